//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → main → RunningServer::stop
//!
//! Shutdown (shutdown.rs):
//!     stop → trigger → sweeper exits → sessions drained → listener closed
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
