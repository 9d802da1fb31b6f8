//! Session management subsystem.
//!
//! # Data Flow
//! ```text
//! TransportFactory on_initialized hook
//!     → registry.rs insert (the only way a session appears)
//!
//! Router:
//!     session ID header → registry.rs touch → transport
//!
//! Removal paths:
//!     DELETE → router → registry.rs terminate
//!     sweeper.rs tick → registry.rs terminate (expired)
//!     transport closes itself → on_closed hook → registry.rs remove
//!     shutdown → registry.rs drain
//! ```
//!
//! # Session States
//! ```text
//! uninitialized → active → terminated
//! ```

pub mod registry;
pub mod sweeper;

pub use registry::{SessionRecord, SessionRegistry, SessionStats, TerminationReason, WeakSessionRegistry};
pub use sweeper::SessionSweeper;
