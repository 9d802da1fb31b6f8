//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! ServerConfig
//!     → tls.rs (load and check PEM material, at construction)
//!     → listener.rs (bind host/port, at start)
//!     → plain axum server, or rustls acceptor when TLS is enabled
//! ```
//!
//! # Design Decisions
//! - Certificate problems surface before any socket is bound
//! - TLS is optional and handled transparently by the HTTP layer

pub mod listener;
pub mod tls;

pub use listener::{Listener, ListenerError};
pub use tls::{TlsError, TlsMaterial};
