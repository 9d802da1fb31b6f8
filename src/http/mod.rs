//! HTTP surface of the streamable transport.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, layers, lifecycle)
//!     → security (Host/Origin allow-lists, CORS)
//!     → router.rs (classify → registry / factory → transport)
//!     → handlers.rs (/health, /sessions)
//! ```

pub mod handlers;
pub mod router;
pub mod server;

pub use router::{classify, McpRequest, RoutingError};
pub use server::{AppState, McpHttpServer, RunningServer, ServerError};
