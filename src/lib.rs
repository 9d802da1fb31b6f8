//! MCP session server library.
//!
//! Serves a Model Context Protocol engine over streamable HTTP, with one
//! stateful session per client, or over stdio for a single local client.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod protocol;
pub mod search;
pub mod security;
pub mod session;
pub mod transport;

pub use config::schema::ServerConfig;
pub use http::{McpHttpServer, RunningServer, ServerError};
pub use lifecycle::Shutdown;
pub use protocol::{EngineFactory, McpServer, ProtocolEngine};
pub use session::SessionRegistry;
pub use transport::{StdioTransport, StreamableTransport, MCP_SESSION_ID_HEADER};
