//! Transport subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP (many sessions):
//!     router → factory.rs (new session) → streamable.rs (per-session transport)
//!                                        → ProtocolEngine
//!
//! stdio (one connection):
//!     stdin lines → stdio.rs → ProtocolEngine → stdout lines
//! ```
//!
//! # Design Decisions
//! - A transport owns exactly one engine; engines are never shared
//! - Session registration happens through injected hooks, not shared globals

pub mod factory;
pub mod stdio;
pub mod streamable;

/// Header carrying the session ID on every request after initialization.
pub const MCP_SESSION_ID_HEADER: &str = "mcp-session-id";

/// Bare spelling some clients send. Read as a fallback, never written.
pub const SESSION_ID_HEADER: &str = "session-id";

/// Session ID presented by the client, preferring `mcp-session-id`.
/// Empty or non-ASCII values count as absent.
pub fn presented_session_id(headers: &axum::http::HeaderMap) -> Option<&str> {
    [MCP_SESSION_ID_HEADER, SESSION_ID_HEADER].into_iter().find_map(|name| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
    })
}

pub use factory::TransportFactory;
pub use stdio::StdioTransport;
pub use streamable::{StreamableTransport, TransportError, TransportHooks};
