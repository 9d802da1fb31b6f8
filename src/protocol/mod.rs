//! Protocol engine subsystem.
//!
//! # Data Flow
//! ```text
//! transport (HTTP session or stdio)
//!     → jsonrpc.rs (classify request / notification / response)
//!     → engine.rs (ProtocolEngine trait, RequestContext, Notifier)
//!     → server.rs (McpServer: initialize, tools/*, resources/*)
//!     → registered Tool implementations (e.g. search)
//! ```
//!
//! # Design Decisions
//! - Transports depend only on the `ProtocolEngine` trait
//! - One engine instance per session; engines hold no cross-session state
//! - Server-push goes through the `Notifier`, never directly to a socket

pub mod engine;
pub mod jsonrpc;
pub mod server;

pub use engine::{EngineFactory, Notifier, ProtocolEngine, RequestContext};
pub use jsonrpc::{IncomingMessage, JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
pub use server::{Content, McpServer, ServerInfo, TextResource, Tool, ToolError};
