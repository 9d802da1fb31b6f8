//! Tool and resource dispatching engine.
//!
//! `McpServer` is the concrete [`ProtocolEngine`]: it negotiates the protocol
//! version on `initialize`, lists and calls registered tools, and serves a set
//! of static text resources.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;

use crate::protocol::engine::{ProtocolEngine, RequestContext};
use crate::protocol::jsonrpc::{
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, INVALID_PARAMS, METHOD_NOT_FOUND,
};

pub const LATEST_PROTOCOL_VERSION: &str = "2025-06-18";
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-06-18", "2025-03-26", "2024-11-05"];

/// Failure of a tool call.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Arguments did not satisfy the tool's input schema. Reported as a
    /// JSON-RPC error.
    #[error("Invalid arguments: {0}")]
    InvalidParams(String),

    /// The tool ran but failed. Reported as a tool result with `isError`.
    #[error("{0}")]
    Execution(String),
}

/// One block of tool output.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Text(String),
}

impl Content {
    fn to_json(&self) -> Value {
        match self {
            Content::Text(text) => json!({ "type": "text", "text": text }),
        }
    }
}

/// A named operation callable through `tools/call`.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON Schema of the `arguments` object.
    fn input_schema(&self) -> Value;
    async fn call(&self, arguments: Value, ctx: &RequestContext) -> Result<Vec<Content>, ToolError>;
}

/// A static text resource served by `resources/read`.
#[derive(Debug, Clone)]
pub struct TextResource {
    pub uri: String,
    pub name: String,
    pub description: String,
    pub mime_type: String,
    pub text: String,
}

/// Server identity reported on `initialize`.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
    pub instructions: Option<String>,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            instructions: None,
        }
    }
}

/// Builder-style engine holding tool and resource registrations.
pub struct McpServer {
    info: ServerInfo,
    tools: BTreeMap<String, Arc<dyn Tool>>,
    resources: BTreeMap<String, TextResource>,
    initialized: AtomicBool,
}

impl McpServer {
    pub fn new(info: ServerInfo) -> Self {
        Self {
            info,
            tools: BTreeMap::new(),
            resources: BTreeMap::new(),
            initialized: AtomicBool::new(false),
        }
    }

    /// Register a tool. A later registration with the same name replaces the
    /// earlier one.
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.insert(tool.name().to_string(), tool);
        self
    }

    pub fn with_resource(mut self, resource: TextResource) -> Self {
        self.resources.insert(resource.uri.clone(), resource);
        self
    }

    /// Whether the client has sent `notifications/initialized`.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    fn initialize(&self, params: Option<&Value>) -> Value {
        let requested = params
            .and_then(|p| p.get("protocolVersion"))
            .and_then(Value::as_str);
        let version = match requested {
            Some(v) if SUPPORTED_PROTOCOL_VERSIONS.contains(&v) => v,
            _ => LATEST_PROTOCOL_VERSION,
        };

        let mut result = json!({
            "protocolVersion": version,
            "capabilities": {
                "tools": { "listChanged": false },
                "resources": { "subscribe": false, "listChanged": false },
                "logging": {},
            },
            "serverInfo": { "name": self.info.name, "version": self.info.version },
        });
        if let Some(instructions) = &self.info.instructions {
            result["instructions"] = json!(instructions);
        }
        result
    }

    fn list_tools(&self) -> Value {
        let tools: Vec<Value> = self
            .tools
            .values()
            .map(|t| {
                json!({
                    "name": t.name(),
                    "description": t.description(),
                    "inputSchema": t.input_schema(),
                })
            })
            .collect();
        json!({ "tools": tools })
    }

    async fn call_tool(&self, id: Value, params: Option<Value>, ctx: RequestContext) -> JsonRpcResponse {
        let params = params.unwrap_or(Value::Null);
        let Some(name) = params.get("name").and_then(Value::as_str) else {
            return JsonRpcResponse::error(id, INVALID_PARAMS, "Missing tool name");
        };
        let Some(tool) = self.tools.get(name) else {
            return JsonRpcResponse::error(id, INVALID_PARAMS, format!("Unknown tool: {}", name));
        };
        let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

        tracing::debug!(tool = %name, session_id = ?ctx.session_id, "Calling tool");

        match tool.call(arguments, &ctx).await {
            Ok(content) => {
                let content: Vec<Value> = content.iter().map(Content::to_json).collect();
                JsonRpcResponse::success(id, json!({ "content": content, "isError": false }))
            }
            Err(ToolError::InvalidParams(msg)) => {
                JsonRpcResponse::error(id, INVALID_PARAMS, format!("Invalid arguments: {}", msg))
            }
            Err(ToolError::Execution(msg)) => {
                tracing::warn!(tool = %name, error = %msg, "Tool execution failed");
                JsonRpcResponse::success(
                    id,
                    json!({ "content": [{ "type": "text", "text": msg }], "isError": true }),
                )
            }
        }
    }

    fn list_resources(&self) -> Value {
        let resources: Vec<Value> = self
            .resources
            .values()
            .map(|r| {
                json!({
                    "uri": r.uri,
                    "name": r.name,
                    "description": r.description,
                    "mimeType": r.mime_type,
                })
            })
            .collect();
        json!({ "resources": resources })
    }

    fn read_resource(&self, id: Value, params: Option<&Value>) -> JsonRpcResponse {
        let Some(uri) = params.and_then(|p| p.get("uri")).and_then(Value::as_str) else {
            return JsonRpcResponse::error(id, INVALID_PARAMS, "Missing resource uri");
        };
        match self.resources.get(uri) {
            Some(r) => JsonRpcResponse::success(
                id,
                json!({ "contents": [{ "uri": r.uri, "mimeType": r.mime_type, "text": r.text }] }),
            ),
            None => JsonRpcResponse::error(id, INVALID_PARAMS, format!("Resource not found: {}", uri)),
        }
    }
}

#[async_trait]
impl ProtocolEngine for McpServer {
    async fn handle_request(&self, request: JsonRpcRequest, ctx: RequestContext) -> JsonRpcResponse {
        let JsonRpcRequest { id, method, params, .. } = request;
        match method.as_str() {
            "initialize" => JsonRpcResponse::success(id, self.initialize(params.as_ref())),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => JsonRpcResponse::success(id, self.list_tools()),
            "tools/call" => {
                let ctx = ctx.with_progress_from(params.as_ref());
                self.call_tool(id, params, ctx).await
            }
            "resources/list" => JsonRpcResponse::success(id, self.list_resources()),
            "resources/read" => self.read_resource(id, params.as_ref()),
            other => JsonRpcResponse::error(id, METHOD_NOT_FOUND, format!("Method not found: {}", other)),
        }
    }

    async fn handle_notification(&self, notification: JsonRpcNotification, ctx: RequestContext) {
        match notification.method.as_str() {
            "notifications/initialized" => {
                self.initialized.store(true, Ordering::Release);
                tracing::debug!(session_id = ?ctx.session_id, "Client initialized");
            }
            "notifications/cancelled" => {
                tracing::debug!(session_id = ?ctx.session_id, "Client cancelled a request");
            }
            other => tracing::debug!(method = %other, "Ignoring notification"),
        }
    }
}
