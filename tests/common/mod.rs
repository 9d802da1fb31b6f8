//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
    response::Response,
};
use serde_json::{json, Value};

use mcp_session_server::protocol::{Content, McpServer, RequestContext, ServerInfo, Tool, ToolError};
use mcp_session_server::{EngineFactory, McpHttpServer, ProtocolEngine, ServerConfig, MCP_SESSION_ID_HEADER};

pub const HOST: &str = "localhost";

/// Echoes `text` back and pushes one log notification per call.
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo the text argument"
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {"text": {"type": "string"}}, "required": ["text"]})
    }

    async fn call(&self, arguments: Value, ctx: &RequestContext) -> Result<Vec<Content>, ToolError> {
        let text = arguments
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidParams("text is required".into()))?;
        ctx.notifier.log("info", "echo", json!(text));
        Ok(vec![Content::Text(text.to_string())])
    }
}

pub fn test_engines() -> EngineFactory {
    Arc::new(|| Arc::new(McpServer::new(ServerInfo::default()).with_tool(Arc::new(EchoTool))) as Arc<dyn ProtocolEngine>)
}

/// HTTP enabled on an ephemeral loopback port, default allow-lists.
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.transport.http_enabled = true;
    config.transport.host = "127.0.0.1".to_string();
    config.transport.port = 0;
    config.security.allowed_hosts = vec!["localhost".to_string(), "127.0.0.1".to_string()];
    config
}

pub fn test_server() -> McpHttpServer {
    McpHttpServer::new(test_config(), test_engines()).unwrap()
}

pub fn init_body() -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {
            "protocolVersion": "2025-06-18",
            "capabilities": {},
            "clientInfo": {"name": "integration-test", "version": "0.0.0"}
        }
    })
}

pub fn ping_body(id: u64) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "method": "ping"})
}

pub fn post(body: &Value, session: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/mcp")
        .header(header::HOST, HOST)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::ACCEPT, "application/json, text/event-stream");
    if let Some(id) = session {
        builder = builder.header(MCP_SESSION_ID_HEADER, id);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn request(method: Method, uri: &str, session: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri).header(header::HOST, HOST);
    if let Some(id) = session {
        builder = builder.header(MCP_SESSION_ID_HEADER, id);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn session_id(response: &Response) -> Option<String> {
    response
        .headers()
        .get(MCP_SESSION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

pub async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
