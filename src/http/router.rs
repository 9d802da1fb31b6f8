//! `/mcp` request routing.
//!
//! Every request is first classified into a [`McpRequest`] from its verb,
//! session header and body, then dispatched. Session lookup happens only
//! after classification, and an unknown session ID is always an error,
//! never an implicit re-initialization.
//!
//! ```text
//! POST   no header + initialize body  → Initialize   → factory → new transport
//! POST   header                       → Session(id)  → registry → transport
//! GET    header                       → Stream(id)   → registry → SSE stream
//! DELETE header                       → Terminate(id)→ registry remove → transport
//! ```

use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Method, Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use crate::http::server::AppState;
use crate::observability::metrics;
use crate::protocol::jsonrpc::{is_initialize_payload, INTERNAL_ERROR, PARSE_ERROR, SERVER_ERROR};
use crate::session::TerminationReason;
use crate::transport::streamable::rpc_error;
use crate::transport::{presented_session_id, TransportError};

const NO_VALID_SESSION: &str = "Bad Request: No valid session ID provided";

/// What an `/mcp` request asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum McpRequest {
    /// POST carrying `initialize` with no session header.
    Initialize,
    /// POST for an existing session.
    Session(String),
    /// GET opening the notification stream of a session.
    Stream(String),
    /// DELETE ending a session.
    Terminate(String),
}

impl McpRequest {
    pub fn session_id(&self) -> Option<&str> {
        match self {
            McpRequest::Initialize => None,
            McpRequest::Session(id) | McpRequest::Stream(id) | McpRequest::Terminate(id) => Some(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
    /// No session header, and the request cannot open a session.
    MissingSessionId,
    UnsupportedMethod(Method),
}

impl IntoResponse for RoutingError {
    fn into_response(self) -> Response {
        match self {
            RoutingError::MissingSessionId => rpc_error(StatusCode::BAD_REQUEST, SERVER_ERROR, NO_VALID_SESSION),
            RoutingError::UnsupportedMethod(_) => {
                let mut response = rpc_error(StatusCode::METHOD_NOT_ALLOWED, SERVER_ERROR, "Method not allowed");
                response
                    .headers_mut()
                    .insert(header::ALLOW, header::HeaderValue::from_static("GET, POST, DELETE"));
                response
            }
        }
    }
}

/// Read the session ID header, ignoring empty or non-ASCII values.
pub fn session_header(headers: &HeaderMap) -> Option<&str> {
    presented_session_id(headers)
}

/// Classify a request. `body` is the parsed payload for POST requests.
pub fn classify(method: &Method, headers: &HeaderMap, body: Option<&Value>) -> Result<McpRequest, RoutingError> {
    let session_id = session_header(headers).map(str::to_string);

    match method {
        &Method::POST => match session_id {
            Some(id) => Ok(McpRequest::Session(id)),
            None if body.is_some_and(is_initialize_payload) => Ok(McpRequest::Initialize),
            None => Err(RoutingError::MissingSessionId),
        },
        &Method::GET => session_id.map(McpRequest::Stream).ok_or(RoutingError::MissingSessionId),
        &Method::DELETE => session_id.map(McpRequest::Terminate).ok_or(RoutingError::MissingSessionId),
        other => Err(RoutingError::UnsupportedMethod(other.clone())),
    }
}

/// 500 response carrying a JSON-RPC error envelope. `detail` goes into
/// `error.data`; it must never include a backtrace.
pub fn internal_error(detail: &str) -> Response {
    let body = json!({
        "jsonrpc": "2.0",
        "error": {
            "code": INTERNAL_ERROR,
            "message": "Internal server error",
            "data": detail,
        },
        "id": null,
    });
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

fn is_json_content_type(headers: &HeaderMap) -> bool {
    match headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
        // Clients that omit the header are given the benefit of the doubt.
        None => true,
        Some(value) => {
            let mime = value.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
            mime == "application/json" || mime.ends_with("+json")
        }
    }
}

/// Handler for every verb on `/mcp`.
pub async fn mcp_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = route(&state, request).await;

    let status = response.status();
    metrics::record_request(method.as_str(), status.as_u16(), start);
    if status.is_server_error() {
        tracing::error!(method = %method, path = %path, status = status.as_u16(), "MCP request failed");
    } else {
        tracing::debug!(method = %method, path = %path, status = status.as_u16(), "MCP request handled");
    }
    response
}

async fn route(state: &AppState, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();

    let payload = if parts.method == Method::POST {
        if !is_json_content_type(&parts.headers) {
            return rpc_error(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                SERVER_ERROR,
                "Unsupported Media Type: Content-Type must be application/json",
            );
        }
        let bytes = match axum::body::to_bytes(body, state.max_body_bytes).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, limit = state.max_body_bytes, "Failed to read request body");
                return rpc_error(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    SERVER_ERROR,
                    "Payload Too Large: request body exceeds the configured limit",
                );
            }
        };
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(error = %e, "Rejected malformed JSON body");
                return rpc_error(StatusCode::BAD_REQUEST, PARSE_ERROR, "Parse error: Invalid JSON");
            }
        }
    } else {
        None
    };

    let classified = match classify(&parts.method, &parts.headers, payload.as_ref()) {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!(method = %parts.method, error = ?e, "Unroutable MCP request");
            return e.into_response();
        }
    };

    let session_id = classified.session_id().map(str::to_string);
    let result = dispatch(state, classified, &parts.headers, payload).await;

    match result {
        Ok(response) => response,
        // The transport closed between lookup and use: same as unknown.
        Err(TransportError::Closed) => rpc_error(StatusCode::BAD_REQUEST, SERVER_ERROR, NO_VALID_SESSION),
        Err(e) => {
            tracing::error!(
                session_id = ?session_id,
                method = %parts.method,
                path = %parts.uri.path(),
                error = %e,
                "Error handling MCP request"
            );
            internal_error(&e.to_string())
        }
    }
}

async fn dispatch(
    state: &AppState,
    request: McpRequest,
    headers: &HeaderMap,
    payload: Option<Value>,
) -> Result<Response, TransportError> {
    match request {
        McpRequest::Initialize => {
            let transport = state.factory.create();
            let response = transport.handle_post(headers, payload.unwrap_or(Value::Null)).await?;
            if let Some(id) = transport.session_id() {
                tracing::info!(session_id = %id, active = state.registry.len(), "New MCP session");
            }
            Ok(response)
        }
        McpRequest::Session(id) => match state.registry.touch(&id) {
            Some(transport) => transport.handle_post(headers, payload.unwrap_or(Value::Null)).await,
            None => Ok(unknown_session(&id)),
        },
        McpRequest::Stream(id) => match state.registry.touch(&id) {
            Some(transport) => transport.handle_get(),
            None => Ok(unknown_session(&id)),
        },
        // Remove before closing so a racing DELETE or the close hook cannot count it twice.
        McpRequest::Terminate(id) => match state.registry.remove(&id, TerminationReason::Deleted) {
            Some(record) => {
                let response = record.transport.handle_delete()?;
                tracing::info!(session_id = %id, remaining = state.registry.len(), "Session terminated by client");
                Ok(response)
            }
            None => Ok(unknown_session(&id)),
        },
    }
}

fn unknown_session(session_id: &str) -> Response {
    tracing::debug!(session_id = %session_id, "Request for unknown session");
    rpc_error(StatusCode::BAD_REQUEST, SERVER_ERROR, NO_VALID_SESSION)
}
