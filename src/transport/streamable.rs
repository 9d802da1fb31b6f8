//! Streamable HTTP transport for one session.
//!
//! # Responsibilities
//! - Assign the session ID when the `initialize` request arrives
//! - Feed POSTed JSON-RPC messages to the session's engine
//! - Hold the standalone SSE stream used for server-push notifications
//! - Close exactly once, on DELETE, eviction, shutdown or stream failure
//!
//! # State
//! ```text
//! uninitialized ──initialize──▶ active ──close()──▶ terminated
//! ```

use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use axum::{
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures_util::stream::{self, Stream};
use serde_json::{Value, json};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::protocol::engine::{Notifier, ProtocolEngine, RequestContext, NOTIFICATION_BUFFER};
use crate::protocol::jsonrpc::{
    IncomingMessage, JsonRpcNotification, JsonRpcResponse, INVALID_REQUEST, SERVER_ERROR,
};
use crate::transport::{presented_session_id, MCP_SESSION_ID_HEADER};

/// Keep-alive comment interval on the notification stream.
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Produces a fresh session ID.
pub type SessionIdGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// Invoked once the transport has a session ID and can take traffic.
pub type OnSessionInitialized = Arc<dyn Fn(&str, Arc<StreamableTransport>) + Send + Sync>;

/// Invoked once when the transport closes.
pub type OnSessionClosed = Arc<dyn Fn(&str) + Send + Sync>;

/// Default generator: random UUID v4.
pub fn uuid_session_id() -> SessionIdGenerator {
    Arc::new(|| uuid::Uuid::new_v4().to_string())
}

/// Errors surfaced to the router. Protocol-level problems are answered
/// inline as JSON-RPC responses and never become a `TransportError`.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport was closed before or while handling the request.
    #[error("session is closed")]
    Closed,

    /// Response could not be serialized.
    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Lifecycle callbacks injected by the factory.
#[derive(Clone)]
pub struct TransportHooks {
    pub on_initialized: OnSessionInitialized,
    pub on_closed: OnSessionClosed,
}

impl TransportHooks {
    /// Hooks that do nothing; useful when no registry is involved.
    pub fn noop() -> Self {
        Self {
            on_initialized: Arc::new(|_: &str, _: Arc<StreamableTransport>| {}),
            on_closed: Arc::new(|_: &str| {}),
        }
    }
}

pub struct StreamableTransport {
    engine: Arc<dyn ProtocolEngine>,
    id_generator: SessionIdGenerator,
    hooks: TransportHooks,
    session_id: OnceLock<String>,
    closed: AtomicBool,
    /// Dropped on close so attached streams end.
    notifications: Mutex<Option<broadcast::Sender<JsonRpcNotification>>>,
    stream_attached: Arc<AtomicBool>,
}

impl std::fmt::Debug for StreamableTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamableTransport")
            .field("session_id", &self.session_id.get())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl StreamableTransport {
    pub fn new(engine: Arc<dyn ProtocolEngine>, id_generator: SessionIdGenerator, hooks: TransportHooks) -> Arc<Self> {
        let (tx, _) = broadcast::channel(NOTIFICATION_BUFFER);
        Arc::new(Self {
            engine,
            id_generator,
            hooks,
            session_id: OnceLock::new(),
            closed: AtomicBool::new(false),
            notifications: Mutex::new(Some(tx)),
            stream_attached: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.get().map(String::as_str)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Whether a GET stream is currently attached.
    pub fn has_stream(&self) -> bool {
        self.stream_attached.load(Ordering::Acquire)
    }

    fn notifier(&self) -> Option<Notifier> {
        self.notifications
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|tx| Notifier::new(tx.clone())))
    }

    /// Handle a client→server POST carrying one message or a batch.
    pub async fn handle_post(self: &Arc<Self>, headers: &HeaderMap, payload: Value) -> Result<Response, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let (raw, is_batch): (Vec<Value>, bool) = match payload {
            Value::Array(items) if items.is_empty() => {
                return Ok(rpc_error(StatusCode::BAD_REQUEST, INVALID_REQUEST, "Invalid Request: empty batch"));
            }
            Value::Array(items) => (items, true),
            single => (vec![single], false),
        };

        let mut messages = Vec::with_capacity(raw.len());
        for value in raw {
            match IncomingMessage::from_value(value) {
                Some(m) => messages.push(m),
                None => {
                    return Ok(rpc_error(
                        StatusCode::BAD_REQUEST,
                        INVALID_REQUEST,
                        "Invalid Request: not a JSON-RPC 2.0 message",
                    ));
                }
            }
        }

        if messages.iter().any(IncomingMessage::is_initialize) {
            if self.session_id.get().is_some() {
                return Ok(rpc_error(StatusCode::BAD_REQUEST, INVALID_REQUEST, "Invalid Request: Server already initialized"));
            }
            if messages.len() > 1 {
                return Ok(rpc_error(
                    StatusCode::BAD_REQUEST,
                    INVALID_REQUEST,
                    "Invalid Request: Only one initialization request is allowed",
                ));
            }
            let id = (self.id_generator)();
            if self.session_id.set(id.clone()).is_err() {
                return Ok(rpc_error(StatusCode::BAD_REQUEST, INVALID_REQUEST, "Invalid Request: Server already initialized"));
            }
            tracing::debug!(session_id = %id, "Session initialized");
            (self.hooks.on_initialized)(&id, Arc::clone(self));
        } else {
            let Some(own_id) = self.session_id() else {
                return Ok(rpc_error(StatusCode::BAD_REQUEST, SERVER_ERROR, "Bad Request: Server not initialized"));
            };
            let presented = presented_session_id(headers);
            if presented != Some(own_id) {
                return Ok(rpc_error(StatusCode::NOT_FOUND, SERVER_ERROR, "Session not found"));
            }
        }

        let notifier = self.notifier().ok_or(TransportError::Closed)?;
        let session_id = self.session_id().map(str::to_string);

        let mut responses: Vec<JsonRpcResponse> = Vec::new();
        for message in messages {
            let ctx = RequestContext::new(session_id.clone(), notifier.clone());
            match message {
                IncomingMessage::Request(request) => {
                    responses.push(self.engine.handle_request(request, ctx).await);
                }
                IncomingMessage::Notification(notification) => {
                    self.engine.handle_notification(notification, ctx).await;
                }
                IncomingMessage::Response(_) => {
                    tracing::debug!(session_id = ?session_id, "Ignoring client response");
                }
            }
        }

        let mut response = if responses.is_empty() {
            StatusCode::ACCEPTED.into_response()
        } else if is_batch {
            Json(serde_json::to_value(&responses)?).into_response()
        } else {
            Json(serde_json::to_value(&responses[0])?).into_response()
        };
        self.attach_session_header(&mut response);
        Ok(response)
    }

    /// Attach the server→client notification stream.
    pub fn handle_get(&self) -> Result<Response, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        if self
            .stream_attached
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(rpc_error(
                StatusCode::CONFLICT,
                SERVER_ERROR,
                "Conflict: Only one SSE stream is allowed per session",
            ));
        }

        let receiver = match self.notifications.lock() {
            Ok(guard) => guard.as_ref().map(broadcast::Sender::subscribe),
            Err(_) => None,
        };
        let Some(receiver) = receiver else {
            self.stream_attached.store(false, Ordering::Release);
            return Err(TransportError::Closed);
        };

        tracing::debug!(session_id = ?self.session_id(), "Notification stream attached");
        let guard = StreamGuard(Arc::clone(&self.stream_attached));
        let sse = Sse::new(notification_stream(receiver, guard))
            .keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL));

        let mut response = sse.into_response();
        self.attach_session_header(&mut response);
        Ok(response)
    }

    /// Terminate the session: close, then acknowledge.
    pub fn handle_delete(&self) -> Result<Response, TransportError> {
        if !self.close() {
            return Err(TransportError::Closed);
        }
        Ok(StatusCode::OK.into_response())
    }

    /// Close the transport. Returns true only for the call that actually
    /// closed it; the close hook runs on that call alone.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        if let Ok(mut guard) = self.notifications.lock() {
            guard.take();
        }
        if let Some(id) = self.session_id.get() {
            tracing::debug!(session_id = %id, "Transport closed");
            (self.hooks.on_closed)(id);
        }
        true
    }

    fn attach_session_header(&self, response: &mut Response) {
        if let Some(id) = self.session_id() {
            if let Ok(value) = HeaderValue::from_str(id) {
                response.headers_mut().insert(MCP_SESSION_ID_HEADER, value);
            }
        }
    }
}

/// Clears the attached flag when the stream is dropped.
struct StreamGuard(Arc<AtomicBool>);

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn notification_stream(
    receiver: broadcast::Receiver<JsonRpcNotification>,
    guard: StreamGuard,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold((receiver, guard), |(mut receiver, guard)| async move {
        loop {
            match receiver.recv().await {
                Ok(notification) => {
                    let data = match serde_json::to_string(&notification) {
                        Ok(data) => data,
                        Err(e) => {
                            tracing::warn!(error = %e, "Dropping unencodable notification");
                            continue;
                        }
                    };
                    let event = Event::default().event("message").data(data);
                    return Some((Ok(event), (receiver, guard)));
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Notification stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
}

/// JSON-RPC error envelope with `id: null` and the given HTTP status.
pub fn rpc_error(status: StatusCode, code: i64, message: &str) -> Response {
    let body = json!({
        "jsonrpc": "2.0",
        "error": { "code": code, "message": message },
        "id": null,
    });
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}
