//! The protocol engine seam.
//!
//! Transports never build domain logic; they receive an [`EngineFactory`]
//! and ask it for a fully wired engine per connection or session.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::broadcast;

use crate::protocol::jsonrpc::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

/// Capacity of the per-session notification buffer. Slow stream readers that
/// fall further behind than this skip the oldest notifications.
pub const NOTIFICATION_BUFFER: usize = 64;

/// Handles JSON-RPC traffic for one logical connection.
#[async_trait]
pub trait ProtocolEngine: Send + Sync {
    /// Answer a request. Every request gets exactly one response.
    async fn handle_request(&self, request: JsonRpcRequest, ctx: RequestContext) -> JsonRpcResponse;

    /// Consume a notification.
    async fn handle_notification(&self, notification: JsonRpcNotification, ctx: RequestContext);
}

/// Produces a fresh, fully registered engine.
pub type EngineFactory = Arc<dyn Fn() -> Arc<dyn ProtocolEngine> + Send + Sync>;

/// Pushes server-initiated notifications to whatever stream the transport has
/// attached to the connection.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<JsonRpcNotification>,
}

impl Notifier {
    pub fn new(tx: broadcast::Sender<JsonRpcNotification>) -> Self {
        Self { tx }
    }

    /// A notifier with no listener; everything sent is dropped.
    pub fn detached() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Send a notification. Returns false if no stream is listening, which is
    /// not an error: server-push is best effort.
    pub fn notify(&self, notification: JsonRpcNotification) -> bool {
        match self.tx.send(notification) {
            Ok(_) => true,
            Err(broadcast::error::SendError(n)) => {
                tracing::debug!(method = %n.method, "No stream attached, notification dropped");
                false
            }
        }
    }

    /// Send a `notifications/message` log entry.
    pub fn log(&self, level: &str, logger: &str, data: Value) -> bool {
        self.notify(JsonRpcNotification::new(
            "notifications/message",
            Some(json!({ "level": level, "logger": logger, "data": data })),
        ))
    }
}

/// Per-request context handed to the engine.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Session the request belongs to; `None` on stdio.
    pub session_id: Option<String>,
    /// `_meta.progressToken` of the request, if the client asked for progress.
    pub progress_token: Option<Value>,
    pub notifier: Notifier,
}

impl RequestContext {
    pub fn new(session_id: Option<String>, notifier: Notifier) -> Self {
        Self {
            session_id,
            progress_token: None,
            notifier,
        }
    }

    /// Attach the progress token found in `params._meta.progressToken`.
    pub fn with_progress_from(mut self, params: Option<&Value>) -> Self {
        self.progress_token = params
            .and_then(|p| p.get("_meta"))
            .and_then(|m| m.get("progressToken"))
            .cloned();
        self
    }

    /// Report progress if the client supplied a token. No-op otherwise.
    pub fn report_progress(&self, progress: u64, total: Option<u64>, message: Option<&str>) {
        let Some(token) = &self.progress_token else {
            return;
        };
        let mut params = json!({ "progressToken": token, "progress": progress });
        if let Some(total) = total {
            params["total"] = json!(total);
        }
        if let Some(message) = message {
            params["message"] = json!(message);
        }
        self.notifier
            .notify(JsonRpcNotification::new("notifications/progress", Some(params)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_only_with_token() {
        let (tx, mut rx) = broadcast::channel(4);
        let notifier = Notifier::new(tx);

        let ctx = RequestContext::new(None, notifier.clone()).with_progress_from(None);
        ctx.report_progress(1, Some(2), None);
        assert!(rx.try_recv().is_err());

        let params = json!({"_meta": {"progressToken": "tok-1"}});
        let ctx = RequestContext::new(None, notifier).with_progress_from(Some(&params));
        ctx.report_progress(1, Some(2), Some("half"));

        let sent = rx.try_recv().unwrap();
        assert_eq!(sent.method, "notifications/progress");
        assert_eq!(
            sent.params.unwrap(),
            json!({"progressToken": "tok-1", "progress": 1, "total": 2, "message": "half"})
        );
    }

    #[test]
    fn test_detached_notifier_drops() {
        assert!(!Notifier::detached().log("info", "test", json!("hello")));
    }
}
