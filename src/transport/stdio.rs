//! Single-connection transport over standard streams.
//!
//! Newline-delimited JSON-RPC: one message (or batch) per input line, one
//! response per output line. Notifications pushed by the engine are written
//! to the same output, between responses.

use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{broadcast, mpsc};

use crate::protocol::engine::{Notifier, ProtocolEngine, RequestContext, NOTIFICATION_BUFFER};
use crate::protocol::jsonrpc::{IncomingMessage, JsonRpcResponse, INVALID_REQUEST, PARSE_ERROR};

pub struct StdioTransport {
    engine: Arc<dyn ProtocolEngine>,
}

impl StdioTransport {
    pub fn new(engine: Arc<dyn ProtocolEngine>) -> Self {
        Self { engine }
    }

    /// Serve the process's stdin/stdout until stdin closes.
    pub async fn run_stdio(self) -> std::io::Result<()> {
        self.run(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve until `reader` reaches EOF.
    pub async fn run<R, W>(self, reader: R, writer: W) -> std::io::Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (out_tx, out_rx) = mpsc::unbounded_channel::<String>();
        let writer_task = tokio::spawn(write_lines(writer, out_rx));

        let (note_tx, mut note_rx) = broadcast::channel(NOTIFICATION_BUFFER);
        let notifier = Notifier::new(note_tx);
        let forward_tx = out_tx.clone();
        let forwarder = tokio::spawn(async move {
            loop {
                match note_rx.recv().await {
                    Ok(notification) => match serde_json::to_string(&notification) {
                        Ok(line) => {
                            if forward_tx.send(line).is_err() {
                                break;
                            }
                        }
                        Err(e) => tracing::warn!(error = %e, "Dropping unencodable notification"),
                    },
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Stdio notification forwarder lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        tracing::info!("Stdio transport ready");

        let mut lines = BufReader::new(reader).lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(output) = self.handle_line(line, &notifier).await {
                if out_tx.send(output).is_err() {
                    break;
                }
            }
        }

        tracing::info!("Stdin closed, stdio transport stopping");
        drop(notifier);
        let _ = forwarder.await;
        drop(out_tx);
        writer_task
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?
    }

    /// Process one input line; returns the line to write back, if any.
    async fn handle_line(&self, line: &str, notifier: &Notifier) -> Option<String> {
        let payload: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                let resp = JsonRpcResponse::error(Value::Null, PARSE_ERROR, format!("Parse error: {}", e));
                return serde_json::to_string(&resp).ok();
            }
        };

        let (items, is_batch) = match payload {
            Value::Array(items) => (items, true),
            single => (vec![single], false),
        };

        let mut responses = Vec::new();
        for item in items {
            let ctx = RequestContext::new(None, notifier.clone());
            match IncomingMessage::from_value(item) {
                Some(IncomingMessage::Request(request)) => {
                    responses.push(self.engine.handle_request(request, ctx).await);
                }
                Some(IncomingMessage::Notification(notification)) => {
                    self.engine.handle_notification(notification, ctx).await;
                }
                Some(IncomingMessage::Response(_)) => {}
                None => responses.push(JsonRpcResponse::error(Value::Null, INVALID_REQUEST, "Invalid Request")),
            }
        }

        if responses.is_empty() {
            None
        } else if is_batch {
            serde_json::to_string(&responses).ok()
        } else {
            serde_json::to_string(&responses[0]).ok()
        }
    }
}

async fn write_lines<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<String>) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = rx.recv().await {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::jsonrpc::{JsonRpcNotification, JsonRpcRequest};
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::io::AsyncReadExt;

    struct ChattyEngine;

    #[async_trait]
    impl ProtocolEngine for ChattyEngine {
        async fn handle_request(&self, request: JsonRpcRequest, ctx: RequestContext) -> JsonRpcResponse {
            ctx.notifier.log("info", "test", json!("working"));
            JsonRpcResponse::success(request.id, json!({ "echo": request.method }))
        }
        async fn handle_notification(&self, _n: JsonRpcNotification, _ctx: RequestContext) {}
    }

    async fn run_with_input(input: &str) -> Vec<Value> {
        let (client, server_out) = tokio::io::duplex(64 * 1024);
        let transport = StdioTransport::new(Arc::new(ChattyEngine));
        transport.run(input.as_bytes(), server_out).await.unwrap();

        let mut output = String::new();
        let mut client = client;
        client.read_to_string(&mut output).await.unwrap();
        output
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_request_response_and_notifications() {
        let out = run_with_input(
            "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n\n{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n",
        )
        .await;

        let response = out.iter().find(|v| v.get("id") == Some(&json!(1))).unwrap();
        assert_eq!(response["result"]["echo"], "ping");
        assert!(out.iter().any(|v| v["method"] == "notifications/message"));
        // The notification line produces no response.
        assert_eq!(out.iter().filter(|v| v.get("id").is_some()).count(), 1);
    }

    #[tokio::test]
    async fn test_parse_error_and_invalid_request() {
        let out = run_with_input("not json\n{\"foo\":1}\n").await;
        assert_eq!(out[0]["error"]["code"], PARSE_ERROR);
        assert_eq!(out[1]["error"]["code"], INVALID_REQUEST);
    }

    #[tokio::test]
    async fn test_batch_yields_array() {
        let out = run_with_input(
            "[{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"a\"},{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"b\"}]\n",
        )
        .await;
        let batch = out.iter().find(|v| v.is_array()).unwrap();
        assert_eq!(batch.as_array().unwrap().len(), 2);
    }
}
