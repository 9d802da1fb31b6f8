//! `web_search` tool: text retrieval backed by the search API.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::protocol::engine::RequestContext;
use crate::protocol::server::{Content, Tool, ToolError};
use crate::search::client::{SearchClient, SearchHit};

pub const MAX_RESULTS_LIMIT: u32 = 20;

pub struct SearchTool {
    client: SearchClient,
    default_max_results: u32,
}

impl SearchTool {
    pub fn new(client: SearchClient, default_max_results: u32) -> Self {
        Self {
            client,
            default_max_results: default_max_results.clamp(1, MAX_RESULTS_LIMIT),
        }
    }

    fn parse_arguments(&self, arguments: &Value) -> Result<(String, u32), ToolError> {
        let query = match arguments.get("query") {
            Some(Value::String(q)) if !q.trim().is_empty() => q.trim().to_string(),
            Some(Value::String(_)) => return Err(ToolError::InvalidParams("query must not be empty".into())),
            Some(_) => return Err(ToolError::InvalidParams("query must be a string".into())),
            None => return Err(ToolError::InvalidParams("query is required".into())),
        };

        let max_results = match arguments.get("max_results") {
            None | Some(Value::Null) => self.default_max_results,
            Some(v) => match v.as_u64() {
                Some(n) if (1..=MAX_RESULTS_LIMIT as u64).contains(&n) => n as u32,
                _ => {
                    return Err(ToolError::InvalidParams(format!(
                        "max_results must be an integer between 1 and {}",
                        MAX_RESULTS_LIMIT
                    )))
                }
            },
        };

        Ok((query, max_results))
    }
}

fn format_hits(query: &str, hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return format!("No results found for \"{}\".", query);
    }
    let mut out = format!("Results for \"{}\":\n", query);
    for (i, hit) in hits.iter().enumerate() {
        out.push_str(&format!("\n{}. {}\n   {}\n   {}\n", i + 1, hit.title, hit.url, hit.content));
    }
    out
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web and return the most relevant text passages."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search query" },
                "max_results": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": MAX_RESULTS_LIMIT,
                    "description": "Number of results to return"
                }
            },
            "required": ["query"]
        })
    }

    async fn call(&self, arguments: Value, ctx: &RequestContext) -> Result<Vec<Content>, ToolError> {
        let (query, max_results) = self.parse_arguments(&arguments)?;

        ctx.report_progress(0, Some(1), Some("searching"));
        let hits = self
            .client
            .search(&query, max_results)
            .await
            .map_err(|e| ToolError::Execution(e.to_string()))?;
        ctx.report_progress(1, Some(1), None);

        tracing::info!(session_id = ?ctx.session_id, results = hits.len(), "Search completed");
        Ok(vec![Content::Text(format_hits(&query, &hits))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchConfig;
    use crate::protocol::engine::Notifier;
    use axum::{routing::post, Json, Router};
    use tokio::sync::broadcast;

    fn tool_for(endpoint: String) -> SearchTool {
        let config = SearchConfig {
            endpoint,
            timeout_secs: 5,
            ..SearchConfig::default()
        };
        SearchTool::new(SearchClient::new(&config).unwrap(), 3)
    }

    #[test]
    fn test_argument_validation() {
        let tool = tool_for("http://127.0.0.1:9/search".into());

        assert_eq!(
            tool.parse_arguments(&json!({"query": "  rust  "})).unwrap(),
            ("rust".to_string(), 3)
        );
        assert_eq!(
            tool.parse_arguments(&json!({"query": "rust", "max_results": 10})).unwrap().1,
            10
        );
        assert!(matches!(tool.parse_arguments(&json!({})), Err(ToolError::InvalidParams(_))));
        assert!(matches!(tool.parse_arguments(&json!({"query": ""})), Err(ToolError::InvalidParams(_))));
        assert!(matches!(tool.parse_arguments(&json!({"query": 7})), Err(ToolError::InvalidParams(_))));
        assert!(matches!(
            tool.parse_arguments(&json!({"query": "x", "max_results": 0})),
            Err(ToolError::InvalidParams(_))
        ));
        assert!(matches!(
            tool.parse_arguments(&json!({"query": "x", "max_results": 21})),
            Err(ToolError::InvalidParams(_))
        ));
    }

    #[test]
    fn test_format_hits() {
        assert_eq!(format_hits("q", &[]), "No results found for \"q\".");
        let text = format_hits(
            "q",
            &[SearchHit {
                title: "Title".into(),
                url: "https://example.com".into(),
                content: "Body".into(),
            }],
        );
        assert!(text.contains("1. Title"));
        assert!(text.contains("https://example.com"));
    }

    #[tokio::test]
    async fn test_search_against_mock_backend() {
        let app = Router::new().route(
            "/search",
            post(|Json(body): Json<Value>| async move {
                let q = body["query"].as_str().unwrap_or_default().to_string();
                Json(json!({"results": [
                    {"title": format!("About {}", q), "url": "https://a.example", "content": "A"},
                    {"title": "Second", "url": "https://b.example", "content": "B"},
                    {"title": "Third", "url": "https://c.example", "content": "C"},
                ]}))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let tool = tool_for(format!("http://{}/search", addr));
        let (tx, mut rx) = broadcast::channel(8);
        let params = json!({"_meta": {"progressToken": 7}});
        let ctx = RequestContext::new(Some("s-1".into()), Notifier::new(tx)).with_progress_from(Some(&params));

        let content = tool
            .call(json!({"query": "tokio", "max_results": 2}), &ctx)
            .await
            .unwrap();
        let Content::Text(text) = &content[0];
        assert!(text.contains("About tokio"));
        assert!(text.contains("Second"));
        assert!(!text.contains("Third"));

        assert_eq!(rx.recv().await.unwrap().method, "notifications/progress");
        assert_eq!(rx.recv().await.unwrap().method, "notifications/progress");
    }

    #[tokio::test]
    async fn test_backend_failure_is_execution_error() {
        let app = Router::new().route(
            "/search",
            post(|| async { (axum::http::StatusCode::BAD_GATEWAY, "upstream down") }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let tool = tool_for(format!("http://{}/search", addr));
        let ctx = RequestContext::new(None, Notifier::detached());
        let err = tool.call(json!({"query": "x"}), &ctx).await.unwrap_err();
        assert!(matches!(err, ToolError::Execution(ref m) if m.contains("502")));
    }
}
