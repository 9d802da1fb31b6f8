//! Search-backed text retrieval, the domain behind the `web_search` tool.
//!
//! # Design Decisions
//! - Outbound calls are async with their own timeout; a slow search API
//!   never stalls other sessions
//! - Upstream failures surface as tool errors (`isError: true`), not as
//!   transport errors

pub mod client;
pub mod tool;

pub use client::{SearchClient, SearchError, SearchHit};
pub use tool::SearchTool;

use std::sync::Arc;

use crate::config::SearchConfig;
use crate::protocol::{EngineFactory, McpServer, ProtocolEngine, ServerInfo, TextResource};

const USAGE_URI: &str = "docs://web_search/usage";

const USAGE_TEXT: &str = "\
web_search looks up text on the configured search API.

Arguments:
  query        non-empty search string (required)
  max_results  1-20, defaults to the server setting

Pass a progressToken in _meta to receive notifications/progress while the
search runs.
";

/// Engine factory wiring a fresh [`McpServer`] with the `web_search` tool and
/// its usage resource. The HTTP client is shared; engines are not.
pub fn engine_factory(config: &SearchConfig) -> Result<EngineFactory, SearchError> {
    let client = SearchClient::new(config)?;
    let default_max_results = config.default_max_results;

    Ok(Arc::new(move || {
        let engine = McpServer::new(ServerInfo::default())
            .with_tool(Arc::new(SearchTool::new(client.clone(), default_max_results)))
            .with_resource(TextResource {
                uri: USAGE_URI.to_string(),
                name: "web_search usage".to_string(),
                description: "How to call the web_search tool".to_string(),
                mime_type: "text/plain".to_string(),
                text: USAGE_TEXT.to_string(),
            });
        Arc::new(engine) as Arc<dyn ProtocolEngine>
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::engine::{Notifier, RequestContext};
    use crate::protocol::jsonrpc::JsonRpcRequest;
    use serde_json::json;

    #[tokio::test]
    async fn test_factory_registers_tool_and_resource() {
        let factory = engine_factory(&SearchConfig::default()).unwrap();
        let engine = factory();

        let ctx = || RequestContext::new(None, Notifier::detached());
        let tools = engine
            .handle_request(
                JsonRpcRequest::new(json!(1), "tools/list", None),
                ctx(),
            )
            .await;
        let names: Vec<_> = tools.result.unwrap()["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["web_search"]);

        let resource = engine
            .handle_request(
                JsonRpcRequest::new(json!(2), "resources/read", Some(json!({"uri": USAGE_URI}))),
                ctx(),
            )
            .await;
        assert!(resource.result.unwrap()["contents"][0]["text"]
            .as_str()
            .unwrap()
            .contains("max_results"));
    }
}
