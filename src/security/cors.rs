//! CORS policy for browser clients.

use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::SecurityConfig;
use crate::transport::{MCP_SESSION_ID_HEADER, SESSION_ID_HEADER};

const MCP_PROTOCOL_VERSION_HEADER: &str = "mcp-protocol-version";
const LAST_EVENT_ID_HEADER: &str = "last-event-id";

/// Build the CORS layer from the origin allow-list. A `*` entry allows any
/// origin; entries that are not valid header values are skipped.
pub fn build_cors_layer(config: &SecurityConfig) -> CorsLayer {
    let session_header = HeaderName::from_static(MCP_SESSION_ID_HEADER);

    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
            session_header.clone(),
            HeaderName::from_static(SESSION_ID_HEADER),
            HeaderName::from_static(MCP_PROTOCOL_VERSION_HEADER),
            HeaderName::from_static(LAST_EVENT_ID_HEADER),
        ])
        .expose_headers([session_header]);

    if config.allowed_origins.iter().any(|o| o.trim() == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim().trim_end_matches('/')) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Skipping invalid CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(origins))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, routing::post, Router};
    use tower::ServiceExt;

    fn app(origins: &[&str]) -> Router {
        let config = SecurityConfig {
            allowed_origins: origins.iter().map(|s| s.to_string()).collect(),
            ..SecurityConfig::default()
        };
        Router::new()
            .route("/mcp", post(|| async { "ok" }))
            .layer(build_cors_layer(&config))
    }

    fn preflight(origin: &str) -> Request<Body> {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/mcp")
            .header("origin", origin)
            .header("access-control-request-method", "POST")
            .header("access-control-request-headers", "mcp-session-id")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_wildcard_allows_any_origin() {
        let resp = app(&["*"]).oneshot(preflight("http://anywhere.example")).await.unwrap();
        assert_eq!(resp.headers()["access-control-allow-origin"], "*");
    }

    #[tokio::test]
    async fn test_listed_origin_only() {
        let allowed = app(&["http://localhost:3000"])
            .oneshot(preflight("http://localhost:3000"))
            .await
            .unwrap();
        assert_eq!(allowed.headers()["access-control-allow-origin"], "http://localhost:3000");

        let denied = app(&["http://localhost:3000"])
            .oneshot(preflight("http://evil.example"))
            .await
            .unwrap();
        assert!(denied.headers().get("access-control-allow-origin").is_none());
    }
}
