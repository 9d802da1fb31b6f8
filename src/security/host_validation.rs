//! DNS rebinding protection.
//!
//! Rejects requests whose Host header (or Origin, for browser requests) is
//! not on the configured allow-list. Runs before any session lookup.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::config::SecurityConfig;
use crate::observability::metrics;

const WILDCARD: &str = "*";

/// Allow-lists used by [`host_validation_middleware`].
#[derive(Debug, Clone)]
pub struct HostPolicy {
    allowed_hosts: Arc<Vec<String>>,
    allowed_origins: Arc<Vec<String>>,
}

/// Outcome of checking one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCheck {
    Allowed,
    MissingHost,
    HostNotAllowed(String),
    OriginNotAllowed(String),
}

impl HostPolicy {
    pub fn new(allowed_hosts: &[String], allowed_origins: &[String]) -> Self {
        Self {
            allowed_hosts: Arc::new(
                allowed_hosts
                    .iter()
                    .map(|h| h.trim().to_lowercase())
                    .filter(|h| !h.is_empty())
                    .collect(),
            ),
            allowed_origins: Arc::new(
                allowed_origins
                    .iter()
                    .map(|o| o.trim().trim_end_matches('/').to_lowercase())
                    .filter(|o| !o.is_empty())
                    .collect(),
            ),
        }
    }

    pub fn from_config(config: &SecurityConfig) -> Self {
        Self::new(&config.allowed_hosts, &config.allowed_origins)
    }

    pub fn allowed_hosts(&self) -> &[String] {
        &self.allowed_hosts
    }

    pub fn allows_host(&self, hostname: &str) -> bool {
        let hostname = hostname.to_lowercase();
        self.allowed_hosts
            .iter()
            .any(|h| h == WILDCARD || *h == hostname)
    }

    pub fn allows_origin(&self, origin: &str) -> bool {
        let origin = origin.trim_end_matches('/').to_lowercase();
        self.allowed_origins
            .iter()
            .any(|o| o == WILDCARD || *o == origin)
    }

    /// Check the Host and Origin headers. `authority` is the request URI's
    /// authority, used when the client sent no Host header (HTTP/2).
    pub fn check(&self, headers: &HeaderMap, authority: Option<&str>) -> HostCheck {
        let host = headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .or(authority)
            .map(str::trim)
            .filter(|h| !h.is_empty());

        let Some(host) = host else {
            return HostCheck::MissingHost;
        };

        let hostname = strip_port(host);
        if !self.allows_host(hostname) {
            return HostCheck::HostNotAllowed(hostname.to_string());
        }

        if let Some(origin) = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok()) {
            if !self.allows_origin(origin) {
                return HostCheck::OriginNotAllowed(origin.to_string());
            }
        }

        HostCheck::Allowed
    }
}

/// Strip an optional `:port` suffix, handling bracketed IPv6 literals.
pub fn strip_port(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    match host.rsplit_once(':') {
        // A bare IPv6 address has several colons and no port.
        Some((name, port)) if !name.contains(':') && port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

fn reject(status: StatusCode, error: &str, message: &str) -> Response {
    (status, Json(json!({ "error": error, "message": message }))).into_response()
}

pub async fn host_validation_middleware(
    State(policy): State<HostPolicy>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let authority = request.uri().authority().map(|a| a.as_str().to_string());

    match policy.check(request.headers(), authority.as_deref()) {
        HostCheck::Allowed => next.run(request).await,
        HostCheck::MissingHost => {
            tracing::warn!(
                path = %request.uri().path(),
                allowed_hosts = ?policy.allowed_hosts(),
                "Rejected request without Host header"
            );
            metrics::record_security_rejection("missing_host");
            reject(StatusCode::BAD_REQUEST, "Bad Request", "Missing Host header")
        }
        HostCheck::HostNotAllowed(hostname) => {
            tracing::warn!(
                hostname = %hostname,
                allowed_hosts = ?policy.allowed_hosts(),
                "Rejected request for disallowed host"
            );
            metrics::record_security_rejection("host_not_allowed");
            reject(StatusCode::FORBIDDEN, "Forbidden", "Host not allowed")
        }
        HostCheck::OriginNotAllowed(origin) => {
            tracing::warn!(
                origin = %origin,
                allowed_origins = ?policy.allowed_origins,
                "Rejected request from disallowed origin"
            );
            metrics::record_security_rejection("origin_not_allowed");
            reject(StatusCode::FORBIDDEN, "Forbidden", "Origin not allowed")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn policy(hosts: &[&str], origins: &[&str]) -> HostPolicy {
        let hosts: Vec<String> = hosts.iter().map(|s| s.to_string()).collect();
        let origins: Vec<String> = origins.iter().map(|s| s.to_string()).collect();
        HostPolicy::new(&hosts, &origins)
    }

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut h = HeaderMap::new();
        for (k, v) in pairs {
            h.insert(k.clone(), HeaderValue::from_str(v).unwrap());
        }
        h
    }

    #[test]
    fn test_strip_port() {
        assert_eq!(strip_port("localhost:3000"), "localhost");
        assert_eq!(strip_port("localhost"), "localhost");
        assert_eq!(strip_port("[::1]:8080"), "::1");
        assert_eq!(strip_port("[::1]"), "::1");
        assert_eq!(strip_port("::1"), "::1");
        assert_eq!(strip_port("127.0.0.1:80"), "127.0.0.1");
    }

    #[test]
    fn test_host_checks() {
        let p = policy(&["localhost"], &["*"]);
        assert_eq!(p.check(&headers(&[(header::HOST, "localhost:3000")]), None), HostCheck::Allowed);
        assert_eq!(p.check(&headers(&[(header::HOST, "LOCALHOST")]), None), HostCheck::Allowed);
        assert_eq!(
            p.check(&headers(&[(header::HOST, "evil.example")]), None),
            HostCheck::HostNotAllowed("evil.example".into())
        );
        assert_eq!(p.check(&HeaderMap::new(), None), HostCheck::MissingHost);
        assert_eq!(p.check(&HeaderMap::new(), Some("localhost:443")), HostCheck::Allowed);
    }

    #[test]
    fn test_wildcard_host() {
        let p = policy(&["*"], &["*"]);
        assert_eq!(p.check(&headers(&[(header::HOST, "anything.example")]), None), HostCheck::Allowed);
    }

    #[test]
    fn test_origin_checks() {
        let p = policy(&["localhost"], &["http://localhost:3000"]);
        let ok = headers(&[(header::HOST, "localhost"), (header::ORIGIN, "http://localhost:3000/")]);
        assert_eq!(p.check(&ok, None), HostCheck::Allowed);

        let bad = headers(&[(header::HOST, "localhost"), (header::ORIGIN, "http://evil.example")]);
        assert_eq!(p.check(&bad, None), HostCheck::OriginNotAllowed("http://evil.example".into()));

        // Non-browser clients send no Origin.
        assert_eq!(p.check(&headers(&[(header::HOST, "localhost")]), None), HostCheck::Allowed);
    }
}
