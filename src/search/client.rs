//! HTTP client for the external search API.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SearchConfig;

/// Errors that can occur while querying the search API.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Could not build the HTTP client.
    #[error("Search client setup failed: {0}")]
    Setup(String),

    /// Request timed out.
    #[error("Search request timed out after {0} seconds")]
    Timeout(u64),

    /// Connection or protocol failure.
    #[error("Search request failed: {0}")]
    Request(String),

    /// The API answered with a non-success status.
    #[error("Search API returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The API answered with a body we could not read.
    #[error("Search API returned an unreadable body: {0}")]
    Decode(String),
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    max_results: u32,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

/// One retrieved document.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
}

/// Thin async client around the search endpoint.
#[derive(Debug, Clone)]
pub struct SearchClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    timeout_secs: u64,
}

impl SearchClient {
    pub fn new(config: &SearchConfig) -> Result<Self, SearchError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SearchError::Setup(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    /// Run a query and return at most `max_results` hits.
    pub async fn search(&self, query: &str, max_results: u32) -> Result<Vec<SearchHit>, SearchError> {
        let mut request = self
            .http
            .post(&self.endpoint)
            .json(&SearchRequest { query, max_results });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                SearchError::Timeout(self.timeout_secs)
            } else {
                SearchError::Request(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Decode(e.to_string()))?;

        let mut hits = parsed.results;
        hits.truncate(max_results as usize);
        Ok(hits)
    }
}
