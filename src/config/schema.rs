//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration for the MCP session server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Transport selection, bind address and TLS material.
    pub transport: TransportConfig,

    /// Host/origin allow-lists and request limits.
    pub security: SecurityConfig,

    /// Session lifecycle settings.
    pub sessions: SessionConfig,

    /// Outbound search collaborator settings.
    pub search: SearchConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Serve the streamable HTTP transport instead of stdio.
    pub http_enabled: bool,

    /// Bind host (e.g., "127.0.0.1").
    pub host: String,

    /// Bind port. Zero asks the OS for an ephemeral port.
    pub port: u16,

    /// TLS configuration for the listener.
    pub tls: TlsConfig,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            http_enabled: false,
            host: "127.0.0.1".to_string(),
            port: 3000,
            tls: TlsConfig::default(),
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TlsConfig {
    /// Serve HTTPS instead of plain HTTP.
    pub enabled: bool,

    /// Path to certificate file (PEM).
    pub cert_path: Option<PathBuf>,

    /// Path to private key file (PEM).
    pub key_path: Option<PathBuf>,
}

/// Security configuration (DNS rebinding protection, CORS, limits).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Hostnames accepted in the Host header. `*` allows any host.
    pub allowed_hosts: Vec<String>,

    /// Origins accepted for browser requests. `*` allows any origin.
    pub allowed_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_hosts: vec!["localhost".to_string(), "127.0.0.1".to_string()],
            allowed_origins: vec!["*".to_string()],
            max_body_bytes: 4 * 1024 * 1024, // 4MB
        }
    }
}

/// Session lifecycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Sessions idle for longer than this are evicted.
    pub idle_timeout_secs: u64,

    /// Upper bound on the sweeper tick interval.
    pub max_sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 30 * 60,
            max_sweep_interval_secs: 60,
        }
    }
}

/// Search backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Search API endpoint receiving `{query, max_results}` POSTs.
    pub endpoint: String,

    /// Optional bearer token for the search API.
    pub api_key: Option<String>,

    /// Outbound request timeout in seconds.
    pub timeout_secs: u64,

    /// Result count used when the caller does not ask for one.
    pub default_max_results: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8088/search".to_string(),
            api_key: None,
            timeout_secs: 10,
            default_max_results: 5,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log format ("pretty" or "json").
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
