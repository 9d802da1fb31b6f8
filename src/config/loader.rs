//! Configuration loading from disk and the environment.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

use crate::config::schema::ServerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration: optional TOML file, then process environment overrides,
/// then validation.
pub fn load_config(path: Option<&Path>) -> Result<ServerConfig, ConfigError> {
    let config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => ServerConfig::default(),
    };

    let config = apply_env_overrides(config, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay environment-style key/value settings onto `config`.
///
/// `lookup` abstracts the environment so callers (and tests) can supply any
/// key/value source.
pub fn apply_env_overrides<F>(mut config: ServerConfig, lookup: F) -> Result<ServerConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("MCP_HTTP_ENABLED") {
        config.transport.http_enabled = parse_bool("MCP_HTTP_ENABLED", &v)?;
    }
    if let Some(v) = lookup("MCP_HTTP_HOST") {
        config.transport.host = v;
    }
    if let Some(v) = lookup("MCP_HTTP_PORT") {
        config.transport.port = parse_value("MCP_HTTP_PORT", &v)?;
    }
    if let Some(v) = lookup("MCP_HTTPS_ENABLED") {
        config.transport.tls.enabled = parse_bool("MCP_HTTPS_ENABLED", &v)?;
    }
    if let Some(v) = lookup("MCP_TLS_CERT_PATH") {
        config.transport.tls.cert_path = non_empty(v).map(PathBuf::from);
    }
    if let Some(v) = lookup("MCP_TLS_KEY_PATH") {
        config.transport.tls.key_path = non_empty(v).map(PathBuf::from);
    }
    if let Some(v) = lookup("MCP_ALLOWED_HOSTS") {
        config.security.allowed_hosts = parse_list(&v);
    }
    if let Some(v) = lookup("MCP_ALLOWED_ORIGINS") {
        config.security.allowed_origins = parse_list(&v);
    }
    if let Some(v) = lookup("MCP_SESSION_IDLE_TIMEOUT_SECS") {
        config.sessions.idle_timeout_secs = parse_value("MCP_SESSION_IDLE_TIMEOUT_SECS", &v)?;
    }
    if let Some(v) = lookup("MCP_MAX_BODY_BYTES") {
        config.security.max_body_bytes = parse_value("MCP_MAX_BODY_BYTES", &v)?;
    }
    if let Some(v) = lookup("SEARCH_API_URL") {
        config.search.endpoint = v;
    }
    if let Some(v) = lookup("SEARCH_API_KEY") {
        config.search.api_key = non_empty(v);
    }
    if let Some(v) = lookup("SEARCH_TIMEOUT_SECS") {
        config.search.timeout_secs = parse_value("SEARCH_TIMEOUT_SECS", &v)?;
    }
    if let Some(v) = lookup("LOG_LEVEL") {
        config.observability.log_level = v;
    }
    if let Some(v) = lookup("LOG_FORMAT") {
        config.observability.log_format = v.to_lowercase();
    }
    if let Some(v) = lookup("METRICS_ENABLED") {
        config.observability.metrics_enabled = parse_bool("METRICS_ENABLED", &v)?;
    }
    if let Some(v) = lookup("METRICS_ADDRESS") {
        config.observability.metrics_address = v;
    }

    Ok(config)
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

fn parse_value<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
