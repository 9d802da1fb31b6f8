//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, host non-empty)
//! - Check that TLS requests name both certificate and key
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - File contents are checked later by `net::tls`, right before binding

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ServerConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("transport.host must not be empty")]
    EmptyHost,

    #[error("TLS is enabled but {0} is not set")]
    MissingTlsPath(&'static str),

    #[error("sessions.idle_timeout_secs must be greater than zero")]
    ZeroIdleTimeout,

    #[error("security.max_body_bytes must be greater than zero")]
    ZeroBodyLimit,

    #[error("security.allowed_hosts must list at least one host (use \"*\" to allow all)")]
    NoAllowedHosts,

    #[error("search.endpoint is not a valid URL: {0}")]
    InvalidSearchEndpoint(String),

    #[error("observability.metrics_address is not a socket address: {0}")]
    InvalidMetricsAddress(String),

    #[error("observability.log_format must be \"pretty\" or \"json\", got {0:?}")]
    UnknownLogFormat(String),
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.transport.host.trim().is_empty() {
        errors.push(ValidationError::EmptyHost);
    }

    let tls = &config.transport.tls;
    if tls.enabled {
        if tls.cert_path.is_none() {
            errors.push(ValidationError::MissingTlsPath("transport.tls.cert_path"));
        }
        if tls.key_path.is_none() {
            errors.push(ValidationError::MissingTlsPath("transport.tls.key_path"));
        }
    }

    if config.sessions.idle_timeout_secs == 0 {
        errors.push(ValidationError::ZeroIdleTimeout);
    }

    if config.security.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    if config.security.allowed_hosts.iter().all(|h| h.trim().is_empty()) {
        errors.push(ValidationError::NoAllowedHosts);
    }

    if let Err(e) = url::Url::parse(&config.search.endpoint) {
        errors.push(ValidationError::InvalidSearchEndpoint(e.to_string()));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    match config.observability.log_format.as_str() {
        "pretty" | "json" => {}
        other => errors.push(ValidationError::UnknownLogFormat(other.to_string())),
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ServerConfig::default();
        config.transport.host = "  ".into();
        config.transport.tls.enabled = true;
        config.sessions.idle_timeout_secs = 0;
        config.security.allowed_hosts.clear();

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::EmptyHost));
        assert!(errors.contains(&ValidationError::MissingTlsPath("transport.tls.cert_path")));
        assert!(errors.contains(&ValidationError::MissingTlsPath("transport.tls.key_path")));
        assert!(errors.contains(&ValidationError::ZeroIdleTimeout));
        assert!(errors.contains(&ValidationError::NoAllowedHosts));
        assert_eq!(errors.len(), 5);
    }

    #[test]
    fn test_rejects_bad_endpoint_and_format() {
        let mut config = ServerConfig::default();
        config.search.endpoint = "not a url".into();
        config.observability.log_format = "xml".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0], ValidationError::InvalidSearchEndpoint(_)));
        assert_eq!(errors[1], ValidationError::UnknownLogFormat("xml".into()));
    }

    #[test]
    fn test_metrics_address_only_checked_when_enabled() {
        let mut config = ServerConfig::default();
        config.observability.metrics_address = "nowhere".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::InvalidMetricsAddress("nowhere".into())]);
    }
}
