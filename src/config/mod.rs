//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → environment overrides (MCP_*, SEARCH_*, LOG_*)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → shared by value/Arc with all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the listener is never rebound
//! - All fields have defaults to allow an empty environment
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{apply_env_overrides, load_config, ConfigError};
pub use schema::ObservabilityConfig;
pub use schema::SearchConfig;
pub use schema::SecurityConfig;
pub use schema::ServerConfig;
pub use schema::SessionConfig;
pub use schema::TlsConfig;
pub use schema::TransportConfig;
