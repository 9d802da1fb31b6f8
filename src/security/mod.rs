//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → host_validation.rs (Host allow-list, Origin allow-list)
//!     → cors.rs (preflight and response headers)
//!     → body limit
//!     → Pass to router
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject before any session state is touched
//! - Every rejection is logged with the offending value and the allow-list

pub mod cors;
pub mod host_validation;

pub use cors::build_cors_layer;
pub use host_validation::{host_validation_middleware, HostCheck, HostPolicy};
