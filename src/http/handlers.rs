//! Status endpoints: `/health` and `/sessions`.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::http::server::AppState;
use crate::session::SessionStats;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: &'static str,
    pub timestamp: String,
    pub version: &'static str,
    pub transport: &'static str,
    pub tls: bool,
    pub uptime_seconds: u64,
    pub active_sessions: usize,
    pub total_sessions_created: u64,
    pub total_sessions_terminated: u64,
}

pub async fn health_handler(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "healthy",
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION"),
        transport: "streamable-http",
        tls: state.tls_enabled,
        uptime_seconds: state.started_at.elapsed().as_secs(),
        active_sessions: state.registry.len(),
        total_sessions_created: state.registry.total_created(),
        total_sessions_terminated: state.registry.total_terminated(),
    })
}

pub async fn sessions_handler(State(state): State<AppState>) -> Json<SessionStats> {
    Json(state.registry.stats())
}
