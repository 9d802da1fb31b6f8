//! Idle session eviction.
//!
//! # Responsibilities
//! - Periodically find sessions idle past the configured timeout
//! - Remove them from the registry and close their transports
//!
//! Runs as its own task, outside any request path, until shutdown.

use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::config::SessionConfig;
use crate::observability::metrics;
use crate::session::registry::{SessionRegistry, TerminationReason};

/// Smallest tick the sweeper will use, whatever the timeout.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(100);

pub struct SessionSweeper {
    registry: SessionRegistry,
    idle_timeout: Duration,
    interval: Duration,
}

impl SessionSweeper {
    pub fn new(registry: SessionRegistry, config: &SessionConfig) -> Self {
        let idle_timeout = Duration::from_secs(config.idle_timeout_secs);
        let cap = Duration::from_secs(config.max_sweep_interval_secs.max(1));
        Self {
            registry,
            idle_timeout,
            interval: sweep_interval(idle_timeout, cap),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Evict every session idle past the timeout as of `now`. Returns the
    /// number of sessions evicted.
    pub fn sweep(&self, now: Instant) -> usize {
        let expired = self.registry.expired_ids(now, self.idle_timeout);
        let evicted = expired
            .iter()
            .filter(|id| self.registry.terminate(id, TerminationReason::Expired))
            .count();

        metrics::record_sweep(evicted);
        if evicted > 0 {
            tracing::info!(evicted, remaining = self.registry.len(), "Evicted idle sessions");
        } else {
            tracing::debug!(active = self.registry.len(), "Session sweep found nothing to evict");
        }
        evicted
    }

    /// Tick until the shutdown signal fires.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_ms = self.interval.as_millis() as u64,
            idle_timeout_secs = self.idle_timeout.as_secs(),
            "Session sweeper starting"
        );

        let mut ticker = time::interval_at(time::Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep(Instant::now());
                }
                _ = shutdown.recv() => {
                    tracing::info!("Session sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

/// A quarter of the idle timeout, clamped to `[MIN_SWEEP_INTERVAL, cap]`.
fn sweep_interval(idle_timeout: Duration, cap: Duration) -> Duration {
    (idle_timeout / 4).clamp(MIN_SWEEP_INTERVAL, cap.max(MIN_SWEEP_INTERVAL))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::engine::{ProtocolEngine, RequestContext};
    use crate::protocol::jsonrpc::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
    use crate::session::registry::SessionRecord;
    use crate::transport::streamable::{StreamableTransport, TransportHooks};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct NullEngine;

    #[async_trait]
    impl ProtocolEngine for NullEngine {
        async fn handle_request(&self, request: JsonRpcRequest, _ctx: RequestContext) -> JsonRpcResponse {
            JsonRpcResponse::success(request.id, json!({}))
        }
        async fn handle_notification(&self, _n: JsonRpcNotification, _ctx: RequestContext) {}
    }

    /// Registers an initialized session whose close hook bumps `closes`.
    async fn open_session(registry: &SessionRegistry, id: &'static str, closes: Arc<AtomicUsize>) {
        let weak = registry.downgrade();
        let hooks = TransportHooks {
            on_initialized: Arc::new(move |sid: &str, transport: Arc<StreamableTransport>| {
                if let Some(registry) = weak.upgrade() {
                    registry.insert(SessionRecord::new(sid, transport));
                }
            }),
            on_closed: Arc::new(move |_: &str| {
                closes.fetch_add(1, Ordering::SeqCst);
            }),
        };
        let transport = StreamableTransport::new(Arc::new(NullEngine), Arc::new(move || id.to_string()), hooks);
        transport
            .handle_post(
                &axum::http::HeaderMap::new(),
                json!({"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}),
            )
            .await
            .unwrap();
    }

    fn config(idle_timeout_secs: u64) -> SessionConfig {
        SessionConfig {
            idle_timeout_secs,
            max_sweep_interval_secs: 60,
        }
    }

    #[test]
    fn test_interval_is_fraction_of_timeout_and_capped() {
        let registry = SessionRegistry::new();
        assert_eq!(SessionSweeper::new(registry.clone(), &config(40)).interval(), Duration::from_secs(10));
        assert_eq!(SessionSweeper::new(registry.clone(), &config(3600)).interval(), Duration::from_secs(60));
        assert_eq!(
            sweep_interval(Duration::from_millis(100), Duration::from_secs(60)),
            MIN_SWEEP_INTERVAL
        );
    }

    #[tokio::test]
    async fn test_sweep_evicts_only_idle_sessions_and_closes_once() {
        let registry = SessionRegistry::new();
        let idle_closes = Arc::new(AtomicUsize::new(0));
        let busy_closes = Arc::new(AtomicUsize::new(0));
        open_session(&registry, "idle", idle_closes.clone()).await;
        open_session(&registry, "busy", busy_closes.clone()).await;
        assert_eq!(registry.len(), 2);

        let later = Instant::now() + Duration::from_secs(61);
        registry.set_last_activity("busy", later);

        let sweeper = SessionSweeper::new(registry.clone(), &config(60));
        assert_eq!(sweeper.sweep(later), 1);
        assert!(!registry.contains("idle"));
        assert!(registry.contains("busy"));
        assert_eq!(idle_closes.load(Ordering::SeqCst), 1);
        assert_eq!(busy_closes.load(Ordering::SeqCst), 0);

        // A second pass at the same instant finds nothing and closes nothing twice.
        assert_eq!(sweeper.sweep(later), 0);
        assert_eq!(idle_closes.load(Ordering::SeqCst), 1);
        assert_eq!(registry.total_terminated(), 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (tx, rx) = broadcast::channel(1);
        let sweeper = SessionSweeper::new(SessionRegistry::new(), &config(1));
        let handle = tokio::spawn(sweeper.run(rx));
        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }
}
