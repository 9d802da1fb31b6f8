//! Concurrent session store.
//!
//! # Responsibilities
//! - Map session IDs to live session records
//! - Refresh `last_activity` on routed requests
//! - Keep aggregate counters for `/sessions` and `/health`
//!
//! # Design Decisions
//! - `DashMap` shards the map so different sessions never contend
//! - Transports are closed only after their entry is removed and every map
//!   guard is released; a transport's close hook re-enters the registry

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant, SystemTime};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;

use crate::observability::metrics;
use crate::transport::streamable::StreamableTransport;

/// Why a session left the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// Explicit DELETE from the client.
    Deleted,
    /// Idle longer than the configured timeout.
    Expired,
    /// The transport closed on its own.
    TransportClosed,
    /// Service shutdown.
    Shutdown,
}

impl TerminationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationReason::Deleted => "deleted",
            TerminationReason::Expired => "expired",
            TerminationReason::TransportClosed => "transport_closed",
            TerminationReason::Shutdown => "shutdown",
        }
    }
}

/// State of one logical client conversation.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub session_id: String,
    pub transport: Arc<StreamableTransport>,
    pub created_at: Instant,
    pub created_wall: SystemTime,
    pub last_activity: Instant,
}

impl SessionRecord {
    pub fn new(session_id: impl Into<String>, transport: Arc<StreamableTransport>) -> Self {
        let now = Instant::now();
        Self {
            session_id: session_id.into(),
            transport,
            created_at: now,
            created_wall: SystemTime::now(),
            last_activity: now,
        }
    }

    /// Time since the last routed request, measured at `now`.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity)
    }
}

/// Snapshot served by `GET /sessions`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub active_sessions: usize,
    pub total_sessions_created: u64,
    pub total_sessions_terminated: u64,
    /// Mean lifetime of terminated sessions, in seconds.
    pub average_session_duration: f64,
}

struct RegistryInner {
    sessions: DashMap<String, SessionRecord>,
    created: AtomicU64,
    terminated: AtomicU64,
    /// Sum of lifetimes of terminated sessions.
    terminated_lifetime_ms: AtomicU64,
}

/// Shared handle to a session map. Cloning shares the same map; each server
/// instance owns its own registry.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

/// Non-owning handle held by transport hooks, so sessions do not keep their
/// own registry alive.
#[derive(Clone)]
pub struct WeakSessionRegistry {
    inner: Weak<RegistryInner>,
}

impl WeakSessionRegistry {
    pub fn upgrade(&self) -> Option<SessionRegistry> {
        self.inner.upgrade().map(|inner| SessionRegistry { inner })
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                sessions: DashMap::new(),
                created: AtomicU64::new(0),
                terminated: AtomicU64::new(0),
                terminated_lifetime_ms: AtomicU64::new(0),
            }),
        }
    }

    pub fn downgrade(&self) -> WeakSessionRegistry {
        WeakSessionRegistry {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Insert a new session. Returns false, leaving the map untouched, if the
    /// ID is already live.
    pub fn insert(&self, record: SessionRecord) -> bool {
        let session_id = record.session_id.clone();
        let inserted = match self.inner.sessions.entry(session_id.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(record);
                true
            }
        };
        // The entry's shard lock is released here; len() locks every shard.
        if inserted {
            self.inner.created.fetch_add(1, Ordering::Relaxed);
            metrics::record_session_created();
            metrics::record_active_sessions(self.inner.sessions.len());
        } else {
            tracing::error!(session_id = %session_id, "Refusing to reuse a live session ID");
        }
        inserted
    }

    /// Look up a session's transport.
    pub fn get(&self, session_id: &str) -> Option<Arc<StreamableTransport>> {
        self.inner
            .sessions
            .get(session_id)
            .map(|r| Arc::clone(&r.transport))
    }

    /// Look up a session and refresh its activity timestamp.
    pub fn touch(&self, session_id: &str) -> Option<Arc<StreamableTransport>> {
        self.inner.sessions.get_mut(session_id).map(|mut r| {
            r.last_activity = Instant::now();
            Arc::clone(&r.transport)
        })
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.inner.sessions.contains_key(session_id)
    }

    /// Remove a session without closing its transport. Counts the
    /// termination only when an entry was actually removed.
    pub fn remove(&self, session_id: &str, reason: TerminationReason) -> Option<SessionRecord> {
        let (_, record) = self.inner.sessions.remove(session_id)?;

        let lifetime_ms = record.created_at.elapsed().as_millis() as u64;
        self.inner.terminated.fetch_add(1, Ordering::Relaxed);
        self.inner
            .terminated_lifetime_ms
            .fetch_add(lifetime_ms, Ordering::Relaxed);
        metrics::record_session_terminated(reason.as_str());
        metrics::record_active_sessions(self.inner.sessions.len());

        tracing::debug!(session_id = %session_id, reason = reason.as_str(), lifetime_ms, "Session removed");
        Some(record)
    }

    /// Remove a session and close its transport.
    pub fn terminate(&self, session_id: &str, reason: TerminationReason) -> bool {
        match self.remove(session_id, reason) {
            Some(record) => {
                record.transport.close();
                true
            }
            None => false,
        }
    }

    /// IDs of sessions idle for longer than `timeout` at `now`.
    pub fn expired_ids(&self, now: Instant, timeout: Duration) -> Vec<String> {
        self.inner
            .sessions
            .iter()
            .filter(|r| r.idle_for(now) > timeout)
            .map(|r| r.key().clone())
            .collect()
    }

    /// Remove and close every session. Returns how many were closed.
    pub fn drain(&self, reason: TerminationReason) -> usize {
        let ids: Vec<String> = self.inner.sessions.iter().map(|r| r.key().clone()).collect();
        ids.iter().filter(|id| self.terminate(id, reason)).count()
    }

    pub fn len(&self) -> usize {
        self.inner.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.sessions.is_empty()
    }

    pub fn total_created(&self) -> u64 {
        self.inner.created.load(Ordering::Relaxed)
    }

    pub fn total_terminated(&self) -> u64 {
        self.inner.terminated.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> SessionStats {
        let terminated = self.total_terminated();
        let average_session_duration = if terminated == 0 {
            0.0
        } else {
            self.inner.terminated_lifetime_ms.load(Ordering::Relaxed) as f64 / terminated as f64 / 1000.0
        };

        SessionStats {
            active_sessions: self.len(),
            total_sessions_created: self.total_created(),
            total_sessions_terminated: terminated,
            average_session_duration,
        }
    }

    #[cfg(test)]
    pub(crate) fn set_last_activity(&self, session_id: &str, at: Instant) {
        if let Some(mut r) = self.inner.sessions.get_mut(session_id) {
            r.last_activity = at;
        }
    }
}
