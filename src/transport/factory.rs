//! Per-session transport construction.
//!
//! Every call to [`TransportFactory::create`] builds one engine and one
//! [`StreamableTransport`] wired together. The transport's initialization
//! hook is the only path into the session registry, so the router can never
//! see a session whose transport is not fully built.

use std::sync::Arc;

use crate::protocol::engine::EngineFactory;
use crate::session::registry::{SessionRecord, SessionRegistry, TerminationReason, WeakSessionRegistry};
use crate::transport::streamable::{
    uuid_session_id, OnSessionClosed, OnSessionInitialized, SessionIdGenerator, StreamableTransport,
    TransportHooks,
};

#[derive(Clone)]
pub struct TransportFactory {
    engine_factory: EngineFactory,
    id_generator: SessionIdGenerator,
    hooks: TransportHooks,
}

impl TransportFactory {
    /// Build a factory with explicit hooks. Used directly in tests; servers
    /// go through [`TransportFactory::for_registry`].
    pub fn new(engine_factory: EngineFactory, id_generator: SessionIdGenerator, hooks: TransportHooks) -> Self {
        Self {
            engine_factory,
            id_generator,
            hooks,
        }
    }

    /// Build a factory whose transports register themselves in `registry`
    /// when initialized and remove themselves when they close.
    pub fn for_registry(engine_factory: EngineFactory, registry: &SessionRegistry) -> Self {
        let weak = registry.downgrade();
        let hooks = TransportHooks {
            on_initialized: register_hook(weak.clone()),
            on_closed: unregister_hook(weak),
        };
        Self::new(engine_factory, uuid_session_id(), hooks)
    }

    pub fn with_id_generator(mut self, id_generator: SessionIdGenerator) -> Self {
        self.id_generator = id_generator;
        self
    }

    /// Mint an uninitialized transport with a fresh engine.
    pub fn create(&self) -> Arc<StreamableTransport> {
        let engine = (self.engine_factory)();
        StreamableTransport::new(engine, Arc::clone(&self.id_generator), self.hooks.clone())
    }
}

fn register_hook(registry: WeakSessionRegistry) -> OnSessionInitialized {
    Arc::new(move |session_id: &str, transport: Arc<StreamableTransport>| {
        let Some(registry) = registry.upgrade() else {
            tracing::warn!(session_id = %session_id, "Session initialized after its registry was dropped");
            return;
        };
        if registry.insert(SessionRecord::new(session_id, transport)) {
            tracing::info!(session_id = %session_id, active = registry.len(), "Session created");
        }
    })
}

fn unregister_hook(registry: WeakSessionRegistry) -> OnSessionClosed {
    Arc::new(move |session_id: &str| {
        let Some(registry) = registry.upgrade() else {
            return;
        };
        // Already gone when the router, sweeper or shutdown closed it.
        if registry.remove(session_id, TerminationReason::TransportClosed).is_some() {
            tracing::info!(session_id = %session_id, "Session removed after transport closed");
        }
    })
}
