//! HTTP server setup and lifecycle.
//!
//! # Responsibilities
//! - Validate configuration and load TLS material before anything binds
//! - Build the axum Router with the security and tracing layers
//! - Bind the listener, serve plain HTTP or HTTPS
//! - Run the idle-session sweeper alongside the server
//! - Stop in order: sweeper, sessions, listener

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::{
    middleware,
    response::Response,
    routing::{any, get},
    Router,
};
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use crate::config::validation::{validate_config, ValidationError};
use crate::config::ServerConfig;
use crate::http::handlers::{health_handler, sessions_handler};
use crate::http::router::{internal_error, mcp_handler};
use crate::lifecycle::Shutdown;
use crate::net::{Listener, ListenerError, TlsError, TlsMaterial};
use crate::protocol::EngineFactory;
use crate::security::{build_cors_layer, host_validation_middleware, HostPolicy};
use crate::session::{SessionRegistry, SessionSweeper, TerminationReason};
use crate::transport::TransportFactory;

/// How long `stop` waits for open connections after the listener closes.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid configuration: {}", join_errors(.0))]
    Config(Vec<ValidationError>),

    #[error(transparent)]
    Tls(#[from] TlsError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: SessionRegistry,
    pub factory: TransportFactory,
    pub max_body_bytes: usize,
    pub started_at: Instant,
    pub tls_enabled: bool,
}

/// Streamable HTTP server. Owns its session registry; two servers in one
/// process never share sessions.
pub struct McpHttpServer {
    config: ServerConfig,
    registry: SessionRegistry,
    router: Router,
    tls: Option<TlsMaterial>,
}

impl McpHttpServer {
    /// Validate `config` and prepare the router. TLS files are read and
    /// checked here, so bad certificate material fails before any bind.
    pub fn new(config: ServerConfig, engine_factory: EngineFactory) -> Result<Self, ServerError> {
        validate_config(&config).map_err(ServerError::Config)?;

        let tls = if config.transport.tls.enabled {
            Some(TlsMaterial::from_config(&config.transport.tls)?)
        } else {
            None
        };

        let registry = SessionRegistry::new();
        let state = AppState {
            registry: registry.clone(),
            factory: TransportFactory::for_registry(engine_factory, &registry),
            max_body_bytes: config.security.max_body_bytes,
            started_at: Instant::now(),
            tls_enabled: tls.is_some(),
        };
        let router = Self::build_router(&config, state);

        Ok(Self {
            config,
            registry,
            router,
            tls,
        })
    }

    /// Build the Axum router with all middleware layers. Host validation is
    /// the outermost layer so rejected requests never reach session state.
    fn build_router(config: &ServerConfig, state: AppState) -> Router {
        let policy = HostPolicy::from_config(&config.security);

        Router::new()
            .route("/mcp", any(mcp_handler))
            .route("/health", get(health_handler))
            .route("/sessions", get(sessions_handler))
            .with_state(state)
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(build_cors_layer(&config.security))
            .layer(TraceLayer::new_for_http())
            .layer(middleware::from_fn_with_state(policy, host_validation_middleware))
    }

    /// The fully layered router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind the listener and start serving.
    pub async fn start(self) -> Result<RunningServer, ServerError> {
        let rustls = match &self.tls {
            Some(material) => Some(material.rustls_config().await?),
            None => None,
        };

        let listener = Listener::bind(&self.config.transport)?;
        let local_addr = listener.local_addr();

        let shutdown = Shutdown::new();
        let sweeper = SessionSweeper::new(self.registry.clone(), &self.config.sessions);
        let sweeper_task = tokio::spawn(sweeper.run(shutdown.subscribe()));

        let (close_tx, close_rx) = oneshot::channel::<()>();
        let serve_task = match rustls {
            None => {
                let tcp = listener.into_tokio()?;
                let router = self.router;
                tokio::spawn(async move {
                    axum::serve(tcp, router)
                        .with_graceful_shutdown(async move {
                            let _ = close_rx.await;
                        })
                        .await
                })
            }
            Some(rustls) => {
                let handle = axum_server::Handle::new();
                let close_handle = handle.clone();
                tokio::spawn(async move {
                    let _ = close_rx.await;
                    close_handle.graceful_shutdown(Some(DRAIN_TIMEOUT));
                });
                let server = axum_server::from_tcp_rustls(listener.into_std(), rustls).handle(handle);
                let service = self.router.into_make_service();
                tokio::spawn(async move { server.serve(service).await })
            }
        };

        let scheme = if self.tls.is_some() { "https" } else { "http" };
        tracing::info!(
            address = %local_addr,
            scheme,
            endpoint = %format!("{}://{}/mcp", scheme, local_addr),
            "MCP server listening"
        );

        Ok(RunningServer {
            local_addr,
            tls_enabled: self.tls.is_some(),
            registry: self.registry,
            shutdown,
            sweeper_task: Mutex::new(Some(sweeper_task)),
            close_tx: Mutex::new(Some(close_tx)),
            serve_task: Mutex::new(Some(serve_task)),
        })
    }
}

/// Handle to a server that is accepting connections.
pub struct RunningServer {
    local_addr: SocketAddr,
    tls_enabled: bool,
    registry: SessionRegistry,
    shutdown: Shutdown,
    sweeper_task: Mutex<Option<JoinHandle<()>>>,
    close_tx: Mutex<Option<oneshot::Sender<()>>>,
    serve_task: Mutex<Option<JoinHandle<std::io::Result<()>>>>,
}

impl RunningServer {
    /// The address actually bound.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn base_url(&self) -> String {
        let scheme = if self.tls_enabled { "https" } else { "http" };
        format!("{}://{}", scheme, self.local_addr)
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.is_triggered()
    }

    /// Stop the server: cancel the sweeper, close every session, then close
    /// the listener and wait for it to finish. Safe to call more than once.
    pub async fn stop(&self) {
        if !self.shutdown.trigger() {
            tracing::warn!("Stop requested but the server is not running");
            return;
        }
        tracing::info!(address = %self.local_addr, "Stopping MCP server");

        if let Some(task) = take(&self.sweeper_task) {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Session sweeper task failed");
            }
        }

        let closed = self.registry.drain(TerminationReason::Shutdown);
        tracing::info!(closed, "Closed active sessions");

        if let Some(tx) = take(&self.close_tx) {
            let _ = tx.send(());
        }
        if let Some(task) = take(&self.serve_task) {
            let abort = task.abort_handle();
            match tokio::time::timeout(DRAIN_TIMEOUT * 2, task).await {
                Ok(Ok(Ok(()))) => tracing::info!("Listener closed"),
                Ok(Ok(Err(e))) => tracing::error!(error = %e, "Server exited with error"),
                Ok(Err(e)) => tracing::error!(error = %e, "Server task failed"),
                Err(_) => {
                    tracing::warn!("Timed out waiting for connections to drain");
                    abort.abort();
                }
            }
        }
    }
}

fn take<T>(slot: &Mutex<Option<T>>) -> Option<T> {
    slot.lock().ok().and_then(|mut guard| guard.take())
}

/// Convert a handler panic into the standard 500 envelope.
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(panic = %detail, "Handler panicked");
    internal_error("Unexpected error while handling request")
}
