//! MCP session server.
//!
//! ```text
//!                    ┌────────────────────────────────────────────────────────┐
//!                    │                   MCP SESSION SERVER                   │
//!                    │                                                        │
//!   HTTP client ─────┼─▶ net ─▶ security ─▶ router ─▶ session registry        │
//!                    │   (TLS)   (Host)      │                                │
//!                    │                       └─▶ transport factory            │
//!                    │                              │                         │
//!                    │                              ▼                         │
//!                    │              streamable transport ─▶ engine ───────────┼─▶ search API
//!                    │                                                        │
//!   stdin/stdout ────┼─▶ stdio transport ──────────────▶ engine               │
//!                    │                                                        │
//!                    │  config · observability · lifecycle (sweeper, stop)    │
//!                    └────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use mcp_session_server::config::load_config;
use mcp_session_server::lifecycle::wait_for_signal;
use mcp_session_server::observability::{logging, metrics};
use mcp_session_server::{search, McpHttpServer, StdioTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TransportKind {
    Stdio,
    Http,
}

#[derive(Parser)]
#[command(name = "mcp-session-server")]
#[command(about = "MCP server with session-managed streamable HTTP and stdio transports", long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Transport to serve; overrides `transport.http_enabled`
    #[arg(short, long, value_enum)]
    transport: Option<TransportKind>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    match args.transport {
        Some(TransportKind::Http) => config.transport.http_enabled = true,
        Some(TransportKind::Stdio) => config.transport.http_enabled = false,
        None => {}
    }

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "mcp-session-server starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let engines = search::engine_factory(&config.search)?;

    if !config.transport.http_enabled {
        tracing::info!("Serving MCP over stdio");
        StdioTransport::new(engines()).run_stdio().await?;
        tracing::info!("Shutdown complete");
        return Ok(());
    }

    tracing::info!(
        host = %config.transport.host,
        port = config.transport.port,
        tls = config.transport.tls.enabled,
        allowed_hosts = ?config.security.allowed_hosts,
        idle_timeout_secs = config.sessions.idle_timeout_secs,
        "Configuration loaded"
    );

    let server = McpHttpServer::new(config, engines)?;
    let running = server.start().await?;

    wait_for_signal().await;
    running.stop().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
