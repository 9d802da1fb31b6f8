//! Listening socket setup.
//!
//! # Responsibilities
//! - Resolve and bind the configured host/port
//! - Report the address actually bound (port 0 resolves to an ephemeral port)
//!
//! The socket is bound as a std listener in non-blocking mode so it can be
//! handed to either the plain axum server or the rustls acceptor.

use std::net::{SocketAddr, TcpListener, ToSocketAddrs};

use thiserror::Error;

use crate::config::TransportConfig;

#[derive(Debug, Error)]
pub enum ListenerError {
    /// Host/port did not resolve to any socket address.
    #[error("failed to resolve {host}:{port}: {source}")]
    Resolve {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// Failed to bind to address.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// A bound, not yet serving, listening socket.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    local_addr: SocketAddr,
}

impl Listener {
    /// Bind to the first address `host:port` resolves to.
    pub fn bind(config: &TransportConfig) -> Result<Self, ListenerError> {
        let resolve_err = |source| ListenerError::Resolve {
            host: config.host.clone(),
            port: config.port,
            source,
        };

        let addr = (config.host.as_str(), config.port)
            .to_socket_addrs()
            .map_err(resolve_err)?
            .next()
            .ok_or_else(|| {
                resolve_err(std::io::Error::new(
                    std::io::ErrorKind::AddrNotAvailable,
                    "no addresses found",
                ))
            })?;

        let bind_err = |source| ListenerError::Bind { addr, source };
        let inner = TcpListener::bind(addr).map_err(bind_err)?;
        inner.set_nonblocking(true).map_err(bind_err)?;
        let local_addr = inner.local_addr().map_err(bind_err)?;

        tracing::info!(address = %local_addr, "Listener bound");

        Ok(Self { inner, local_addr })
    }

    /// The address actually bound.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn into_std(self) -> TcpListener {
        self.inner
    }

    pub fn into_tokio(self) -> std::io::Result<tokio::net::TcpListener> {
        tokio::net::TcpListener::from_std(self.inner)
    }
}
