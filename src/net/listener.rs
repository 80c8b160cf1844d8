//! TCP listener implementation.
//!
//! # Responsibilities
//! - Bind to the configured address
//! - Accept incoming TCP connections
//! - Distinguish fatal bind errors from per-accept errors

use std::future::Future;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The configured address is not a socket address.
    #[error("Invalid bind address '{address}': {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: std::net::AddrParseError,
    },

    /// Failed to bind to address.
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Failed to accept connection.
    #[error("Failed to accept: {0}")]
    Accept(#[source] std::io::Error),
}

/// The proxy's listening socket.
///
/// Dropping it closes the socket.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    local_addr: SocketAddr,
}

impl Listener {
    /// Bind to the configured address.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let addr: SocketAddr =
            config
                .bind_address
                .parse()
                .map_err(|source| ListenerError::InvalidAddress {
                    address: config.bind_address.clone(),
                    source,
                })?;

        let inner = TcpListener::bind(addr)
            .await
            .map_err(|source| ListenerError::Bind { address: addr, source })?;

        let local_addr = inner
            .local_addr()
            .map_err(|source| ListenerError::Bind { address: addr, source })?;

        tracing::debug!(address = %local_addr, "Listener bound");

        Ok(Self { inner, local_addr })
    }

    /// Accept a new connection.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), ListenerError> {
        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;

        tracing::debug!(peer_addr = %addr, "Connection accepted");

        Ok((stream, addr))
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

/// Where the accept loop takes its clients from.
pub trait Accept {
    fn next_client(
        &mut self,
    ) -> impl Future<Output = Result<(TcpStream, SocketAddr), ListenerError>> + Send;

    fn local_addr(&self) -> SocketAddr;
}

impl Accept for Listener {
    fn next_client(
        &mut self,
    ) -> impl Future<Output = Result<(TcpStream, SocketAddr), ListenerError>> + Send {
        Listener::accept(self)
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}
