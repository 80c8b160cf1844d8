//! Proxy server: accept loop and relay dispatch.
//!
//! # Responsibilities
//! - Bind the listening socket (fatal on failure)
//! - Accept connections until stopped, logging and surviving accept errors
//! - Spawn one relay task per connection without waiting for it
//! - Expose start/stop lifecycle control through `ServerHandle`

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::net::TcpStream;
use tracing::Instrument;

use crate::config::ProxyConfig;
use crate::lifecycle::{ServerState, Shutdown};
use crate::net::{Accept, ConnectionTracker, Listener, ListenerError};
use crate::observability::metrics;
use crate::relay::{Relay, RelayOutcome};

/// Errors surfaced by the server itself. Relay failures never appear here.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("server cannot start from the {0} state")]
    InvalidState(ServerState),
}

/// Forward proxy server.
pub struct ProxyServer {
    config: ProxyConfig,
    relay: Arc<Relay>,
    shutdown: Shutdown,
    tracker: ConnectionTracker,
}

impl ProxyServer {
    /// Create a new server with the given configuration.
    pub fn new(config: ProxyConfig) -> Self {
        let relay = Arc::new(Relay::new(&config));
        Self {
            config,
            relay,
            shutdown: Shutdown::new(),
            tracker: ConnectionTracker::new(),
        }
    }

    /// A cloneable handle for stopping and observing this server.
    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            shutdown: self.shutdown.clone(),
            tracker: self.tracker.clone(),
        }
    }

    /// Bind the configured listening address.
    pub async fn bind(&self) -> Result<Listener, ListenerError> {
        Listener::bind(&self.config.listener).await
    }

    /// Bind and run the accept loop until stopped.
    pub async fn start(self) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Run the accept loop on an already bound listener until stopped.
    ///
    /// A failed accept is logged and the loop carries on. The listener is
    /// closed when this returns; relays already dispatched keep running.
    pub async fn serve<L>(self, mut listener: L) -> Result<(), ServerError>
    where
        L: Accept + Send,
    {
        self.shutdown.start().map_err(ServerError::InvalidState)?;
        let mut stop = self.shutdown.subscribe();

        tracing::info!(address = %listener.local_addr(), "Proxy server started");

        loop {
            tokio::select! {
                biased;

                _ = stop.stopped() => break,

                accepted = listener.next_client() => match accepted {
                    Ok((stream, peer)) => self.dispatch(stream, peer),
                    Err(e) => {
                        metrics::record_accept_error();
                        tracing::warn!(error = %e, "Error accepting client");
                    }
                },
            }
        }

        drop(listener);
        tracing::info!(
            in_flight = self.tracker.active_count(),
            "Proxy server stopped"
        );
        Ok(())
    }

    fn dispatch(&self, stream: TcpStream, peer: SocketAddr) {
        metrics::record_accept();

        let guard = self.tracker.track();
        let relay = Arc::clone(&self.relay);
        let span = tracing::info_span!("relay", id = %guard.id(), peer = %peer);

        tokio::spawn(
            async move {
                let start = Instant::now();
                match relay.handle(stream).await {
                    Ok(RelayOutcome::Completed { bytes_forwarded, .. }) => {
                        tracing::debug!(bytes_forwarded, "Relay completed");
                        metrics::record_relay("completed", start);
                    }
                    Ok(RelayOutcome::Dropped(reason)) => {
                        tracing::debug!(?reason, "Request dropped");
                        metrics::record_relay("dropped", start);
                    }
                    Err(e) => {
                        tracing::error!(kind = e.kind(), "ERROR: {e}");
                        metrics::record_relay("error", start);
                    }
                }
                drop(guard);
            }
            .instrument(span),
        );
    }
}

/// Control surface of a running (or not yet started) server.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    shutdown: Shutdown,
    tracker: ConnectionTracker,
}

impl ServerHandle {
    /// Stop accepting connections and close the listener.
    pub fn stop(&self) {
        if self.shutdown.trigger() {
            tracing::info!("Stopping proxy server");
        }
    }

    pub fn state(&self) -> ServerState {
        self.shutdown.state()
    }

    /// Number of relays still running, including ones accepted before a stop.
    pub fn active_relays(&self) -> u64 {
        self.tracker.active_count()
    }
}
