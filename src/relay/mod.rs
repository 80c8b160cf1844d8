//! Per-connection relay.
//!
//! # Data Flow
//! ```text
//! client ──read once──▶ request line ──▶ upstream target
//!                                          │
//!                         rewritten request ▼
//!                                      upstream
//! client ◀──chunk by chunk, unmodified──── │ (until upstream EOF)
//! ```
//!
//! # Design Decisions
//! - One bounded read of the request; anything past the buffer is not sent
//! - Response chunks are written to the client as soon as they are read
//! - Both sockets are owned by `handle` and closed when it returns, on every path
//! - Timeouts are opt-in; by default a silent peer stalls its relay indefinitely

pub mod pump;

use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::config::{ProxyConfig, RewriteMode};
use crate::http::{rewrite_request, status_token, RequestLine, TargetError, UpstreamTarget};
use crate::observability::metrics;

/// Errors that terminate a single relay.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The request target is not a usable URI, even with an `http://` prefix.
    #[error(transparent)]
    Parse(#[from] TargetError),

    /// DNS resolution or TCP connect to the upstream failed.
    #[error("failed to connect to {upstream}: {source}")]
    UpstreamConnect {
        upstream: String,
        #[source]
        source: std::io::Error,
    },

    /// A configured timeout expired.
    #[error("{stage} timed out after {after:?}")]
    Timeout { stage: &'static str, after: Duration },

    /// Read or write failure on either socket.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::Parse(_) => "parse",
            RelayError::UpstreamConnect { .. } => "upstream_connect",
            RelayError::Timeout { .. } => "timeout",
            RelayError::Io(_) => "io",
        }
    }
}

/// Why a request was abandoned without contacting an upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The client sent nothing before closing.
    EmptyRequest,
    /// The first line has fewer than three space separated tokens.
    MalformedRequestLine,
}

/// How a relay finished when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Silently abandoned; nothing was written anywhere.
    Dropped(DropReason),
    /// The upstream closed after its response was streamed to the client.
    Completed {
        /// Status token of the response, or `Unknown`.
        status: String,
        /// Response bytes written to the client.
        bytes_forwarded: u64,
    },
}

/// Executes one client request against the upstream it names.
///
/// Cheap to share: the server keeps one behind an `Arc` for all relays.
#[derive(Debug, Clone)]
pub struct Relay {
    buffer_size: usize,
    rewrite: RewriteMode,
    connect_timeout: Option<Duration>,
    idle_timeout: Option<Duration>,
}

impl Relay {
    pub fn new(config: &ProxyConfig) -> Self {
        Self {
            buffer_size: config.relay.buffer_size.max(1),
            rewrite: config.relay.rewrite,
            connect_timeout: config.timeouts.connect(),
            idle_timeout: config.timeouts.idle(),
        }
    }

    /// Handle one client connection to completion.
    ///
    /// The inbound stream and the upstream connection are dropped, and so
    /// closed, before this returns.
    pub async fn handle<S>(&self, mut inbound: S) -> Result<RelayOutcome, RelayError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let idle = self.idle_timeout;
        let mut buf = vec![0u8; self.buffer_size];

        let n = pump::read_chunk(&mut inbound, &mut buf, idle).await?;
        if n == 0 {
            return Ok(RelayOutcome::Dropped(DropReason::EmptyRequest));
        }
        let raw = &buf[..n];

        let Some(line) = RequestLine::parse(raw) else {
            return Ok(RelayOutcome::Dropped(DropReason::MalformedRequestLine));
        };
        let upstream = line.upstream()?;

        tracing::info!(method = %line.method, target = %line.target, "REQ");

        let mut outbound = self.connect(&upstream).await?;

        let request = rewrite_request(raw, &line, &upstream.path, self.rewrite);
        pump::write_chunk(&mut outbound, &request, idle).await?;
        metrics::record_bytes("upstream", request.len() as u64);

        let first = pump::read_chunk(&mut outbound, &mut buf, idle).await?;
        if first > 0 {
            pump::write_chunk(&mut inbound, &buf[..first], idle).await?;
        }

        let status = status_token(&buf[..first]);
        tracing::info!(status = %status, target = %line.target, "RES");

        let rest = if first > 0 {
            pump::forward(&mut outbound, &mut inbound, &mut buf, idle).await?
        } else {
            0
        };
        let bytes_forwarded = first as u64 + rest;
        metrics::record_bytes("downstream", bytes_forwarded);

        // Upstream is done; close our write side towards the client.
        if let Err(e) = inbound.shutdown().await {
            tracing::debug!(error = %e, "Client shutdown failed");
        }

        Ok(RelayOutcome::Completed {
            status,
            bytes_forwarded,
        })
    }

    async fn connect(&self, upstream: &UpstreamTarget) -> Result<TcpStream, RelayError> {
        let attempt = TcpStream::connect((upstream.host.as_str(), upstream.port));

        let result = match self.connect_timeout {
            Some(after) => tokio::time::timeout(after, attempt)
                .await
                .map_err(|_| RelayError::Timeout {
                    stage: "connect",
                    after,
                })?,
            None => attempt.await,
        };

        let stream = result.map_err(|source| RelayError::UpstreamConnect {
            upstream: upstream.to_string(),
            source,
        })?;

        tracing::debug!(upstream = %upstream, "Upstream connected");
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt, DuplexStream};
    use tokio::net::TcpListener;

    fn relay() -> Relay {
        Relay::new(&ProxyConfig::default())
    }

    /// One-shot upstream: reads once, answers with `chunks`, then closes.
    async fn upstream(chunks: Vec<Vec<u8>>) -> (std::net::SocketAddr, tokio::task::JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let n = socket.read(&mut buf).await.unwrap();
            buf.truncate(n);
            for chunk in chunks {
                socket.write_all(&chunk).await.unwrap();
                socket.flush().await.unwrap();
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            buf
        });
        (addr, task)
    }

    async fn client_with(request: &[u8]) -> (DuplexStream, DuplexStream) {
        let (mut client, proxy_side) = duplex(64 * 1024);
        client.write_all(request).await.unwrap();
        (client, proxy_side)
    }

    #[tokio::test]
    async fn rewrites_request_and_streams_response() {
        let response = b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello".to_vec();
        let (addr, backend) = upstream(vec![response.clone()]).await;

        let request = format!("GET http://{addr}/foo HTTP/1.1\r\nHost: example.com\r\n\r\n");
        let (mut client, proxy_side) = client_with(request.as_bytes()).await;

        let outcome = relay().handle(proxy_side).await.unwrap();
        assert_eq!(
            outcome,
            RelayOutcome::Completed {
                status: "200".into(),
                bytes_forwarded: response.len() as u64,
            }
        );

        let received = backend.await.unwrap();
        assert_eq!(received, b"GET /foo HTTP/1.1\r\nHost: example.com\r\n\r\n");

        let mut got = Vec::new();
        client.read_to_end(&mut got).await.unwrap();
        assert_eq!(got, response);
    }

    #[tokio::test]
    async fn multiple_chunks_arrive_in_order() {
        let chunks: Vec<Vec<u8>> = vec![
            b"HTTP/1.1 200 OK\r\n\r\n".to_vec(),
            b"first;".to_vec(),
            b"second;".to_vec(),
            vec![b'x'; 10_000],
        ];
        let expected: Vec<u8> = chunks.concat();
        let (addr, backend) = upstream(chunks).await;

        let mut config = ProxyConfig::default();
        config.relay.buffer_size = 64;
        let relay = Relay::new(&config);

        let request = format!("GET http://{addr}/stream HTTP/1.1\r\n\r\n");
        let (mut client, proxy_side) = client_with(request.as_bytes()).await;

        let outcome = relay.handle(proxy_side).await.unwrap();
        backend.await.unwrap();

        let mut got = Vec::new();
        client.read_to_end(&mut got).await.unwrap();
        assert_eq!(got, expected);
        assert!(matches!(
            outcome,
            RelayOutcome::Completed { bytes_forwarded, .. } if bytes_forwarded == expected.len() as u64
        ));
    }

    #[tokio::test]
    async fn upstream_closing_without_response_yields_unknown_status() {
        let (addr, backend) = upstream(Vec::new()).await;

        let request = format!("GET http://{addr}/ HTTP/1.1\r\n\r\n");
        let (mut client, proxy_side) = client_with(request.as_bytes()).await;

        let outcome = relay().handle(proxy_side).await.unwrap();
        backend.await.unwrap();
        assert_eq!(
            outcome,
            RelayOutcome::Completed {
                status: "Unknown".into(),
                bytes_forwarded: 0,
            }
        );

        let mut got = Vec::new();
        client.read_to_end(&mut got).await.unwrap();
        assert!(got.is_empty());
    }

    #[tokio::test]
    async fn empty_request_is_dropped() {
        let (client, proxy_side) = duplex(1024);
        drop(client);

        let outcome = relay().handle(proxy_side).await.unwrap();
        assert_eq!(outcome, RelayOutcome::Dropped(DropReason::EmptyRequest));
    }

    #[tokio::test]
    async fn short_request_line_never_reaches_upstream() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let request = format!("GET http://{addr}/\r\n\r\n");
        let (mut client, proxy_side) = client_with(request.as_bytes()).await;

        let outcome = relay().handle(proxy_side).await.unwrap();
        assert_eq!(outcome, RelayOutcome::Dropped(DropReason::MalformedRequestLine));

        let accepted = tokio::time::timeout(Duration::from_millis(100), listener.accept()).await;
        assert!(accepted.is_err(), "upstream must not be contacted");

        let mut got = Vec::new();
        client.read_to_end(&mut got).await.unwrap();
        assert!(got.is_empty());
    }

    #[tokio::test]
    async fn unparseable_target_is_parse_error() {
        let (_client, proxy_side) = client_with(b"GET http://example.com:99999/ HTTP/1.1\r\n\r\n").await;

        let err = relay().handle(proxy_side).await.unwrap_err();
        assert!(matches!(err, RelayError::Parse(_)));
        assert_eq!(err.kind(), "parse");
    }

    #[tokio::test]
    async fn refused_upstream_is_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let request = format!("GET http://{addr}/ HTTP/1.1\r\n\r\n");
        let (mut client, proxy_side) = client_with(request.as_bytes()).await;

        let err = relay().handle(proxy_side).await.unwrap_err();
        assert!(matches!(err, RelayError::UpstreamConnect { .. }));

        let mut got = Vec::new();
        client.read_to_end(&mut got).await.unwrap();
        assert!(got.is_empty());
    }

    #[tokio::test]
    async fn silent_upstream_hits_idle_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let backend = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(2)).await;
            drop(socket);
        });

        let mut config = ProxyConfig::default();
        config.timeouts.idle_secs = 1;
        let relay = Relay::new(&config);

        let request = format!("GET http://{addr}/ HTTP/1.1\r\n\r\n");
        let (_client, proxy_side) = client_with(request.as_bytes()).await;

        let err = relay.handle(proxy_side).await.unwrap_err();
        assert!(matches!(err, RelayError::Timeout { .. }));
        backend.abort();
    }

    #[tokio::test]
    async fn oversized_request_is_truncated_to_buffer() {
        let (addr, backend) = upstream(vec![b"HTTP/1.1 204 No Content\r\n\r\n".to_vec()]).await;

        let mut config = ProxyConfig::default();
        config.relay.buffer_size = 128;
        let relay = Relay::new(&config);

        let mut request = format!("POST http://{addr}/upload HTTP/1.1\r\n\r\n").into_bytes();
        let head_len = request.len();
        request.extend(std::iter::repeat(b'a').take(1000));
        let (_client, proxy_side) = client_with(&request).await;

        let outcome = relay.handle(proxy_side).await.unwrap();
        assert!(matches!(outcome, RelayOutcome::Completed { ref status, .. } if status == "204"));

        let received = backend.await.unwrap();
        let rewritten_head = b"POST /upload HTTP/1.1\r\n\r\n";
        let body_sent = 128 - head_len;
        assert_eq!(received.len(), rewritten_head.len() + body_sent);
        assert!(received.starts_with(rewritten_head));
    }
}
