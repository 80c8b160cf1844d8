//! Shared utilities for integration and load testing.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use forward_proxy::{ProxyConfig, ProxyServer, ServerHandle};

/// Read the (small) request a test client sent, in one go.
async fn read_request(socket: &mut TcpStream) -> Vec<u8> {
    let mut buf = vec![0u8; 8192];
    let n = socket.read(&mut buf).await.unwrap_or(0);
    buf.truncate(n);
    buf
}

/// Start a simple mock backend that returns a fixed response.
///
/// Every request it receives is sent on the returned channel.
pub async fn start_mock_backend(
    response: &'static str,
) -> (SocketAddr, mpsc::UnboundedReceiver<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let seen_tx = seen_tx.clone();
                    tokio::spawn(async move {
                        let request = read_request(&mut socket).await;
                        let _ = seen_tx.send(request);
                        let response_str = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            response.len(),
                            response
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, seen_rx)
}

/// Start a backend that writes `chunks` one at a time, pausing `gap`
/// between them, then closes.
#[allow(dead_code)]
pub async fn start_chunked_backend(chunks: Vec<Vec<u8>>, gap: Duration) -> SocketAddr {
    start_programmable_backend(move || {
        let chunks = chunks.clone();
        async move { (chunks, gap) }
    })
    .await
}

/// Start a programmable mock backend with async support.
///
/// For each connection `f` decides which chunks to send and how long to
/// wait before each of them.
#[allow(dead_code)]
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (Vec<Vec<u8>>, Duration)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = std::sync::Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        read_request(&mut socket).await;
                        let (chunks, gap) = f().await;
                        for chunk in chunks {
                            tokio::time::sleep(gap).await;
                            if socket.write_all(&chunk).await.is_err() {
                                return;
                            }
                        }
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Start a backend that accepts connections and never answers.
#[allow(dead_code)]
pub async fn start_silent_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    addr
}

/// Start the proxy on an ephemeral local port.
pub async fn start_proxy(mut config: ProxyConfig) -> (SocketAddr, ServerHandle) {
    config.listener.bind_address = "127.0.0.1:0".into();

    let server = ProxyServer::new(config);
    let handle = server.handle();
    let listener = server.bind().await.unwrap();
    let addr = listener.local_addr();

    tokio::spawn(async move {
        let _ = server.serve(listener).await;
    });

    (addr, handle)
}

/// Send raw bytes through the proxy and collect everything it sends back
/// until it closes the connection.
#[allow(dead_code)]
pub async fn raw_exchange(proxy: SocketAddr, request: &[u8]) -> Vec<u8> {
    let mut client = TcpStream::connect(proxy).await.unwrap();
    client.write_all(request).await.unwrap();

    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), client.read_to_end(&mut response))
        .await
        .expect("proxy should close the connection")
        .unwrap();
    response
}

/// HTTP client that sends every request through the proxy.
#[allow(dead_code)]
pub fn proxied_client(proxy: SocketAddr) -> reqwest::Client {
    reqwest::Client::builder()
        .proxy(reqwest::Proxy::http(format!("http://{proxy}")).unwrap())
        .pool_max_idle_per_host(0)
        .build()
        .unwrap()
}
