//! Chunked byte forwarding between the two ends of a relay.

use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::relay::RelayError;

/// Await an I/O step, bounded by `limit` when one is configured.
pub async fn within<F, T>(limit: Option<Duration>, stage: &'static str, step: F) -> Result<T, RelayError>
where
    F: Future<Output = io::Result<T>>,
{
    let result = match limit {
        Some(after) => tokio::time::timeout(after, step)
            .await
            .map_err(|_| RelayError::Timeout { stage, after })?,
        None => step.await,
    };
    result.map_err(RelayError::Io)
}

/// Read at most one buffer's worth.
pub async fn read_chunk<R>(reader: &mut R, buf: &mut [u8], idle: Option<Duration>) -> Result<usize, RelayError>
where
    R: AsyncRead + Unpin,
{
    within(idle, "read", reader.read(buf)).await
}

/// Write the whole chunk and flush it.
pub async fn write_chunk<W>(writer: &mut W, chunk: &[u8], idle: Option<Duration>) -> Result<(), RelayError>
where
    W: AsyncWrite + Unpin,
{
    within(idle, "write", async {
        writer.write_all(chunk).await?;
        writer.flush().await
    })
    .await
}

/// Copy chunks from `reader` to `writer` in order until `reader` reaches
/// EOF. Each chunk is written as soon as it is read.
///
/// Returns the number of bytes forwarded.
pub async fn forward<R, W>(
    reader: &mut R,
    writer: &mut W,
    buf: &mut [u8],
    idle: Option<Duration>,
) -> Result<u64, RelayError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut total = 0u64;
    loop {
        let n = read_chunk(reader, buf, idle).await?;
        if n == 0 {
            return Ok(total);
        }
        write_chunk(writer, &buf[..n], idle).await?;
        total += n as u64;
    }
}
