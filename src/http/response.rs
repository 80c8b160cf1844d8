//! Response inspection for logging.

/// Placeholder logged when the first chunk carries no status token.
pub const UNKNOWN_STATUS: &str = "Unknown";

/// Extract the status code token from the first response chunk.
///
/// Looks at the chunk's first line only; the response itself is never
/// modified.
pub fn status_token(chunk: &[u8]) -> String {
    let end = memchr::memchr(b'\n', chunk).unwrap_or(chunk.len());
    let line = String::from_utf8_lossy(&chunk[..end]);

    line.trim()
        .split(' ')
        .nth(1)
        .map(str::to_string)
        .unwrap_or_else(|| UNKNOWN_STATUS.to_string())
}
