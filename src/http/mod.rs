//! HTTP/1.x request line handling.
//!
//! # Data Flow
//! ```text
//! First client read (raw bytes)
//!     → request.rs (request line tokens, upstream target)
//!     → rewrite.rs (absolute-URI → origin-form)
//!     → Send upstream
//!
//! First upstream chunk
//!     → response.rs (status token for logging only)
//! ```
//!
//! Headers and bodies are never parsed.

pub mod request;
pub mod response;
pub mod rewrite;

pub use request::{RequestLine, TargetError, UpstreamTarget, DEFAULT_PORT};
pub use response::{status_token, UNKNOWN_STATUS};
pub use rewrite::rewrite_request;
