//! Plain-HTTP Forward Proxy Library
//!
//! Accepts a client connection, reads one request, rewrites its request
//! line from absolute-URI form to origin form, relays it to the named host
//! and streams the response back until the upstream closes.

// Core
pub mod http;
pub mod relay;
pub mod server;

// Plumbing
pub mod config;
pub mod net;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::ProxyConfig;
pub use lifecycle::{ServerState, Shutdown};
pub use relay::{Relay, RelayError, RelayOutcome};
pub use server::{ProxyServer, ServerError, ServerHandle};
