//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Apply CLI overrides → Validate → Logging/metrics → Start server
//!
//! Shutdown (shutdown.rs):
//!     Stop requested → state becomes Stopped → accept loop exits → listener closed
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → request stop
//! ```
//!
//! # Design Decisions
//! - Server state lives in one watch channel; stop is observed, not polled
//! - No drain: in-flight relays finish on their own after stop

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{ServerState, Shutdown, StopSignal};
pub use signals::shutdown_signal;
pub use startup::{init_observability, resolve_config, Overrides};
