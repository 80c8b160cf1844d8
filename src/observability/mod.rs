//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Server and relays produce:
//!     → logging.rs (console events: start/stop, REQ/RES, errors)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```

pub mod logging;
pub mod metrics;
