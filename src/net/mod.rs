//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (bind, accept)
//!     → connection.rs (relay ID, in-flight tracking)
//!     → Hand off to a relay task
//! ```
//!
//! # Design Decisions
//! - Bind failures are fatal, accept failures are not
//! - Each relay is counted until its task finishes, independent of server state

pub mod connection;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionTracker, RelayId};
pub use listener::{Accept, Listener, ListenerError};
