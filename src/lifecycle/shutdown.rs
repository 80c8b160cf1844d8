//! Server state and the stop signal.

use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// Lifecycle of a proxy server: `Created → Running → Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Created,
    Running,
    Stopped,
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServerState::Created => "created",
            ServerState::Running => "running",
            ServerState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Single owner of a server's state.
///
/// Every clone observes and drives the same state. Transitions go through
/// the watch channel, so waiters are woken the moment the server stops.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<ServerState>>,
}

impl Shutdown {
    /// Create a new coordinator in the `Created` state.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ServerState::Created);
        Self { tx: Arc::new(tx) }
    }

    /// Current state.
    pub fn state(&self) -> ServerState {
        *self.tx.borrow()
    }

    /// Move `Created → Running`. Returns the state found if that is not
    /// possible.
    pub fn start(&self) -> Result<(), ServerState> {
        let mut found = ServerState::Created;
        let started = self.tx.send_if_modified(|state| {
            found = *state;
            if *state == ServerState::Created {
                *state = ServerState::Running;
                true
            } else {
                false
            }
        });
        if started {
            Ok(())
        } else {
            Err(found)
        }
    }

    /// Trigger the stop signal. Returns `false` if already stopped.
    pub fn trigger(&self) -> bool {
        self.tx.send_if_modified(|state| {
            if *state == ServerState::Stopped {
                false
            } else {
                *state = ServerState::Stopped;
                true
            }
        })
    }

    /// Subscribe to the stop signal.
    pub fn subscribe(&self) -> StopSignal {
        StopSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of the stop signal.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<ServerState>,
}

impl StopSignal {
    /// Resolve once the server is stopped (immediately if it already is).
    pub async fn stopped(&mut self) {
        loop {
            let state = *self.rx.borrow_and_update();
            if state == ServerState::Stopped {
                return;
            }
            if self.rx.changed().await.is_err() {
                // Every owner is gone; nothing can stop us any more.
                std::future::pending::<()>().await;
            }
        }
    }
}
