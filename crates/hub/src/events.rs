use std::sync::Mutex;

use serde::Serialize;
use tokio::sync::broadcast;

/// Lifecycle of a hub connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
        };
        f.write_str(s)
    }
}

/// Broadcast on every state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateChange {
    pub previous: ConnectionState,
    pub current: ConnectionState,
}

/// Holds the current state and fans out transitions.
pub(crate) struct StateTracker {
    url: String,
    current: Mutex<ConnectionState>,
    tx: broadcast::Sender<StateChange>,
}

impl StateTracker {
    pub(crate) fn new(url: &str) -> Self {
        let (tx, _) = broadcast::channel(64);
        Self {
            url: url.to_string(),
            current: Mutex::new(ConnectionState::Disconnected),
            tx,
        }
    }

    pub(crate) fn get(&self) -> ConnectionState {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Move to `next`. Repeating the current state is a no-op.
    pub(crate) fn set(&self, next: ConnectionState) {
        let previous = {
            let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
            if *current == next {
                return;
            }
            std::mem::replace(&mut *current, next)
        };

        tracing::info!(url = %self.url, from = %previous, to = %next, "Hub connection state changed");
        // No subscribers is fine.
        let _ = self.tx.send(StateChange {
            previous,
            current: next,
        });
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.tx.subscribe()
    }
}
