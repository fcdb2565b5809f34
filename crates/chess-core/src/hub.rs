//! Registry of live connections.
//!
//! A single task owns the membership map. Everything else talks to it
//! through a cloneable [`Hub`] handle, so concurrent connects and disconnects
//! are applied one at a time without any lock on the map itself.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::HubError;
use crate::outbox::Outbox;

/// Process-unique identifier of one accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

pub fn next_connection_id() -> ConnectionId {
    ConnectionId(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
}

enum HubCommand {
    Register {
        id: ConnectionId,
        outbox: Outbox,
        reply: oneshot::Sender<Result<(), HubError>>,
    },
    Unregister {
        id: ConnectionId,
    },
    Count {
        reply: oneshot::Sender<usize>,
    },
}

/// Handle to the registry task.
#[derive(Clone)]
pub struct Hub {
    tx: mpsc::UnboundedSender<HubCommand>,
}

impl Hub {
    /// Spawn the registry task on the current runtime.
    ///
    /// The task exits once every handle is dropped, closing the outbox of
    /// every connection still registered.
    pub fn spawn(max_connections: usize) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(rx, max_connections));
        (Self { tx }, handle)
    }

    /// Admit a connection.
    pub async fn register(&self, id: ConnectionId, outbox: Outbox) -> Result<(), HubError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(HubCommand::Register { id, outbox, reply })
            .map_err(|_| HubError::HubClosed)?;
        rx.await.map_err(|_| HubError::HubClosed)?
    }

    /// Remove a connection and close its outbox. Removing an id that is not
    /// registered does nothing.
    pub fn unregister(&self, id: ConnectionId) {
        // A stopped hub has already closed every outbox.
        let _ = self.tx.send(HubCommand::Unregister { id });
    }

    pub async fn connection_count(&self) -> Result<usize, HubError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(HubCommand::Count { reply })
            .map_err(|_| HubError::HubClosed)?;
        rx.await.map_err(|_| HubError::HubClosed)
    }
}

async fn run(mut rx: mpsc::UnboundedReceiver<HubCommand>, max_connections: usize) {
    let mut connections: HashMap<ConnectionId, Outbox> = HashMap::new();

    while let Some(cmd) = rx.recv().await {
        match cmd {
            HubCommand::Register { id, outbox, reply } => {
                let result = if connections.len() >= max_connections {
                    tracing::warn!(conn = %id, max_connections, "Rejecting connection: hub is full");
                    Err(HubError::CapacityReached(max_connections))
                } else {
                    connections.insert(id, outbox);
                    tracing::debug!(conn = %id, live = connections.len(), "Connection registered");
                    Ok(())
                };
                let _ = reply.send(result);
            }
            HubCommand::Unregister { id } => {
                if let Some(outbox) = connections.remove(&id) {
                    outbox.close();
                    tracing::debug!(conn = %id, live = connections.len(), "Connection unregistered");
                }
            }
            HubCommand::Count { reply } => {
                let _ = reply.send(connections.len());
            }
        }
    }

    for outbox in connections.values() {
        outbox.close();
    }
    tracing::info!("Hub shutting down");
}
