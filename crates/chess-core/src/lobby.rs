//! Shared state handed to every connection.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::config::ConnectionConfig;
use crate::connection;
use crate::error::HubError;
use crate::hub::Hub;
use crate::matchmaker::Matchmaker;
use crate::transport::Transport;

/// The hub, the matchmaker and the per-connection settings, bundled so a
/// server can clone one value into each upgrade handler.
#[derive(Clone)]
pub struct Lobby {
    hub: Hub,
    matchmaker: Arc<Matchmaker>,
    config: ConnectionConfig,
}

impl Lobby {
    /// Start the hub task and return the lobby together with its handle.
    pub fn start(max_connections: usize, config: ConnectionConfig) -> (Self, JoinHandle<()>) {
        let (hub, task) = Hub::spawn(max_connections);
        let lobby = Self {
            hub,
            matchmaker: Arc::new(Matchmaker::new()),
            config,
        };
        (lobby, task)
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    pub fn matchmaker(&self) -> &Matchmaker {
        &self.matchmaker
    }

    /// Serve one upgraded connection to completion.
    pub async fn serve<T: Transport>(&self, transport: T) -> Result<(), HubError> {
        connection::serve(transport, &self.hub, &self.matchmaker, self.config).await
    }
}
