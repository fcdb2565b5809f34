//! Error taxonomy for the hub.

use thiserror::Error;

use crate::protocol::Role;
use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum HubError {
    /// No session with this id is live.
    #[error("game {0} does not exist")]
    SessionNotFound(String),

    /// Id collision on creation. Random ids make this practically unreachable.
    #[error("game {0} already exists")]
    SessionAlreadyExists(String),

    /// Another participant holds the requested role.
    #[error("{role} seat of game {game_id} is already taken")]
    SlotOccupied { game_id: String, role: Role },

    /// The envelope's `type` is not one a peer may send.
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),

    /// The frame is not a JSON envelope.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// `find_game` named something other than `white` or `black`.
    #[error("orientation can only be either black or white, got {0:?}")]
    InvalidRole(String),

    /// The hub already holds its maximum number of connections.
    #[error("connection limit of {0} reached")]
    CapacityReached(usize),

    /// The registry task has stopped.
    #[error("hub is no longer running")]
    HubClosed,

    /// Reading from or writing to the peer failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl HubError {
    /// Errors caused by a well-formed but unserviceable request.
    ///
    /// These are answered with an `error` envelope; everything else is only
    /// logged.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            HubError::SessionNotFound(_) | HubError::SlotOccupied { .. } | HubError::InvalidRole(_)
        )
    }

    pub fn game_id(&self) -> Option<&str> {
        match self {
            HubError::SessionNotFound(id) | HubError::SessionAlreadyExists(id) => Some(id),
            HubError::SlotOccupied { game_id, .. } => Some(game_id),
            _ => None,
        }
    }
}
