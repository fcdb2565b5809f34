//! Inbound envelope dispatch.
//!
//! Turns one text frame into a [`Command`] and runs it against the
//! matchmaker or the addressed session. Errors are returned to the caller
//! (the connection's read loop), which decides what to log and what to
//! report back to the peer.

use crate::error::HubError;
use crate::hub::ConnectionId;
use crate::matchmaker::Matchmaker;
use crate::outbox::Outbox;
use crate::protocol::{Command, Envelope};
use crate::session::Seat;

/// What the router knows about the connection a frame arrived on.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    pub id: ConnectionId,
    pub outbox: Outbox,
    /// Identity claimed by the first successful `find_game` that named one.
    pub player_id: Option<String>,
}

impl ConnectionContext {
    pub fn new(id: ConnectionId, outbox: Outbox) -> Self {
        Self {
            id,
            outbox,
            player_id: None,
        }
    }

    /// The identity to act as: the claimed one if any, otherwise whatever
    /// the envelope names.
    fn identity(&self, requested: String) -> String {
        match &self.player_id {
            Some(claimed) => {
                if !requested.is_empty() && requested != *claimed {
                    tracing::warn!(
                        conn = %self.id,
                        claimed = %claimed,
                        requested = %requested,
                        "Ignoring player id that differs from the one claimed by this connection"
                    );
                }
                claimed.clone()
            }
            None => requested,
        }
    }
}

/// Decode and dispatch one inbound frame.
pub async fn dispatch(
    matchmaker: &Matchmaker,
    conn: &mut ConnectionContext,
    text: &str,
) -> Result<(), HubError> {
    let command = Command::try_from(Envelope::decode(text)?)?;
    tracing::debug!(conn = %conn.id, ?command, "Received message");

    match command {
        Command::FindGame { player_id, role } => {
            let player_id = conn.identity(player_id);
            let seat = Seat::new(player_id.clone(), conn.id, conn.outbox.clone());
            let (game_id, outcome) = matchmaker.find_or_create_and_join(seat, role).await?;
            if !player_id.is_empty() {
                conn.player_id.get_or_insert(player_id);
            }
            tracing::debug!(conn = %conn.id, game = %game_id, ?outcome, "Matched");
        }
        Command::GetGame { game_id } => {
            let handle = matchmaker.session(&game_id).await?;
            handle.lock().await.notify_state();
        }
        Command::LeaveGame { game_id, player_id } => {
            let player_id = conn.identity(player_id);
            matchmaker.leave(&game_id, conn.id, &player_id).await?;
        }
        Command::MakeMove {
            game_id,
            mut transition,
        } => {
            transition.player_id = conn.identity(transition.player_id);
            let handle = matchmaker.session(&game_id).await?;
            handle.lock().await.apply_transition(transition);
        }
    }
    Ok(())
}
