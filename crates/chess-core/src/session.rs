//! A two-player game session.
//!
//! A [`Session`] holds the two seats, the move log, and the current position.
//! It is always accessed through its own mutex (see
//! [`Matchmaker`](crate::matchmaker::Matchmaker)), so every method here runs
//! with exclusive access and never awaits.

use serde::Serialize;

use crate::error::HubError;
use crate::hub::ConnectionId;
use crate::outbox::Outbox;
use crate::protocol::{Envelope, INITIAL_POSITION, Role, Transition};

/// A participant occupying one role of a session, together with the
/// connection it is reachable through.
#[derive(Debug, Clone)]
pub struct Seat {
    pub player_id: String,
    pub connection: ConnectionId,
    pub outbox: Outbox,
}

impl Seat {
    pub fn new(player_id: impl Into<String>, connection: ConnectionId, outbox: Outbox) -> Self {
        Self {
            player_id: player_id.into(),
            connection,
            outbox,
        }
    }

    /// Whether `other` is the same participant: the same connection, or the
    /// same non-empty player id arriving over another one.
    pub fn is_same_participant(&self, other: &Seat) -> bool {
        self.connection == other.connection
            || (!self.player_id.is_empty() && self.player_id == other.player_id)
    }
}

/// Result of a successful [`Session::join`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Seated; still waiting for an opponent.
    Waiting,
    /// Seated and the session now has both players.
    Started,
    /// The participant already held this seat.
    AlreadySeated,
}

/// Read-only snapshot used for listings.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub game_id: String,
    pub position: String,
    pub moves: usize,
    pub white: Option<String>,
    pub black: Option<String>,
}

#[derive(Debug)]
pub struct Session {
    id: String,
    position: String,
    moves: Vec<Transition>,
    white: Option<Seat>,
    black: Option<Seat>,
}

impl Session {
    /// Create an empty session. An empty `position` means the initial one.
    pub fn new(id: impl Into<String>, position: &str) -> Self {
        let position = if position.is_empty() {
            INITIAL_POSITION
        } else {
            position
        };
        Self {
            id: id.into(),
            position: position.to_string(),
            moves: Vec::new(),
            white: None,
            black: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn position(&self) -> &str {
        &self.position
    }

    pub fn moves(&self) -> &[Transition] {
        &self.moves
    }

    pub fn seat(&self, role: Role) -> Option<&Seat> {
        match role {
            Role::White => self.white.as_ref(),
            Role::Black => self.black.as_ref(),
        }
    }

    fn seat_mut(&mut self, role: Role) -> &mut Option<Seat> {
        match role {
            Role::White => &mut self.white,
            Role::Black => &mut self.black,
        }
    }

    /// Role held by `player_id`, if any. An empty id names nobody.
    pub fn role_of(&self, player_id: &str) -> Option<Role> {
        if player_id.is_empty() {
            return None;
        }
        [Role::White, Role::Black]
            .into_iter()
            .find(|&role| self.seat(role).is_some_and(|s| s.player_id == player_id))
    }

    /// Role held through `connection`, if any.
    pub fn role_of_connection(&self, connection: ConnectionId) -> Option<Role> {
        [Role::White, Role::Black]
            .into_iter()
            .find(|&role| self.seat(role).is_some_and(|s| s.connection == connection))
    }

    /// Both seats are taken.
    pub fn is_active(&self) -> bool {
        self.white.is_some() && self.black.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.white.is_none() && self.black.is_none()
    }

    /// Whether matchmaking may seat a participant reached through
    /// `connection` as `role` here.
    pub fn is_open_for(&self, role: Role, connection: ConnectionId) -> bool {
        !self.is_active()
            && self.seat(role).is_none()
            && self
                .seat(role.opposite())
                .is_none_or(|s| s.connection != connection)
    }

    /// Whether `seat` already belongs to the participant holding `role`.
    pub fn holds(&self, role: Role, seat: &Seat) -> bool {
        self.seat(role).is_some_and(|s| s.is_same_participant(seat))
    }

    /// Seat a participant.
    ///
    /// Fails with [`HubError::SlotOccupied`] when another participant holds
    /// `role`. Joining the seat one already holds refreshes the connection
    /// and sends nothing.
    pub fn join(&mut self, seat: Seat, role: Role) -> Result<JoinOutcome, HubError> {
        let game_id = self.id.clone();
        let slot = self.seat_mut(role);
        match slot {
            Some(current) if current.is_same_participant(&seat) => {
                *current = seat;
                return Ok(JoinOutcome::AlreadySeated);
            }
            Some(_) => return Err(HubError::SlotOccupied { game_id, role }),
            None => {}
        }

        let player_id = seat.player_id.clone();
        *slot = Some(seat);
        tracing::info!(game = %self.id, player = %player_id, %role, "Player joined game");

        if self.is_active() {
            self.broadcast(&Envelope::game_started(&self.id, &self.position, &player_id));
            Ok(JoinOutcome::Started)
        } else {
            Ok(JoinOutcome::Waiting)
        }
    }

    /// Vacate whatever seat `player_id` holds and tell the opponent.
    ///
    /// Returns the vacated role, or `None` when the participant was not
    /// seated. The session itself is left in place even when it becomes
    /// empty; removing it is the caller's decision.
    pub fn leave(&mut self, player_id: &str) -> Option<Role> {
        let role = self.role_of(player_id)?;
        self.vacate(role).map(|_| role)
    }

    /// Empty the `role` seat and tell whoever remains.
    pub fn vacate(&mut self, role: Role) -> Option<Seat> {
        let seat = self.seat_mut(role).take()?;
        tracing::info!(
            game = %self.id,
            player = %seat.player_id,
            conn = %seat.connection,
            %role,
            "Player left game"
        );

        self.broadcast(&Envelope::player_left(
            &self.id,
            &self.position,
            &seat.player_id,
            role,
        ));
        Some(seat)
    }

    /// Record a move and relay it to both seats, including the mover.
    ///
    /// The new position is taken as given; legality is not checked here.
    pub fn apply_transition(&mut self, transition: Transition) {
        if !transition.old_position.is_empty() && transition.old_position != self.position {
            tracing::debug!(
                game = %self.id,
                expected = %transition.old_position,
                current = %self.position,
                "Move based on a stale position"
            );
        }

        self.position = transition.new_position.clone();
        let envelope = Envelope::move_made(&self.id, &transition);
        tracing::debug!(
            game = %self.id,
            player = %transition.player_id,
            source = %transition.source,
            target = %transition.target,
            "Move made"
        );
        self.moves.push(transition);
        self.broadcast(&envelope);
    }

    /// Role expected to move next: white on an even move count, black on odd.
    pub fn active_role(&self) -> Role {
        if self.moves.len() % 2 == 0 {
            Role::White
        } else {
            Role::Black
        }
    }

    /// The participant expected to move next, if that seat is occupied.
    pub fn active_participant(&self) -> Option<&Seat> {
        self.seat(self.active_role())
    }

    /// Send the current position and the player to move to both seats.
    pub fn notify_state(&self) {
        let active = self.active_participant().map(|s| s.player_id.as_str());
        self.broadcast(&Envelope::state_update(&self.id, &self.position, active));
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            game_id: self.id.clone(),
            position: self.position.clone(),
            moves: self.moves.len(),
            white: self.white.as_ref().map(|s| s.player_id.clone()),
            black: self.black.as_ref().map(|s| s.player_id.clone()),
        }
    }

    /// Fan an envelope out to every occupied seat. A seat whose outbox is
    /// full or closed is skipped.
    fn broadcast(&self, envelope: &Envelope) {
        for seat in [&self.white, &self.black].into_iter().flatten() {
            if let Err(e) = seat.outbox.push(envelope.clone()) {
                tracing::warn!(
                    game = %self.id,
                    player = %seat.player_id,
                    conn = %seat.connection,
                    kind = %envelope.kind,
                    "Dropping outbound message: {e}"
                );
            }
        }
    }
}
