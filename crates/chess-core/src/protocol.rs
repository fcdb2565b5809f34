//! Wire envelope exchanged with browser clients.
//!
//! Every frame carries exactly one [`Envelope`]: a `type` discriminator and a
//! flat `data` object whose populated fields depend on the kind.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::HubError;

/// FEN piece placement of the standard starting position.
///
/// The hub never interprets positions; this is only the value new sessions
/// start from.
pub const INITIAL_POSITION: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR";

/// One of the two mutually exclusive sides of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    White,
    Black,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::White => "white",
            Role::Black => "black",
        }
    }

    pub fn opposite(self) -> Role {
        match self {
            Role::White => Role::Black,
            Role::Black => Role::White,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "white" => Ok(Role::White),
            "black" => Ok(Role::Black),
            other => Err(HubError::InvalidRole(other.to_string())),
        }
    }
}

/// Envelope discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    // Client → server
    FindGame,
    GetGame,
    LeaveGame,
    MakeMove,
    // Server → client
    GameStarted,
    PlayerLeft,
    MoveMade,
    StateUpdate,
    Error,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::FindGame => "find_game",
            MessageKind::GetGame => "get_game",
            MessageKind::LeaveGame => "leave_game",
            MessageKind::MakeMove => "make_move",
            MessageKind::GameStarted => "game_started",
            MessageKind::PlayerLeft => "player_left",
            MessageKind::MoveMade => "move_made",
            MessageKind::StateUpdate => "state_update",
            MessageKind::Error => "error",
        }
    }

    /// Parse a wire discriminator. Unrecognised kinds are reported as
    /// [`HubError::UnknownMessageType`].
    pub fn parse(s: &str) -> Result<Self, HubError> {
        let kind = match s {
            "find_game" => MessageKind::FindGame,
            "get_game" => MessageKind::GetGame,
            "leave_game" => MessageKind::LeaveGame,
            "make_move" => MessageKind::MakeMove,
            "game_started" => MessageKind::GameStarted,
            "player_left" => MessageKind::PlayerLeft,
            "move_made" => MessageKind::MoveMade,
            "state_update" => MessageKind::StateUpdate,
            "error" => MessageKind::Error,
            other => return Err(HubError::UnknownMessageType(other.to_string())),
        };
        Ok(kind)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed message with a string discriminator and a flat field set.
///
/// `kind` stays a plain string on the wire struct so that an unknown kind can
/// be told apart from a body that does not parse at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: EnvelopeData,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeData {
    pub orientation: String,
    pub position: String,
    pub game_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub piece: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Envelope {
    pub fn new(kind: MessageKind, data: EnvelopeData) -> Self {
        Self {
            kind: kind.as_str().to_string(),
            data,
        }
    }

    /// Decode one text frame.
    ///
    /// Newlines inside the frame are folded to spaces and surrounding
    /// whitespace is trimmed before parsing.
    pub fn decode(text: &str) -> Result<Self, HubError> {
        let normalised = text.replace('\n', " ");
        serde_json::from_str(normalised.trim())
            .map_err(|e| HubError::MalformedEnvelope(e.to_string()))
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn kind(&self) -> Result<MessageKind, HubError> {
        MessageKind::parse(&self.kind)
    }

    pub fn game_started(game_id: &str, position: &str, player_id: &str) -> Self {
        Self::new(
            MessageKind::GameStarted,
            EnvelopeData {
                game_id: game_id.to_string(),
                position: position.to_string(),
                player_id: Some(player_id.to_string()),
                ..Default::default()
            },
        )
    }

    pub fn player_left(game_id: &str, position: &str, player_id: &str, role: Role) -> Self {
        Self::new(
            MessageKind::PlayerLeft,
            EnvelopeData {
                orientation: role.as_str().to_string(),
                game_id: game_id.to_string(),
                position: position.to_string(),
                player_id: Some(player_id.to_string()),
                ..Default::default()
            },
        )
    }

    pub fn move_made(game_id: &str, transition: &Transition) -> Self {
        Self::new(
            MessageKind::MoveMade,
            EnvelopeData {
                game_id: game_id.to_string(),
                position: transition.new_position.clone(),
                player_id: Some(transition.player_id.clone()),
                source: Some(transition.source.clone()),
                target: Some(transition.target.clone()),
                piece: non_empty(&transition.piece),
                old_position: non_empty(&transition.old_position),
                new_position: Some(transition.new_position.clone()),
                ..Default::default()
            },
        )
    }

    pub fn state_update(game_id: &str, position: &str, active_player: Option<&str>) -> Self {
        Self::new(
            MessageKind::StateUpdate,
            EnvelopeData {
                game_id: game_id.to_string(),
                position: position.to_string(),
                player_id: active_player.map(str::to_string),
                ..Default::default()
            },
        )
    }

    pub fn error(game_id: Option<&str>, message: impl Into<String>) -> Self {
        Self::new(
            MessageKind::Error,
            EnvelopeData {
                game_id: game_id.unwrap_or_default().to_string(),
                message: Some(message.into()),
                ..Default::default()
            },
        )
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

/// One recorded state change of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub player_id: String,
    pub source: String,
    pub target: String,
    pub piece: String,
    pub old_position: String,
    pub new_position: String,
}

/// A decoded client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    FindGame {
        player_id: String,
        role: Role,
    },
    GetGame {
        game_id: String,
    },
    LeaveGame {
        game_id: String,
        player_id: String,
    },
    MakeMove {
        game_id: String,
        transition: Transition,
    },
}

impl TryFrom<Envelope> for Command {
    type Error = HubError;

    fn try_from(envelope: Envelope) -> Result<Self, Self::Error> {
        let kind = envelope.kind()?;
        let data = envelope.data;
        let player_id = data.player_id.unwrap_or_default();
        match kind {
            MessageKind::FindGame => Ok(Command::FindGame {
                role: data.orientation.parse()?,
                player_id,
            }),
            MessageKind::GetGame => Ok(Command::GetGame {
                game_id: data.game_id,
            }),
            MessageKind::LeaveGame => Ok(Command::LeaveGame {
                game_id: data.game_id,
                player_id,
            }),
            MessageKind::MakeMove => Ok(Command::MakeMove {
                game_id: data.game_id,
                transition: Transition {
                    player_id,
                    source: data.source.unwrap_or_default(),
                    target: data.target.unwrap_or_default(),
                    piece: data.piece.unwrap_or_default(),
                    old_position: data.old_position.unwrap_or_default(),
                    new_position: data.new_position.unwrap_or_default(),
                },
            }),
            // Server-originated kinds are never accepted from a peer.
            MessageKind::GameStarted
            | MessageKind::PlayerLeft
            | MessageKind::MoveMade
            | MessageKind::StateUpdate
            | MessageKind::Error => Err(HubError::UnknownMessageType(kind.to_string())),
        }
    }
}
