//! Wire protocol between peers and the relay.
//!
//! Every frame is one JSON object tagged by its `event` field. Field names
//! are camelCase on the wire.

use std::fmt;

use chess_rules::{Color, GameStatus, MoveRecord, Piece, PieceKind, Square};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One connected peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub Uuid);

impl PeerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PeerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Frames a peer sends to the relay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ClientMessage {
    JoinSession,
    SubmitMove(MoveSubmission),
    LeaveSession,
}

/// A move as the submitting peer saw it. Only `from`, `to` and
/// `promoted_to` influence the relay; the rest is the peer's own opinion
/// and is checked against the relay's game, never trusted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveSubmission {
    pub from: Square,
    pub to: Square,
    pub piece: Piece,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promoted_to: Option<PieceKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_piece: Option<Piece>,
    #[serde(default)]
    pub is_en_passant: bool,
    #[serde(default)]
    pub is_check: bool,
    #[serde(default)]
    pub is_checkmate: bool,
    #[serde(default)]
    pub is_stalemate: bool,
    #[serde(default)]
    pub is_draw: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_status: Option<GameStatus>,
    pub position: String,
}

impl MoveSubmission {
    /// Submission carrying the flags of a locally applied move.
    pub fn from_record(record: &MoveRecord, status: GameStatus, position: String) -> Self {
        Self {
            from: record.from,
            to: record.to,
            piece: record.piece,
            promoted_to: record.promoted_to,
            captured_piece: record.captured_piece,
            is_en_passant: record.is_en_passant,
            is_check: record.is_check,
            is_checkmate: record.is_checkmate,
            is_stalemate: record.is_stalemate,
            is_draw: record.is_draw,
            game_status: Some(status),
            position,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: PeerId,
    pub color: Color,
}

/// A move as applied by the relay's own game.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayedMove {
    #[serde(flatten)]
    pub record: MoveRecord,
    /// Position string after the move.
    pub position: String,
    pub game_status: GameStatus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeKind {
    Checkmate,
    Stalemate,
    Draw,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOutcome {
    #[serde(rename = "type")]
    pub kind: OutcomeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner_color: Option<Color>,
}

impl SessionOutcome {
    /// Outcome of a finished game; `None` while the game is still active.
    pub fn from_status(status: GameStatus, winner: Option<Color>) -> Option<Self> {
        let kind = match status {
            GameStatus::Active => return None,
            GameStatus::Checkmate => OutcomeKind::Checkmate,
            GameStatus::Stalemate => OutcomeKind::Stalemate,
            GameStatus::DrawFifty | GameStatus::DrawRepetition => OutcomeKind::Draw,
        };
        Some(Self {
            kind,
            winner_color: if kind == OutcomeKind::Checkmate {
                winner
            } else {
                None
            },
        })
    }
}

/// Frames the relay sends to a peer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ServerMessage {
    WaitingForPeer,
    SessionStart {
        players: Vec<PlayerInfo>,
        position: String,
        /// The recipient's own id, to find its color in `players`.
        you: PeerId,
    },
    MoveRelayed(RelayedMove),
    PromotionRequired,
    PeerLeft,
    SessionEnded(SessionOutcome),
    SessionReset,
    LobbyFull,
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    /// Wire name of the event, for logging.
    pub fn event_name(&self) -> &'static str {
        match self {
            ServerMessage::WaitingForPeer => "waiting-for-peer",
            ServerMessage::SessionStart { .. } => "session-start",
            ServerMessage::MoveRelayed(_) => "move-relayed",
            ServerMessage::PromotionRequired => "promotion-required",
            ServerMessage::PeerLeft => "peer-left",
            ServerMessage::SessionEnded(_) => "session-ended",
            ServerMessage::SessionReset => "session-reset",
            ServerMessage::LobbyFull => "lobby-full",
            ServerMessage::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod protocol_tests;
