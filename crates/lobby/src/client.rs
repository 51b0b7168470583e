//! Client side of the protocol, minus rendering.
//!
//! A [`PeerMirror`] keeps a private [`Game`] in step with the relay. It
//! applies each relayed move from its coordinates and promotion only, then
//! checks that it reached the same position the relay reported.

use std::time::Duration;

use chess_rules::{
    Color, FenError, Game, GameStatus, MoveError, MoveRecord, PieceKind, PromotionPolicy, Square,
};
use thiserror::Error;

use crate::protocol::{ClientMessage, MoveSubmission, PeerId, ServerMessage, SessionOutcome};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MirrorError {
    #[error("not in a running session")]
    NotInSession,
    #[error("it is {0}'s turn")]
    NotYourTurn(Color),
    #[error("move rejected locally: {0}")]
    Rejected(#[from] MoveError),
    #[error("bad start position: {0}")]
    BadPosition(#[from] FenError),
    #[error("session-start does not list this peer")]
    NotListed,
    #[error("mirror reached {actual} but relay reported {expected}")]
    Desync { expected: String, actual: String },
}

/// What a handled server message meant to this client.
#[derive(Clone, Debug, PartialEq)]
pub enum MirrorEvent {
    Waiting,
    Started { color: Color },
    Moved(MoveRecord),
    PromotionRequired,
    PeerLeft,
    Ended(SessionOutcome),
    Reset,
    LobbyFull,
    Error(String),
}

#[derive(Clone, Debug)]
pub struct PeerMirror {
    me: Option<PeerId>,
    color: Option<Color>,
    game: Game,
    running: bool,
}

impl PeerMirror {
    pub fn new(policy: PromotionPolicy) -> Self {
        Self {
            me: None,
            color: None,
            game: Game::with_policy(policy),
            running: false,
        }
    }

    pub fn id(&self) -> Option<PeerId> {
        self.me
    }

    pub fn color(&self) -> Option<Color> {
        self.color
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn my_turn(&self) -> bool {
        self.running && self.color == Some(self.game.turn())
    }

    pub fn handle(&mut self, message: &ServerMessage) -> Result<MirrorEvent, MirrorError> {
        match message {
            ServerMessage::WaitingForPeer => Ok(MirrorEvent::Waiting),
            ServerMessage::SessionStart {
                players,
                position,
                you,
            } => {
                let me = players
                    .iter()
                    .find(|p| p.id == *you)
                    .ok_or(MirrorError::NotListed)?;
                self.game.load_fen(position)?;
                self.me = Some(*you);
                self.color = Some(me.color);
                self.running = true;
                Ok(MirrorEvent::Started { color: me.color })
            }
            ServerMessage::MoveRelayed(relayed) => {
                if !self.running {
                    return Err(MirrorError::NotInSession);
                }
                let rec = &relayed.record;
                let mine = self.game.apply_move(rec.from, rec.to, rec.promoted_to)?;
                let actual = self.game.to_fen();
                if actual != relayed.position {
                    return Err(MirrorError::Desync {
                        expected: relayed.position.clone(),
                        actual,
                    });
                }
                if self.game.status().is_terminal() {
                    self.running = false;
                }
                Ok(MirrorEvent::Moved(mine))
            }
            ServerMessage::PromotionRequired => Ok(MirrorEvent::PromotionRequired),
            ServerMessage::PeerLeft => {
                self.running = false;
                Ok(MirrorEvent::PeerLeft)
            }
            ServerMessage::SessionEnded(outcome) => {
                self.running = false;
                Ok(MirrorEvent::Ended(*outcome))
            }
            ServerMessage::SessionReset => {
                self.game.reset();
                self.color = None;
                self.running = false;
                Ok(MirrorEvent::Reset)
            }
            ServerMessage::LobbyFull => Ok(MirrorEvent::LobbyFull),
            ServerMessage::Error { message } => Ok(MirrorEvent::Error(message.clone())),
        }
    }

    /// Check a move against the local game and build its submission. The
    /// local game is left alone; it advances when the relay echoes the move.
    pub fn submit(
        &self,
        from: Square,
        to: Square,
        promotion: Option<PieceKind>,
    ) -> Result<ClientMessage, MirrorError> {
        let color = self.color.ok_or(MirrorError::NotInSession)?;
        if !self.running {
            return Err(MirrorError::NotInSession);
        }
        if color != self.game.turn() {
            return Err(MirrorError::NotYourTurn(self.game.turn()));
        }
        let mut probe = self.game.clone();
        let record = probe.apply_move(from, to, promotion)?;
        Ok(ClientMessage::SubmitMove(MoveSubmission::from_record(
            &record,
            probe.status(),
            probe.to_fen(),
        )))
    }

    pub fn status(&self) -> GameStatus {
        self.game.status()
    }
}

/// Bounded reconnect attempts with a fixed delay.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reconnect {
    RetryAfter(Duration),
    GiveUp,
}

/// Tracks consecutive connection failures against a [`ReconnectPolicy`].
#[derive(Clone, Debug, Default)]
pub struct Reconnector {
    policy: ReconnectPolicy,
    failures: u32,
}

impl Reconnector {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            failures: 0,
        }
    }

    pub fn on_failure(&mut self) -> Reconnect {
        self.failures += 1;
        if self.failures > self.policy.max_attempts {
            Reconnect::GiveUp
        } else {
            Reconnect::RetryAfter(self.policy.delay)
        }
    }

    pub fn on_connected(&mut self) {
        self.failures = 0;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod client_tests;
