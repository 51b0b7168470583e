//! Session coordinator: one pairing of at most two peers around one game.
//!
//! A [`Session`] is a plain synchronous state machine. It never touches a
//! socket; every operation returns a [`Reply`] naming who gets which
//! message, and the registry does the delivery. The relay keeps its own
//! [`Game`] and re-validates every submitted move against it, so a peer's
//! claimed flags and position are never trusted.

use std::time::{Duration, Instant};

use chess_rules::{Color, Game, MoveError, PromotionPolicy};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::protocol::{
    MoveSubmission, PeerId, PlayerInfo, RelayedMove, ServerMessage, SessionId, SessionOutcome,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Empty,
    WaitingForSecond,
    Active,
    Ended,
}

/// A message addressed to one peer.
#[derive(Clone, Debug, PartialEq)]
pub struct Outbound {
    pub to: PeerId,
    pub message: ServerMessage,
}

/// Result of one session operation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Reply {
    pub outbound: Vec<Outbound>,
    /// Set when the session ended; the registry resets the session after
    /// the configured delay by calling [`Session::teardown`] with this epoch.
    pub teardown: Option<u64>,
    /// Set when this operation started a game.
    pub started: bool,
    /// Set when this operation ended a game.
    pub ended: bool,
}

impl Reply {
    fn to(peer: PeerId, message: ServerMessage) -> Self {
        Reply {
            outbound: vec![Outbound { to: peer, message }],
            ..Reply::default()
        }
    }

    fn push(&mut self, to: PeerId, message: ServerMessage) {
        self.outbound.push(Outbound { to, message });
    }

    pub fn merge(&mut self, other: Reply) {
        self.outbound.extend(other.outbound);
        self.teardown = other.teardown.or(self.teardown);
        self.started |= other.started;
        self.ended |= other.ended;
    }

    /// Messages addressed to `peer`, in order.
    pub fn messages_for(&self, peer: PeerId) -> Vec<&ServerMessage> {
        self.outbound
            .iter()
            .filter(|o| o.to == peer)
            .map(|o| &o.message)
            .collect()
    }
}

/// Why a submitted move was not relayed. The session is unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("Game not started")]
    NotStarted,
    #[error("Player not found")]
    UnknownPeer,
    #[error("Not your turn")]
    NotYourTurn,
    #[error("{0}")]
    Move(#[from] MoveError),
}

impl Rejection {
    /// The notice sent back to the submitting peer.
    pub fn notice(&self) -> ServerMessage {
        match self {
            Rejection::Move(MoveError::PromotionRequired) => ServerMessage::PromotionRequired,
            other => ServerMessage::error(other.to_string()),
        }
    }
}

#[derive(Debug)]
pub struct Session {
    id: SessionId,
    phase: Phase,
    players: Vec<PlayerInfo>,
    game: Game,
    /// Bumped every time the session returns to empty.
    epoch: u64,
    last_activity: Instant,
}

impl Session {
    pub fn new(id: SessionId, policy: PromotionPolicy) -> Self {
        Self {
            id,
            phase: Phase::Empty,
            players: Vec::with_capacity(2),
            game: Game::with_policy(policy),
            epoch: 0,
            last_activity: Instant::now(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn players(&self) -> &[PlayerInfo] {
        &self.players
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn has_peer(&self, peer: PeerId) -> bool {
        self.players.iter().any(|p| p.id == peer)
    }

    pub fn color_of(&self, peer: PeerId) -> Option<Color> {
        self.players.iter().find(|p| p.id == peer).map(|p| p.color)
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity)
    }

    /// Admit a peer. The first joiner plays white and waits; the second plays
    /// black and starts the game for both. Anyone else gets `lobby-full`.
    pub fn join(&mut self, peer: PeerId) -> Reply {
        if self.has_peer(peer) {
            return Reply::to(peer, ServerMessage::error("Already in session"));
        }
        self.touch();
        match self.phase {
            Phase::Empty => {
                self.players.push(PlayerInfo {
                    id: peer,
                    color: Color::White,
                });
                self.phase = Phase::WaitingForSecond;
                info!(session = %self.id, %peer, color = %Color::White, "player joined, waiting for peer");
                Reply::to(peer, ServerMessage::WaitingForPeer)
            }
            Phase::WaitingForSecond => {
                self.players.push(PlayerInfo {
                    id: peer,
                    color: Color::Black,
                });
                self.phase = Phase::Active;
                self.game.reset();
                info!(
                    session = %self.id,
                    %peer,
                    color = %Color::Black,
                    promotion = ?self.game.promotion_policy(),
                    "player joined, game started"
                );

                let position = self.game.to_fen();
                let mut reply = Reply {
                    started: true,
                    ..Reply::default()
                };
                for p in &self.players {
                    reply.push(
                        p.id,
                        ServerMessage::SessionStart {
                            players: self.players.clone(),
                            position: position.clone(),
                            you: p.id,
                        },
                    );
                }
                reply
            }
            Phase::Active | Phase::Ended => {
                debug!(session = %self.id, %peer, "session full");
                Reply::to(peer, ServerMessage::LobbyFull)
            }
        }
    }

    /// Re-validate a submitted move on the relay's game and broadcast the
    /// result to every member, sender included.
    pub fn submit_move(&mut self, peer: PeerId, sub: &MoveSubmission) -> Result<Reply, Rejection> {
        if self.phase != Phase::Active {
            return Err(Rejection::NotStarted);
        }
        let color = self.color_of(peer).ok_or(Rejection::UnknownPeer)?;
        if color != self.game.turn() {
            return Err(Rejection::NotYourTurn);
        }

        let record = self.game.apply_move(sub.from, sub.to, sub.promoted_to)?;
        self.touch();

        let position = self.game.to_fen();
        let status = self.game.status();
        if sub.position != position {
            warn!(
                session = %self.id,
                %peer,
                claimed = %sub.position,
                actual = %position,
                "peer position disagrees with relay"
            );
        }
        if sub.is_checkmate != record.is_checkmate || sub.is_stalemate != record.is_stalemate {
            warn!(session = %self.id, %peer, %status, "peer termination flags disagree with relay");
        }
        info!(
            session = %self.id,
            %color,
            from = %record.from,
            to = %record.to,
            san = %record.san,
            %status,
            "move relayed"
        );

        let relayed = RelayedMove {
            record,
            position,
            game_status: status,
        };
        let mut reply = Reply::default();
        for p in &self.players {
            reply.push(p.id, ServerMessage::MoveRelayed(relayed.clone()));
        }

        if let Some(outcome) = SessionOutcome::from_status(status, self.game.winner()) {
            self.phase = Phase::Ended;
            info!(session = %self.id, ?outcome, "game over");
            for p in &self.players {
                reply.push(p.id, ServerMessage::SessionEnded(outcome));
            }
            reply.teardown = Some(self.epoch);
            reply.ended = true;
        }
        Ok(reply)
    }

    /// Remove a peer. Leaving a game in progress ends it for the other peer.
    pub fn leave(&mut self, peer: PeerId) -> Reply {
        let Some(idx) = self.players.iter().position(|p| p.id == peer) else {
            return Reply::default();
        };
        let left = self.players.remove(idx);
        info!(session = %self.id, %peer, color = %left.color, phase = ?self.phase, "player left");
        self.touch();

        if self.players.is_empty() {
            let ended = self.phase == Phase::Active;
            self.reset();
            return Reply {
                ended,
                ..Reply::default()
            };
        }

        let mut reply = Reply::default();
        match self.phase {
            Phase::Active => {
                self.phase = Phase::Ended;
                for p in &self.players {
                    reply.push(p.id, ServerMessage::PeerLeft);
                }
                reply.teardown = Some(self.epoch);
                reply.ended = true;
            }
            Phase::WaitingForSecond | Phase::Ended | Phase::Empty => {}
        }
        reply
    }

    /// Drop members for which `alive` is false, as if they had left.
    pub fn prune(&mut self, alive: impl Fn(PeerId) -> bool) -> Reply {
        let stale: Vec<PeerId> = self
            .players
            .iter()
            .map(|p| p.id)
            .filter(|&id| !alive(id))
            .collect();
        let mut reply = Reply::default();
        for peer in stale {
            debug!(session = %self.id, %peer, "pruning stale peer");
            reply.merge(self.leave(peer));
        }
        reply
    }

    /// Delayed reset after a game ended. Ignored unless the session is still
    /// in the ended game that scheduled it.
    pub fn teardown(&mut self, epoch: u64) -> Reply {
        if epoch != self.epoch || self.phase != Phase::Ended {
            debug!(session = %self.id, epoch, current = self.epoch, "stale teardown ignored");
            return Reply::default();
        }
        self.expire()
    }

    /// Reset now, telling every remaining member.
    pub fn expire(&mut self) -> Reply {
        let mut reply = Reply::default();
        for p in &self.players {
            reply.push(p.id, ServerMessage::SessionReset);
        }
        reply.ended = self.phase == Phase::Active;
        info!(session = %self.id, epoch = self.epoch, "session reset");
        self.reset();
        reply
    }

    fn reset(&mut self) {
        self.players.clear();
        self.game.reset();
        self.phase = Phase::Empty;
        self.epoch += 1;
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod session_tests;
