//! Session registry: every connected peer and every live session.
//!
//! Each session sits behind its own mutex, so submissions for one session
//! are processed one at a time while sessions proceed independently. A
//! reply is delivered to peer channels while the session lock is still
//! held, which keeps broadcasts in submission order.
//!
//! Lock order: a session mutex may be held while taking the peer map, never
//! the other way round, and the session map is never held across a session
//! lock.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chess_rules::PromotionPolicy;
use tokio::sync::{Mutex, RwLock, mpsc};
use tracing::{debug, info, warn};

use crate::config::LobbyConfig;
use crate::metrics::Metrics;
use crate::protocol::{ClientMessage, MoveSubmission, PeerId, ServerMessage, SessionId};
use crate::session::{Phase, Reply, Session};

type SessionHandle = Arc<Mutex<Session>>;

#[derive(Debug)]
struct PeerEntry {
    tx: mpsc::UnboundedSender<ServerMessage>,
    session: Option<SessionId>,
}

/// What one janitor sweep did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub sessions_expired: usize,
    pub sessions_dropped: usize,
    pub peers_dropped: usize,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        *self == SweepReport::default()
    }
}

#[derive(Debug)]
pub struct Registry {
    max_sessions: usize,
    reset_delay: Duration,
    promotion_policy: PromotionPolicy,
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
    peers: RwLock<HashMap<PeerId, PeerEntry>>,
    /// Serializes admission so two joiners never race for one seat.
    admission: Mutex<()>,
    metrics: Arc<Metrics>,
}

impl Registry {
    pub fn new(config: &LobbyConfig, metrics: Arc<Metrics>) -> Arc<Self> {
        Arc::new(Self {
            max_sessions: config.max_sessions.max(1),
            reset_delay: config.reset_delay(),
            promotion_policy: config.promotion_policy,
            sessions: RwLock::new(HashMap::new()),
            peers: RwLock::new(HashMap::new()),
            admission: Mutex::new(()),
            metrics,
        })
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Register a new peer. Everything the relay sends it arrives on the
    /// returned receiver.
    pub async fn connect(&self) -> (PeerId, mpsc::UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let peer = PeerId::new();
        self.peers
            .write()
            .await
            .insert(peer, PeerEntry { tx, session: None });
        self.metrics.connection_opened();
        info!(%peer, "peer connected");
        (peer, rx)
    }

    /// Leave any session and forget the peer.
    pub async fn disconnect(self: &Arc<Self>, peer: PeerId) {
        self.leave(peer).await;
        if self.peers.write().await.remove(&peer).is_some() {
            self.metrics.connection_closed();
            info!(%peer, "peer disconnected");
        }
    }

    pub async fn dispatch(self: &Arc<Self>, peer: PeerId, message: ClientMessage) {
        match message {
            ClientMessage::JoinSession => self.join(peer).await,
            ClientMessage::SubmitMove(sub) => self.submit_move(peer, &sub).await,
            ClientMessage::LeaveSession => self.leave(peer).await,
        }
    }

    /// Answer a frame that could not be decoded.
    pub async fn reject_frame(&self, peer: PeerId, reason: &str) {
        self.metrics.protocol_error();
        debug!(%peer, reason, "undecodable frame");
        self.send(peer, ServerMessage::error(format!("malformed message: {reason}")))
            .await;
    }

    pub async fn join(self: &Arc<Self>, peer: PeerId) {
        let _admission = self.admission.lock().await;

        if let Some(handle) = self.session_of(peer).await {
            let member = handle.lock().await.has_peer(peer);
            if member {
                self.metrics.protocol_error();
                self.send(peer, ServerMessage::error("Already in session")).await;
                return;
            }
        }

        self.prune_stale().await;

        let handles: Vec<(SessionId, SessionHandle)> = self
            .sessions
            .read()
            .await
            .iter()
            .map(|(id, h)| (*id, Arc::clone(h)))
            .collect();

        // A session with someone waiting first, then an empty one.
        for wanted in [Phase::WaitingForSecond, Phase::Empty] {
            for (id, handle) in &handles {
                let mut session = handle.lock().await;
                if session.phase() == wanted {
                    let reply = session.join(peer);
                    self.assign(peer, Some(*id)).await;
                    self.settle(*id, reply).await;
                    return;
                }
            }
        }

        let count = self.sessions.read().await.len();
        if count >= self.max_sessions {
            info!(%peer, sessions = count, "lobby full");
            self.send(peer, ServerMessage::LobbyFull).await;
            return;
        }

        let id = SessionId::new();
        let handle = Arc::new(Mutex::new(Session::new(id, self.promotion_policy)));
        let mut session = handle.lock().await;
        self.sessions.write().await.insert(id, Arc::clone(&handle));
        info!(session = %id, "session opened");
        let reply = session.join(peer);
        self.assign(peer, Some(id)).await;
        self.settle(id, reply).await;
    }

    pub async fn submit_move(self: &Arc<Self>, peer: PeerId, sub: &MoveSubmission) {
        let Some(handle) = self.session_of(peer).await else {
            self.metrics.move_rejected();
            self.send(peer, ServerMessage::error("Game not started")).await;
            return;
        };

        let mut session = handle.lock().await;
        let started = Instant::now();
        match session.submit_move(peer, sub) {
            Ok(reply) => {
                self.metrics.move_relayed(started.elapsed());
                self.settle(session.id(), reply).await;
            }
            Err(rejection) => {
                self.metrics.move_rejected();
                info!(
                    session = %session.id(),
                    %peer,
                    from = %sub.from,
                    to = %sub.to,
                    reason = %rejection,
                    "move rejected"
                );
                self.send(peer, rejection.notice()).await;
            }
        }
    }

    pub async fn leave(self: &Arc<Self>, peer: PeerId) {
        let Some(handle) = self.session_of(peer).await else {
            return;
        };
        let mut session = handle.lock().await;
        let reply = session.leave(peer);
        let id = session.id();
        self.assign(peer, None).await;
        self.settle(id, reply).await;
    }

    /// Reset sessions idle for at least `idle_timeout`, drop sessions left
    /// empty, and forget peers whose connection is gone.
    pub async fn sweep_idle(self: &Arc<Self>, idle_timeout: Duration) -> SweepReport {
        let _admission = self.admission.lock().await;
        let mut report = SweepReport::default();

        let dead: Vec<PeerId> = self
            .peers
            .read()
            .await
            .iter()
            .filter(|(_, e)| e.tx.is_closed())
            .map(|(id, _)| *id)
            .collect();
        for peer in dead {
            self.disconnect(peer).await;
            report.peers_dropped += 1;
        }

        let handles: Vec<SessionHandle> = self.sessions.read().await.values().cloned().collect();
        let now = Instant::now();
        let mut empty = Vec::new();
        for handle in handles {
            let mut session = handle.lock().await;
            if session.phase() != Phase::Empty && session.idle_for(now) >= idle_timeout {
                warn!(session = %session.id(), idle_secs = session.idle_for(now).as_secs(), "expiring idle session");
                let members: Vec<PeerId> = session.players().iter().map(|p| p.id).collect();
                let reply = session.expire();
                for peer in members {
                    self.assign(peer, None).await;
                }
                self.settle(session.id(), reply).await;
                report.sessions_expired += 1;
            }
            if session.phase() == Phase::Empty {
                empty.push(session.id());
            }
        }

        if !empty.is_empty() {
            let mut sessions = self.sessions.write().await;
            for id in empty {
                sessions.remove(&id);
                report.sessions_dropped += 1;
            }
        }
        report
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn peer_count(&self) -> usize {
        self.peers.read().await.len()
    }

    /// Phase of the session `peer` belongs to, if any.
    pub async fn phase_of(&self, peer: PeerId) -> Option<Phase> {
        let handle = self.session_of(peer).await?;
        let session = handle.lock().await;
        session.has_peer(peer).then(|| session.phase())
    }

    async fn session_of(&self, peer: PeerId) -> Option<SessionHandle> {
        let id = self.peers.read().await.get(&peer)?.session?;
        self.sessions.read().await.get(&id).cloned()
    }

    async fn assign(&self, peer: PeerId, session: Option<SessionId>) {
        if let Some(entry) = self.peers.write().await.get_mut(&peer) {
            entry.session = session;
        }
    }

    /// Drop session members whose connection has closed.
    async fn prune_stale(self: &Arc<Self>) {
        let alive: HashSet<PeerId> = self
            .peers
            .read()
            .await
            .iter()
            .filter(|(_, e)| !e.tx.is_closed())
            .map(|(id, _)| *id)
            .collect();
        let handles: Vec<SessionHandle> = self.sessions.read().await.values().cloned().collect();
        for handle in handles {
            let mut session = handle.lock().await;
            let members: Vec<PeerId> = session.players().iter().map(|p| p.id).collect();
            let reply = session.prune(|p| alive.contains(&p));
            for peer in members.into_iter().filter(|p| !session.has_peer(*p)) {
                self.assign(peer, None).await;
            }
            self.settle(session.id(), reply).await;
        }
    }

    /// Deliver a session's reply, update counters and schedule teardown.
    /// Called with the session lock held.
    async fn settle(self: &Arc<Self>, id: SessionId, reply: Reply) {
        if reply.started {
            self.metrics.game_started();
        }
        if reply.ended {
            self.metrics.game_ended();
        }
        if let Some(epoch) = reply.teardown {
            self.schedule_teardown(id, epoch);
        }
        self.deliver(reply).await;
    }

    async fn deliver(&self, reply: Reply) {
        let peers = self.peers.read().await;
        for out in reply.outbound {
            let event = out.message.event_name();
            match peers.get(&out.to) {
                Some(entry) => {
                    if entry.tx.send(out.message).is_err() {
                        debug!(peer = %out.to, event, "peer channel closed");
                    }
                }
                None => debug!(peer = %out.to, event, "no such peer"),
            }
        }
    }

    async fn send(&self, peer: PeerId, message: ServerMessage) {
        let reply = Reply {
            outbound: vec![crate::session::Outbound { to: peer, message }],
            ..Reply::default()
        };
        self.deliver(reply).await;
    }

    fn schedule_teardown(self: &Arc<Self>, id: SessionId, epoch: u64) {
        let registry = Arc::clone(self);
        let delay = self.reset_delay;
        debug!(session = %id, epoch, delay_ms = delay.as_millis() as u64, "teardown scheduled");
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            registry.teardown(id, epoch).await;
        });
    }

    async fn teardown(&self, id: SessionId, epoch: u64) {
        let Some(handle) = self.sessions.read().await.get(&id).cloned() else {
            return;
        };
        let mut session = handle.lock().await;
        if session.epoch() != epoch {
            debug!(session = %id, epoch, "session already reset");
            return;
        }
        let members: Vec<PeerId> = session.players().iter().map(|p| p.id).collect();
        let reply = session.teardown(epoch);
        for peer in members {
            self.assign(peer, None).await;
        }
        self.deliver(reply).await;
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod registry_tests;
