//! Relay counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug)]
pub struct Metrics {
    started_at: DateTime<Utc>,
    started: Instant,
    connections: AtomicU64,
    disconnections: AtomicU64,
    games_started: AtomicU64,
    games_ended: AtomicU64,
    moves_relayed: AtomicU64,
    moves_rejected: AtomicU64,
    protocol_errors: AtomicU64,
    move_micros: AtomicU64,
}

/// Point-in-time copy of the counters, served on `/metrics`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
    pub connections: u64,
    pub active_connections: u64,
    pub games_started: u64,
    pub games_ended: u64,
    pub active_games: u64,
    pub moves_relayed: u64,
    pub moves_rejected: u64,
    pub protocol_errors: u64,
    /// Mean time to validate and relay one move.
    pub avg_move_micros: u64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            started: Instant::now(),
            connections: AtomicU64::new(0),
            disconnections: AtomicU64::new(0),
            games_started: AtomicU64::new(0),
            games_ended: AtomicU64::new(0),
            moves_relayed: AtomicU64::new(0),
            moves_rejected: AtomicU64::new(0),
            protocol_errors: AtomicU64::new(0),
            move_micros: AtomicU64::new(0),
        }
    }

    pub fn connection_opened(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.disconnections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn game_started(&self) {
        self.games_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn game_ended(&self) {
        self.games_ended.fetch_add(1, Ordering::Relaxed);
    }

    pub fn move_relayed(&self, took: Duration) {
        self.moves_relayed.fetch_add(1, Ordering::Relaxed);
        let micros = u64::try_from(took.as_micros()).unwrap_or(u64::MAX);
        self.move_micros.fetch_add(micros, Ordering::Relaxed);
    }

    pub fn move_rejected(&self) {
        self.moves_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let connections = self.connections.load(Ordering::Relaxed);
        let disconnections = self.disconnections.load(Ordering::Relaxed);
        let games_started = self.games_started.load(Ordering::Relaxed);
        let games_ended = self.games_ended.load(Ordering::Relaxed);
        let moves_relayed = self.moves_relayed.load(Ordering::Relaxed);
        let move_micros = self.move_micros.load(Ordering::Relaxed);

        MetricsSnapshot {
            started_at: self.started_at,
            uptime_secs: self.started.elapsed().as_secs(),
            connections,
            active_connections: connections.saturating_sub(disconnections),
            games_started,
            games_ended,
            active_games: games_started.saturating_sub(games_ended),
            moves_relayed,
            moves_rejected: self.moves_rejected.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            avg_move_micros: move_micros.checked_div(moves_relayed).unwrap_or(0),
        }
    }
}
