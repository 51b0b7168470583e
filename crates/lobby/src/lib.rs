//! Two-peer session relay for `chess_rules` games.
//!
//! Peers connect over a websocket, are paired into a session (first joiner
//! white, second black), and submit moves that the relay re-validates on
//! its own game before broadcasting them to both sides.

pub mod client;
pub mod config;
pub mod janitor;
pub mod metrics;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;

pub use client::{MirrorError, MirrorEvent, PeerMirror, Reconnect, ReconnectPolicy, Reconnector};
pub use config::{ConfigError, LobbyConfig};
pub use metrics::{Metrics, MetricsSnapshot};
pub use protocol::*;
pub use registry::{Registry, SweepReport};
pub use session::{Outbound, Phase, Rejection, Reply, Session};
