//! HTTP and websocket front end.

use std::sync::Arc;

use anyhow::Context;
use axum::{Json, Router};
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::config::LobbyConfig;
use crate::janitor;
use crate::metrics::Metrics;
use crate::protocol::{ClientMessage, PeerId};
use crate::registry::Registry;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_upgrade))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.registry.metrics().snapshot())
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| peer_loop(socket, state.registry))
}

/// One peer connection: a writer task drains the peer's channel into the
/// socket while this task reads frames and hands them to the registry.
async fn peer_loop(socket: WebSocket, registry: Arc<Registry>) {
    let (peer, mut outbox) = registry.connect().await;
    let (mut sink, mut stream) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(message) = outbox.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    warn!(%peer, error = %e, "failed to encode message");
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => handle_text(&registry, peer, &text).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(%peer, error = %e, "socket error");
                break;
            }
        }
    }

    registry.disconnect(peer).await;
    // Dropping the peer closed its channel, so the writer drains and stops.
    if let Err(e) = writer.await {
        debug!(%peer, error = %e, "writer task ended abnormally");
    }
}

async fn handle_text(registry: &Arc<Registry>, peer: PeerId, text: &str) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => registry.dispatch(peer, message).await,
        Err(e) => registry.reject_frame(peer, &e.to_string()).await,
    }
}

/// Bind, start the janitor and serve until Ctrl-C.
pub async fn run(config: LobbyConfig) -> anyhow::Result<()> {
    let metrics = Arc::new(Metrics::new());
    let registry = Registry::new(&config, metrics);
    let sweeper = janitor::spawn(
        Arc::clone(&registry),
        config.sweep_interval(),
        config.idle_timeout(),
    );

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(
        %addr,
        max_sessions = config.max_sessions,
        reset_delay_ms = config.reset_delay_ms,
        promotion = ?config.promotion_policy,
        "lobby listening"
    );

    axum::serve(listener, router(AppState { registry }))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    sweeper.abort();
    info!("lobby stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
