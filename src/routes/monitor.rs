//! # routes::monitor
//!
//! **Monitor feed**: the dashboard's read-only view of the simulation.
//!
//! | Method    | Path                      | Description                           |
//! |-----------|---------------------------|---------------------------------------|
//! | GET (WS)  | `/ws/monitor`             | `SNAPSHOT` on connect, then events    |
//! | GET       | `/api/monitor/snapshot`   | full [`Snapshot`]                     |
//! | GET       | `/api/monitor/positions`  | open positions                        |
//! | GET       | `/api/monitor/trades`     | closed trades, newest first           |
//! | GET       | `/api/monitor/stats`      | [`TradingStats`]                      |
//! | GET       | `/api/monitor/thoughts`   | rendered thought log, oldest first    |
//! | GET       | `/api/monitor/equity`     | equity curve samples                  |
//!
//! [`Snapshot`]: crate::engine::Snapshot
//! [`TradingStats`]: crate::models::TradingStats

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

use crate::{events::MonitorEvent, state::SharedState};

// ─── WebSocket ────────────────────────────────────────────────────────────────

pub async fn ws_monitor(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: SharedState) {
    // Subscribe before snapshotting so nothing falls between the two.
    let mut rx = state.subscribe();
    let (mut sender, mut receiver) = socket.split();

    info!("🔌 Monitor client connected");

    let snapshot = {
        let mut sim = state.sim.lock().await;
        MonitorEvent::Snapshot(Box::new(sim.snapshot(Utc::now()))).to_json()
    };
    if sender.send(Message::Text(snapshot)).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(json_str) => {
                        if sender.send(Message::Text(json_str)).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        debug!("Monitor client lagged, skipped {n} events");
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            result = receiver.next() => {
                match result {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sender.send(Message::Pong(data)).await;
                    }
                    _ => {}
                }
            }
        }
    }

    info!("🔌 Monitor client disconnected");
}

// ─── REST ─────────────────────────────────────────────────────────────────────

/// GET /api/monitor/snapshot
pub async fn get_snapshot(State(state): State<SharedState>) -> impl IntoResponse {
    let snapshot = state.sim.lock().await.snapshot(Utc::now());
    Json(json!({
        "ok":       true,
        "snapshot": snapshot,
    }))
}

/// GET /api/monitor/positions
pub async fn get_positions(State(state): State<SharedState>) -> impl IntoResponse {
    let positions = state.sim.lock().await.positions().to_vec();
    Json(json!({
        "ok":        true,
        "count":     positions.len(),
        "positions": positions,
    }))
}

/// GET /api/monitor/trades
pub async fn get_trades(State(state): State<SharedState>) -> impl IntoResponse {
    let trades = state.sim.lock().await.recent_trades();
    Json(json!({
        "ok":     true,
        "count":  trades.len(),
        "trades": trades,
    }))
}

/// GET /api/monitor/stats
pub async fn get_stats(State(state): State<SharedState>) -> impl IntoResponse {
    let stats = state.sim.lock().await.stats(Utc::now());
    Json(json!({
        "ok":    true,
        "stats": stats,
    }))
}

/// GET /api/monitor/thoughts
pub async fn get_thoughts(State(state): State<SharedState>) -> impl IntoResponse {
    let thoughts = state.sim.lock().await.thoughts();
    Json(json!({
        "ok":       true,
        "count":    thoughts.len(),
        "thoughts": thoughts,
    }))
}

/// GET /api/monitor/equity
pub async fn get_equity(State(state): State<SharedState>) -> impl IntoResponse {
    let points = state.sim.lock().await.equity_curve();
    Json(json!({
        "ok":     true,
        "count":  points.len(),
        "points": points,
    }))
}
