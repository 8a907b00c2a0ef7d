//! # perpsim
//!
//! Simulated "AI" perpetuals trading agent. The engine fabricates positions,
//! marks them against a spot feed, closes them on stop-loss / take-profit,
//! keeps the statistics and writes a narration log. The monitor API streams
//! all of it to a dashboard.
//!
//! ```text
//!  ┌─────────────┐  every 30 s   ┌──────────────────────────────────────────┐
//!  │ PriceSource │ ────────────▶ │ Simulator (behind tokio::Mutex)          │
//!  │ gecko / sim │               │ ├─ PriceBook                             │
//!  └─────────────┘               │ ├─ PositionEngine   mark → settle        │
//!                                │ ├─ StatsAggregator                       │
//!   mark tick · agent · equity ─▶│ ├─ TradeHistory · ThoughtLog · Equity    │
//!                                │ └─ Agent                                 │
//!                                └───────────────┬──────────────────────────┘
//!                                                │ MonitorEvent (JSON)
//!  ┌─────────────┐  ws://host/ws/monitor         ▼
//!  │  Dashboard  │ ◀──────────────────── broadcast_tx
//!  └─────────────┘  GET /api/monitor/*
//! ```

use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod format;
pub mod models;
pub mod routes;
pub mod runtime;
pub mod state;

use routes::{
    control::{close_position, health, open_position},
    monitor::{get_equity, get_positions, get_snapshot, get_stats, get_thoughts, get_trades, ws_monitor},
};
use state::SharedState;

/// Full HTTP surface with tracing and permissive CORS.
pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // ── Monitor ───────────────────────────────────────────────────────────
        .route("/ws/monitor",              get(ws_monitor))
        .route("/api/monitor/snapshot",    get(get_snapshot))
        .route("/api/monitor/positions",   get(get_positions))
        .route("/api/monitor/trades",      get(get_trades))
        .route("/api/monitor/stats",       get(get_stats))
        .route("/api/monitor/thoughts",    get(get_thoughts))
        .route("/api/monitor/equity",      get(get_equity))
        // ── Control ───────────────────────────────────────────────────────────
        .route("/api/positions",           post(open_position))
        .route("/api/positions/:id/close", post(close_position))
        .route("/health",                  get(health))
        // ── Middleware ────────────────────────────────────────────────────────
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
