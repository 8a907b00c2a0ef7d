//! # routes::control
//!
//! | Method | Path                          | Description                          |
//! |--------|-------------------------------|--------------------------------------|
//! | POST   | `/api/positions`              | open at the book price (sampled size)|
//! | POST   | `/api/positions/:id/close`    | close at the current mark (MANUAL)   |
//! | GET    | `/health`                     | liveness + feed status               |

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::{error::AppError, models::Side, state::SharedState};

#[derive(Debug, Deserialize)]
pub struct OpenRequest {
    pub symbol: String,
    pub side:   Side,
}

/// POST /api/positions
pub async fn open_position(
    State(state): State<SharedState>,
    Json(body): Json<OpenRequest>,
) -> Result<impl IntoResponse, AppError> {
    let symbol = body.symbol.trim().to_ascii_uppercase();
    let (position, events) = state.sim.lock().await.open(&symbol, body.side, Utc::now())?;
    state.publish(events);

    info!(id = %position.id, %symbol, side = %body.side, "Manual open via API");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "ok":       true,
            "position": position,
        })),
    ))
}

/// POST /api/positions/:id/close
pub async fn close_position(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let (trade, events) = state.sim.lock().await.close_manual(id, Utc::now())?;
    state.publish(events);

    Ok(Json(json!({
        "ok":    true,
        "trade": trade,
    })))
}

/// GET /health
pub async fn health(State(state): State<SharedState>) -> impl IntoResponse {
    let (feed, open_positions) = {
        let sim = state.sim.lock().await;
        (sim.feed_status(), sim.positions().len())
    };
    let uptime_secs = (Utc::now() - state.started_at).num_seconds();

    Json(json!({
        "ok":             true,
        "uptime_secs":    uptime_secs,
        "open_positions": open_positions,
        "feed":           feed,
    }))
}
