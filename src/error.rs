//! # error
//!
//! Centralised error types.
//!
//! [`SimError`] is what the simulation core returns. [`AppError`] is what the
//! monitor API handlers return; its `IntoResponse` impl turns every failure
//! into a structured JSON body so the dashboard always gets a
//! machine-readable response.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Failures of the simulation core. None of these are fatal: the runtime
/// logs them and keeps ticking.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// Reference price was zero, negative or not a finite number.
    #[error("invalid reference price {price} for {symbol}")]
    InvalidPrice { symbol: String, price: f64 },

    /// The feed has no usable quote for the symbol.
    #[error("no price available for {0}")]
    PriceUnavailable(String),

    /// An explicit order plan violated a sizing or trigger precondition.
    #[error("invalid order plan: {0}")]
    InvalidPlan(String),

    /// No open position carries this id.
    #[error("position {0} not found")]
    NotFound(Uuid),

    /// The price source could not be reached or parsed.
    #[error("price feed error: {0}")]
    Feed(String),
}

#[derive(Debug, Error)]
pub enum AppError {
    /// The simulation refused the request.
    #[error("Simulation error: {0}")]
    Sim(#[from] SimError),

    /// Catch-all for unexpected failures.
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Sim(SimError::NotFound(id)) => {
                (StatusCode::NOT_FOUND, format!("position {id} not found"))
            }
            AppError::Sim(SimError::PriceUnavailable(symbol)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("no price available for {symbol}"),
            ),
            AppError::Sim(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            AppError::Internal(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Internal error: {err}"),
            ),
        };

        let body = Json(json!({
            "ok":    false,
            "error": message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_errors_map_to_status_codes() {
        let cases = [
            (SimError::NotFound(Uuid::nil()), StatusCode::NOT_FOUND),
            (SimError::PriceUnavailable("BTC".into()), StatusCode::SERVICE_UNAVAILABLE),
            (SimError::InvalidPlan("size".into()), StatusCode::BAD_REQUEST),
            (SimError::InvalidPrice { symbol: "ETH".into(), price: 0.0 }, StatusCode::BAD_REQUEST),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).into_response().status(), status);
        }
        let internal = AppError::from(anyhow::anyhow!("boom")).into_response();
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
