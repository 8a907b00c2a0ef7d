use std::collections::HashMap;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use perpsim::{
    build_router,
    config::SimConfig,
    models::PriceQuote,
    state::{build_state, SharedState},
};

fn quote(symbol: &str, price: f64) -> PriceQuote {
    PriceQuote {
        symbol:     symbol.to_string(),
        price,
        change_24h: 0.0,
        high_24h:   price,
        low_24h:    price,
        as_of:      Utc::now(),
    }
}

async fn setup() -> (SharedState, Router) {
    let state = build_state(SimConfig::default(), "test");
    {
        let mut sim = state.sim.lock().await;
        sim.seed_history(Utc::now());
        let quotes = HashMap::from([
            ("BTC".to_string(), quote("BTC", 98_000.0)),
            ("ETH".to_string(), quote("ETH", 3_400.0)),
        ]);
        sim.apply_prices(quotes, Utc::now());
    }
    let app = build_router(state.clone());
    (state, app)
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => request
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn health_reports_feed() {
    let (_, app) = setup().await;
    let (status, body) = call(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["feed"]["loading"], false);
    assert_eq!(body["feed"]["symbols"], 2);
}

#[tokio::test]
async fn snapshot_contains_seeded_history() {
    let (_, app) = setup().await;
    let (status, body) = call(&app, "GET", "/api/monitor/snapshot", None).await;
    assert_eq!(status, StatusCode::OK);

    let snapshot = &body["snapshot"];
    let seeded = SimConfig::default().seed_trades as u64;
    assert_eq!(snapshot["stats"]["total_trades"], seeded);
    assert_eq!(snapshot["closed_trades"].as_array().map(Vec::len), Some(seeded as usize));
    assert_eq!(snapshot["equity_curve"].as_array().map(Vec::len), Some(50));
    assert_eq!(snapshot["current_action"], "ANALYZING");
    assert!(snapshot["thoughts"][0]["title"].is_string());
}

#[tokio::test]
async fn open_then_close_position() {
    let (state, app) = setup().await;
    let mut rx = state.subscribe();

    let (status, body) = call(
        &app,
        "POST",
        "/api/positions",
        Some(serde_json::json!({ "symbol": "eth", "side": "LONG" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["position"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["position"]["asset"], "ETH-PERP");

    let opened: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
    assert_eq!(opened["event"], "POSITION_OPENED");

    let (_, body) = call(&app, "GET", "/api/monitor/positions", None).await;
    assert_eq!(body["count"], 1);

    let (status, body) = call(&app, "POST", &format!("/api/positions/{id}/close"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["trade"]["reason"], "MANUAL");

    // Second close of the same id is a 404, not a double count.
    let (status, body) = call(&app, "POST", &format!("/api/positions/{id}/close"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["ok"], false);

    let (_, body) = call(&app, "GET", "/api/monitor/stats", None).await;
    let seeded = SimConfig::default().seed_trades as u64;
    assert_eq!(body["stats"]["total_trades"], seeded + 1);

    let (_, body) = call(&app, "GET", "/api/monitor/thoughts", None).await;
    let kinds: Vec<&str> = body["thoughts"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|t| t["type"].as_str())
        .collect();
    assert_eq!(kinds.last(), Some(&"CLOSE"));
    assert!(kinds.contains(&"EXECUTE"));
}

#[tokio::test]
async fn unknown_position_is_not_found() {
    let (_, app) = setup().await;
    let (status, body) = call(&app, "POST", &format!("/api/positions/{}/close", Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn open_without_price_is_unavailable() {
    let (_, app) = setup().await;
    let (status, body) = call(
        &app,
        "POST",
        "/api/positions",
        Some(serde_json::json!({ "symbol": "DOGE", "side": "SHORT" })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["ok"], false);
}

#[tokio::test]
async fn trades_and_equity_endpoints_list_history() {
    let (_, app) = setup().await;

    let (status, body) = call(&app, "GET", "/api/monitor/trades", None).await;
    assert_eq!(status, StatusCode::OK);
    let trades = body["trades"].as_array().unwrap();
    assert!(!trades.is_empty());
    // newest first
    let first = trades[0]["close_time"].as_str().unwrap();
    let last = trades[trades.len() - 1]["close_time"].as_str().unwrap();
    assert!(first >= last);

    let (_, body) = call(&app, "GET", "/api/monitor/equity", None).await;
    assert_eq!(body["count"], 50);
}
