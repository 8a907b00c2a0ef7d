use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use futures_util::{Stream, StreamExt};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use perpsim::{
    build_router,
    config::SimConfig,
    engine::agent::Activity,
    events::MonitorEvent,
    models::PriceQuote,
    state::{build_state, SharedState},
};

async fn serve() -> (SharedState, String) {
    let state = build_state(SimConfig::default(), "test");
    {
        let mut sim = state.sim.lock().await;
        sim.seed_history(Utc::now());
        let quote = PriceQuote {
            symbol:     "BTC".to_string(),
            price:      98_000.0,
            change_24h: 0.0,
            high_24h:   98_000.0,
            low_24h:    98_000.0,
            as_of:      Utc::now(),
        };
        sim.apply_prices(HashMap::from([("BTC".to_string(), quote)]), Utc::now());
    }

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = build_router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (state, format!("ws://{addr}/ws/monitor"))
}

async fn next_json<S>(stream: &mut S) -> Value
where
    S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("frame within 5 s")
            .expect("stream open")
            .expect("valid frame");
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

#[tokio::test]
async fn monitor_socket_sends_snapshot_then_events() {
    let (state, url) = serve().await;
    let (mut socket, _) = connect_async(url).await.unwrap();

    let first = next_json(&mut socket).await;
    assert_eq!(first["event"], "SNAPSHOT");
    assert_eq!(
        first["closed_trades"].as_array().map(Vec::len),
        Some(SimConfig::default().seed_trades)
    );

    // The client subscribed before its snapshot, so a later broadcast arrives.
    state.publish([MonitorEvent::ActionChanged { action: Activity::Scanning }]);
    let second = next_json(&mut socket).await;
    assert_eq!(second["event"], "ACTION_CHANGED");
}
