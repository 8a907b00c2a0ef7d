//! # perpsim — simulated AI perpetuals trading agent
//!
//! Boots the simulator, seeds its history, starts the periodic tasks and
//! serves the monitor API until Ctrl-C.
//!
//! ## Environment Variables
//!
//! See [`perpsim::config`] for the full table. The common ones:
//!
//! | Variable       | Default          | Description                     |
//! |----------------|------------------|---------------------------------|
//! | `BIND_ADDR`    | `0.0.0.0:3000`   | Address Axum listens on         |
//! | `PRICE_SOURCE` | `coingecko`      | `coingecko` or `simulated`      |
//! | `RUST_LOG`     | `perpsim=debug`  | Tracing filter                  |

use std::time::Duration;

use chrono::Utc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use perpsim::{
    build_router,
    config::{PriceSourceKind, SimConfig},
    engine::feed::{PriceSource, SimulatedMarket},
    runtime::TaskSet,
    state::build_state,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Load .env ──────────────────────────────────────────────────────────
    dotenvy::dotenv().ok();

    // ── 2. Structured logging ─────────────────────────────────────────────────
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive("perpsim=debug".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .init();

    info!(r#"

  ╔═══════════════════════════════════════════════════════╗
  ║              PERPSIM — AI Trading Agent               ║
  ║   Feed · Positions · Stats · Thoughts · Monitor WS    ║
  ╚═══════════════════════════════════════════════════════╝"#);

    // ── 3. Config ─────────────────────────────────────────────────────────────
    let config = SimConfig::from_env()?;

    // ── 4. Price source ───────────────────────────────────────────────────────
    let source = match config.price_source {
        PriceSourceKind::CoinGecko => {
            let client = reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(5))
                .build()?;
            PriceSource::coingecko(config.coingecko_url.clone(), client)
        }
        PriceSourceKind::Simulated => PriceSource::Simulated(SimulatedMarket::with_default_universe()),
    };
    info!(source = source.name(), "📡 Price source selected");

    // ── 5. Shared state + seeded history ──────────────────────────────────────
    let addr = config.bind_addr;
    let state = build_state(config, source.name());
    state.sim.lock().await.seed_history(Utc::now());

    // ── 6. Periodic tasks ─────────────────────────────────────────────────────
    let tasks = TaskSet::spawn(state.clone(), source);

    // ── 7. Bind & Serve ───────────────────────────────────────────────────────
    let app = build_router(state);
    info!(?addr, "🚀 perpsim server starting");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tasks.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Ctrl-C received — shutting down");
    }
}
