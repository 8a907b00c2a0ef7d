//! # state
//!
//! Shared application state: the simulator behind an async mutex, the
//! broadcast channel feeding `/ws/monitor`, and the loaded config.
//!
//! Every task and handler takes the lock for exactly one simulator step, so
//! steps never interleave.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{broadcast, Mutex};

use crate::config::SimConfig;
use crate::engine::Simulator;
use crate::events::MonitorEvent;

/// Buffered events per subscriber before it starts lagging.
const BROADCAST_CAPACITY: usize = 256;

// ─── AppState ─────────────────────────────────────────────────────────────────

pub struct AppState {
    pub sim:          Mutex<Simulator>,
    /// Pre-serialized [`MonitorEvent`] JSON.
    pub broadcast_tx: broadcast::Sender<String>,
    pub config:       SimConfig,
    pub started_at:   DateTime<Utc>,
}

impl AppState {
    pub fn new(config: SimConfig, source: &'static str) -> Self {
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let sim = Simulator::new(&config, source, StdRng::from_os_rng());
        Self {
            sim: Mutex::new(sim),
            broadcast_tx,
            config,
            started_at: Utc::now(),
        }
    }

    /// Sends one event to every connected client. No receivers is not an error.
    pub fn broadcast(&self, event: &MonitorEvent) {
        let _ = self.broadcast_tx.send(event.to_json());
    }

    pub fn publish(&self, events: impl IntoIterator<Item = MonitorEvent>) {
        for event in events {
            self.broadcast(&event);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.broadcast_tx.subscribe()
    }
}

pub type SharedState = Arc<AppState>;

pub fn build_state(config: SimConfig, source: &'static str) -> SharedState {
    Arc::new(AppState::new(config, source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::agent::Activity;

    #[tokio::test]
    async fn published_events_reach_subscribers() {
        let state = build_state(SimConfig::default(), "test");
        let mut rx = state.subscribe();

        state.publish([MonitorEvent::ActionChanged { action: Activity::Trading }]);
        let json = rx.recv().await.unwrap();
        assert!(json.contains("\"ACTION_CHANGED\""));

        // No subscribers left: still fine.
        drop(rx);
        state.broadcast(&MonitorEvent::ActionChanged { action: Activity::Trading });
    }
}
