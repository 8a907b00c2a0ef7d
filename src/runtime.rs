//! # runtime
//!
//! The periodic tasks that drive the simulator.
//!
//! | Task          | Period (default) | Step                                    |
//! |---------------|------------------|-----------------------------------------|
//! | price refresh | 30 s             | fetch (no lock held) → apply / fail     |
//! | mark tick     | 1500 ms          | day roll → mark → settle                |
//! | agent         | 1 s              | timers, signals, due entries            |
//! | equity        | 5 s              | sample `equity + unrealized`            |
//!
//! All four live in one [`TaskSet`] and are aborted together.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinSet;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::engine::feed::PriceSource;
use crate::state::SharedState;

pub struct TaskSet {
    tasks: JoinSet<()>,
}

impl TaskSet {
    /// Spawns every simulation task against `state`.
    pub fn spawn(state: SharedState, source: PriceSource) -> Self {
        let mut tasks = JoinSet::new();
        let config = &state.config;

        tasks.spawn(price_refresh(state.clone(), source, config.price_refresh));

        tasks.spawn(every(config.mark_tick, state.clone(), |state| async move {
            let events = state.sim.lock().await.tick(Utc::now());
            state.publish(events);
        }));

        tasks.spawn(every(config.agent_tick, state.clone(), |state| async move {
            let events = state.sim.lock().await.agent_step(Utc::now());
            state.publish(events);
        }));

        tasks.spawn(every(config.equity_sample, state.clone(), |state| async move {
            let event = state.sim.lock().await.sample_equity(Utc::now());
            state.broadcast(&event);
        }));

        info!(tasks = tasks.len(), "⚙️ Simulation tasks started");
        Self { tasks }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Aborts every task and waits for them to finish unwinding.
    pub async fn shutdown(mut self) {
        self.tasks.abort_all();
        while self.tasks.join_next().await.is_some() {}
        info!("🛑 Simulation tasks stopped");
    }
}

async fn every<F, Fut>(period: Duration, state: SharedState, step: F)
where
    F: Fn(SharedState) -> Fut,
    Fut: Future<Output = ()>,
{
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        step(state.clone()).await;
    }
}

/// Fetches outside the lock so a slow HTTP call never stalls a mark tick.
async fn price_refresh(state: SharedState, mut source: PriceSource, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let fetched = source.fetch(Utc::now()).await;

        let events = {
            let mut sim = state.sim.lock().await;
            match fetched {
                Ok(quotes) => {
                    debug!(source = source.name(), count = quotes.len(), "Prices refreshed");
                    sim.apply_prices(quotes, Utc::now())
                }
                Err(err) => sim.price_refresh_failed(&err, Utc::now()),
            }
        };
        state.publish(events);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PriceSourceKind, SimConfig};
    use crate::engine::feed::SimulatedMarket;
    use crate::state::build_state;

    #[tokio::test]
    async fn tasks_drive_the_simulator_and_stop_together() {
        let config = SimConfig {
            price_source:  PriceSourceKind::Simulated,
            price_refresh: Duration::from_millis(20),
            mark_tick:     Duration::from_millis(10),
            agent_tick:    Duration::from_millis(10),
            equity_sample: Duration::from_millis(10),
            ..SimConfig::default()
        };
        let state = build_state(config, "simulated");
        let tasks = TaskSet::spawn(state.clone(), PriceSource::Simulated(SimulatedMarket::with_default_universe()));
        assert_eq!(tasks.len(), 4);

        tokio::time::sleep(Duration::from_millis(120)).await;
        tasks.shutdown().await;

        let sim = state.sim.lock().await;
        assert!(sim.is_ready());
        assert!(!sim.equity_curve().is_empty());
    }
}
