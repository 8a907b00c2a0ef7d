//! # engine::agent
//!
//! **Autopilot** — the decision loop behind the "AI" persona.
//!
//! ## Cadence
//! | Every      | Does                                                          |
//! |------------|---------------------------------------------------------------|
//! | 4 s        | rotates the current activity label                            |
//! | 15 s       | one of market structure / risk assessment / funding scan      |
//! | 25 s       | 30 % chance: SIGNAL on an unheld symbol, entry 2 s later      |
//! | when flat  | scan + bullish setup → LONG at 5 s, bearish → SHORT at 10 s   |
//!
//! The agent never touches positions itself. [`Agent::step`] returns
//! [`Decision`]s and the simulator applies them.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{Narration, Side};

/// Symbols the agent trades.
pub const TRADING_PAIRS: &[&str] = &["BTC", "ETH", "SOL", "AVAX", "ARB", "LINK", "DOGE", "OP", "INJ", "SUI"];

/// Drawdown ceiling quoted in the risk narration, percent.
pub const MAX_DRAWDOWN_PCT: f64 = 10.0;

const SIGNAL_PROBABILITY: f64 = 0.3;

// ─── Activity ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Activity {
    Analyzing,
    Scanning,
    Monitoring,
    Calculating,
    Trading,
}

impl Activity {
    pub const ALL: [Activity; 5] = [
        Activity::Analyzing,
        Activity::Scanning,
        Activity::Monitoring,
        Activity::Calculating,
        Activity::Trading,
    ];
}

// ─── Inputs / outputs ─────────────────────────────────────────────────────────

/// What the agent may look at on a step.
#[derive(Debug, Clone, Copy)]
pub struct MarketView<'a> {
    pub prices:         &'a HashMap<String, f64>,
    pub held:           &'a [String],
    pub open_positions: usize,
    pub exposure:       f64,
    pub drawdown_pct:   f64,
}

impl MarketView<'_> {
    fn price(&self, symbol: &str) -> Option<f64> {
        self.prices.get(symbol).copied().filter(|p| p.is_finite() && *p > 0.0)
    }

    fn holds(&self, symbol: &str) -> bool {
        self.held.iter().any(|s| s == symbol)
    }

    fn tradable(&self) -> Vec<&'static str> {
        TRADING_PAIRS.iter().copied().filter(|s| self.price(s).is_some()).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Activity(Activity),
    Narrate(Narration),
    /// Open at the current price. Already re-checked against the view.
    Enter { symbol: String, side: Side },
}

#[derive(Debug, Clone, PartialEq)]
enum Job {
    Narrate(Narration),
    Enter { symbol: String, side: Side },
}

#[derive(Debug, Clone, PartialEq)]
struct Scheduled {
    due: DateTime<Utc>,
    job: Job,
}

// ─── Agent ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct AgentCadence {
    pub action:        Duration,
    pub analysis:      Duration,
    pub signal:        Duration,
    pub max_positions: usize,
}

impl Default for AgentCadence {
    fn default() -> Self {
        Self {
            action:        Duration::seconds(4),
            analysis:      Duration::seconds(15),
            signal:        Duration::seconds(25),
            max_positions: 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Agent {
    cadence:          AgentCadence,
    activity:         Activity,
    next_action_at:   Option<DateTime<Utc>>,
    next_analysis_at: Option<DateTime<Utc>>,
    next_signal_at:   Option<DateTime<Utc>>,
    scheduled:        Vec<Scheduled>,
}

impl Agent {
    pub fn new(cadence: AgentCadence) -> Self {
        Self {
            cadence,
            activity:         Activity::Analyzing,
            next_action_at:   None,
            next_analysis_at: None,
            next_signal_at:   None,
            scheduled:        Vec::new(),
        }
    }

    pub fn activity(&self) -> Activity {
        self.activity
    }

    pub fn scheduled_len(&self) -> usize {
        self.scheduled.len()
    }

    /// Runs every timer that is due at `now`. Does nothing until prices exist.
    pub fn step<R: Rng>(&mut self, now: DateTime<Utc>, view: &MarketView<'_>, rng: &mut R) -> Vec<Decision> {
        let mut out = Vec::new();
        if view.prices.is_empty() {
            return out;
        }

        // Timers start counting from the first step that has prices.
        let next_action   = *self.next_action_at.get_or_insert(now + self.cadence.action);
        let next_analysis = *self.next_analysis_at.get_or_insert(now + self.cadence.analysis);
        let next_signal   = *self.next_signal_at.get_or_insert(now + self.cadence.signal);

        if view.open_positions == 0 && self.scheduled.is_empty() {
            self.bootstrap(now, view, rng);
        }

        if now >= next_action {
            if let Some(activity) = Activity::ALL.choose(rng) {
                self.activity = *activity;
                out.push(Decision::Activity(*activity));
            }
            self.next_action_at = Some(now + self.cadence.action);
        }

        if now >= next_analysis {
            if let Some(narration) = self.analysis(view, rng) {
                out.push(Decision::Narrate(narration));
            }
            self.next_analysis_at = Some(now + self.cadence.analysis);
        }

        if now >= next_signal {
            self.signal(now, view, rng, &mut out);
            self.next_signal_at = Some(now + self.cadence.signal);
        }

        self.run_due(now, view, &mut out);
        out
    }

    /// Flat book: stage a scan, a LONG thesis and a SHORT thesis.
    fn bootstrap<R: Rng>(&mut self, now: DateTime<Utc>, view: &MarketView<'_>, rng: &mut R) {
        let available = view.tradable();
        let Some(&long_symbol) = available.choose(rng) else { return };
        let others: Vec<&str> = available.iter().copied().filter(|s| *s != long_symbol).collect();
        let short_symbol = others.choose(rng).copied();

        debug!(long = long_symbol, short = ?short_symbol, "Flat book — staging opening trades");

        let at = |secs| now + Duration::seconds(secs);
        if let Some(price) = view.price(long_symbol) {
            self.schedule(at(1), Job::Narrate(Narration::Scan { symbol: long_symbol.to_string() }));
            self.schedule(
                at(3),
                Job::Narrate(Narration::BullishSetup { symbol: long_symbol.to_string(), support: price * 0.98 }),
            );
            self.schedule(at(5), Job::Enter { symbol: long_symbol.to_string(), side: Side::Long });
        }
        if let Some(symbol) = short_symbol {
            self.schedule(at(8), Job::Narrate(Narration::BearishDivergence { symbol: symbol.to_string() }));
            self.schedule(at(10), Job::Enter { symbol: symbol.to_string(), side: Side::Short });
        }
    }

    fn analysis<R: Rng>(&self, view: &MarketView<'_>, rng: &mut R) -> Option<Narration> {
        let narration = match rng.random_range(0..3) {
            0 => {
                let symbol = *view.tradable().choose(rng)?;
                Narration::MarketStructure {
                    symbol:           symbol.to_string(),
                    price:            view.price(symbol)?,
                    above_ema:        rng.random_bool(0.5),
                    volume_pct:       rng.random_range(80.0..150.0),
                    volatility_index: rng.random_range(20.0..80.0),
                    elevated:         rng.random_bool(0.5),
                }
            }
            1 => Narration::RiskAssessment {
                open_positions:   view.open_positions,
                exposure:         view.exposure,
                drawdown_pct:     view.drawdown_pct,
                max_drawdown_pct: MAX_DRAWDOWN_PCT,
            },
            _ => Narration::FundingScan {
                btc_rate:     rng.random_range(-0.02..0.02),
                eth_rate:     rng.random_range(-0.02..0.02),
                longs_paying: rng.random_bool(0.5),
            },
        };
        Some(narration)
    }

    fn signal<R: Rng>(&mut self, now: DateTime<Utc>, view: &MarketView<'_>, rng: &mut R, out: &mut Vec<Decision>) {
        let pending_entries = self.scheduled.iter().filter(|s| matches!(s.job, Job::Enter { .. })).count();
        if view.open_positions + pending_entries >= self.cadence.max_positions {
            return;
        }
        if !rng.random_bool(SIGNAL_PROBABILITY) {
            return;
        }

        let candidates: Vec<&str> = view
            .tradable()
            .into_iter()
            .filter(|s| !view.holds(s) && !self.entry_pending(s))
            .collect();
        let Some(&symbol) = candidates.choose(rng) else { return };
        let Some(price) = view.price(symbol) else { return };

        let side = if rng.random_bool(0.5) { Side::Long } else { Side::Short };
        let level = match side {
            Side::Long  => price * 0.99,
            Side::Short => price * 1.01,
        };

        out.push(Decision::Narrate(Narration::Breakout {
            symbol: symbol.to_string(),
            side,
            level,
            hours: rng.random_range(1..=3),
            volume_surge_pct: rng.random_range(150.0..300.0),
        }));
        self.schedule(now + Duration::seconds(2), Job::Enter { symbol: symbol.to_string(), side });
    }

    fn run_due(&mut self, now: DateTime<Utc>, view: &MarketView<'_>, out: &mut Vec<Decision>) {
        let (due, waiting): (Vec<Scheduled>, Vec<Scheduled>) =
            self.scheduled.drain(..).partition(|s| s.due <= now);
        self.scheduled = waiting;

        let mut entered: Vec<String> = Vec::new();
        for Scheduled { job, .. } in due {
            match job {
                Job::Narrate(narration) => out.push(Decision::Narrate(narration)),
                Job::Enter { symbol, side } => {
                    let open = view.open_positions + entered.len();
                    if view.price(&symbol).is_none()
                        || view.holds(&symbol)
                        || entered.contains(&symbol)
                        || open >= self.cadence.max_positions
                    {
                        debug!(%symbol, "Scheduled entry dropped at due time");
                        continue;
                    }
                    entered.push(symbol.clone());
                    out.push(Decision::Enter { symbol, side });
                }
            }
        }
    }

    fn schedule(&mut self, due: DateTime<Utc>, job: Job) {
        let idx = self.scheduled.partition_point(|s| s.due <= due);
        self.scheduled.insert(idx, Scheduled { due, job });
    }

    fn entry_pending(&self, symbol: &str) -> bool {
        self.scheduled
            .iter()
            .any(|s| matches!(&s.job, Job::Enter { symbol: pending, .. } if pending == symbol))
    }
}

impl Default for Agent {
    fn default() -> Self {
        Self::new(AgentCadence::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn prices() -> HashMap<String, f64> {
        HashMap::from([
            ("BTC".to_string(), 98_000.0),
            ("ETH".to_string(), 3_400.0),
            ("SOL".to_string(), 180.0),
        ])
    }

    fn view<'a>(prices: &'a HashMap<String, f64>, held: &'a [String]) -> MarketView<'a> {
        MarketView { prices, held, open_positions: held.len(), exposure: 0.0, drawdown_pct: 0.0 }
    }

    fn entries(decisions: &[Decision]) -> Vec<(String, Side)> {
        decisions
            .iter()
            .filter_map(|d| match d {
                Decision::Enter { symbol, side } => Some((symbol.clone(), *side)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn idle_without_prices() {
        let mut agent = Agent::default();
        let empty = HashMap::new();
        let out = agent.step(Utc::now(), &view(&empty, &[]), &mut StdRng::seed_from_u64(1));
        assert!(out.is_empty());
        assert_eq!(agent.scheduled_len(), 0);
    }

    #[test]
    fn flat_book_bootstraps_long_then_short() {
        let mut agent = Agent::default();
        let mut rng = StdRng::seed_from_u64(2);
        let prices = prices();
        let start = Utc::now();

        assert!(entries(&agent.step(start, &view(&prices, &[]), &mut rng)).is_empty());

        let at5 = agent.step(start + Duration::seconds(5), &view(&prices, &[]), &mut rng);
        let longs = entries(&at5);
        assert_eq!(longs.len(), 1);
        assert_eq!(longs[0].1, Side::Long);
        assert!(at5.iter().any(|d| matches!(d, Decision::Narrate(Narration::Scan { .. }))));
        assert!(at5.iter().any(|d| matches!(d, Decision::Narrate(Narration::BullishSetup { .. }))));

        let held = vec![longs[0].0.clone()];
        let at10 = agent.step(start + Duration::seconds(10), &view(&prices, &held), &mut rng);
        let shorts = entries(&at10);
        assert_eq!(shorts.len(), 1);
        assert_eq!(shorts[0].1, Side::Short);
        assert_ne!(shorts[0].0, longs[0].0);
    }

    #[test]
    fn due_entry_rechecks_holdings() {
        let mut agent = Agent::default();
        let mut rng = StdRng::seed_from_u64(3);
        let prices = prices();
        let start = Utc::now();
        agent.step(start, &view(&prices, &[]), &mut rng);

        // Every symbol is already held by the time the entries fall due.
        let held: Vec<String> = prices.keys().cloned().collect();
        let out = agent.step(start + Duration::seconds(11), &view(&prices, &held), &mut rng);
        assert!(entries(&out).is_empty());
        assert_eq!(agent.scheduled_len(), 0);
    }

    #[test]
    fn timers_fire_on_cadence() {
        let mut agent = Agent::default();
        let mut rng = StdRng::seed_from_u64(4);
        let prices = prices();
        let held: Vec<String> = vec!["BTC".into()];
        let start = Utc::now();

        agent.step(start, &view(&prices, &held), &mut rng);
        let out = agent.step(start + Duration::seconds(4), &view(&prices, &held), &mut rng);
        assert!(out.iter().any(|d| matches!(d, Decision::Activity(_))));

        let out = agent.step(start + Duration::seconds(15), &view(&prices, &held), &mut rng);
        assert!(out.iter().any(|d| matches!(
            d,
            Decision::Narrate(
                Narration::MarketStructure { .. }
                    | Narration::RiskAssessment { .. }
                    | Narration::FundingScan { .. }
            )
        )));
    }

    #[test]
    fn signals_respect_position_limit() {
        let mut agent = Agent::default();
        let mut rng = StdRng::seed_from_u64(5);
        let prices = prices();
        let held: Vec<String> = vec!["A".into(), "B".into(), "C".into(), "D".into()];
        let start = Utc::now();

        agent.step(start, &view(&prices, &held), &mut rng);
        for k in 1..=40 {
            let out = agent.step(start + Duration::seconds(25 * k), &view(&prices, &held), &mut rng);
            assert!(!out.iter().any(|d| matches!(d, Decision::Narrate(Narration::Breakout { .. }))));
            assert!(entries(&out).is_empty());
        }
    }

    #[test]
    fn signals_eventually_schedule_entries() {
        let mut agent = Agent::default();
        let mut rng = StdRng::seed_from_u64(6);
        let prices = prices();
        let held: Vec<String> = vec!["BTC".into()];
        let start = Utc::now();
        agent.step(start, &view(&prices, &held), &mut rng);

        let mut opened = Vec::new();
        for k in 1..=200 {
            let now = start + Duration::seconds(25 * k);
            agent.step(now, &view(&prices, &held), &mut rng);
            opened.extend(entries(&agent.step(now + Duration::seconds(2), &view(&prices, &held), &mut rng)));
        }
        assert!(!opened.is_empty());
        assert!(opened.iter().all(|(s, _)| s != "BTC"));
    }
}
