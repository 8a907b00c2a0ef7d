//! # engine::simulator
//!
//! **Simulator** — owns every engine component and is the only thing that
//! mutates them. Each public method is one run-to-completion step and returns
//! the [`MonitorEvent`]s it produced; the caller decides where they go.
//!
//! ```text
//!  PriceBook ──prices──▶ PositionEngine ──closed──▶ StatsAggregator
//!                              │                        │
//!                              └──────────┬─────────────┘
//!                                         ▼
//!                          TradeHistory · ThoughtLog · EquityCurve
//!                                         │
//!                                         ▼
//!                                 Snapshot / MonitorEvent
//! ```

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rand::rngs::StdRng;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SimConfig;
use crate::engine::agent::{Activity, Agent, Decision, MarketView, TRADING_PAIRS};
use crate::engine::clock::{epoch, time_slot, SeededRandom, DEFAULT_SLOT_MS};
use crate::engine::feed::{FeedStatus, PriceBook};
use crate::engine::history::{EquityCurve, TradeHistory};
use crate::engine::positions::{PositionEngine, SizingPolicy};
use crate::engine::seed;
use crate::engine::stats::StatsAggregator;
use crate::engine::thoughts::ThoughtLog;
use crate::error::SimError;
use crate::events::MonitorEvent;
use crate::format::format_time_ago;
use crate::models::position::round2;
use crate::models::{
    ClosedTrade, CloseReason, EquityPoint, Narration, Position, PriceQuote, Side, ThoughtEntry,
    ThoughtView, TradeSnapshot, TradingStats,
};

const SEED_EQUITY_POINTS: usize = 50;

// ─── Snapshot ─────────────────────────────────────────────────────────────────

/// Immutable view of the whole simulation at one instant.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub as_of:          DateTime<Utc>,
    pub positions:      Vec<Position>,
    /// Newest first.
    pub closed_trades:  Vec<ClosedTrade>,
    pub stats:          TradingStats,
    /// Oldest first, rendered.
    pub thoughts:       Vec<ThoughtView>,
    pub current_action: Activity,
    pub is_ai_active:   bool,
    pub equity_curve:   Vec<EquityPoint>,
    pub unrealized_pnl: f64,
    pub exposure:       f64,
    pub feed:           FeedStatus,
}

// ─── Simulator ────────────────────────────────────────────────────────────────

pub struct Simulator {
    book:       PriceBook,
    engine:     PositionEngine,
    history:    TradeHistory,
    stats:      StatsAggregator,
    thoughts:   ThoughtLog,
    equity:     EquityCurve,
    agent:      Agent,
    policy:     SizingPolicy,
    volatility: f64,

    slot_ms:     i64,
    seed_trades: usize,
    seeded:      bool,
    day:         Option<NaiveDate>,
    rng:         StdRng,
}

impl Simulator {
    pub fn new(config: &SimConfig, source: &'static str, rng: StdRng) -> Self {
        Self {
            book:        PriceBook::new(source),
            engine:      PositionEngine::new(),
            history:     TradeHistory::new(config.trade_history_cap),
            stats:       StatsAggregator::new(config.starting_equity),
            thoughts:    ThoughtLog::new(config.thought_log_cap),
            equity:      EquityCurve::new(config.equity_history_cap),
            agent:       Agent::new(config.cadence()),
            policy:      SizingPolicy::default(),
            volatility:  config.mark_volatility,
            slot_ms:     DEFAULT_SLOT_MS,
            seed_trades: config.seed_trades,
            seeded:      false,
            day:         None,
            rng,
        }
    }

    // ─── Seeding ──────────────────────────────────────────────────────────────

    /// Builds the replay-safe backstory for the slot containing `now`:
    /// historical trades, the opening narration and the initial equity curve.
    /// Runs once; later calls return `false`.
    pub fn seed_history(&mut self, now: DateTime<Utc>) -> bool {
        if self.seeded {
            return false;
        }
        self.seeded = true;

        let slot = time_slot(now, self.slot_ms);
        let slot_start = epoch() + Duration::milliseconds(slot.saturating_mul(self.slot_ms));
        let mut rng = SeededRandom::new(slot);

        let trades = seed::historical_trades(&mut rng, slot_start, self.seed_trades);
        for trade in trades {
            self.stats.record(&trade);
            self.history.push(trade);
        }

        if let Some(symbol) = rng.pick(TRADING_PAIRS) {
            let entry = ThoughtEntry::new(
                rng.next_id(),
                slot_start,
                Narration::Scan { symbol: symbol.to_string() },
                None,
            );
            self.thoughts.push(entry);
        }

        let curve = seed::equity_history(
            &mut rng,
            slot_start,
            self.stats.equity(),
            SEED_EQUITY_POINTS,
            Duration::minutes(1),
        );
        self.equity.extend(curve);
        self.day = Some(now.date_naive());

        info!(
            slot,
            trades = self.history.len(),
            equity = self.stats.equity(),
            "🌱 Seeded session history"
        );
        true
    }

    // ─── Price feed ───────────────────────────────────────────────────────────

    pub fn apply_prices(
        &mut self,
        quotes: std::collections::HashMap<String, PriceQuote>,
        now: DateTime<Utc>,
    ) -> Vec<MonitorEvent> {
        self.book.apply(quotes, now);
        vec![MonitorEvent::FeedUpdated { feed: self.book.status() }]
    }

    /// Records a failed refresh. Raises one ALERT per failure streak.
    pub fn price_refresh_failed(&mut self, err: &SimError, now: DateTime<Utc>) -> Vec<MonitorEvent> {
        let message = match self.book.status().last_refresh {
            Some(at) => format!("{err}; last good prices {}", format_time_ago((now - at).num_seconds())),
            None => err.to_string(),
        };
        let mut events = Vec::new();
        if self.book.fail(err) {
            let narration = Narration::FeedAlert { message };
            events.push(self.push_thought(narration, None, now));
        }
        events.push(MonitorEvent::FeedUpdated { feed: self.book.status() });
        events
    }

    // ─── Mark tick ────────────────────────────────────────────────────────────

    /// Phase one (mark + decide) then phase two (settle). Suppressed until
    /// the first price set has arrived.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<MonitorEvent> {
        let mut events = Vec::new();
        if !self.book.is_ready() {
            return events;
        }
        self.roll_day(now);

        let prices = self.book.prices();
        let queued = self.engine.mark_to_market(&prices, self.volatility, &mut self.rng);
        if !queued.is_empty() {
            debug!(count = queued.len(), "Trigger closes queued");
        }
        let closed = self.engine.settle(now);

        if !self.engine.is_empty() {
            events.push(MonitorEvent::PositionsMarked { positions: self.engine.positions().to_vec() });
        }
        for trade in closed {
            self.record_close(trade, now, &mut events);
        }
        events
    }

    /// Resets today's P&L when the UTC date changes. Returns `true` on a roll.
    pub fn roll_day(&mut self, now: DateTime<Utc>) -> bool {
        let today = now.date_naive();
        match self.day {
            Some(day) if day == today => false,
            Some(_) => {
                self.stats.reset_today();
                self.day = Some(today);
                info!(%today, "📅 New trading day — today's P&L reset");
                true
            }
            None => {
                self.day = Some(today);
                false
            }
        }
    }

    // ─── Agent ────────────────────────────────────────────────────────────────

    pub fn agent_step(&mut self, now: DateTime<Utc>) -> Vec<MonitorEvent> {
        let prices = self.book.prices();
        let held: Vec<String> = self.engine.positions().iter().map(|p| p.symbol.clone()).collect();
        let view = MarketView {
            prices:         &prices,
            held:           &held,
            open_positions: self.engine.len(),
            exposure:       self.engine.exposure(),
            drawdown_pct:   round2(self.stats.current_drawdown(self.engine.unrealized_pnl())),
        };
        let decisions = self.agent.step(now, &view, &mut self.rng);

        let mut events = Vec::new();
        for decision in decisions {
            match decision {
                Decision::Activity(action) => events.push(MonitorEvent::ActionChanged { action }),
                Decision::Narrate(narration) => events.push(self.push_thought(narration, None, now)),
                Decision::Enter { symbol, side } => match self.open(&symbol, side, now) {
                    Ok((_, opened)) => events.extend(opened),
                    Err(e) => warn!(%symbol, error = %e, "Agent entry rejected"),
                },
            }
        }
        events
    }

    // ─── Open / close ─────────────────────────────────────────────────────────

    /// Opens at the book price with a sampled size, emitting EXECUTE.
    pub fn open(
        &mut self,
        symbol: &str,
        side: Side,
        now: DateTime<Utc>,
    ) -> Result<(Position, Vec<MonitorEvent>), SimError> {
        let price = self
            .book
            .price(symbol)
            .ok_or_else(|| SimError::PriceUnavailable(symbol.to_string()))?;
        let opened = self.engine.open_position(symbol, side, price, &self.policy, now, &mut self.rng)?;
        let position = opened.position;

        let narration = Narration::Execute {
            asset:       position.asset.clone(),
            symbol:      position.symbol.clone(),
            side,
            entry:       position.entry_price,
            size:        position.size,
            leverage:    position.leverage,
            stop_loss:   position.stop_loss.unwrap_or(position.liquidation_price),
            take_profit: position.take_profit.unwrap_or(position.entry_price),
            sl_pct:      opened.stop_pct,
            tp_pct:      opened.target_pct,
        };

        let mut events = vec![MonitorEvent::PositionOpened { position: Box::new(position.clone()) }];
        events.push(self.push_thought(narration, Some(TradeSnapshot::opened(&position)), now));
        Ok((position, events))
    }

    /// Closes at the current mark with reason MANUAL.
    pub fn close_manual(&mut self, id: Uuid, now: DateTime<Utc>) -> Result<(ClosedTrade, Vec<MonitorEvent>), SimError> {
        let trade = self
            .engine
            .close_at_mark(id, CloseReason::Manual, now)
            .ok_or(SimError::NotFound(id))?;
        let mut events = Vec::new();
        self.record_close(trade.clone(), now, &mut events);
        Ok((trade, events))
    }

    fn record_close(&mut self, trade: ClosedTrade, now: DateTime<Utc>, events: &mut Vec<MonitorEvent>) {
        self.stats.record(&trade);

        let narration = Narration::Close {
            asset:         trade.asset.clone(),
            exit:          trade.exit_price,
            duration_secs: trade.duration_secs,
            reason:        trade.reason,
            pnl:           trade.pnl,
            pnl_percent:   trade.pnl_percent,
        };
        let thought = self.push_thought(narration, Some(TradeSnapshot::closed(&trade)), now);

        events.push(MonitorEvent::PositionClosed { trade: Box::new(trade.clone()) });
        events.push(thought);
        events.push(MonitorEvent::StatsUpdated { stats: Box::new(self.stats.snapshot(now)) });

        self.history.push(trade);
    }

    fn push_thought(&mut self, narration: Narration, trade: Option<TradeSnapshot>, now: DateTime<Utc>) -> MonitorEvent {
        let entry = ThoughtEntry::new(Uuid::new_v4(), now, narration, trade);
        let view = ThoughtView::from(&entry);
        self.thoughts.push(entry);
        MonitorEvent::Thought { thought: Box::new(view) }
    }

    // ─── Equity ───────────────────────────────────────────────────────────────

    /// Appends `equity + unrealized` to the curve.
    pub fn sample_equity(&mut self, now: DateTime<Utc>) -> MonitorEvent {
        let point = EquityPoint {
            timestamp: now,
            value:     round2(self.stats.equity() + self.engine.unrealized_pnl()),
        };
        self.equity.push(point);
        MonitorEvent::EquitySampled { point }
    }

    // ─── Reads ────────────────────────────────────────────────────────────────

    pub fn snapshot(&mut self, now: DateTime<Utc>) -> Snapshot {
        Snapshot {
            as_of:          now,
            positions:      self.engine.positions().to_vec(),
            closed_trades:  self.history.recent(),
            stats:          self.stats.snapshot(now),
            thoughts:       self.thoughts.views(),
            current_action: self.agent.activity(),
            is_ai_active:   true,
            equity_curve:   self.equity.points(),
            unrealized_pnl: round2(self.engine.unrealized_pnl()),
            exposure:       self.engine.exposure(),
            feed:           self.book.status(),
        }
    }

    pub fn positions(&self) -> &[Position] {
        self.engine.positions()
    }

    pub fn recent_trades(&self) -> Vec<ClosedTrade> {
        self.history.recent()
    }

    pub fn stats(&mut self, now: DateTime<Utc>) -> TradingStats {
        self.stats.snapshot(now)
    }

    pub fn thoughts(&self) -> Vec<ThoughtView> {
        self.thoughts.views()
    }

    pub fn equity_curve(&self) -> Vec<EquityPoint> {
        self.equity.points()
    }

    pub fn feed_status(&self) -> FeedStatus {
        self.book.status()
    }

    pub fn is_ready(&self) -> bool {
        self.book.is_ready()
    }
}
