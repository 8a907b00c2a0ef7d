//! # engine::positions
//!
//! **Position Engine** — owns every open position.
//!
//! ## Tick (two phases)
//! ```text
//! 1. mark_to_market  → new marks + P&L for every position with a price
//!                    → trigger decisions over the marked set (pure)
//!                    → decisions queued, nothing removed yet
//! 2. settle          → drain the queue, close each id at most once
//! ```
//!
//! Closing is the only transition out of the open set. A second close for an
//! id that is already gone is a silent no-op.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use rand::seq::IndexedRandom;
use rand::Rng;
use tracing::{debug, info};
use uuid::Uuid;

use crate::engine::feed::perturb;
use crate::error::SimError;
use crate::models::position::{liquidation_price, ClosedTrade, CloseReason, Position, Side};

// ─── Sizing ───────────────────────────────────────────────────────────────────

/// Ranges the engine samples from when it opens a position on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct SizingPolicy {
    pub leverages:  Vec<u32>,
    /// USD notional, `[min, max)`.
    pub notional:   (f64, f64),
    /// Stop-loss distance as a fraction of entry.
    pub stop_pct:   (f64, f64),
    /// Take-profit distance as a fraction of entry.
    pub target_pct: (f64, f64),
}

impl Default for SizingPolicy {
    fn default() -> Self {
        Self {
            leverages:  vec![3, 5, 10, 15, 20],
            notional:   (500.0, 5000.0),
            stop_pct:   (0.01, 0.03),
            target_pct: (0.02, 0.06),
        }
    }
}

/// Fully specified order, used for seeded history and explicit opens.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderPlan {
    pub symbol:      String,
    pub side:        Side,
    pub entry_price: f64,
    pub size:        f64,
    pub leverage:    u32,
    pub stop_loss:   Option<f64>,
    pub take_profit: Option<f64>,
}

/// A freshly opened position plus the offsets it was sized with.
#[derive(Debug, Clone, PartialEq)]
pub struct Opened {
    pub position: Position,
    pub stop_pct: f64,
    pub target_pct: f64,
}

/// A decided close waiting for the settle phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CloseOrder {
    pub position_id: Uuid,
    pub reason:      CloseReason,
    pub exit_price:  f64,
}

fn valid_price(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

// ─── Trigger evaluation ───────────────────────────────────────────────────────

/// Decides whether the current mark closes the position.
///
/// Stop-loss is checked first so it wins when both levels are crossed. The
/// exit is clamped to the trigger level, never the overshoot mark. A position
/// without a stop-loss is closed at its liquidation price.
pub fn evaluate_trigger(position: &Position) -> Option<CloseOrder> {
    let mark = position.mark_price;
    let order = |reason, exit_price| CloseOrder { position_id: position.id, reason, exit_price };

    let (stop_hit, target_hit, liquidated) = match position.side {
        Side::Long => (
            position.stop_loss.is_some_and(|sl| mark <= sl),
            position.take_profit.is_some_and(|tp| mark >= tp),
            mark <= position.liquidation_price,
        ),
        Side::Short => (
            position.stop_loss.is_some_and(|sl| mark >= sl),
            position.take_profit.is_some_and(|tp| mark <= tp),
            mark >= position.liquidation_price,
        ),
    };

    match (position.stop_loss, position.take_profit) {
        (Some(sl), _) if stop_hit => Some(order(CloseReason::StopLoss, sl)),
        (None, _) if liquidated => Some(order(CloseReason::StopLoss, position.liquidation_price)),
        (_, Some(tp)) if target_hit => Some(order(CloseReason::TakeProfit, tp)),
        _ => None,
    }
}

// ─── PositionEngine ───────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct PositionEngine {
    /// Open positions in open order.
    positions: Vec<Position>,
    /// Decided closes not yet applied.
    pending:   VecDeque<CloseOrder>,
}

impl PositionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Open ─────────────────────────────────────────────────────────────────

    /// Opens a position sized from `policy`.
    pub fn open_position<R: Rng>(
        &mut self,
        symbol: &str,
        side: Side,
        reference_price: f64,
        policy: &SizingPolicy,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<Opened, SimError> {
        if !valid_price(reference_price) {
            return Err(SimError::InvalidPrice { symbol: symbol.to_string(), price: reference_price });
        }

        let leverage = *policy
            .leverages
            .choose(rng)
            .ok_or_else(|| SimError::InvalidPlan("sizing policy has no leverage options".into()))?;
        let size_usd   = sample(rng, policy.notional);
        let stop_pct   = sample(rng, policy.stop_pct);
        let target_pct = sample(rng, policy.target_pct);

        let (stop_loss, take_profit) = match side {
            Side::Long  => (reference_price * (1.0 - stop_pct), reference_price * (1.0 + target_pct)),
            Side::Short => (reference_price * (1.0 + stop_pct), reference_price * (1.0 - target_pct)),
        };

        let plan = OrderPlan {
            symbol: symbol.to_string(),
            side,
            entry_price: reference_price,
            size: size_usd / reference_price,
            leverage,
            stop_loss: Some(stop_loss),
            take_profit: Some(take_profit),
        };
        let position = self.open_planned(plan, now)?;

        Ok(Opened { position, stop_pct, target_pct })
    }

    /// Opens exactly the given plan after checking its preconditions.
    pub fn open_planned(&mut self, plan: OrderPlan, now: DateTime<Utc>) -> Result<Position, SimError> {
        let position = build_position(plan, Uuid::new_v4(), now)?;

        info!(
            id       = %position.id,
            symbol   = %position.symbol,
            side     = %position.side,
            entry    = position.entry_price,
            size     = position.size,
            leverage = position.leverage,
            "📈 Position opened"
        );

        self.positions.push(position.clone());
        Ok(position)
    }

    // ─── Phase 1: mark ────────────────────────────────────────────────────────

    /// Marks every position with a usable price and queues the closes the
    /// new marks trigger. Returns the orders queued by this pass.
    pub fn mark_to_market<R: Rng>(
        &mut self,
        prices: &HashMap<String, f64>,
        volatility: f64,
        rng: &mut R,
    ) -> Vec<CloseOrder> {
        for position in self.positions.iter_mut() {
            let Some(&price) = prices.get(&position.symbol) else {
                debug!(symbol = %position.symbol, "No price this tick — mark skipped");
                continue;
            };
            if !valid_price(price) {
                continue;
            }
            let mark = perturb(rng, price, volatility);
            position.mark(mark);
        }

        let decided: Vec<CloseOrder> = self.positions.iter().filter_map(evaluate_trigger).collect();
        decided.into_iter().filter(|order| self.schedule(*order)).collect()
    }

    /// Queues a close. Returns `false` when an order for this id is already
    /// waiting, so the first decision wins.
    pub fn schedule(&mut self, order: CloseOrder) -> bool {
        if self.pending.iter().any(|p| p.position_id == order.position_id) {
            return false;
        }
        debug!(id = %order.position_id, reason = ?order.reason, exit = order.exit_price, "Close scheduled");
        self.pending.push_back(order);
        true
    }

    // ─── Phase 2: settle ──────────────────────────────────────────────────────

    /// Applies every queued close in order.
    pub fn settle(&mut self, now: DateTime<Utc>) -> Vec<ClosedTrade> {
        let mut seen = HashSet::new();
        let mut closed = Vec::with_capacity(self.pending.len());
        while let Some(order) = self.pending.pop_front() {
            if !seen.insert(order.position_id) {
                continue;
            }
            if let Some(trade) = self.close_position(order.position_id, order.reason, order.exit_price, now) {
                closed.push(trade);
            }
        }
        closed
    }

    /// Removes the position and returns its closed record. Unknown ids
    /// (including ones closed a moment ago) return `None`.
    pub fn close_position(
        &mut self,
        id: Uuid,
        reason: CloseReason,
        exit_price: f64,
        now: DateTime<Utc>,
    ) -> Option<ClosedTrade> {
        let idx = self.positions.iter().position(|p| p.id == id)?;
        let position = self.positions.remove(idx);
        let exit = if valid_price(exit_price) { exit_price } else { position.mark_price };
        let trade = position.into_closed(reason, exit, now);

        info!(
            id     = %trade.id,
            symbol = %trade.symbol,
            reason = ?trade.reason,
            exit   = trade.exit_price,
            pnl    = trade.pnl,
            "📉 Position closed"
        );
        Some(trade)
    }

    /// Closes at the current mark.
    pub fn close_at_mark(&mut self, id: Uuid, reason: CloseReason, now: DateTime<Utc>) -> Option<ClosedTrade> {
        let mark = self.get(id)?.mark_price;
        self.close_position(id, reason, mark, now)
    }

    // ─── Queries ──────────────────────────────────────────────────────────────

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn get(&self, id: Uuid) -> Option<&Position> {
        self.positions.iter().find(|p| p.id == id)
    }

    pub fn holds(&self, symbol: &str) -> bool {
        self.positions.iter().any(|p| p.symbol == symbol)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Σ notional × leverage over open positions.
    pub fn exposure(&self) -> f64 {
        self.positions.iter().map(Position::exposure).sum()
    }

    pub fn unrealized_pnl(&self) -> f64 {
        self.positions.iter().map(|p| p.pnl).sum()
    }
}

fn sample<R: Rng>(rng: &mut R, (min, max): (f64, f64)) -> f64 {
    if max > min { rng.random_range(min..max) } else { min }
}

/// Validates a plan and derives the remaining position fields.
pub(crate) fn build_position(plan: OrderPlan, id: Uuid, now: DateTime<Utc>) -> Result<Position, SimError> {
    let OrderPlan { symbol, side, entry_price, size, leverage, stop_loss, take_profit } = plan;

    if !valid_price(entry_price) {
        return Err(SimError::InvalidPrice { symbol, price: entry_price });
    }
    if !(size.is_finite() && size > 0.0) {
        return Err(SimError::InvalidPlan(format!("size must be positive, got {size}")));
    }
    if leverage == 0 {
        return Err(SimError::InvalidPlan("leverage must be at least 1".into()));
    }

    let liquidation = liquidation_price(side, entry_price, leverage);

    if let Some(sl) = stop_loss {
        let ok = match side {
            Side::Long  => sl < entry_price && sl > liquidation,
            Side::Short => sl > entry_price && sl < liquidation,
        };
        if !ok {
            return Err(SimError::InvalidPlan(format!(
                "stop loss {sl} must sit between entry {entry_price} and liquidation {liquidation} for {side}"
            )));
        }
    }
    if let Some(tp) = take_profit {
        let ok = match side {
            Side::Long  => tp > entry_price,
            Side::Short => tp < entry_price,
        };
        if !ok {
            return Err(SimError::InvalidPlan(format!(
                "take profit {tp} is on the wrong side of entry {entry_price} for {side}"
            )));
        }
    }

    Ok(Position {
        id,
        asset: format!("{symbol}-PERP"),
        symbol,
        side,
        size,
        size_usd: size * entry_price,
        leverage,
        entry_price,
        mark_price: entry_price,
        stop_loss,
        take_profit,
        liquidation_price: liquidation,
        open_time: now,
        pnl: 0.0,
        pnl_percent: 0.0,
    })
}
