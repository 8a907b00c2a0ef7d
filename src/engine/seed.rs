//! # engine::seed
//!
//! Replay-safe history for a fresh session. Everything here draws from a
//! [`SeededRandom`], so two processes started in the same time slot build the
//! same closed trades and the same equity curve.

use chrono::{DateTime, Duration, Utc};

use crate::engine::agent::TRADING_PAIRS;
use crate::engine::clock::SeededRandom;
use crate::engine::feed::reference_price;
use crate::engine::positions::{build_position, OrderPlan, SizingPolicy};
use crate::models::position::round2;
use crate::models::{ClosedTrade, CloseReason, EquityPoint, Side};

const WIN_PROBABILITY: f64 = 0.64;

/// `count` closed trades, oldest first, the last one closing at `until`.
pub fn historical_trades(rng: &mut SeededRandom, until: DateTime<Utc>, count: usize) -> Vec<ClosedTrade> {
    let gaps: Vec<i64> = (0..count).map(|_| rng.between(240.0, 1_200.0) as i64).collect();
    let mut close_time = until - Duration::seconds(gaps.iter().skip(1).sum());

    let policy = SizingPolicy::default();
    let mut trades = Vec::with_capacity(count);
    for (i, gap) in gaps.iter().enumerate() {
        if i > 0 {
            close_time += Duration::seconds(*gap);
        }
        if let Some(trade) = historical_trade(rng, &policy, close_time) {
            trades.push(trade);
        }
    }
    trades
}

fn historical_trade(
    rng: &mut SeededRandom,
    policy: &SizingPolicy,
    close_time: DateTime<Utc>,
) -> Option<ClosedTrade> {
    let symbol     = *rng.pick(TRADING_PAIRS)?;
    let base       = reference_price(symbol)?;
    let side       = if rng.chance(0.5) { Side::Long } else { Side::Short };
    let leverage   = *rng.pick(&policy.leverages)?;
    let size_usd   = rng.between(policy.notional.0, policy.notional.1);
    let stop_pct   = rng.between(policy.stop_pct.0, policy.stop_pct.1);
    let target_pct = rng.between(policy.target_pct.0, policy.target_pct.1);
    let entry      = base * rng.between(0.97, 1.03);
    let held       = Duration::seconds(rng.between(180.0, 2_700.0) as i64);

    let (stop_loss, take_profit) = match side {
        Side::Long  => (entry * (1.0 - stop_pct), entry * (1.0 + target_pct)),
        Side::Short => (entry * (1.0 + stop_pct), entry * (1.0 - target_pct)),
    };
    let plan = OrderPlan {
        symbol: symbol.to_string(),
        side,
        entry_price: entry,
        size: size_usd / entry,
        leverage,
        stop_loss: Some(stop_loss),
        take_profit: Some(take_profit),
    };
    let position = build_position(plan, rng.next_id(), close_time - held).ok()?;

    // Exits sit exactly on the level that fired.
    let (reason, exit) = if rng.chance(WIN_PROBABILITY) {
        (CloseReason::TakeProfit, position.take_profit?)
    } else {
        (CloseReason::StopLoss, position.stop_loss?)
    };
    Some(position.into_closed(reason, exit, close_time))
}

/// `points` samples spaced `spacing` apart ending at `until`, ramping up to
/// roughly `equity` with seeded noise.
pub fn equity_history(
    rng: &mut SeededRandom,
    until: DateTime<Utc>,
    equity: f64,
    points: usize,
    spacing: Duration,
) -> Vec<EquityPoint> {
    let last = points.saturating_sub(1);
    (0..points)
        .map(|i| {
            let progress = if last > 0 { i as f64 / last as f64 } else { 1.0 };
            let target = equity * (0.4 + progress * 0.6);
            let noise = (rng.next_f64() - 0.45) * equity * 0.08;
            EquityPoint {
                timestamp: until - spacing * (last - i) as i32,
                value:     round2((target + noise).max(equity * 0.2)),
            }
        })
        .collect()
}
