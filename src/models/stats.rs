//! # models::stats
//!
//! Aggregate figures shown on the performance panel and the equity sparkline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Portfolio metrics derived from closed-trade history. No identity of its own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradingStats {
    pub total_pnl: f64,
    pub today_pnl: f64,
    pub total_trades: u64,
    /// Percent of trades closed with `pnl >= 0`.
    pub win_rate: f64,
    pub current_streak: u32,
    /// Longest win streak seen.
    pub win_streak: u32,
    pub best_trade: f64,
    pub worst_trade: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub sharpe_ratio: f64,
    /// Percent peak-to-trough of cumulative equity.
    pub max_drawdown: f64,
    pub profit_factor: f64,
    pub volume_24h: f64,
}

/// One sample of the equity curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}
