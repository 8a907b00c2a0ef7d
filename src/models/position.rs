//! # models::position
//!
//! Structs for **open positions** and the immutable **closed-trade** record.
//!
//! ## Why separate?
//! `Position`    = live state, mutated on every mark tick
//! `ClosedTrade` = frozen snapshot taken at close, never mutated again

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Side ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// Signed price move in the position's favour.
    #[inline]
    pub fn price_diff(self, entry: f64, price: f64) -> f64 {
        match self {
            Side::Long  => price - entry,
            Side::Short => entry - price,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Side::Long  => "LONG",
            Side::Short => "SHORT",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ─── CloseReason ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloseReason {
    TakeProfit,
    StopLoss,
    Manual,
    Signal,
}

impl CloseReason {
    pub fn describe(self) -> &'static str {
        match self {
            CloseReason::TakeProfit => "Take profit triggered",
            CloseReason::StopLoss   => "Stop loss triggered",
            CloseReason::Manual     => "Manual close",
            CloseReason::Signal     => "Signal reversal detected",
        }
    }
}

// ─── P&L math ─────────────────────────────────────────────────────────────────

/// Rounds to cents, the precision every displayed P&L figure carries.
#[inline]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `(pnl, pnl_percent)` for a leveraged move from `entry` to `price`,
/// both rounded to 2 decimal places.
pub fn leveraged_pnl(side: Side, entry: f64, price: f64, size: f64, leverage: u32) -> (f64, f64) {
    let diff = side.price_diff(entry, price);
    let lev  = f64::from(leverage);
    let pnl         = diff * size * lev;
    let pnl_percent = diff / entry * 100.0 * lev;
    (round2(pnl), round2(pnl_percent))
}

/// Price at which the margin is considered wiped out.
/// Moves further from entry as leverage decreases.
pub fn liquidation_price(side: Side, entry: f64, leverage: u32) -> f64 {
    let buffer = 0.9 / f64::from(leverage);
    match side {
        Side::Long  => entry * (1.0 - buffer),
        Side::Short => entry * (1.0 + buffer),
    }
}

// ─── Position ─────────────────────────────────────────────────────────────────

/// An open perpetual position owned by the position engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: Uuid,
    /// Base asset ticker, e.g. `"BTC"`.
    pub symbol: String,
    /// Display name, e.g. `"BTC-PERP"`.
    pub asset: String,
    pub side: Side,
    /// Quantity of the underlying asset.
    pub size: f64,
    /// USD notional sampled at open.
    pub size_usd: f64,
    pub leverage: u32,
    pub entry_price: f64,
    pub mark_price: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub liquidation_price: f64,
    pub open_time: DateTime<Utc>,
    pub pnl: f64,
    pub pnl_percent: f64,
}

impl Position {
    /// Sets a new mark and re-derives the P&L fields from it.
    pub fn mark(&mut self, mark_price: f64) {
        let (pnl, pnl_percent) =
            leveraged_pnl(self.side, self.entry_price, mark_price, self.size, self.leverage);
        self.mark_price  = mark_price;
        self.pnl         = pnl;
        self.pnl_percent = pnl_percent;
    }

    /// Notional times leverage.
    #[inline]
    pub fn exposure(&self) -> f64 {
        self.size_usd * f64::from(self.leverage)
    }

    pub fn size_display(&self) -> String {
        format!("{:.4} {}", self.size, self.symbol)
    }

    /// Converts the position into its closed record at `exit_price`.
    /// P&L comes from the exit price, not the last mark, so clamped
    /// trigger exits are honoured.
    pub fn into_closed(self, reason: CloseReason, exit_price: f64, close_time: DateTime<Utc>) -> ClosedTrade {
        let (pnl, pnl_percent) =
            leveraged_pnl(self.side, self.entry_price, exit_price, self.size, self.leverage);
        ClosedTrade {
            id:          self.id,
            symbol:      self.symbol,
            asset:       self.asset,
            side:        self.side,
            size:        self.size,
            size_usd:    self.size_usd,
            leverage:    self.leverage,
            entry_price: self.entry_price,
            exit_price,
            pnl,
            pnl_percent,
            open_time:   self.open_time,
            close_time,
            duration_secs: (close_time - self.open_time).num_seconds().max(0),
            reason,
        }
    }
}

// ─── ClosedTrade ──────────────────────────────────────────────────────────────

/// Immutable record of a finished trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub id: Uuid,
    pub symbol: String,
    pub asset: String,
    pub side: Side,
    pub size: f64,
    pub size_usd: f64,
    pub leverage: u32,
    pub entry_price: f64,
    pub exit_price: f64,
    pub pnl: f64,
    pub pnl_percent: f64,
    pub open_time: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
    pub duration_secs: i64,
    pub reason: CloseReason,
}

impl ClosedTrade {
    #[inline]
    pub fn is_win(&self) -> bool {
        self.pnl >= 0.0
    }

    #[inline]
    pub fn volume(&self) -> f64 {
        self.size_usd * f64::from(self.leverage)
    }
}
