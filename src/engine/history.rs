//! # engine::history
//!
//! Bounded stores fed by the engine: the closed-trade ledger and the sampled
//! equity curve behind the sparkline.

use std::collections::VecDeque;

use crate::models::{ClosedTrade, EquityPoint};

pub const DEFAULT_TRADE_CAP:  usize = 100;
pub const DEFAULT_EQUITY_CAP: usize = 60;

// ─── TradeHistory ─────────────────────────────────────────────────────────────

/// Append-only closed trades, oldest dropped past the cap.
#[derive(Debug, Clone)]
pub struct TradeHistory {
    trades: VecDeque<ClosedTrade>,
    cap:    usize,
}

impl TradeHistory {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self { trades: VecDeque::with_capacity(cap), cap }
    }

    pub fn push(&mut self, trade: ClosedTrade) {
        if self.trades.len() >= self.cap {
            self.trades.pop_front();
        }
        self.trades.push_back(trade);
    }

    /// Oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &ClosedTrade> {
        self.trades.iter()
    }

    /// Newest first, for the ticker.
    pub fn recent(&self) -> Vec<ClosedTrade> {
        self.trades.iter().rev().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }
}

impl Default for TradeHistory {
    fn default() -> Self {
        Self::new(DEFAULT_TRADE_CAP)
    }
}

// ─── EquityCurve ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct EquityCurve {
    points: VecDeque<EquityPoint>,
    cap:    usize,
}

impl EquityCurve {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self { points: VecDeque::with_capacity(cap), cap }
    }

    pub fn push(&mut self, point: EquityPoint) {
        while self.points.len() >= self.cap {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    pub fn extend(&mut self, points: impl IntoIterator<Item = EquityPoint>) {
        for point in points {
            self.push(point);
        }
    }

    pub fn points(&self) -> Vec<EquityPoint> {
        self.points.iter().copied().collect()
    }

    pub fn last(&self) -> Option<EquityPoint> {
        self.points.back().copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl Default for EquityCurve {
    fn default() -> Self {
        Self::new(DEFAULT_EQUITY_CAP)
    }
}
