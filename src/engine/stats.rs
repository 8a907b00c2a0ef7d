//! # engine::stats
//!
//! **Stats Aggregator** — running portfolio metrics, updated in O(1) per
//! closed trade.
//!
//! | Metric          | Rule                                                  |
//! |-----------------|-------------------------------------------------------|
//! | win_rate        | wins / total × 100 (a win is `pnl >= 0`)              |
//! | current_streak  | +1 on win, 0 on loss; `win_streak` keeps the max      |
//! | profit_factor   | gross profit / max(gross loss, ε)                     |
//! | sharpe_ratio    | mean / stddev of per-trade returns (Welford moments)  |
//! | max_drawdown    | peak-to-trough of `starting_equity + Σ pnl`, percent  |
//! | volume_24h      | Σ notional × leverage of trades closed in the last 24h|

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};

use crate::models::position::{round2, ClosedTrade};
use crate::models::TradingStats;

const EPSILON: f64 = 1e-9;

/// Trailing window for `volume_24h`.
pub fn volume_window() -> Duration {
    Duration::hours(24)
}

#[derive(Debug, Clone)]
pub struct StatsAggregator {
    starting_equity: f64,

    total_pnl:    f64,
    today_pnl:    f64,
    total_trades: u64,
    wins:         u64,
    losses:       u64,

    current_streak: u32,
    win_streak:     u32,
    best_trade:     Option<f64>,
    worst_trade:    Option<f64>,

    gross_profit: f64,
    gross_loss:   f64,

    // Welford running moments over per-trade returns
    return_mean: f64,
    return_m2:   f64,

    equity:        f64,
    equity_peak:   f64,
    max_drawdown:  f64,

    /// `(close_time, volume)` in close order, evicted past the window.
    volume_window: VecDeque<(DateTime<Utc>, f64)>,
    volume_sum:    f64,
}

impl StatsAggregator {
    pub fn new(starting_equity: f64) -> Self {
        Self {
            starting_equity,
            total_pnl:      0.0,
            today_pnl:      0.0,
            total_trades:   0,
            wins:           0,
            losses:         0,
            current_streak: 0,
            win_streak:     0,
            best_trade:     None,
            worst_trade:    None,
            gross_profit:   0.0,
            gross_loss:     0.0,
            return_mean:    0.0,
            return_m2:      0.0,
            equity:         starting_equity,
            equity_peak:    starting_equity,
            max_drawdown:   0.0,
            volume_window:  VecDeque::new(),
            volume_sum:     0.0,
        }
    }

    /// Replays a history oldest-first. Matches applying `record` one by one.
    pub fn rebuild<'a>(starting_equity: f64, trades: impl IntoIterator<Item = &'a ClosedTrade>) -> Self {
        let mut stats = Self::new(starting_equity);
        for trade in trades {
            stats.record(trade);
        }
        stats
    }

    pub fn record(&mut self, trade: &ClosedTrade) {
        let pnl = trade.pnl;

        self.total_pnl    += pnl;
        self.today_pnl    += pnl;
        self.total_trades += 1;

        if trade.is_win() {
            self.wins           += 1;
            self.current_streak += 1;
            self.win_streak      = self.win_streak.max(self.current_streak);
            self.gross_profit   += pnl;
        } else {
            self.losses        += 1;
            self.current_streak = 0;
            self.gross_loss    += -pnl;
        }

        self.best_trade  = Some(self.best_trade.map_or(pnl, |b| b.max(pnl)));
        self.worst_trade = Some(self.worst_trade.map_or(pnl, |w| w.min(pnl)));

        let n = self.total_trades as f64;
        let delta = trade.pnl_percent - self.return_mean;
        self.return_mean += delta / n;
        self.return_m2   += delta * (trade.pnl_percent - self.return_mean);

        self.equity += pnl;
        if self.equity > self.equity_peak {
            self.equity_peak = self.equity;
        } else if self.equity_peak > 0.0 {
            let drawdown = (self.equity_peak - self.equity) / self.equity_peak * 100.0;
            self.max_drawdown = self.max_drawdown.max(drawdown);
        }

        let volume = trade.volume();
        self.volume_window.push_back((trade.close_time, volume));
        self.volume_sum += volume;
    }

    /// Day-boundary signal from the runtime.
    pub fn reset_today(&mut self) {
        self.today_pnl = 0.0;
    }

    /// Drops volume contributions older than the window ending at `now`.
    pub fn evict_volume(&mut self, now: DateTime<Utc>) {
        let cutoff = now - volume_window();
        while let Some(&(closed_at, volume)) = self.volume_window.front() {
            if closed_at >= cutoff {
                break;
            }
            self.volume_sum -= volume;
            self.volume_window.pop_front();
        }
        if self.volume_window.is_empty() {
            self.volume_sum = 0.0;
        }
    }

    pub fn volume_24h(&mut self, now: DateTime<Utc>) -> f64 {
        self.evict_volume(now);
        self.volume_sum.max(0.0)
    }

    pub fn total_trades(&self) -> u64 {
        self.total_trades
    }

    /// Current equity (starting equity plus realised P&L).
    pub fn equity(&self) -> f64 {
        self.equity
    }

    pub fn starting_equity(&self) -> f64 {
        self.starting_equity
    }

    /// Percent below the running equity peak right now.
    pub fn current_drawdown(&self, unrealized: f64) -> f64 {
        let equity = self.equity + unrealized;
        if self.equity_peak > 0.0 && equity < self.equity_peak {
            (self.equity_peak - equity) / self.equity_peak * 100.0
        } else {
            0.0
        }
    }

    /// Display snapshot as of `now`, rounded for the panel.
    pub fn snapshot(&mut self, now: DateTime<Utc>) -> TradingStats {
        let volume_24h = self.volume_24h(now);

        let win_rate = if self.total_trades > 0 {
            self.wins as f64 / self.total_trades as f64 * 100.0
        } else {
            0.0
        };
        let avg_win  = if self.wins > 0 { self.gross_profit / self.wins as f64 } else { 0.0 };
        let avg_loss = if self.losses > 0 { -self.gross_loss / self.losses as f64 } else { 0.0 };

        let profit_factor = self.gross_profit / self.gross_loss.max(EPSILON);

        let sharpe_ratio = if self.total_trades >= 2 {
            let variance = self.return_m2 / (self.total_trades - 1) as f64;
            let stddev = variance.sqrt();
            if stddev > EPSILON { self.return_mean / stddev } else { 0.0 }
        } else {
            0.0
        };

        TradingStats {
            total_pnl:      round2(self.total_pnl),
            today_pnl:      round2(self.today_pnl),
            total_trades:   self.total_trades,
            win_rate:       round2(win_rate),
            current_streak: self.current_streak,
            win_streak:     self.win_streak,
            best_trade:     round2(self.best_trade.unwrap_or(0.0)),
            worst_trade:    round2(self.worst_trade.unwrap_or(0.0)),
            avg_win:        round2(avg_win),
            avg_loss:       round2(avg_loss),
            sharpe_ratio:   round2(sharpe_ratio),
            max_drawdown:   round2(self.max_drawdown),
            profit_factor:  round2(profit_factor),
            volume_24h:     round2(volume_24h),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::position::{CloseReason, Side};
    use uuid::Uuid;

    fn trade(pnl: f64, pnl_percent: f64, closed: DateTime<Utc>) -> ClosedTrade {
        ClosedTrade {
            id:            Uuid::new_v4(),
            symbol:        "BTC".into(),
            asset:         "BTC-PERP".into(),
            side:          Side::Long,
            size:          0.01,
            size_usd:      1000.0,
            leverage:      5,
            entry_price:   100_000.0,
            exit_price:    100_000.0,
            pnl,
            pnl_percent,
            open_time:     closed - Duration::minutes(10),
            close_time:    closed,
            duration_secs: 600,
            reason:        if pnl >= 0.0 { CloseReason::TakeProfit } else { CloseReason::StopLoss },
        }
    }

    #[test]
    fn counts_every_close() {
        let now = Utc::now();
        let mut stats = StatsAggregator::new(5000.0);
        let pnls = [10.0, -5.0, 0.0, -1.0, 30.0, 2.0, -8.0];
        for pnl in pnls {
            stats.record(&trade(pnl, pnl / 10.0, now));
        }
        let snap = stats.snapshot(now);
        assert_eq!(snap.total_trades, pnls.len() as u64);
        assert_eq!(snap.total_pnl, 28.0);
        assert_eq!(snap.best_trade, 30.0);
        assert_eq!(snap.worst_trade, -8.0);
        // wins: 10, 0, 30, 2
        assert_eq!(snap.win_rate, round2(4.0 / 7.0 * 100.0));
    }

    #[test]
    fn streaks_reset_on_loss() {
        let now = Utc::now();
        let mut stats = StatsAggregator::new(5000.0);
        for pnl in [1.0, 1.0, 1.0, -1.0, 1.0] {
            stats.record(&trade(pnl, 0.1, now));
        }
        let snap = stats.snapshot(now);
        assert_eq!(snap.current_streak, 1);
        assert_eq!(snap.win_streak, 3);
    }

    #[test]
    fn averages_and_profit_factor() {
        let now = Utc::now();
        let mut stats = StatsAggregator::new(5000.0);
        for pnl in [100.0, 50.0, -25.0, -25.0] {
            stats.record(&trade(pnl, 1.0, now));
        }
        let snap = stats.snapshot(now);
        assert_eq!(snap.avg_win, 75.0);
        assert_eq!(snap.avg_loss, -25.0);
        assert_eq!(snap.profit_factor, 3.0);

        let mut winners_only = StatsAggregator::new(5000.0);
        winners_only.record(&trade(10.0, 1.0, now));
        assert!(winners_only.snapshot(now).profit_factor > 1e6);
    }

    #[test]
    fn drawdown_tracks_peak_to_trough() {
        let now = Utc::now();
        let mut stats = StatsAggregator::new(1000.0);
        // 1000 → 1200 → 900 → 1100
        for pnl in [200.0, -300.0, 200.0] {
            stats.record(&trade(pnl, 0.0, now));
        }
        assert_eq!(stats.snapshot(now).max_drawdown, 25.0);
    }

    #[test]
    fn sharpe_uses_sample_moments() {
        let now = Utc::now();
        let mut stats = StatsAggregator::new(5000.0);
        for r in [1.0, 2.0, 3.0] {
            stats.record(&trade(r, r, now));
        }
        // mean 2, sample stddev 1
        assert_eq!(stats.snapshot(now).sharpe_ratio, 2.0);

        let mut single = StatsAggregator::new(5000.0);
        single.record(&trade(1.0, 1.0, now));
        assert_eq!(single.snapshot(now).sharpe_ratio, 0.0);
    }

    #[test]
    fn volume_ages_out_after_a_day() {
        let now = Utc::now();
        let mut stats = StatsAggregator::new(5000.0);
        stats.record(&trade(1.0, 0.1, now - Duration::hours(30)));
        stats.record(&trade(1.0, 0.1, now - Duration::hours(2)));
        stats.record(&trade(1.0, 0.1, now));

        // 1000 notional × 5x per trade, the 30h-old one excluded
        assert_eq!(stats.volume_24h(now), 10_000.0);
        assert_eq!(stats.volume_24h(now + Duration::hours(23)), 5_000.0);
        assert_eq!(stats.volume_24h(now + Duration::hours(25)), 0.0);
    }

    #[test]
    fn rebuild_matches_incremental() {
        let now = Utc::now();
        let history: Vec<ClosedTrade> = [12.5, -3.0, 7.25, -20.0, 4.0]
            .iter()
            .enumerate()
            .map(|(i, &pnl)| trade(pnl, pnl / 4.0, now - Duration::minutes(50 - i as i64)))
            .collect();

        let mut incremental = StatsAggregator::new(5000.0);
        for t in &history {
            incremental.record(t);
        }
        let mut rebuilt = StatsAggregator::rebuild(5000.0, &history);
        assert_eq!(incremental.snapshot(now), rebuilt.snapshot(now));
    }

    #[test]
    fn today_bucket_resets_independently() {
        let now = Utc::now();
        let mut stats = StatsAggregator::new(5000.0);
        stats.record(&trade(40.0, 1.0, now));
        stats.reset_today();
        stats.record(&trade(-15.0, -1.0, now));
        let snap = stats.snapshot(now);
        assert_eq!(snap.today_pnl, -15.0);
        assert_eq!(snap.total_pnl, 25.0);
    }
}
