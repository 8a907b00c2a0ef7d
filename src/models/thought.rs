//! # models::thought
//!
//! Narration events for the "AI thoughts" terminal.
//!
//! Each narration kind is a variant of [`Narration`] carrying typed fields.
//! Text is produced only by [`Narration::render`], which the snapshot calls on
//! the way out to the dashboard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::format::{format_duration, format_pnl, format_percent, format_price, format_usd};
use crate::models::position::{CloseReason, ClosedTrade, Position, Side};

// ─── ThoughtKind ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThoughtKind {
    Signal,
    Analysis,
    Execute,
    Monitor,
    Close,
    Alert,
}

// ─── TradeSnapshot ────────────────────────────────────────────────────────────

/// Frozen trade figures attached to a narration. Copied at emission time,
/// never a reference to the live position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSnapshot {
    pub asset: String,
    pub side: Side,
    pub entry: Option<f64>,
    pub exit: Option<f64>,
    pub size: Option<String>,
    pub leverage: Option<u32>,
    pub pnl: Option<f64>,
    pub pnl_percent: Option<f64>,
}

impl TradeSnapshot {
    pub fn opened(position: &Position) -> Self {
        Self {
            asset:       position.asset.clone(),
            side:        position.side,
            entry:       Some(position.entry_price),
            exit:        None,
            size:        Some(position.size_display()),
            leverage:    Some(position.leverage),
            pnl:         None,
            pnl_percent: None,
        }
    }

    pub fn closed(trade: &ClosedTrade) -> Self {
        Self {
            asset:       trade.asset.clone(),
            side:        trade.side,
            entry:       Some(trade.entry_price),
            exit:        Some(trade.exit_price),
            size:        None,
            leverage:    Some(trade.leverage),
            pnl:         Some(trade.pnl),
            pnl_percent: Some(trade.pnl_percent),
        }
    }
}

// ─── Narration ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "narration", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Narration {
    /// Opening market scan on a fresh session.
    Scan { symbol: String },

    /// Bootstrap long thesis.
    BullishSetup { symbol: String, support: f64 },

    /// Bootstrap short thesis.
    BearishDivergence { symbol: String },

    /// Periodic entry signal preceding a scheduled open.
    Breakout {
        symbol: String,
        side: Side,
        level: f64,
        hours: u32,
        volume_surge_pct: f64,
    },

    Execute {
        asset: String,
        symbol: String,
        side: Side,
        entry: f64,
        size: f64,
        leverage: u32,
        stop_loss: f64,
        take_profit: f64,
        sl_pct: f64,
        tp_pct: f64,
    },

    Close {
        asset: String,
        exit: f64,
        duration_secs: i64,
        reason: CloseReason,
        pnl: f64,
        pnl_percent: f64,
    },

    MarketStructure {
        symbol: String,
        price: f64,
        above_ema: bool,
        volume_pct: f64,
        volatility_index: f64,
        elevated: bool,
    },

    RiskAssessment {
        open_positions: usize,
        exposure: f64,
        drawdown_pct: f64,
        max_drawdown_pct: f64,
    },

    FundingScan {
        btc_rate: f64,
        eth_rate: f64,
        longs_paying: bool,
    },

    FeedAlert { message: String },
}

impl Narration {
    pub fn kind(&self) -> ThoughtKind {
        match self {
            Narration::Scan { .. }
            | Narration::MarketStructure { .. }
            | Narration::FundingScan { .. } => ThoughtKind::Analysis,
            Narration::BullishSetup { .. }
            | Narration::BearishDivergence { .. }
            | Narration::Breakout { .. } => ThoughtKind::Signal,
            Narration::Execute { .. } => ThoughtKind::Execute,
            Narration::Close { .. } => ThoughtKind::Close,
            Narration::RiskAssessment { .. } => ThoughtKind::Monitor,
            Narration::FeedAlert { .. } => ThoughtKind::Alert,
        }
    }

    /// Renders `(title, lines)` for display.
    pub fn render(&self) -> (String, Vec<String>) {
        match self {
            Narration::Scan { symbol } => (
                "Scanning Market Conditions".to_string(),
                vec![
                    format!("{symbol} showing strong momentum on 4H timeframe."),
                    "Volume profile indicates accumulation phase.".to_string(),
                    "Funding rate neutral - no directional bias from leverage.".to_string(),
                ],
            ),

            Narration::BullishSetup { symbol, support } => (
                format!("{symbol} Bullish Setup Detected"),
                vec![
                    "RSI showing higher lows while price consolidates.".to_string(),
                    "MACD histogram turning positive after extended bearish run.".to_string(),
                    format!("Key support held at ${}.", format_price(*support)),
                ],
            ),

            Narration::BearishDivergence { symbol } => (
                format!("{symbol} Bearish Divergence Forming"),
                vec![
                    format!("{symbol}/BTC ratio breaking down from key support."),
                    "4H showing lower highs pattern near resistance.".to_string(),
                    "Waiting for confirmation before entry.".to_string(),
                ],
            ),

            Narration::Breakout { symbol, side, level, hours, volume_surge_pct } => {
                let (bias, first, momentum) = match side {
                    Side::Long => (
                        "Bullish",
                        format!("Price breaking above {hours}H resistance at ${}.", format_price(*level)),
                        "turning bullish",
                    ),
                    Side::Short => (
                        "Bearish",
                        format!("Price rejected at {hours}H resistance near ${}.", format_price(*level)),
                        "showing weakness",
                    ),
                };
                (
                    format!("{symbol} {bias} Setup Detected"),
                    vec![
                        first,
                        format!("Volume surge: {volume_surge_pct:.0}% above average."),
                        format!("Momentum indicators {momentum}."),
                    ],
                )
            }

            Narration::Execute {
                asset, symbol, side, entry, size, leverage,
                stop_loss, take_profit, sl_pct, tp_pct,
            } => {
                let risk = sl_pct * f64::from(*leverage) * 100.0;
                let reward_risk = if *sl_pct > 0.0 { tp_pct / sl_pct } else { 0.0 };
                (
                    format!("Opening {side} {asset}"),
                    vec![
                        format!(
                            "Entry: ${} | Size: {size:.4} {symbol} | Leverage: {leverage}x",
                            format_price(*entry)
                        ),
                        format!(
                            "Stop Loss: ${} ({:.1}%) | Take Profit: ${} (+{:.1}%)",
                            format_price(*stop_loss),
                            sl_pct * 100.0,
                            format_price(*take_profit),
                            tp_pct * 100.0,
                        ),
                        format!("Risk: {risk:.1}% of position | R:R Ratio: {reward_risk:.2}"),
                    ],
                )
            }

            Narration::Close { asset, exit, duration_secs, reason, pnl, pnl_percent } => {
                let outcome = if *pnl >= 0.0 { "in Profit" } else { "at Loss" };
                let closing = if *pnl >= 0.0 {
                    "Adding to win streak. Looking for next opportunity."
                } else {
                    "Loss contained within risk parameters."
                };
                (
                    format!("{asset} Closed {outcome}"),
                    vec![
                        format!(
                            "Exit: ${} | Duration: {} | P&L: {} ({})",
                            format_price(*exit),
                            format_duration(*duration_secs),
                            format_pnl(*pnl),
                            format_percent(*pnl_percent),
                        ),
                        format!("Reason: {}", reason.describe()),
                        closing.to_string(),
                    ],
                )
            }

            Narration::MarketStructure {
                symbol, price, above_ema, volume_pct, volatility_index, elevated,
            } => (
                format!("{symbol} Market Structure Analysis"),
                vec![
                    format!(
                        "Current price: ${} - {} 20 EMA.",
                        format_price(*price),
                        if *above_ema { "above" } else { "below" }
                    ),
                    format!("Volume: {volume_pct:.0}% of 24h average."),
                    format!(
                        "Volatility index: {volatility_index:.1} - {} conditions.",
                        if *elevated { "elevated" } else { "normal" }
                    ),
                ],
            ),

            Narration::RiskAssessment { open_positions, exposure, drawdown_pct, max_drawdown_pct } => (
                "Portfolio Risk Assessment".to_string(),
                vec![
                    format!(
                        "Open positions: {open_positions} | Total exposure: {}",
                        format_usd(*exposure)
                    ),
                    format!(
                        "Current drawdown: {drawdown_pct:.2}% | Max allowed: {max_drawdown_pct:.0}%"
                    ),
                    if drawdown_pct < max_drawdown_pct {
                        "Risk parameters within acceptable bounds.".to_string()
                    } else {
                        "Drawdown limit breached - reducing exposure.".to_string()
                    },
                ],
            ),

            Narration::FundingScan { btc_rate, eth_rate, longs_paying } => (
                "Funding Rate Scan".to_string(),
                vec![
                    format!(
                        "BTC funding: {btc_rate:.4}% - {}",
                        if *longs_paying { "longs paying shorts" } else { "shorts paying longs" }
                    ),
                    format!("ETH funding: {eth_rate:.4}%"),
                    "No significant funding arbitrage opportunities detected.".to_string(),
                ],
            ),

            Narration::FeedAlert { message } => (
                "Price Feed Degraded".to_string(),
                vec![
                    message.clone(),
                    "Continuing on last known prices.".to_string(),
                ],
            ),
        }
    }
}

// ─── ThoughtEntry ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThoughtEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// `HH:MM:SS` (UTC) for the terminal gutter.
    pub time: String,
    pub kind: ThoughtKind,
    pub narration: Narration,
    pub trade: Option<TradeSnapshot>,
}

impl ThoughtEntry {
    pub fn new(id: Uuid, timestamp: DateTime<Utc>, narration: Narration, trade: Option<TradeSnapshot>) -> Self {
        Self {
            id,
            timestamp,
            time: timestamp.format("%H:%M:%S").to_string(),
            kind: narration.kind(),
            narration,
            trade,
        }
    }
}

/// Rendered form of a [`ThoughtEntry`] for the dashboard terminal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThoughtView {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub time: String,
    #[serde(rename = "type")]
    pub kind: ThoughtKind,
    pub title: String,
    pub content: Vec<String>,
    pub trade: Option<TradeSnapshot>,
}

impl From<&ThoughtEntry> for ThoughtView {
    fn from(entry: &ThoughtEntry) -> Self {
        let (title, content) = entry.narration.render();
        Self {
            id: entry.id,
            timestamp: entry.timestamp,
            time: entry.time.clone(),
            kind: entry.kind,
            title,
            content,
            trade: entry.trade.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_narration_renders_outcome_and_reason() {
        let narration = Narration::Close {
            asset: "BTC-PERP".into(),
            exit: 98.0,
            duration_secs: 125,
            reason: CloseReason::StopLoss,
            pnl: -100.0,
            pnl_percent: -10.0,
        };
        assert_eq!(narration.kind(), ThoughtKind::Close);

        let (title, lines) = narration.render();
        assert_eq!(title, "BTC-PERP Closed at Loss");
        assert_eq!(lines[0], "Exit: $98.00 | Duration: 2m 5s | P&L: -$100.00 (-10.00%)");
        assert_eq!(lines[1], "Reason: Stop loss triggered");
    }

    #[test]
    fn execute_narration_reports_reward_to_risk() {
        let narration = Narration::Execute {
            asset: "SOL-PERP".into(),
            symbol: "SOL".into(),
            side: Side::Long,
            entry: 200.0,
            size: 10.0,
            leverage: 5,
            stop_loss: 196.0,
            take_profit: 208.0,
            sl_pct: 0.02,
            tp_pct: 0.04,
        };
        let (title, lines) = narration.render();
        assert_eq!(title, "Opening LONG SOL-PERP");
        assert_eq!(lines[2], "Risk: 10.0% of position | R:R Ratio: 2.00");
    }

    #[test]
    fn entry_time_is_wall_clock_gutter() {
        let ts = DateTime::parse_from_rfc3339("2025-03-01T09:05:07Z").unwrap().with_timezone(&Utc);
        let entry = ThoughtEntry::new(Uuid::nil(), ts, Narration::FeedAlert { message: "x".into() }, None);
        assert_eq!(entry.time, "09:05:07");
        assert_eq!(entry.kind, ThoughtKind::Alert);
    }

    #[test]
    fn view_renders_text_and_keeps_trade_copy() {
        let entry = ThoughtEntry::new(
            Uuid::nil(),
            Utc::now(),
            Narration::Scan { symbol: "ETH".into() },
            None,
        );
        let view = ThoughtView::from(&entry);
        assert_eq!(view.title, "Scanning Market Conditions");
        assert_eq!(view.content[0], "ETH showing strong momentum on 4H timeframe.");

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["type"], "ANALYSIS");
    }
}
