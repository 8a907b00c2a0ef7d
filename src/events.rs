//! # events
//!
//! [`MonitorEvent`] — everything the simulator pushes to dashboard clients.
//!
//! Events go out on a `tokio::sync::broadcast::Sender<String>` as
//! pre-serialized JSON, so subscribers never need the payload types to be
//! `Clone`.

use serde::Serialize;

use crate::engine::agent::Activity;
use crate::engine::feed::FeedStatus;
use crate::engine::simulator::Snapshot;
use crate::models::{ClosedTrade, EquityPoint, Position, ThoughtView, TradingStats};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MonitorEvent {
    /// Full state, sent once to every client on connect.
    Snapshot(Box<Snapshot>),

    PositionOpened {
        position: Box<Position>,
    },

    /// New marks after a tick, one entry per open position.
    PositionsMarked {
        positions: Vec<Position>,
    },

    PositionClosed {
        trade: Box<ClosedTrade>,
    },

    Thought {
        thought: Box<ThoughtView>,
    },

    StatsUpdated {
        stats: Box<TradingStats>,
    },

    EquitySampled {
        point: EquityPoint,
    },

    ActionChanged {
        action: Activity,
    },

    FeedUpdated {
        feed: FeedStatus,
    },
}

impl MonitorEvent {
    #[inline]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"event":"SERIALIZATION_ERROR"}"#.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn events_carry_screaming_tag() {
        let json = MonitorEvent::ActionChanged { action: Activity::Scanning }.to_json();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["event"], "ACTION_CHANGED");
        assert_eq!(value["action"], "SCANNING");

        let json = MonitorEvent::EquitySampled { point: EquityPoint { timestamp: Utc::now(), value: 5010.5 } }.to_json();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["event"], "EQUITY_SAMPLED");
        assert_eq!(value["point"]["value"], 5010.5);
    }
}
