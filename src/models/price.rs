//! # models::price
//!
//! Defines [`PriceQuote`], the per-symbol market pulse the price feed hands to
//! the engine on every refresh.
//!
//! Kept flat and cheap to clone: the mark tick copies the current price map
//! before iterating positions, so the feed lock is never held across a tick.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A spot quote for one base asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    /// Base asset ticker, e.g. `"BTC"`, `"SOL"`.
    pub symbol: String,

    /// Last USD price.
    pub price: f64,

    /// Percent change over the trailing 24 hours.
    #[serde(default)]
    pub change_24h: f64,

    pub high_24h: f64,
    pub low_24h: f64,

    /// When the source produced (or we received) this quote.
    pub as_of: DateTime<Utc>,
}

impl PriceQuote {
    /// A quote is usable only with a positive, finite price.
    #[inline]
    pub fn is_usable(&self) -> bool {
        self.price.is_finite() && self.price > 0.0
    }
}
