//! # engine::feed
//!
//! **Price Feed** — where spot prices come from, and the last-known book the
//! engine reads from.
//!
//! ## Sources (selected by `PRICE_SOURCE`)
//! 1. `coingecko` — public `simple/price` endpoint, polled every 30 s
//! 2. `simulated` — offline random walk, no network
//!
//! `simple/price` carries no 24 h high/low, so [`PriceBook`] keeps a rolling
//! range per symbol from the quotes it has seen.
//!
//! ## Degradation
//! A failed refresh never clears the book: the engine keeps marking against
//! the last known quotes and the dashboard sees `error = Some(..)`.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::SimError;
use crate::models::PriceQuote;

/// Symbol → CoinGecko id for every asset the feed knows.
pub const COINGECKO_IDS: &[(&str, &str)] = &[
    ("BTC",   "bitcoin"),
    ("ETH",   "ethereum"),
    ("SOL",   "solana"),
    ("AVAX",  "avalanche-2"),
    ("ARB",   "arbitrum"),
    ("DOGE",  "dogecoin"),
    ("LINK",  "chainlink"),
    ("MATIC", "matic-network"),
    ("OP",    "optimism"),
    ("APT",   "aptos"),
    ("SUI",   "sui"),
    ("INJ",   "injective-protocol"),
    ("TIA",   "celestia"),
    ("SEI",   "sei-network"),
    ("NEAR",  "near"),
    ("ATOM",  "cosmos"),
    ("DOT",   "polkadot"),
    ("ADA",   "cardano"),
    ("XRP",   "ripple"),
    ("BNB",   "binancecoin"),
];

// ─── PriceSource ──────────────────────────────────────────────────────────────

/// Where quotes come from. Owned by the refresh task, never by shared state,
/// so a slow HTTP call cannot block a mark tick.
pub enum PriceSource {
    CoinGecko {
        base_url: String,
        client:   reqwest::Client,
    },
    Simulated(SimulatedMarket),
}

impl PriceSource {
    pub fn coingecko(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        PriceSource::CoinGecko { base_url: base_url.into(), client }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PriceSource::CoinGecko { .. } => "coingecko",
            PriceSource::Simulated(_)     => "simulated",
        }
    }

    /// Pulls one full price set.
    pub async fn fetch(&mut self, now: DateTime<Utc>) -> Result<HashMap<String, PriceQuote>, SimError> {
        match self {
            PriceSource::CoinGecko { base_url, client } => fetch_coingecko(client, base_url, now).await,
            PriceSource::Simulated(market) => Ok(market.step(now)),
        }
    }
}

/// Per-coin payload of `simple/price`.
#[derive(Debug, Deserialize)]
struct GeckoQuote {
    usd:            Option<f64>,
    usd_24h_change: Option<f64>,
}

async fn fetch_coingecko(
    client:   &reqwest::Client,
    base_url: &str,
    now:      DateTime<Utc>,
) -> Result<HashMap<String, PriceQuote>, SimError> {
    let ids = COINGECKO_IDS.iter().map(|(_, id)| *id).collect::<Vec<_>>().join(",");
    let url = format!(
        "{base_url}/api/v3/simple/price?ids={ids}&vs_currencies=usd&include_24hr_change=true"
    );

    let response = client
        .get(&url)
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .map_err(|e| SimError::Feed(format!("price API unreachable: {e}")))?;

    if !response.status().is_success() {
        return Err(SimError::Feed(format!("price API returned HTTP {}", response.status())));
    }

    let body: HashMap<String, GeckoQuote> = response
        .json()
        .await
        .map_err(|e| SimError::Feed(format!("price response parse error: {e}")))?;

    let quotes = parse_gecko(body, now);
    debug!(count = quotes.len(), "CoinGecko price set received");
    Ok(quotes)
}

fn parse_gecko(body: HashMap<String, GeckoQuote>, now: DateTime<Utc>) -> HashMap<String, PriceQuote> {
    let mut quotes = HashMap::new();
    for (symbol, gecko_id) in COINGECKO_IDS {
        let Some(raw) = body.get(*gecko_id) else { continue };
        let Some(price) = raw.usd else { continue };
        quotes.insert(
            symbol.to_string(),
            PriceQuote {
                symbol:     symbol.to_string(),
                price,
                change_24h: raw.usd_24h_change.unwrap_or(0.0),
                high_24h:   price,
                low_24h:    price,
                as_of:      now,
            },
        );
    }
    quotes
}

// ─── SimulatedMarket ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct SimulatedAsset {
    open:       f64,
    price:      f64,
    high:       f64,
    low:        f64,
    volatility: f64,
}

/// Offline market: each step moves every asset by a bucketed random amount
/// plus a slow sinusoidal trend.
pub struct SimulatedMarket {
    assets: BTreeMap<String, SimulatedAsset>,
    rng:    StdRng,
}

impl SimulatedMarket {
    /// Base prices and per-step volatility for the default universe.
    pub const DEFAULT_UNIVERSE: &'static [(&'static str, f64, f64)] = &[
        ("BTC",   98_234.0,   0.0008),
        ("ETH",   3_456.0,    0.0012),
        ("SOL",   178.5,      0.0018),
        ("AVAX",  42.3,       0.0015),
        ("ARB",   1.23,       0.002),
        ("DOGE",  0.324,      0.0025),
        ("LINK",  18.9,       0.0014),
        ("MATIC", 0.89,       0.0016),
        ("OP",    2.45,       0.0018),
        ("APT",   12.3,       0.0017),
        ("INJ",   28.5,       0.002),
        ("SUI",   4.12,       0.0022),
        ("WIF",   2.89,       0.003),
        ("PEPE",  0.000_023_4, 0.004),
    ];

    pub fn new(universe: &[(&str, f64, f64)], rng: StdRng) -> Self {
        let assets = universe
            .iter()
            .map(|(symbol, price, volatility)| {
                (
                    symbol.to_string(),
                    SimulatedAsset {
                        open: *price,
                        price: *price,
                        high: *price,
                        low: *price,
                        volatility: *volatility,
                    },
                )
            })
            .collect();
        Self { assets, rng }
    }

    pub fn with_default_universe() -> Self {
        Self::new(Self::DEFAULT_UNIVERSE, StdRng::from_os_rng())
    }

    /// Advances every asset one step and returns the new quote set.
    pub fn step(&mut self, now: DateTime<Utc>) -> HashMap<String, PriceQuote> {
        let trend = (now.timestamp_millis() as f64 / 60_000.0).sin() * 0.0002;
        let mut quotes = HashMap::with_capacity(self.assets.len());

        for (symbol, asset) in self.assets.iter_mut() {
            asset.price = realistic_step(&mut self.rng, asset.price, asset.volatility, trend);
            asset.high  = asset.high.max(asset.price);
            asset.low   = asset.low.min(asset.price);

            quotes.insert(
                symbol.clone(),
                PriceQuote {
                    symbol:     symbol.clone(),
                    price:      asset.price,
                    change_24h: (asset.price / asset.open - 1.0) * 100.0,
                    high_24h:   asset.high,
                    low_24h:    asset.low,
                    as_of:      now,
                },
            );
        }
        quotes
    }
}

/// Base price of `symbol` in the default universe.
pub fn reference_price(symbol: &str) -> Option<f64> {
    SimulatedMarket::DEFAULT_UNIVERSE
        .iter()
        .find(|(s, _, _)| *s == symbol)
        .map(|(_, price, _)| *price)
}

/// Mostly small moves, occasionally a spike.
fn realistic_step<R: Rng>(rng: &mut R, price: f64, volatility: f64, trend: f64) -> f64 {
    let roll: f64 = rng.random();
    let direction = if rng.random_bool(0.5) { 1.0 } else { -1.0 };

    let magnitude = if roll < 0.7 {
        volatility * 0.3
    } else if roll < 0.9 {
        volatility * 0.7
    } else if roll < 0.98 {
        volatility * 1.2
    } else {
        volatility * 2.5
    };

    let next = price + (direction * magnitude + trend) * price;
    if next.is_finite() && next > 0.0 { next } else { price }
}

/// Uniform `price × (1 + u)`, `u ∈ [-volatility, volatility]`.
pub fn perturb<R: Rng>(rng: &mut R, price: f64, volatility: f64) -> f64 {
    if volatility <= 0.0 {
        return price;
    }
    let change: f64 = rng.random_range(-volatility..=volatility);
    price * (1.0 + change)
}

// ─── PriceBook ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct FeedStatus {
    pub source:       &'static str,
    pub loading:      bool,
    pub error:        Option<String>,
    pub last_refresh: Option<DateTime<Utc>>,
    pub symbols:      usize,
}

/// Observed high/low of one symbol since `since`.
#[derive(Debug, Clone, Copy)]
struct Range {
    high:  f64,
    low:   f64,
    since: DateTime<Utc>,
}

/// Last known quote per symbol plus loading/error flags.
#[derive(Debug, Clone)]
pub struct PriceBook {
    quotes:       HashMap<String, PriceQuote>,
    ranges:       HashMap<String, Range>,
    source:       &'static str,
    loading:      bool,
    error:        Option<String>,
    last_refresh: Option<DateTime<Utc>>,
    failures:     u32,
}

impl PriceBook {
    pub fn new(source: &'static str) -> Self {
        Self {
            quotes:       HashMap::new(),
            ranges:       HashMap::new(),
            source,
            loading:      true,
            error:        None,
            last_refresh: None,
            failures:     0,
        }
    }

    /// Merges a fresh set. Unusable quotes are dropped, previously known
    /// symbols absent from this set keep their last quote. High/low widen to
    /// every price seen in the last 24 h.
    pub fn apply(&mut self, quotes: HashMap<String, PriceQuote>, now: DateTime<Utc>) {
        let before = self.quotes.len();
        for (symbol, mut quote) in quotes {
            if quote.is_usable() {
                self.widen_range(&symbol, &mut quote, now);
                self.quotes.insert(symbol, quote);
            } else {
                debug!(%symbol, price = quote.price, "Dropping unusable quote");
            }
        }
        if self.failures > 0 {
            info!(failures = self.failures, "Price feed recovered");
        }
        self.loading      = false;
        self.error        = None;
        self.failures     = 0;
        self.last_refresh = Some(now);
        if before == 0 {
            info!(symbols = self.quotes.len(), "First price set loaded");
        }
    }

    fn widen_range(&mut self, symbol: &str, quote: &mut PriceQuote, now: DateTime<Utc>) {
        let fresh = Range {
            high:  quote.high_24h.max(quote.price),
            low:   quote.low_24h.min(quote.price),
            since: now,
        };
        let range = self.ranges.entry(symbol.to_string()).or_insert(fresh);
        if now - range.since >= TimeDelta::hours(24) {
            *range = fresh;
        }
        range.high = range.high.max(fresh.high);
        range.low  = range.low.min(fresh.low);

        quote.high_24h = range.high;
        quote.low_24h  = range.low;
    }

    /// Records a failed refresh. Returns `true` on the first failure of a
    /// streak so the caller can raise a single alert.
    pub fn fail(&mut self, err: &SimError) -> bool {
        warn!(error = %err, failures = self.failures + 1, "Price refresh failed — keeping last known prices");
        self.loading   = false;
        self.error     = Some(err.to_string());
        self.failures += 1;
        self.failures == 1
    }

    /// Usable price or `None`.
    pub fn price(&self, symbol: &str) -> Option<f64> {
        self.quotes.get(symbol).filter(|q| q.is_usable()).map(|q| q.price)
    }

    pub fn quote(&self, symbol: &str) -> Option<&PriceQuote> {
        self.quotes.get(symbol)
    }

    /// Copy of all usable prices, taken before a mark pass.
    pub fn prices(&self) -> HashMap<String, f64> {
        self.quotes
            .iter()
            .filter(|(_, q)| q.is_usable())
            .map(|(s, q)| (s.clone(), q.price))
            .collect()
    }

    /// True once at least one price set has been applied.
    pub fn is_ready(&self) -> bool {
        !self.quotes.is_empty()
    }

    pub fn status(&self) -> FeedStatus {
        FeedStatus {
            source:       self.source,
            loading:      self.loading,
            error:        self.error.clone(),
            last_refresh: self.last_refresh,
            symbols:      self.quotes.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(symbol: &str, price: f64) -> PriceQuote {
        PriceQuote {
            symbol: symbol.into(),
            price,
            change_24h: 0.0,
            high_24h: price,
            low_24h: price,
            as_of: Utc::now(),
        }
    }

    #[test]
    fn failure_keeps_last_known_prices() {
        let mut book = PriceBook::new("test");
        assert!(!book.is_ready());

        book.apply(HashMap::from([("BTC".to_string(), quote("BTC", 100.0))]), Utc::now());
        assert_eq!(book.price("BTC"), Some(100.0));

        let err = SimError::Feed("timeout".into());
        assert!(book.fail(&err));
        assert!(!book.fail(&err));
        assert_eq!(book.price("BTC"), Some(100.0));
        assert!(book.status().error.is_some());

        book.apply(HashMap::new(), Utc::now());
        assert!(book.status().error.is_none());
        assert_eq!(book.price("BTC"), Some(100.0));
    }

    #[test]
    fn unusable_quotes_are_unavailable() {
        let mut book = PriceBook::new("test");
        book.apply(
            HashMap::from([
                ("ZERO".to_string(), quote("ZERO", 0.0)),
                ("NAN".to_string(), quote("NAN", f64::NAN)),
                ("ETH".to_string(), quote("ETH", 3000.0)),
            ]),
            Utc::now(),
        );
        assert_eq!(book.price("ZERO"), None);
        assert_eq!(book.price("NAN"), None);
        assert_eq!(book.price("MISSING"), None);
        assert_eq!(book.prices().len(), 1);
    }

    #[test]
    fn simulated_market_stays_positive() {
        let mut market = SimulatedMarket::new(SimulatedMarket::DEFAULT_UNIVERSE, StdRng::seed_from_u64(9));
        let mut last = HashMap::new();
        for _ in 0..500 {
            last = market.step(Utc::now());
        }
        assert_eq!(last.len(), SimulatedMarket::DEFAULT_UNIVERSE.len());
        assert!(last.values().all(|q| q.is_usable() && q.low_24h <= q.price && q.price <= q.high_24h));
    }

    #[test]
    fn perturb_is_bounded() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..1000 {
            let p = perturb(&mut rng, 100.0, 0.0003);
            assert!((99.969..=100.031).contains(&p));
        }
        assert_eq!(perturb(&mut rng, 100.0, 0.0), 100.0);
    }

    #[test]
    fn gecko_payload_maps_ids_to_symbols() {
        let body: HashMap<String, GeckoQuote> = serde_json::from_str(
            r#"{"bitcoin":{"usd":98000.5,"usd_24h_change":1.5},"solana":{"usd":null}}"#,
        )
        .unwrap();
        let quotes = parse_gecko(body, Utc::now());
        assert_eq!(quotes.len(), 1);
        let btc = &quotes["BTC"];
        assert_eq!(btc.price, 98000.5);
        assert_eq!(btc.high_24h, 98000.5);
        assert_eq!(btc.change_24h, 1.5);
    }

    #[test]
    fn book_tracks_rolling_high_low() {
        let start = Utc::now();
        let mut book = PriceBook::new("test");
        for (minutes, price) in [(0, 100.0), (10, 104.0), (20, 97.0), (30, 101.0)] {
            let at = start + TimeDelta::minutes(minutes);
            book.apply(HashMap::from([("BTC".to_string(), quote("BTC", price))]), at);
        }
        let btc = book.quote("BTC").unwrap();
        assert_eq!(btc.price, 101.0);
        assert_eq!(btc.high_24h, 104.0);
        assert_eq!(btc.low_24h, 97.0);

        // A day later the range starts over from the new quote.
        let later = start + TimeDelta::hours(25);
        book.apply(HashMap::from([("BTC".to_string(), quote("BTC", 99.0))]), later);
        let btc = book.quote("BTC").unwrap();
        assert_eq!((btc.low_24h, btc.high_24h), (99.0, 99.0));
    }
}
