//! # config
//!
//! Runtime configuration, read once at startup from the environment (after
//! `.env` is loaded).
//!
//! | Variable                 | Default                             |
//! |--------------------------|-------------------------------------|
//! | `BIND_ADDR`              | `0.0.0.0:3000`                      |
//! | `PRICE_SOURCE`           | `coingecko` (`simulated` offline)   |
//! | `COINGECKO_URL`          | `https://api.coingecko.com`         |
//! | `PRICE_REFRESH_SECS`     | `30`                                |
//! | `MARK_TICK_MS`           | `1500`                              |
//! | `MARK_VOLATILITY`        | `0.0003`                            |
//! | `AGENT_TICK_MS`          | `1000`                              |
//! | `ACTION_INTERVAL_SECS`   | `4`                                 |
//! | `ANALYSIS_INTERVAL_SECS` | `15`                                |
//! | `SIGNAL_INTERVAL_SECS`   | `25`                                |
//! | `EQUITY_SAMPLE_SECS`     | `5`                                 |
//! | `MAX_OPEN_POSITIONS`     | `4`                                 |
//! | `THOUGHT_LOG_CAP`        | `50`                                |
//! | `TRADE_HISTORY_CAP`      | `100`                               |
//! | `EQUITY_HISTORY_CAP`     | `60`                                |
//! | `STARTING_EQUITY`        | `5000`                              |
//! | `SEED_TRADES`            | `24`                                |

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context};

use crate::engine::agent::AgentCadence;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceSourceKind {
    CoinGecko,
    Simulated,
}

impl FromStr for PriceSourceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "coingecko" | "gecko" => Ok(PriceSourceKind::CoinGecko),
            "simulated" | "sim" | "offline" => Ok(PriceSourceKind::Simulated),
            other => bail!("unknown PRICE_SOURCE '{other}' (expected coingecko | simulated)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub bind_addr:          SocketAddr,
    pub price_source:       PriceSourceKind,
    pub coingecko_url:      String,
    pub price_refresh:      Duration,
    pub mark_tick:          Duration,
    pub mark_volatility:    f64,
    pub agent_tick:         Duration,
    pub action_interval:    Duration,
    pub analysis_interval:  Duration,
    pub signal_interval:    Duration,
    pub equity_sample:      Duration,
    pub max_open_positions: usize,
    pub thought_log_cap:    usize,
    pub trade_history_cap:  usize,
    pub equity_history_cap: usize,
    pub starting_equity:    f64,
    pub seed_trades:        usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            bind_addr:          SocketAddr::from(([0, 0, 0, 0], 3000)),
            price_source:       PriceSourceKind::CoinGecko,
            coingecko_url:      "https://api.coingecko.com".to_string(),
            price_refresh:      Duration::from_secs(30),
            mark_tick:          Duration::from_millis(1500),
            mark_volatility:    0.0003,
            agent_tick:         Duration::from_millis(1000),
            action_interval:    Duration::from_secs(4),
            analysis_interval:  Duration::from_secs(15),
            signal_interval:    Duration::from_secs(25),
            equity_sample:      Duration::from_secs(5),
            max_open_positions: 4,
            thought_log_cap:    50,
            trade_history_cap:  100,
            equity_history_cap: 60,
            starting_equity:    5000.0,
            seed_trades:        24,
        }
    }
}

impl SimConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let d = Self::default();

        let bind_addr = match std::env::var("BIND_ADDR") {
            Ok(raw) => raw.parse().with_context(|| format!("invalid BIND_ADDR '{raw}'"))?,
            Err(_) => d.bind_addr,
        };
        let price_source = match std::env::var("PRICE_SOURCE") {
            Ok(raw) => raw.parse()?,
            Err(_) => d.price_source,
        };

        let config = Self {
            bind_addr,
            price_source,
            coingecko_url:      std::env::var("COINGECKO_URL").unwrap_or(d.coingecko_url),
            price_refresh:      Duration::from_secs(env_u64("PRICE_REFRESH_SECS", 30)),
            mark_tick:          Duration::from_millis(env_u64("MARK_TICK_MS", 1500)),
            mark_volatility:    env_f64("MARK_VOLATILITY", d.mark_volatility),
            agent_tick:         Duration::from_millis(env_u64("AGENT_TICK_MS", 1000)),
            action_interval:    Duration::from_secs(env_u64("ACTION_INTERVAL_SECS", 4)),
            analysis_interval:  Duration::from_secs(env_u64("ANALYSIS_INTERVAL_SECS", 15)),
            signal_interval:    Duration::from_secs(env_u64("SIGNAL_INTERVAL_SECS", 25)),
            equity_sample:      Duration::from_secs(env_u64("EQUITY_SAMPLE_SECS", 5)),
            max_open_positions: env_usize("MAX_OPEN_POSITIONS", d.max_open_positions),
            thought_log_cap:    env_usize("THOUGHT_LOG_CAP", d.thought_log_cap),
            trade_history_cap:  env_usize("TRADE_HISTORY_CAP", d.trade_history_cap),
            equity_history_cap: env_usize("EQUITY_HISTORY_CAP", d.equity_history_cap),
            starting_equity:    env_f64("STARTING_EQUITY", d.starting_equity),
            seed_trades:        env_usize("SEED_TRADES", d.seed_trades),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let intervals = [
            ("PRICE_REFRESH_SECS", self.price_refresh),
            ("MARK_TICK_MS", self.mark_tick),
            ("AGENT_TICK_MS", self.agent_tick),
            ("ACTION_INTERVAL_SECS", self.action_interval),
            ("ANALYSIS_INTERVAL_SECS", self.analysis_interval),
            ("SIGNAL_INTERVAL_SECS", self.signal_interval),
            ("EQUITY_SAMPLE_SECS", self.equity_sample),
        ];
        for (key, value) in intervals {
            if value.is_zero() {
                bail!("{key} must be greater than zero");
            }
        }
        if !(self.mark_volatility.is_finite() && (0.0..0.5).contains(&self.mark_volatility)) {
            bail!("MARK_VOLATILITY must be in [0, 0.5), got {}", self.mark_volatility);
        }
        if !(self.starting_equity.is_finite() && self.starting_equity > 0.0) {
            bail!("STARTING_EQUITY must be positive, got {}", self.starting_equity);
        }
        for (key, cap) in [
            ("THOUGHT_LOG_CAP", self.thought_log_cap),
            ("TRADE_HISTORY_CAP", self.trade_history_cap),
            ("EQUITY_HISTORY_CAP", self.equity_history_cap),
        ] {
            if cap == 0 {
                bail!("{key} must be at least 1");
            }
        }
        if self.price_source == PriceSourceKind::CoinGecko && self.coingecko_url.trim().is_empty() {
            bail!("COINGECKO_URL is empty");
        }
        Ok(())
    }

    pub fn cadence(&self) -> AgentCadence {
        AgentCadence {
            action:        to_chrono(self.action_interval),
            analysis:      to_chrono(self.analysis_interval),
            signal:        to_chrono(self.signal_interval),
            max_positions: self.max_open_positions,
        }
    }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::MAX)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SimConfig::default();
        config.validate().unwrap();
        assert_eq!(config.cadence().signal, chrono::Duration::seconds(25));
        assert_eq!(config.cadence().max_positions, 4);
    }

    #[test]
    fn rejects_bad_values() {
        let zero_tick = SimConfig { mark_tick: Duration::ZERO, ..SimConfig::default() };
        assert!(zero_tick.validate().is_err());

        let broke = SimConfig { starting_equity: -1.0, ..SimConfig::default() };
        assert!(broke.validate().is_err());

        let wild = SimConfig { mark_volatility: f64::NAN, ..SimConfig::default() };
        assert!(wild.validate().is_err());

        let no_log = SimConfig { thought_log_cap: 0, ..SimConfig::default() };
        assert!(no_log.validate().is_err());
    }

    #[test]
    fn parses_price_source() {
        assert_eq!("CoinGecko".parse::<PriceSourceKind>().unwrap(), PriceSourceKind::CoinGecko);
        assert_eq!(" simulated ".parse::<PriceSourceKind>().unwrap(), PriceSourceKind::Simulated);
        assert!("binance".parse::<PriceSourceKind>().is_err());
    }
}
