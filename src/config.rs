use std::time::Duration;

use crate::error::BotError;
use crate::strategy::ThresholdPolicy;
use crate::Result;

const DEFAULT_SYMBOL: &str = "BTCUSDT";
const DEFAULT_BUY_QUANTITY: f64 = 0.0013;
const DEFAULT_RSI_PERIOD: usize = 14;
const DEFAULT_OVERSOLD: f64 = 30.0;
const DEFAULT_OVERBOUGHT: f64 = 69.0;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;
const DEFAULT_KLINE_INTERVAL: &str = "5m";
const MIN_FETCH_COUNT: usize = 100;

/// Runtime settings, read once from the environment at startup
///
/// Everything except the API credentials has a default matching the
/// production deployment. Invalid settings abort startup; nothing is
/// re-read while the bot runs.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub api_key: String,
    pub api_secret: String,
    pub symbol: String,
    pub buy_quantity: f64,
    pub rsi_period: usize,
    pub oversold: f64,
    pub overbought: f64,
    pub poll_interval: Duration,
    pub kline_interval: String,
    /// How many candles each poll or warm-up fetches; at least the
    /// indicator requirement, padded to a fuller history so the
    /// smoothed averages settle.
    pub fetch_count: usize,
}

impl BotConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = require(&lookup, "BINANCE_API_KEY")?;
        let api_secret = require(&lookup, "BINANCE_API_SECRET")?;
        let symbol = string_or(&lookup, "SYMBOL", DEFAULT_SYMBOL);
        let buy_quantity = parse_or(&lookup, "BUY_QUANTITY", DEFAULT_BUY_QUANTITY)?;
        let rsi_period = parse_or(&lookup, "RSI_PERIOD", DEFAULT_RSI_PERIOD)?;
        let oversold = parse_or(&lookup, "RSI_OVERSOLD", DEFAULT_OVERSOLD)?;
        let overbought = parse_or(&lookup, "RSI_OVERBOUGHT", DEFAULT_OVERBOUGHT)?;
        let poll_secs = parse_or(&lookup, "POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?;
        let kline_interval = string_or(&lookup, "KLINE_INTERVAL", DEFAULT_KLINE_INTERVAL);

        let config = Self {
            api_key,
            api_secret,
            symbol,
            buy_quantity,
            rsi_period,
            oversold,
            overbought,
            poll_interval: Duration::from_secs(poll_secs),
            kline_interval,
            fetch_count: MIN_FETCH_COUNT.max(rsi_period + 1),
        };
        config.validate()?;
        Ok(config)
    }

    /// The decision thresholds this configuration describes
    pub fn policy(&self) -> ThresholdPolicy {
        ThresholdPolicy {
            rsi_period: self.rsi_period,
            oversold: self.oversold,
            overbought: self.overbought,
        }
    }

    fn validate(&self) -> Result<()> {
        self.policy().validate()?;

        if self.symbol.is_empty() {
            return Err(BotError::ConfigInvalid("SYMBOL must not be empty".to_string()));
        }
        if !(self.buy_quantity.is_finite() && self.buy_quantity > 0.0) {
            return Err(BotError::ConfigInvalid(format!(
                "BUY_QUANTITY must be a positive number, got {}",
                self.buy_quantity
            )));
        }
        if self.poll_interval < Duration::from_secs(1) {
            return Err(BotError::ConfigInvalid(
                "POLL_INTERVAL_SECS must be at least 1".to_string(),
            ));
        }
        if self.kline_interval.is_empty() {
            return Err(BotError::ConfigInvalid(
                "KLINE_INTERVAL must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn require(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<String> {
    match lookup(name) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(BotError::ConfigInvalid(format!("{name} not set"))),
    }
}

fn string_or(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    match lookup(name) {
        Some(value) if !value.trim().is_empty() => value,
        _ => default.to_string(),
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T> {
    match lookup(name) {
        Some(raw) => raw.trim().parse().map_err(|_| {
            BotError::ConfigInvalid(format!("{name} has unparseable value {raw:?}"))
        }),
        None => Ok(default),
    }
}
