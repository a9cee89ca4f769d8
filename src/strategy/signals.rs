use crate::error::BotError;
use crate::models::Signal;
use crate::Result;

/// Thresholds for the RSI decision rule
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdPolicy {
    pub rsi_period: usize,
    pub oversold: f64,
    pub overbought: f64,
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            oversold: 30.0,
            overbought: 69.0,
        }
    }
}

impl ThresholdPolicy {
    /// Reject settings under which the rule cannot behave sensibly
    ///
    /// Called once at startup. A policy where the oversold threshold
    /// meets or crosses the overbought one would classify a single
    /// RSI value as both Buy and Sell.
    pub fn validate(&self) -> Result<()> {
        if self.rsi_period < 2 {
            return Err(BotError::ConfigInvalid(format!(
                "RSI period must be at least 2, got {}",
                self.rsi_period
            )));
        }
        if !(0.0..=100.0).contains(&self.oversold) || !(0.0..=100.0).contains(&self.overbought) {
            return Err(BotError::ConfigInvalid(format!(
                "RSI thresholds must lie in [0, 100], got oversold={} overbought={}",
                self.oversold, self.overbought
            )));
        }
        if self.oversold >= self.overbought {
            return Err(BotError::ConfigInvalid(format!(
                "oversold threshold {} must be below overbought threshold {}",
                self.oversold, self.overbought
            )));
        }
        Ok(())
    }

    /// Map an RSI value onto a trading signal
    ///
    /// Buy wins at the boundary: with degenerate thresholds where a
    /// value satisfies both comparisons, the oversold branch is
    /// checked first. `validate` rejects such policies up front, so
    /// live configurations never reach that case.
    pub fn classify(&self, rsi: f64) -> Signal {
        if rsi <= self.oversold {
            Signal::Buy
        } else if rsi >= self.overbought {
            Signal::Sell
        } else {
            Signal::Hold
        }
    }

    /// Closes needed before the rule can fire
    pub fn closes_required(&self) -> usize {
        self.rsi_period + 1
    }
}
