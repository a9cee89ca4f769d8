use crate::error::BotError;
use crate::Result;

/// Incremental Relative Strength Index (RSI)
///
/// RSI measures the magnitude of recent price changes to evaluate
/// overbought or oversold conditions.
///
/// Values:
/// - RSI > 69: Overbought
/// - RSI < 30: Oversold
///
/// The averages are seeded with the unweighted mean of the first
/// `period` gains and losses; every later delta is folded in with
/// Wilder smoothing: `avg = (avg * (period - 1) + x) / period`.
///
/// Feeding closes one at a time produces the same value as a single
/// [`evaluate`] call over the equivalent history, since both walk the
/// identical recurrence.
///
/// When `avg_loss` is zero the index reports 100. A fully flat series
/// has zero average gain AND loss and still reports 100 through the
/// same branch; callers that care should treat it as extreme
/// overbought, not as undefined.
#[derive(Debug, Clone, PartialEq)]
pub struct RsiEngine {
    period: usize,
    last_close: Option<f64>,
    seed_gain_sum: f64,
    seed_loss_sum: f64,
    deltas_seen: usize,
    avg_gain: f64,
    avg_loss: f64,
}

impl RsiEngine {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            last_close: None,
            seed_gain_sum: 0.0,
            seed_loss_sum: 0.0,
            deltas_seen: 0,
            avg_gain: 0.0,
            avg_loss: 0.0,
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Number of closes observed since the last reset
    pub fn closes_seen(&self) -> usize {
        self.deltas_seen + usize::from(self.last_close.is_some())
    }

    /// True once enough closes have been folded in to report a value
    pub fn is_warm(&self) -> bool {
        self.deltas_seen >= self.period
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.period);
    }

    /// Fold one closing price into the running averages
    pub fn update(&mut self, close: f64) {
        let last = match self.last_close.replace(close) {
            Some(last) => last,
            None => return,
        };

        let delta = close - last;
        let gain = delta.max(0.0);
        let loss = (-delta).max(0.0);
        self.deltas_seen += 1;

        if self.deltas_seen <= self.period {
            self.seed_gain_sum += gain;
            self.seed_loss_sum += loss;
            if self.deltas_seen == self.period {
                self.avg_gain = self.seed_gain_sum / self.period as f64;
                self.avg_loss = self.seed_loss_sum / self.period as f64;
            }
        } else {
            let p = self.period as f64;
            self.avg_gain = (self.avg_gain * (p - 1.0) + gain) / p;
            self.avg_loss = (self.avg_loss * (p - 1.0) + loss) / p;
        }
    }

    /// Replace the engine state with the given price history
    pub fn seed(&mut self, closes: &[f64]) {
        self.reset();
        for &close in closes {
            self.update(close);
        }
    }

    /// Current RSI in [0, 100]
    ///
    /// Fails with `InsufficientData` until `period + 1` closes have
    /// been observed.
    pub fn value(&self) -> Result<f64> {
        if !self.is_warm() {
            return Err(BotError::InsufficientData {
                have: self.closes_seen(),
                need: self.period + 1,
            });
        }

        if self.avg_loss == 0.0 {
            return Ok(100.0);
        }

        let rs = self.avg_gain / self.avg_loss;
        Ok(100.0 - (100.0 / (1.0 + rs)))
    }
}

/// Evaluate RSI over a full window of closing prices
///
/// Requires at least `period + 1` closes. Windows longer than that
/// fold the extra deltas through the Wilder recurrence, matching what
/// an engine fed the same history one close at a time would report.
pub fn evaluate(closes: &[f64], period: usize) -> Result<f64> {
    if closes.len() < period + 1 {
        return Err(BotError::InsufficientData {
            have: closes.len(),
            need: period + 1,
        });
    }

    let mut engine = RsiEngine::new(period);
    engine.seed(closes);
    engine.value()
}
