use crate::error::BotError;
use crate::Result;
use std::collections::VecDeque;

/// Rolling window of closing prices
///
/// Holds the most recent `capacity` closes in arrival order. The
/// capacity is fixed at construction to `period + 1`, the minimum
/// history the indicator needs.
#[derive(Debug, Clone)]
pub struct PriceWindow {
    closes: VecDeque<f64>,
    capacity: usize,
}

impl PriceWindow {
    pub fn new(period: usize) -> Self {
        let capacity = period + 1;
        Self {
            closes: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    /// True once the window holds enough closes to evaluate
    pub fn is_warm(&self) -> bool {
        self.closes.len() >= self.capacity
    }

    /// Append one close, evicting the oldest when full
    pub fn push(&mut self, close: f64) {
        self.closes.push_back(close);
        while self.closes.len() > self.capacity {
            self.closes.pop_front();
        }
    }

    /// Replace the contents with the tail of the given history
    pub fn seed(&mut self, closes: &[f64]) {
        self.closes.clear();
        let start = closes.len().saturating_sub(self.capacity);
        self.closes.extend(&closes[start..]);
    }

    /// Copy of the window contents, oldest first
    ///
    /// Fails until the window is warm so callers never evaluate a
    /// partial history.
    pub fn snapshot(&self) -> Result<Vec<f64>> {
        if !self.is_warm() {
            return Err(BotError::InsufficientData {
                have: self.closes.len(),
                need: self.capacity,
            });
        }
        Ok(self.closes.iter().copied().collect())
    }
}
