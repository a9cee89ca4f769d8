use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trading signal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

/// Order side as the exchange expects it
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

/// One candle from the market-data feed
///
/// Only the closing price participates in the indicator; `is_final`
/// marks a closed trading period. Live streams also emit updates for
/// the still-open candle, which must not enter the price window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Kline {
    pub symbol: String,
    pub open_time: DateTime<Utc>,
    pub close: f64,
    pub is_final: bool,
}

/// Per-symbol trading constraints from exchange info
///
/// Read-mostly reference data, refreshed on demand before each order.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolFilters {
    pub symbol: String,
    pub base_asset: String,
    pub quote_asset: String,
    /// Minimum increment an order quantity must be a multiple of
    pub lot_step: f64,
}

/// Acknowledgement returned by the exchange for a submitted order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderReceipt {
    pub order_id: u64,
    pub client_order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub executed_qty: f64,
    pub status: String,
}
