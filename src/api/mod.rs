pub mod binance;
pub mod stream;

use async_trait::async_trait;

use crate::models::{OrderReceipt, OrderSide, SymbolFilters};
use crate::Result;

pub use binance::BinanceClient;
pub use stream::{KlineEvents, KlineStream};

/// Exchange operations the trading loop depends on
///
/// `BinanceClient` is the live implementation; tests substitute an
/// in-memory double.
#[async_trait]
pub trait ExchangeApi: Send + Sync {
    /// The most recent `count` closed candle prices, oldest first
    async fn fetch_recent_closes(&self, symbol: &str, count: usize) -> Result<Vec<f64>>;

    /// Free balance of one asset from the account snapshot
    async fn get_available_balance(&self, asset: &str) -> Result<f64>;

    /// Trading constraints for a symbol, fetched fresh on each call
    async fn get_symbol_filters(&self, symbol: &str) -> Result<SymbolFilters>;

    /// Submit a market order and return the exchange acknowledgement
    async fn submit_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: f64,
        lot_step: f64,
    ) -> Result<OrderReceipt>;
}
