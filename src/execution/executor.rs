use crate::api::ExchangeApi;
use crate::error::BotError;
use crate::execution::price_window::PriceWindow;
use crate::execution::sizer;
use crate::indicators::{evaluate, RsiEngine};
use crate::models::{Kline, OrderReceipt, OrderSide, Signal};
use crate::strategy::ThresholdPolicy;
use crate::Result;

/// What one evaluation pass did
///
/// Every pass ends back in the idle state. A failure before the order
/// reaches the exchange is a skip; a failure of the submission itself
/// is reported separately so the operator can tell the two apart in
/// the logs.
#[derive(Debug)]
pub enum TickOutcome {
    Skipped { reason: String },
    OrderSubmitted { receipt: OrderReceipt },
    OrderFailed { error: BotError },
}

/// Drives one symbol through fetch, evaluate, decide, submit
///
/// Owns the price history and indicator state. Each tick or stream
/// event is processed to completion with at most one order attempt;
/// nothing is retried and no position state is carried between
/// passes.
pub struct TradeExecutor<A> {
    api: A,
    symbol: String,
    buy_quantity: f64,
    policy: ThresholdPolicy,
    window: PriceWindow,
    engine: RsiEngine,
    fetch_count: usize,
    dry_run: bool,
}

impl<A: ExchangeApi> TradeExecutor<A> {
    pub fn new(
        api: A,
        symbol: String,
        buy_quantity: f64,
        policy: ThresholdPolicy,
        fetch_count: usize,
        dry_run: bool,
    ) -> Self {
        let period = policy.rsi_period;
        Self {
            api,
            symbol,
            buy_quantity,
            policy,
            window: PriceWindow::new(period),
            engine: RsiEngine::new(period),
            fetch_count,
            dry_run,
        }
    }

    pub fn is_warm(&self) -> bool {
        self.window.is_warm()
    }

    /// Seed the price history from recent closed candles
    ///
    /// Called once before the streaming loop so the first live close
    /// can already produce a value. A failure here is not fatal: the
    /// window fills from live closes instead, just more slowly.
    pub async fn warmup(&mut self) -> Result<()> {
        let closes = self
            .api
            .fetch_recent_closes(&self.symbol, self.fetch_count)
            .await?;
        self.window.seed(&closes);
        self.engine.seed(&closes);
        tracing::info!(
            "Seeded {} closes for {}, indicator warm: {}",
            closes.len(),
            self.symbol,
            self.engine.is_warm()
        );
        Ok(())
    }

    /// One polling pass: fetch fresh history, evaluate, act
    ///
    /// Never fails; anything that goes wrong is logged and the pass
    /// is abandoned until the next tick.
    pub async fn tick(&mut self) -> TickOutcome {
        match self.poll_once().await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!("Tick abandoned: {}", err);
                TickOutcome::Skipped {
                    reason: err.to_string(),
                }
            }
        }
    }

    async fn poll_once(&mut self) -> Result<TickOutcome> {
        let closes = self
            .api
            .fetch_recent_closes(&self.symbol, self.fetch_count)
            .await?;
        self.window.seed(&closes);
        self.engine.seed(&closes);

        let rsi = evaluate(&closes, self.policy.rsi_period)?;
        let signal = self.policy.classify(rsi);
        tracing::info!("{}: RSI {:.2} over {} closes -> {:?}", self.symbol, rsi, closes.len(), signal);

        Ok(self.act(signal, rsi).await)
    }

    /// One stream event: fold in a closed candle, evaluate, act
    ///
    /// Updates for the still-open candle carry `is_final == false`
    /// and are dropped without touching the window.
    pub async fn on_close(&mut self, kline: &Kline) -> Option<TickOutcome> {
        if !kline.is_final {
            return None;
        }

        self.window.push(kline.close);
        self.engine.update(kline.close);

        let rsi = match self.engine.value() {
            Ok(rsi) => rsi,
            Err(err) => {
                tracing::info!("Warming up: {}", err);
                return Some(TickOutcome::Skipped {
                    reason: err.to_string(),
                });
            }
        };

        let signal = self.policy.classify(rsi);
        tracing::info!(
            "{}: close {} -> RSI {:.2} -> {:?}",
            kline.symbol,
            kline.close,
            rsi,
            signal
        );

        Some(self.act(signal, rsi).await)
    }

    async fn act(&mut self, signal: Signal, rsi: f64) -> TickOutcome {
        let side = match signal {
            Signal::Buy => OrderSide::Buy,
            Signal::Sell => OrderSide::Sell,
            Signal::Hold => {
                return TickOutcome::Skipped {
                    reason: format!("RSI {rsi:.2} inside neutral band"),
                }
            }
        };

        let (quantity, lot_step) = match self.order_quantity(side).await {
            Ok(pair) => pair,
            Err(err) => {
                tracing::warn!("{} order not placed: {}", side.as_str(), err);
                return TickOutcome::Skipped {
                    reason: err.to_string(),
                };
            }
        };

        if self.dry_run {
            tracing::info!(
                "[dry run] would submit {} {} {}",
                side.as_str(),
                sizer::format_quantity(quantity, lot_step),
                self.symbol
            );
            return TickOutcome::Skipped {
                reason: "dry run".to_string(),
            };
        }

        match self
            .api
            .submit_market_order(&self.symbol, side, quantity, lot_step)
            .await
        {
            Ok(receipt) => {
                tracing::info!(
                    "Order {} accepted: {} {} {}, status {}",
                    receipt.order_id,
                    receipt.side.as_str(),
                    receipt.executed_qty,
                    receipt.symbol,
                    receipt.status
                );
                TickOutcome::OrderSubmitted { receipt }
            }
            Err(error) => {
                tracing::error!("{} order failed: {}", side.as_str(), error);
                TickOutcome::OrderFailed { error }
            }
        }
    }

    /// Resolve the quantity and lot step for one order attempt
    ///
    /// Filters are fetched fresh each time. Buys spend the fixed
    /// configured quantity; sells liquidate the full base-asset
    /// balance floored to the lot step.
    async fn order_quantity(&self, side: OrderSide) -> Result<(f64, f64)> {
        let filters = self.api.get_symbol_filters(&self.symbol).await?;
        match side {
            OrderSide::Buy => Ok((sizer::size_buy(self.buy_quantity), filters.lot_step)),
            OrderSide::Sell => {
                let available = self.api.get_available_balance(&filters.base_asset).await?;
                let quantity = sizer::size_sell(available, filters.lot_step)?;
                Ok((quantity, filters.lot_step))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SymbolFilters;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::{Arc, Mutex};

    #[derive(Clone)]
    struct MockExchange {
        closes: Vec<f64>,
        balance: f64,
        lot_step: f64,
        fail_fetch: bool,
        fail_balance: bool,
        fail_submit: bool,
        submitted: Arc<Mutex<Vec<(OrderSide, f64)>>>,
    }

    impl MockExchange {
        fn new(closes: Vec<f64>) -> Self {
            Self {
                closes,
                balance: 0.1023,
                lot_step: 0.0001,
                fail_fetch: false,
                fail_balance: false,
                fail_submit: false,
                submitted: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn submitted(&self) -> Vec<(OrderSide, f64)> {
            self.submitted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ExchangeApi for MockExchange {
        async fn fetch_recent_closes(&self, _symbol: &str, count: usize) -> Result<Vec<f64>> {
            if self.fail_fetch {
                return Err(BotError::Upstream("klines down".to_string()));
            }
            let start = self.closes.len().saturating_sub(count);
            Ok(self.closes[start..].to_vec())
        }

        async fn get_available_balance(&self, _asset: &str) -> Result<f64> {
            if self.fail_balance {
                return Err(BotError::Upstream("account down".to_string()));
            }
            Ok(self.balance)
        }

        async fn get_symbol_filters(&self, symbol: &str) -> Result<SymbolFilters> {
            Ok(SymbolFilters {
                symbol: symbol.to_string(),
                base_asset: "BTC".to_string(),
                quote_asset: "USDT".to_string(),
                lot_step: self.lot_step,
            })
        }

        async fn submit_market_order(
            &self,
            symbol: &str,
            side: OrderSide,
            quantity: f64,
            _lot_step: f64,
        ) -> Result<OrderReceipt> {
            if self.fail_submit {
                return Err(BotError::Upstream("order rejected".to_string()));
            }
            self.submitted.lock().unwrap().push((side, quantity));
            Ok(OrderReceipt {
                order_id: 42,
                client_order_id: "test".to_string(),
                symbol: symbol.to_string(),
                side,
                executed_qty: quantity,
                status: "FILLED".to_string(),
            })
        }
    }

    fn executor(api: MockExchange) -> TradeExecutor<MockExchange> {
        TradeExecutor::new(
            api,
            "BTCUSDT".to_string(),
            0.0013,
            ThresholdPolicy::default(),
            100,
            false,
        )
    }

    fn rising(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64).collect()
    }

    fn falling(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 - i as f64 * 0.1).collect()
    }

    fn final_close(close: f64) -> Kline {
        Kline {
            symbol: "BTCUSDT".to_string(),
            open_time: Utc::now(),
            close,
            is_final: true,
        }
    }

    #[tokio::test]
    async fn test_sell_on_overbought_floors_balance() {
        let api = MockExchange::new(rising(20));
        let mut executor = executor(api.clone());

        let outcome = executor.tick().await;

        assert!(matches!(outcome, TickOutcome::OrderSubmitted { .. }));
        assert_eq!(api.submitted(), vec![(OrderSide::Sell, 0.1023)]);
    }

    #[tokio::test]
    async fn test_buy_on_oversold_uses_fixed_quantity() {
        let mut closes = vec![100.0; 5];
        closes.extend(falling(20));
        let api = MockExchange::new(closes);
        let mut executor = executor(api.clone());

        let outcome = executor.tick().await;

        assert!(matches!(outcome, TickOutcome::OrderSubmitted { .. }));
        assert_eq!(api.submitted(), vec![(OrderSide::Buy, 0.0013)]);
    }

    #[tokio::test]
    async fn test_neutral_rsi_holds() {
        // Alternating gains and losses keep RSI near 50.
        let closes: Vec<f64> = (0..30)
            .map(|i| 100.0 + if i % 2 == 0 { 1.0 } else { 0.0 })
            .collect();
        let api = MockExchange::new(closes);
        let mut executor = executor(api.clone());

        let outcome = executor.tick().await;

        assert!(matches!(outcome, TickOutcome::Skipped { .. }));
        assert!(api.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_skips_tick() {
        let mut api = MockExchange::new(rising(20));
        api.fail_fetch = true;
        let mut executor = executor(api.clone());

        let outcome = executor.tick().await;

        assert!(matches!(outcome, TickOutcome::Skipped { .. }));
        assert!(api.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_short_history_skips_tick() {
        let api = MockExchange::new(rising(5));
        let mut executor = executor(api.clone());

        let outcome = executor.tick().await;

        match outcome {
            TickOutcome::Skipped { reason } => assert!(reason.contains("insufficient data")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_balance_failure_skips_without_submit() {
        let mut api = MockExchange::new(rising(20));
        api.fail_balance = true;
        let mut executor = executor(api.clone());

        let outcome = executor.tick().await;

        assert!(matches!(outcome, TickOutcome::Skipped { .. }));
        assert!(api.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_dust_balance_skips_without_submit() {
        let mut api = MockExchange::new(rising(20));
        api.balance = 0.00003;
        let mut executor = executor(api.clone());

        let outcome = executor.tick().await;

        match outcome {
            TickOutcome::Skipped { reason } => assert!(reason.contains("insufficient balance")),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(api.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_submit_failure_reported_as_order_failed() {
        let mut api = MockExchange::new(rising(20));
        api.fail_submit = true;
        let mut executor = executor(api.clone());

        let outcome = executor.tick().await;

        assert!(matches!(
            outcome,
            TickOutcome::OrderFailed {
                error: BotError::Upstream(_)
            }
        ));
    }

    #[tokio::test]
    async fn test_dry_run_never_submits() {
        let api = MockExchange::new(rising(20));
        let mut executor = TradeExecutor::new(
            api.clone(),
            "BTCUSDT".to_string(),
            0.0013,
            ThresholdPolicy::default(),
            100,
            true,
        );

        let outcome = executor.tick().await;

        match outcome {
            TickOutcome::Skipped { reason } => assert_eq!(reason, "dry run"),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(api.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_open_candle_updates_are_dropped() {
        let api = MockExchange::new(rising(20));
        let mut executor = executor(api.clone());
        executor.warmup().await.unwrap();

        let mut kline = final_close(500.0);
        kline.is_final = false;

        assert!(executor.on_close(&kline).await.is_none());
        assert!(api.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_stream_close_after_warmup_trades() {
        let api = MockExchange::new(rising(20));
        let mut executor = executor(api.clone());
        executor.warmup().await.unwrap();
        assert!(executor.is_warm());

        let outcome = executor.on_close(&final_close(130.0)).await.unwrap();

        assert!(matches!(outcome, TickOutcome::OrderSubmitted { .. }));
        assert_eq!(api.submitted(), vec![(OrderSide::Sell, 0.1023)]);
    }

    #[tokio::test]
    async fn test_stream_stays_quiet_until_warm() {
        let api = MockExchange::new(Vec::new());
        let mut executor = executor(api.clone());

        for i in 0..14 {
            let outcome = executor.on_close(&final_close(100.0 + i as f64)).await;
            assert!(matches!(
                outcome,
                Some(TickOutcome::Skipped { .. })
            ));
        }
        assert!(api.submitted().is_empty());

        // The fifteenth close completes the window.
        let outcome = executor.on_close(&final_close(114.0)).await.unwrap();
        assert!(matches!(outcome, TickOutcome::OrderSubmitted { .. }));
    }

    #[tokio::test]
    async fn test_failed_tick_leaves_next_tick_clean() {
        let mut api = MockExchange::new(rising(20));
        api.fail_balance = true;
        let mut executor = executor(api.clone());

        let first = executor.tick().await;
        assert!(matches!(first, TickOutcome::Skipped { .. }));

        // Balance recovers; the next tick proceeds as if nothing happened.
        executor.api.fail_balance = false;
        let second = executor.tick().await;
        assert!(matches!(second, TickOutcome::OrderSubmitted { .. }));
    }
}
