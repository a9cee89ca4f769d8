use clap::{Parser, ValueEnum};
use rsibot::api::{BinanceClient, ExchangeApi, KlineEvents, KlineStream};
use rsibot::execution::TradeExecutor;
use rsibot::BotConfig;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

const RECONNECT_INITIAL: Duration = Duration::from_secs(1);
const RECONNECT_MAX: Duration = Duration::from_secs(300);

#[derive(Debug, Parser)]
#[command(name = "rsibot", about = "RSI threshold trader for one Binance spot symbol")]
struct Cli {
    /// How candle closes reach the bot
    #[arg(value_enum, default_value_t = Mode::Poll)]
    mode: Mode,

    /// Evaluate and log decisions without submitting orders
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Fetch recent candles on a fixed interval
    Poll,
    /// React to closed candles pushed over the market websocket
    Stream,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();
    let config = BotConfig::from_env()?;

    tracing::info!("rsibot starting in {:?} mode", cli.mode);
    tracing::info!("  Symbol: {}", config.symbol);
    tracing::info!(
        "  RSI: period {}, buy <= {}, sell >= {}",
        config.rsi_period,
        config.oversold,
        config.overbought
    );
    tracing::info!("  Buy quantity: {}", config.buy_quantity);
    tracing::info!(
        "  Candles: {} interval, {} per fetch",
        config.kline_interval,
        config.fetch_count
    );
    if cli.dry_run {
        tracing::info!("  Dry run: orders will be logged, not submitted");
    }

    let api = BinanceClient::new(
        config.api_key.clone(),
        config.api_secret.clone(),
        config.kline_interval.clone(),
    );
    let mut executor = TradeExecutor::new(
        api,
        config.symbol.clone(),
        config.buy_quantity,
        config.policy(),
        config.fetch_count,
        cli.dry_run,
    );

    match cli.mode {
        Mode::Poll => run_polling(&mut executor, config.poll_interval).await,
        Mode::Stream => run_streaming(&mut executor, &config).await,
    }

    tracing::info!("rsibot stopped");
    Ok(())
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("rsibot=info")),
        )
        .init();
}

/// Evaluate on a fixed timer, skipping ticks that back up
async fn run_polling<A: ExchangeApi>(executor: &mut TradeExecutor<A>, poll_interval: Duration) {
    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let outcome = executor.tick().await;
                tracing::debug!("Tick outcome: {:?}", outcome);
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C, shutting down");
                return;
            }
        }
    }
}

/// React to closed candles from the websocket, reconnecting on drops
async fn run_streaming<A: ExchangeApi>(executor: &mut TradeExecutor<A>, config: &BotConfig) {
    if let Err(err) = executor.warmup().await {
        tracing::warn!("History warm-up failed, filling from live closes: {}", err);
    }

    let stream = KlineStream::new(&config.symbol, &config.kline_interval);
    let mut backoff = RECONNECT_INITIAL;

    loop {
        tokio::select! {
            connected = stream.connect() => match connected {
                Ok(mut events) => {
                    tracing::info!("Connected to {}", stream.endpoint());
                    backoff = RECONNECT_INITIAL;
                    if !consume_events(executor, &mut events).await {
                        return;
                    }
                }
                Err(err) => {
                    tracing::warn!("Connect to {} failed: {}", stream.endpoint(), err);
                }
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C, shutting down");
                return;
            }
        }

        tracing::info!("Reconnecting in {:?}", backoff);
        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(RECONNECT_MAX);
    }
}

/// Drain one connection; false means shutdown was requested
async fn consume_events<A: ExchangeApi>(
    executor: &mut TradeExecutor<A>,
    events: &mut KlineEvents,
) -> bool {
    loop {
        tokio::select! {
            next = events.next_close() => match next {
                Ok(Some(kline)) => {
                    if let Some(outcome) = executor.on_close(&kline).await {
                        tracing::debug!("Close outcome: {:?}", outcome);
                    }
                }
                Ok(None) => {
                    tracing::warn!("Stream closed by server");
                    return true;
                }
                Err(err) => {
                    tracing::warn!("Stream error: {}", err);
                    return true;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C, shutting down");
                return false;
            }
        }
    }
}
