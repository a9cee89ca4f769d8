use chrono::{TimeZone, Utc};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::BotError;
use crate::models::Kline;
use crate::Result;

const BINANCE_WS_BASE: &str = "wss://stream.binance.com:9443/ws";

/// Market-data websocket for one symbol's candle channel
///
/// The channel emits an update for the open candle every couple of
/// seconds and a last update with the final flag set when the candle
/// closes. Consumers decide which of those they care about; this
/// layer only decodes.
pub struct KlineStream {
    endpoint: String,
}

// ============== Wire Types ==============

#[derive(Debug, Deserialize)]
struct KlineEventRaw {
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "k")]
    kline: KlinePayloadRaw,
}

#[derive(Debug, Deserialize)]
struct KlinePayloadRaw {
    #[serde(rename = "t")]
    open_time_ms: i64,
    #[serde(rename = "c")]
    close: String,
    #[serde(rename = "x")]
    is_final: bool,
}

fn parse_event(text: &str) -> Result<Kline> {
    let raw: KlineEventRaw = serde_json::from_str(text)?;

    let close = raw
        .kline
        .close
        .parse::<f64>()
        .map_err(|_| BotError::Upstream(format!("decode failed: close {:?}", raw.kline.close)))?;

    let open_time = Utc
        .timestamp_millis_opt(raw.kline.open_time_ms)
        .single()
        .ok_or_else(|| {
            BotError::Upstream(format!(
                "decode failed: open time {} out of range",
                raw.kline.open_time_ms
            ))
        })?;

    Ok(Kline {
        symbol: raw.symbol,
        open_time,
        close,
        is_final: raw.kline.is_final,
    })
}

// ============== Implementation ==============

impl KlineStream {
    pub fn new(symbol: &str, interval: &str) -> Self {
        Self {
            endpoint: format!(
                "{}/{}@kline_{}",
                BINANCE_WS_BASE,
                symbol.to_lowercase(),
                interval
            ),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn connect(&self) -> Result<KlineEvents> {
        let (socket, _response) = connect_async(&self.endpoint).await?;
        Ok(KlineEvents { socket })
    }
}

/// An open kline subscription
pub struct KlineEvents {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl KlineEvents {
    /// Next candle event, answering pings along the way
    ///
    /// Returns `Ok(None)` when the server closes the connection; the
    /// caller reconnects.
    pub async fn next_close(&mut self) -> Result<Option<Kline>> {
        while let Some(message) = self.socket.next().await {
            match message? {
                Message::Text(text) => return parse_event(&text).map(Some),
                Message::Ping(payload) => self.socket.send(Message::Pong(payload)).await?,
                Message::Close(_) => return Ok(None),
                _ => {}
            }
        }
        Ok(None)
    }
}
