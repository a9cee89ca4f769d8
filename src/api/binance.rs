use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;

use crate::error::BotError;
use crate::execution::sizer;
use crate::models::{OrderReceipt, OrderSide, SymbolFilters};
use crate::api::ExchangeApi;
use crate::Result;

const BINANCE_API_BASE: &str = "https://api.binance.com";
const API_KEY_HEADER: &str = "X-MBX-APIKEY";

/// Client for the Binance spot REST API
///
/// Market-data endpoints are public; account and order endpoints
/// carry an HMAC-SHA256 signature over the query string plus a
/// millisecond timestamp.
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    kline_interval: String,
}

// ============== Response Types ==============

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeInfoResponse {
    symbols: Vec<SymbolInfoRaw>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolInfoRaw {
    symbol: String,
    base_asset: String,
    quote_asset: String,
    filters: Vec<SymbolFilterRaw>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolFilterRaw {
    filter_type: String,
    #[serde(default)]
    step_size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    balances: Vec<BalanceRaw>,
}

#[derive(Debug, Deserialize)]
struct BalanceRaw {
    asset: String,
    free: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    symbol: String,
    order_id: u64,
    client_order_id: String,
    executed_qty: String,
    status: String,
    side: OrderSide,
}

// ============== Implementation ==============

impl BinanceClient {
    pub fn new(api_key: String, api_secret: String, kline_interval: String) -> Self {
        Self::with_base_url(api_key, api_secret, kline_interval, BINANCE_API_BASE.to_string())
    }

    pub fn with_base_url(
        api_key: String,
        api_secret: String,
        kline_interval: String,
        base_url: String,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
            api_secret,
            kline_interval,
        }
    }

    fn sign(&self, query: &str) -> Result<String> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.api_secret.as_bytes())
            .map_err(|_| BotError::ConfigInvalid("API secret rejected by HMAC".to_string()))?;
        mac.update(query.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Append the timestamp, sign the full query, build the final URL
    ///
    /// The signature covers exactly the query string the exchange
    /// sees, signature parameter excluded.
    fn signed_url(&self, path: &str, query: &str) -> Result<String> {
        let timestamp = Utc::now().timestamp_millis();
        let query = if query.is_empty() {
            format!("timestamp={timestamp}")
        } else {
            format!("{query}&timestamp={timestamp}")
        };
        let signature = self.sign(&query)?;
        Ok(format!(
            "{}{}?{}&signature={}",
            self.base_url, path, query, signature
        ))
    }
}

async fn into_checked(path: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(BotError::Upstream(format!(
            "{path} returned {status}: {body}"
        )));
    }
    Ok(response)
}

fn parse_decimal(raw: &str, field: &str) -> Result<f64> {
    raw.parse::<f64>().map_err(|_| {
        BotError::Upstream(format!("decode failed: {field} {raw:?} is not a number"))
    })
}

#[async_trait]
impl ExchangeApi for BinanceClient {
    /// Endpoint: GET /api/v3/klines?symbol={symbol}&interval={interval}&limit={count}
    ///
    /// Rows arrive as mixed-type arrays; the close price sits at
    /// index 4 as a decimal string. Only closed candles appear here,
    /// so every row participates.
    async fn fetch_recent_closes(&self, symbol: &str, count: usize) -> Result<Vec<f64>> {
        let url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.base_url, symbol, self.kline_interval, count
        );

        let response = into_checked("/api/v3/klines", self.client.get(&url).send().await?).await?;
        let rows: Vec<Vec<serde_json::Value>> = response.json().await?;

        let mut closes = Vec::with_capacity(rows.len());
        for row in &rows {
            let raw = row
                .get(4)
                .and_then(|v| v.as_str())
                .ok_or_else(|| BotError::Upstream("kline row missing close".to_string()))?;
            closes.push(parse_decimal(raw, "close")?);
        }
        Ok(closes)
    }

    /// Endpoint: GET /api/v3/account (signed)
    async fn get_available_balance(&self, asset: &str) -> Result<f64> {
        let url = self.signed_url("/api/v3/account", "")?;

        let response = into_checked(
            "/api/v3/account",
            self.client
                .get(&url)
                .header(API_KEY_HEADER, &self.api_key)
                .send()
                .await?,
        )
        .await?;
        let account: AccountResponse = response.json().await?;

        let balance = account
            .balances
            .iter()
            .find(|b| b.asset == asset)
            .ok_or_else(|| BotError::AssetNotFound(asset.to_string()))?;
        parse_decimal(&balance.free, "free")
    }

    /// Endpoint: GET /api/v3/exchangeInfo?symbol={symbol}
    async fn get_symbol_filters(&self, symbol: &str) -> Result<SymbolFilters> {
        let url = format!("{}/api/v3/exchangeInfo?symbol={}", self.base_url, symbol);

        let response =
            into_checked("/api/v3/exchangeInfo", self.client.get(&url).send().await?).await?;
        let info: ExchangeInfoResponse = response.json().await?;

        let sym = info
            .symbols
            .into_iter()
            .find(|s| s.symbol == symbol)
            .ok_or_else(|| BotError::FilterNotFound(symbol.to_string()))?;

        let step_raw = sym
            .filters
            .iter()
            .find(|f| f.filter_type == "LOT_SIZE")
            .and_then(|f| f.step_size.as_deref())
            .ok_or_else(|| BotError::FilterNotFound(symbol.to_string()))?;

        let lot_step = parse_decimal(step_raw, "stepSize")?;
        if lot_step <= 0.0 {
            return Err(BotError::Upstream(format!(
                "LOT_SIZE step {step_raw} for {symbol} is not positive"
            )));
        }

        Ok(SymbolFilters {
            symbol: sym.symbol,
            base_asset: sym.base_asset,
            quote_asset: sym.quote_asset,
            lot_step,
        })
    }

    /// Endpoint: POST /api/v3/order (signed)
    ///
    /// Quantity is printed at the lot-step precision so the exchange
    /// never sees more decimals than the filter allows. Each order
    /// carries a fresh client order id for log correlation.
    async fn submit_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: f64,
        lot_step: f64,
    ) -> Result<OrderReceipt> {
        let client_order_id = uuid::Uuid::new_v4().to_string();
        let query = format!(
            "symbol={}&side={}&type=MARKET&quantity={}&newClientOrderId={}",
            symbol,
            side.as_str(),
            sizer::format_quantity(quantity, lot_step),
            client_order_id
        );
        let url = self.signed_url("/api/v3/order", &query)?;

        let response = into_checked(
            "/api/v3/order",
            self.client
                .post(&url)
                .header(API_KEY_HEADER, &self.api_key)
                .send()
                .await?,
        )
        .await?;
        let order: OrderResponse = response.json().await?;

        Ok(OrderReceipt {
            order_id: order.order_id,
            client_order_id: order.client_order_id,
            symbol: order.symbol,
            side: order.side,
            executed_qty: parse_decimal(&order.executed_qty, "executedQty")?,
            status: order.status,
        })
    }
}
