use thiserror::Error;

/// Error taxonomy for the trading client.
///
/// `ConfigInvalid` is fatal at startup. Every other kind is recovered
/// locally: the current tick is logged and abandoned, and the loop
/// proceeds to the next tick or event without retry.
#[derive(Debug, Error)]
pub enum BotError {
    /// The price window does not yet hold enough closes to evaluate.
    #[error("insufficient data: {have} closes, need {need}")]
    InsufficientData { have: usize, need: usize },

    /// The available balance rounds down to zero at the lot step.
    #[error("insufficient balance: {available} rounds to zero at lot step {lot_step}")]
    InsufficientBalance { available: f64, lot_step: f64 },

    /// The account snapshot does not list the requested asset.
    #[error("asset {0} not found in account")]
    AssetNotFound(String),

    /// exchangeInfo carries no usable LOT_SIZE filter for the symbol.
    #[error("LOT_SIZE filter not found for {0}")]
    FilterNotFound(String),

    /// An exchange call failed or returned an unexpected shape.
    #[error("upstream unavailable: {0}")]
    Upstream(String),

    /// Missing secrets or nonsensical settings at startup.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),
}

impl From<reqwest::Error> for BotError {
    fn from(err: reqwest::Error) -> Self {
        BotError::Upstream(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for BotError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        BotError::Upstream(err.to_string())
    }
}

impl From<serde_json::Error> for BotError {
    fn from(err: serde_json::Error) -> Self {
        BotError::Upstream(format!("decode failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_condition() {
        let err = BotError::InsufficientData { have: 3, need: 15 };
        assert_eq!(err.to_string(), "insufficient data: 3 closes, need 15");

        let err = BotError::FilterNotFound("BTCUSDT".to_string());
        assert!(err.to_string().contains("LOT_SIZE"));
        assert!(err.to_string().contains("BTCUSDT"));
    }

    #[test]
    fn test_json_error_maps_to_upstream() {
        let bad: std::result::Result<f64, _> = serde_json::from_str("not json");
        let err: BotError = bad.unwrap_err().into();
        assert!(matches!(err, BotError::Upstream(_)));
    }
}
