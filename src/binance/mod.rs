// =============================================================================
// Binance USDⓈ-M futures access: REST client, request budget, retry policy and
// the all-market ticker stream.
// =============================================================================

pub mod client;
pub mod rate_limit;
pub mod retry;
pub mod ticker_stream;

pub use client::{BinanceFuturesClient, ExchangeClient};
pub use rate_limit::RequestBudget;
pub use retry::RetryPolicy;
pub use ticker_stream::{StreamEvent, StreamSettings, TickerStream};

use anyhow::{Context, Result};

/// Binance sends most numeric values as JSON strings; accept either form.
pub(crate) fn parse_string_f64(val: &serde_json::Value, name: &str) -> Result<f64> {
    match val {
        serde_json::Value::String(s) => s
            .parse::<f64>()
            .with_context(|| format!("failed to parse {name} as f64: {s}")),
        serde_json::Value::Number(n) => n
            .as_f64()
            .with_context(|| format!("field {name} is not a valid f64")),
        _ => anyhow::bail!("field {name} has unexpected JSON type"),
    }
}
