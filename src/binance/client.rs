// =============================================================================
// Binance USDⓈ-M Futures REST Client: public market data under a budget
// =============================================================================
//
// Only public endpoints are used, so no request is signed. Every call:
//   1. fails fast if the exchange-reported weight is at the hard ceiling,
//   2. waits for room in the local rolling-window budget,
//   3. runs under a bounded timeout,
//   4. maps the HTTP status onto an `ExchangeError` class.
// =============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use super::parse_string_f64;
use super::rate_limit::{klines_weight, RequestBudget};
use super::ticker_stream::{self, StreamSettings, TickerStream};
use crate::error::ExchangeError;
use crate::market_data::{Candle, TickerUpdate};
use crate::runtime_config::ExchangeConfig;
use crate::shutdown::Shutdown;
use crate::types::{now_ms, Timeframe};

const EXCHANGE_INFO: &str = "/fapi/v1/exchangeInfo";
const KLINES: &str = "/fapi/v1/klines";
const TICKER_24H: &str = "/fapi/v1/ticker/24hr";

const EXCHANGE_INFO_WEIGHT: u32 = 1;
/// All-symbol 24h ticker.
const TICKER_24H_WEIGHT: u32 = 40;
/// Largest page the klines endpoint returns.
const KLINES_MAX_LIMIT: usize = 1500;

/// Market data capability consumed by the market data manager.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Tradable perpetual contracts.
    async fn list_symbols(&self) -> Result<BTreeSet<String>, ExchangeError>;

    /// Bars strictly ascending by open time.
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, ExchangeError>;

    /// 24h ticker for every symbol.
    async fn fetch_tickers(&self) -> Result<Vec<TickerUpdate>, ExchangeError>;

    /// Long-lived all-market ticker subscription.
    fn stream_tickers(&self, shutdown: Shutdown) -> TickerStream;
}

/// Binance USDⓈ-M futures implementation of [`ExchangeClient`].
pub struct BinanceFuturesClient {
    rest_url: String,
    ws_url: String,
    quote_asset: Option<String>,
    http: reqwest::Client,
    request_timeout: Duration,
    budget: Arc<RequestBudget>,
    stream: StreamSettings,
}

impl BinanceFuturesClient {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    pub fn new(cfg: &ExchangeConfig, quote_asset: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.request_timeout())
            .build()
            .context("failed to build reqwest client")?;

        debug!(rest_url = %cfg.rest_url, ws_url = %cfg.ws_url, "BinanceFuturesClient initialised");

        Ok(Self {
            rest_url: cfg.rest_url.trim_end_matches('/').to_string(),
            ws_url: cfg.ws_url.trim_end_matches('/').to_string(),
            quote_asset,
            http,
            request_timeout: cfg.request_timeout(),
            budget: Arc::new(RequestBudget::new(cfg.budget_weight, cfg.budget_window())),
            stream: StreamSettings::from_config(cfg),
        })
    }

    pub fn budget(&self) -> &Arc<RequestBudget> {
        &self.budget
    }

    // -------------------------------------------------------------------------
    // Request plumbing
    // -------------------------------------------------------------------------

    async fn get_json(
        &self,
        path: &str,
        query: &str,
        weight: u32,
    ) -> Result<serde_json::Value, ExchangeError> {
        if let Some(cooldown) = self.budget.server_cooldown() {
            return Err(ExchangeError::RateLimitExceeded {
                endpoint: path.to_string(),
                retry_after: Some(cooldown),
            });
        }
        self.budget.acquire(weight).await;

        let url = if query.is_empty() {
            format!("{}{}", self.rest_url, path)
        } else {
            format!("{}{}?{}", self.rest_url, path, query)
        };
        let timeout_err = || ExchangeError::Timeout {
            endpoint: path.to_string(),
            timeout_ms: self.request_timeout.as_millis() as u64,
        };

        let resp = match tokio::time::timeout(self.request_timeout, self.http.get(&url).send()).await {
            Err(_) => return Err(timeout_err()),
            Ok(Err(e)) => return Err(map_reqwest_error(path, self.request_timeout, e)),
            Ok(Ok(resp)) => resp,
        };

        self.budget.update_from_headers(resp.headers());
        let status = resp.status().as_u16();
        let retry_after = parse_retry_after(resp.headers());

        let body = match tokio::time::timeout(self.request_timeout, resp.text()).await {
            Err(_) => return Err(timeout_err()),
            Ok(Err(e)) => return Err(map_reqwest_error(path, self.request_timeout, e)),
            Ok(Ok(body)) => body,
        };

        if !(200..300).contains(&status) {
            return Err(classify_status(path, status, &body, retry_after));
        }

        serde_json::from_str(&body).map_err(|e| ExchangeError::Malformed {
            endpoint: path.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl ExchangeClient for BinanceFuturesClient {
    /// GET /fapi/v1/exchangeInfo: perpetual contracts in TRADING status.
    #[instrument(skip(self), name = "binance::list_symbols")]
    async fn list_symbols(&self) -> Result<BTreeSet<String>, ExchangeError> {
        let body = self.get_json(EXCHANGE_INFO, "", EXCHANGE_INFO_WEIGHT).await?;
        let symbols = parse_perpetual_symbols(&body, self.quote_asset.as_deref())
            .map_err(|e| malformed(EXCHANGE_INFO, e))?;
        debug!(count = symbols.len(), "perpetual symbols listed");
        Ok(symbols)
    }

    /// GET /fapi/v1/klines.
    #[instrument(skip(self), name = "binance::fetch_candles")]
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, ExchangeError> {
        let limit = limit.clamp(1, KLINES_MAX_LIMIT);
        let query = format!("symbol={symbol}&interval={}&limit={limit}", timeframe.as_str());
        let body = self.get_json(KLINES, &query, klines_weight(limit)).await?;
        let candles = parse_klines(&body, now_ms()).map_err(|e| malformed(KLINES, e))?;
        debug!(symbol, interval = %timeframe, count = candles.len(), "klines fetched");
        Ok(candles)
    }

    /// GET /fapi/v1/ticker/24hr for all symbols.
    #[instrument(skip(self), name = "binance::fetch_tickers")]
    async fn fetch_tickers(&self) -> Result<Vec<TickerUpdate>, ExchangeError> {
        let body = self.get_json(TICKER_24H, "", TICKER_24H_WEIGHT).await?;
        let tickers = parse_tickers_24h(&body).map_err(|e| malformed(TICKER_24H, e))?;
        debug!(count = tickers.len(), "24h tickers fetched");
        Ok(tickers)
    }

    fn stream_tickers(&self, shutdown: Shutdown) -> TickerStream {
        let url = format!("{}/ws/!ticker@arr", self.ws_url);
        ticker_stream::spawn(url, self.stream, shutdown)
    }
}

impl std::fmt::Debug for BinanceFuturesClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceFuturesClient")
            .field("rest_url", &self.rest_url)
            .field("ws_url", &self.ws_url)
            .field("quote_asset", &self.quote_asset)
            .field("budget", &self.budget)
            .finish()
    }
}

// =============================================================================
// Status classification
// =============================================================================

/// Map a non-success HTTP status (and Binance error code) onto an error class.
pub fn classify_status(
    endpoint: &str,
    status: u16,
    body: &str,
    retry_after: Option<Duration>,
) -> ExchangeError {
    let code = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("code").and_then(serde_json::Value::as_i64));
    let endpoint = endpoint.to_string();
    let snippet: String = body.chars().take(256).collect();

    match status {
        401 | 403 => ExchangeError::FatalAuth {
            endpoint,
            reason: format!("HTTP {status}: {snippet}"),
        },
        429 | 418 => ExchangeError::RateLimitExceeded {
            endpoint,
            retry_after,
        },
        500..=599 => ExchangeError::TransientNetwork {
            endpoint,
            reason: format!("HTTP {status}"),
        },
        _ if matches!(code, Some(-2014 | -2015 | -1022)) => ExchangeError::FatalAuth {
            endpoint,
            reason: format!("code {}: {snippet}", code.unwrap_or_default()),
        },
        _ => ExchangeError::Rejected {
            endpoint,
            status,
            body: snippet,
        },
    }
}

fn map_reqwest_error(endpoint: &str, timeout: Duration, e: reqwest::Error) -> ExchangeError {
    if e.is_timeout() {
        ExchangeError::Timeout {
            endpoint: endpoint.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }
    } else {
        ExchangeError::TransientNetwork {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        }
    }
}

fn malformed(endpoint: &str, e: anyhow::Error) -> ExchangeError {
    ExchangeError::Malformed {
        endpoint: endpoint.to_string(),
        reason: format!("{e:#}"),
    }
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

// =============================================================================
// Response parsing
// =============================================================================

/// Perpetual contracts in TRADING status, optionally for one quote asset.
pub fn parse_perpetual_symbols(
    body: &serde_json::Value,
    quote_asset: Option<&str>,
) -> Result<BTreeSet<String>> {
    let entries = body["symbols"]
        .as_array()
        .context("exchangeInfo response has no symbols array")?;

    let symbols = entries
        .iter()
        .filter(|s| s["contractType"].as_str() == Some("PERPETUAL"))
        .filter(|s| s["status"].as_str() == Some("TRADING"))
        .filter(|s| match quote_asset {
            Some(q) => s["quoteAsset"].as_str() == Some(q),
            None => true,
        })
        .filter_map(|s| s["symbol"].as_str().map(str::to_string))
        .collect();
    Ok(symbols)
}

/// Parse the klines array-of-arrays response.
///
/// Array indices:
///   [0] openTime, [1] open, [2] high, [3] low, [4] close, [5] volume,
///   [6] closeTime, [7] quoteAssetVolume, [8] numberOfTrades, ...
///
/// Malformed entries are skipped. The result is sorted by open time with
/// duplicates collapsed to the last occurrence.
pub fn parse_klines(body: &serde_json::Value, now_ms: i64) -> Result<Vec<Candle>> {
    let raw = body.as_array().context("klines response is not an array")?;

    let mut candles = Vec::with_capacity(raw.len());
    for entry in raw {
        match parse_kline_entry(entry, now_ms) {
            Ok(c) => candles.push(c),
            Err(e) => warn!(error = %e, "skipping malformed kline entry"),
        }
    }

    candles.sort_by_key(|c| c.open_time);
    let before = candles.len();
    candles.dedup_by(|later, earlier| {
        if later.open_time == earlier.open_time {
            *earlier = *later;
            true
        } else {
            false
        }
    });
    if candles.len() != before {
        debug!(removed = before - candles.len(), "duplicate klines collapsed");
    }
    Ok(candles)
}

fn parse_kline_entry(entry: &serde_json::Value, now_ms: i64) -> Result<Candle> {
    let arr = entry.as_array().context("kline entry is not an array")?;
    if arr.len() < 9 {
        anyhow::bail!("kline entry has {} elements", arr.len());
    }
    let close_time = arr[6].as_i64().context("closeTime is not an integer")?;
    Ok(Candle {
        open_time: arr[0].as_i64().context("openTime is not an integer")?,
        close_time,
        open: parse_string_f64(&arr[1], "open")?,
        high: parse_string_f64(&arr[2], "high")?,
        low: parse_string_f64(&arr[3], "low")?,
        close: parse_string_f64(&arr[4], "close")?,
        volume: parse_string_f64(&arr[5], "volume")?,
        quote_volume: parse_string_f64(&arr[7], "quoteVolume")?,
        trades_count: arr[8].as_u64().unwrap_or(0),
        is_closed: close_time < now_ms,
    })
}

/// Parse the all-symbol 24h ticker response. Malformed entries are skipped.
pub fn parse_tickers_24h(body: &serde_json::Value) -> Result<Vec<TickerUpdate>> {
    let raw = body.as_array().context("24hr ticker response is not an array")?;

    let mut tickers = Vec::with_capacity(raw.len());
    for entry in raw {
        let parsed = (|| -> Result<TickerUpdate> {
            Ok(TickerUpdate {
                symbol: entry["symbol"].as_str().context("missing symbol")?.to_string(),
                price: parse_string_f64(&entry["lastPrice"], "lastPrice")?,
                pct_change_1h: None,
                pct_change_24h: parse_string_f64(&entry["priceChangePercent"], "priceChangePercent")?,
                volume_24h: parse_string_f64(&entry["quoteVolume"], "quoteVolume")?,
                trade_count_24h: entry["count"].as_u64(),
                event_time: entry["closeTime"].as_i64().context("missing closeTime")?,
            })
        })();
        match parsed {
            Ok(t) => tickers.push(t),
            Err(e) => debug!(error = %e, "skipping malformed 24hr ticker entry"),
        }
    }
    Ok(tickers)
}
