// =============================================================================
// All-market ticker stream: `<ws>/ws/!ticker@arr`
// =============================================================================
//
// A background task owns the WebSocket. It reconnects on its own with capped
// exponential delay and reports `Connected` / `Interrupted` to the consumer
// instead of failing. It exits on shutdown (closing the socket) or once the
// consumer drops its `TickerStream`.
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::parse_string_f64;
use crate::market_data::TickerUpdate;
use crate::runtime_config::ExchangeConfig;
use crate::shutdown::Shutdown;

/// Events delivered to the stream consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Connected,
    Tickers(Vec<TickerUpdate>),
    Interrupted { reason: String },
}

/// Reconnect and liveness settings.
#[derive(Debug, Clone, Copy)]
pub struct StreamSettings {
    pub reconnect_base: Duration,
    pub reconnect_max: Duration,
    /// No frame for this long counts as a dropped connection.
    pub idle_timeout: Duration,
}

impl StreamSettings {
    pub fn from_config(cfg: &ExchangeConfig) -> Self {
        Self {
            reconnect_base: Duration::from_millis(cfg.stream_reconnect_ms),
            reconnect_max: Duration::from_millis(cfg.stream_reconnect_max_ms),
            idle_timeout: Duration::from_secs(cfg.stream_idle_timeout_secs),
        }
    }

    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(31));
        self.reconnect_base
            .saturating_mul(factor)
            .min(self.reconnect_max)
    }
}

/// Consumer handle of the ticker stream.
#[derive(Debug)]
pub struct TickerStream {
    rx: mpsc::Receiver<StreamEvent>,
}

impl TickerStream {
    pub fn from_receiver(rx: mpsc::Receiver<StreamEvent>) -> Self {
        Self { rx }
    }

    /// Next event; `None` once the stream task has exited.
    pub async fn next(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }
}

/// Start the stream task for `url`.
pub fn spawn(url: String, settings: StreamSettings, shutdown: Shutdown) -> TickerStream {
    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(run(url, settings, shutdown, tx));
    TickerStream::from_receiver(rx)
}

enum SessionEnd {
    Shutdown,
    ReceiverGone,
    Dropped { reason: String, was_connected: bool },
}

async fn run(url: String, settings: StreamSettings, shutdown: Shutdown, tx: mpsc::Sender<StreamEvent>) {
    let mut attempt = 0u32;
    loop {
        match session(&url, &settings, &shutdown, &tx).await {
            SessionEnd::Shutdown => {
                info!("ticker stream stopped on shutdown");
                return;
            }
            SessionEnd::ReceiverGone => {
                debug!("ticker stream consumer gone, stopping");
                return;
            }
            SessionEnd::Dropped {
                reason,
                was_connected,
            } => {
                if was_connected {
                    attempt = 0;
                }
                let delay = settings.reconnect_delay(attempt);
                attempt = attempt.saturating_add(1);
                warn!(
                    reason = %reason,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "ticker stream interrupted, reconnecting"
                );
                if tx.send(StreamEvent::Interrupted { reason }).await.is_err() {
                    return;
                }
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}

async fn session(
    url: &str,
    settings: &StreamSettings,
    shutdown: &Shutdown,
    tx: &mpsc::Sender<StreamEvent>,
) -> SessionEnd {
    info!(url = %url, "connecting to ticker WebSocket");

    let connect = tokio::time::timeout(settings.idle_timeout, connect_async(url));
    let ws_stream = tokio::select! {
        _ = shutdown.cancelled() => return SessionEnd::Shutdown,
        r = connect => match r {
            Err(_) => {
                return SessionEnd::Dropped {
                    reason: "connect timed out".to_string(),
                    was_connected: false,
                }
            }
            Ok(Err(e)) => {
                return SessionEnd::Dropped {
                    reason: format!("connect failed: {e}"),
                    was_connected: false,
                }
            }
            Ok(Ok((ws, _response))) => ws,
        },
    };

    info!("ticker WebSocket connected");
    if tx.send(StreamEvent::Connected).await.is_err() {
        return SessionEnd::ReceiverGone;
    }

    let (mut write, mut read) = ws_stream.split();
    let dropped = |reason: String| SessionEnd::Dropped {
        reason,
        was_connected: true,
    };

    loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                return SessionEnd::Shutdown;
            }
            r = tokio::time::timeout(settings.idle_timeout, read.next()) => r,
        };

        match next {
            Err(_) => {
                return dropped(format!(
                    "no data for {}s",
                    settings.idle_timeout.as_secs()
                ))
            }
            Ok(None) => return dropped("stream ended".to_string()),
            Ok(Some(Err(e))) => return dropped(format!("read error: {e}")),
            Ok(Some(Ok(Message::Text(text)))) => match parse_ticker_message(&text) {
                Ok(updates) if updates.is_empty() => {}
                Ok(updates) => {
                    if tx.send(StreamEvent::Tickers(updates)).await.is_err() {
                        return SessionEnd::ReceiverGone;
                    }
                }
                Err(e) => warn!(error = %e, "failed to parse ticker message"),
            },
            Ok(Some(Ok(Message::Close(frame)))) => {
                return dropped(format!("server closed connection: {frame:?}"))
            }
            // Ping / Pong / Binary: tungstenite answers pings itself.
            Ok(Some(Ok(_))) => {}
        }
    }
}

/// Parse a ticker frame: an array of tickers, a single ticker, or either one
/// wrapped in a combined-stream `{ "stream", "data" }` envelope.
///
/// Entry shape:
/// ```json
/// { "e": "24hrTicker", "E": 1700000000000, "s": "BTCUSDT", "P": "2.31",
///   "c": "37020.10", "q": "4567890.12", "n": 150000 }
/// ```
pub fn parse_ticker_message(text: &str) -> Result<Vec<TickerUpdate>> {
    let root: serde_json::Value =
        serde_json::from_str(text).context("failed to parse ticker JSON")?;

    let data = if root.get("data").is_some() {
        &root["data"]
    } else {
        &root
    };

    match data {
        serde_json::Value::Array(entries) => {
            let mut out = Vec::with_capacity(entries.len());
            for entry in entries {
                match parse_stream_ticker(entry) {
                    Ok(t) => out.push(t),
                    Err(e) => debug!(error = %e, "skipping malformed ticker entry"),
                }
            }
            Ok(out)
        }
        serde_json::Value::Object(_) => Ok(vec![parse_stream_ticker(data)?]),
        _ => anyhow::bail!("ticker message is neither an object nor an array"),
    }
}

fn parse_stream_ticker(v: &serde_json::Value) -> Result<TickerUpdate> {
    let symbol = v["s"].as_str().context("missing field s")?.to_uppercase();
    Ok(TickerUpdate {
        price: parse_string_f64(&v["c"], "c")?,
        pct_change_1h: None,
        pct_change_24h: parse_string_f64(&v["P"], "P")?,
        volume_24h: parse_string_f64(&v["q"], "q")?,
        trade_count_24h: v["n"].as_u64(),
        event_time: v["E"].as_i64().context("missing field E")?,
        symbol,
    })
}
