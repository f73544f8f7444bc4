use serde::{Deserialize, Serialize};

/// One ticker observation, from the 24h REST ticker or the ticker stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerUpdate {
    pub symbol: String,
    pub price: f64,
    /// Absent on every exchange source; derived by the manager.
    pub pct_change_1h: Option<f64>,
    pub pct_change_24h: f64,
    /// 24h quote-asset volume.
    pub volume_24h: f64,
    pub trade_count_24h: Option<u64>,
    /// Exchange event time (ms).
    pub event_time: i64,
}

/// Latest ticker state held per symbol. Replaced wholesale, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerState {
    pub price: f64,
    pub pct_change_1h: Option<f64>,
    pub pct_change_24h: f64,
    pub volume_24h: f64,
    pub trade_count_24h: Option<u64>,
    pub event_time: i64,
    /// Local receipt time (ms).
    pub received_at_ms: i64,
}

impl TickerState {
    pub fn from_update(update: &TickerUpdate, received_at_ms: i64) -> Self {
        Self {
            price: update.price,
            pct_change_1h: update.pct_change_1h,
            pct_change_24h: update.pct_change_24h,
            volume_24h: update.volume_24h,
            trade_count_24h: update.trade_count_24h,
            event_time: update.event_time,
            received_at_ms,
        }
    }

    pub fn is_stale(&self, now_ms: i64, stale_after_ms: i64) -> bool {
        now_ms - self.received_at_ms > stale_after_ms
    }
}
