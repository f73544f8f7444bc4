// =============================================================================
// Futures Intelligence Module
// =============================================================================
//
// Per-symbol enrichment from an auxiliary feed: tick count, funding rate and
// open interest. The feed is optional; the engine runs without it and keeps
// the last good intel when a refresh fails.
//
// Funding is read contrarian: crowded longs pay positive funding and are
// the side most likely to be flushed. Open interest is compared against the
// value from the previous refresh.
// =============================================================================

pub mod feed;

pub use feed::{CommandFeed, IntelFeed};

use serde::{Deserialize, Serialize};

use crate::types::Direction;

/// One record as printed by the feed command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntelRecord {
    pub symbol: String,
    #[serde(default)]
    pub tick_count: u64,
    /// Decimal (0.0001 = 0.01%).
    #[serde(default, deserialize_with = "number_or_string")]
    pub funding_rate: f64,
    #[serde(default, deserialize_with = "number_or_string")]
    pub open_interest: f64,
}

/// Intel held per symbol by the market data manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuturesIntel {
    pub tick_count: u64,
    pub funding_rate: f64,
    pub funding_rate_pct: f64,
    pub open_interest: f64,
    /// Open interest from the previous refresh, if there was one.
    pub previous_open_interest: Option<f64>,
    pub received_at_ms: i64,
}

impl FuturesIntel {
    pub fn from_record(record: &IntelRecord, received_at_ms: i64) -> Self {
        Self {
            tick_count: record.tick_count,
            funding_rate: record.funding_rate,
            funding_rate_pct: record.funding_rate * 100.0,
            open_interest: record.open_interest,
            previous_open_interest: None,
            received_at_ms,
        }
    }

    /// Carry the open interest of the intel this one replaces.
    pub fn with_previous(mut self, previous: Option<&FuturesIntel>) -> Self {
        self.previous_open_interest = previous.map(|p| p.open_interest);
        self
    }

    /// Current / previous open interest. `None` unless both are positive.
    pub fn open_interest_ratio(&self) -> Option<f64> {
        let prev = self.previous_open_interest?;
        (prev > 0.0 && self.open_interest > 0.0).then(|| self.open_interest / prev)
    }

    /// Contrarian bias implied by funding: positive funding leans Down.
    pub fn funding_bias(&self) -> Option<Direction> {
        Direction::of(-self.funding_rate_pct)
    }
}

/// Binance-style feeds print numbers as strings; accept both.
fn number_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(f64),
        Str(String),
        Null,
    }

    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Str(s) => s.trim().parse::<f64>().map_err(serde::de::Error::custom),
        Raw::Null => Ok(0.0),
    }
}
