use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::candle_series::{Candle, CandleSeries};
use super::ticker::TickerState;
use crate::futures_intel::FuturesIntel;
use crate::types::Timeframe;

/// Immutable point-in-time view of every tracked symbol.
///
/// Candle rings are shared with the manager through `Arc`; the manager
/// copies a ring before writing to it while any snapshot still holds it.
#[derive(Debug, Clone, Serialize)]
pub struct MarketSnapshot {
    pub published_at: DateTime<Utc>,
    /// Newest data timestamp contained (ticker event or bar close), ms.
    pub as_of_ms: i64,
    pub symbols: BTreeMap<String, SymbolSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SymbolSnapshot {
    pub symbol: String,
    pub ticker: Option<TickerState>,
    pub ticker_stale: bool,
    #[serde(skip)]
    pub candles: BTreeMap<Timeframe, Arc<CandleSeries>>,
    pub stale_timeframes: BTreeSet<Timeframe>,
    pub intel: Option<FuturesIntel>,
}

impl MarketSnapshot {
    pub fn new(published_at: DateTime<Utc>, symbols: BTreeMap<String, SymbolSnapshot>) -> Self {
        let as_of_ms = symbols
            .values()
            .map(SymbolSnapshot::newest_data_ms)
            .max()
            .unwrap_or(0);
        Self {
            published_at,
            as_of_ms,
            symbols,
        }
    }

    pub fn get(&self, symbol: &str) -> Option<&SymbolSnapshot> {
        self.symbols.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl SymbolSnapshot {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ticker: None,
            ticker_stale: false,
            candles: BTreeMap::new(),
            stale_timeframes: BTreeSet::new(),
            intel: None,
        }
    }

    pub fn with_ticker(mut self, ticker: TickerState, stale: bool) -> Self {
        self.ticker = Some(ticker);
        self.ticker_stale = stale;
        self
    }

    pub fn with_series(mut self, timeframe: Timeframe, series: CandleSeries) -> Self {
        self.candles.insert(timeframe, Arc::new(series));
        self
    }

    pub fn with_stale(mut self, timeframe: Timeframe) -> Self {
        self.stale_timeframes.insert(timeframe);
        self
    }

    pub fn with_intel(mut self, intel: FuturesIntel) -> Self {
        self.intel = Some(intel);
        self
    }

    /// Ticker if present and fresh.
    pub fn fresh_ticker(&self) -> Option<&TickerState> {
        if self.ticker_stale {
            None
        } else {
            self.ticker.as_ref()
        }
    }

    pub fn series(&self, timeframe: Timeframe) -> Option<&CandleSeries> {
        self.candles.get(&timeframe).map(Arc::as_ref)
    }

    /// The newest `count` closed bars, oldest first. `None` when the series
    /// is missing, stale, or holds fewer than `count` closed bars.
    pub fn closed_bars(&self, timeframe: Timeframe, count: usize) -> Option<Vec<&Candle>> {
        if self.stale_timeframes.contains(&timeframe) {
            return None;
        }
        let bars = self.series(timeframe)?.last_closed(count);
        (bars.len() == count).then_some(bars)
    }

    fn newest_data_ms(&self) -> i64 {
        let ticker = self.ticker.as_ref().map_or(0, |t| t.event_time);
        let bars = self
            .candles
            .values()
            .filter_map(|s| s.last_closed_bar())
            .map(|c| c.close_time)
            .max()
            .unwrap_or(0);
        ticker.max(bars)
    }
}
