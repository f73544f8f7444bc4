use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::debug;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A single OHLCV bar from the Binance klines endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: i64,
    pub close_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub quote_volume: f64,
    pub trades_count: u64,
    /// False for the in-progress bar.
    pub is_closed: bool,
}

/// Result of inserting one bar into a [`CandleSeries`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// New open time; `evicted` is true when the oldest bar made room.
    Inserted { evicted: bool },
    /// A bar with the same open time was overwritten.
    Replaced,
    /// Older than the oldest retained bar while the ring is full.
    Dropped,
}

/// Aggregate of a batch merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    pub inserted: usize,
    pub replaced: usize,
    pub dropped: usize,
    pub evicted: usize,
}

impl MergeStats {
    pub fn absorb(&mut self, other: MergeStats) {
        self.inserted += other.inserted;
        self.replaced += other.replaced;
        self.dropped += other.dropped;
        self.evicted += other.evicted;
    }
}

// ---------------------------------------------------------------------------
// CandleSeries -- fixed-capacity ring per (symbol, timeframe)
// ---------------------------------------------------------------------------

/// Bars strictly ascending by `open_time`, never more than `capacity`.
///
/// The in-progress bar lives in the ring like any other; when the exchange
/// later returns the closed version with the same open time it replaces it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandleSeries {
    capacity: usize,
    bars: VecDeque<Candle>,
}

impl CandleSeries {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            bars: VecDeque::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Insert or replace a bar, keeping the ring sorted and bounded.
    pub fn insert(&mut self, candle: Candle) -> InsertOutcome {
        match self.bars.binary_search_by_key(&candle.open_time, |c| c.open_time) {
            Ok(i) => {
                self.bars[i] = candle;
                InsertOutcome::Replaced
            }
            Err(i) if self.bars.len() < self.capacity => {
                self.bars.insert(i, candle);
                InsertOutcome::Inserted { evicted: false }
            }
            Err(0) => {
                debug!(
                    open_time = candle.open_time,
                    "bar older than retained history dropped"
                );
                InsertOutcome::Dropped
            }
            Err(i) => {
                self.bars.pop_front();
                self.bars.insert(i - 1, candle);
                InsertOutcome::Inserted { evicted: true }
            }
        }
    }

    /// Insert a batch of bars in order.
    pub fn merge<I>(&mut self, candles: I) -> MergeStats
    where
        I: IntoIterator<Item = Candle>,
    {
        let mut stats = MergeStats::default();
        for c in candles {
            match self.insert(c) {
                InsertOutcome::Inserted { evicted } => {
                    stats.inserted += 1;
                    if evicted {
                        stats.evicted += 1;
                    }
                }
                InsertOutcome::Replaced => stats.replaced += 1,
                InsertOutcome::Dropped => stats.dropped += 1,
            }
        }
        stats
    }

    /// Newest bar, closed or not.
    pub fn last(&self) -> Option<&Candle> {
        self.bars.back()
    }

    /// Newest closed bar.
    pub fn last_closed_bar(&self) -> Option<&Candle> {
        self.bars.iter().rev().find(|c| c.is_closed)
    }

    /// The most recent `count` closed bars, oldest first. Shorter when the
    /// series holds fewer.
    pub fn last_closed(&self, count: usize) -> Vec<&Candle> {
        let mut out: Vec<&Candle> = self
            .bars
            .iter()
            .rev()
            .filter(|c| c.is_closed)
            .take(count)
            .collect();
        out.reverse();
        out
    }

    /// Close of the newest closed bar whose close time is at or before `ts`.
    pub fn close_at_or_before(&self, ts: i64) -> Option<f64> {
        self.bars
            .iter()
            .rev()
            .find(|c| c.is_closed && c.close_time <= ts)
            .map(|c| c.close)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candle> {
        self.bars.iter()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
