// =============================================================================
// Market Data Manager: live working set of symbols
// =============================================================================
//
// Owns one slot per tracked symbol: a ticker, one candle ring per timeframe
// and optional futures intel. Four loops keep it current:
//   - poll loop:     klines per symbol/timeframe, bounded concurrency
//   - ticker stream: all-market ticker push
//   - universe loop: tracked symbol set
//   - intel loop:    auxiliary feed (optional)
//
// Locking: the symbol map is read-locked only long enough to clone slot
// handles. Each slot has its own locks; none is held across an await.
// Candle rings are `Arc`-shared with published snapshots and copied on write.
// =============================================================================

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::candle_series::{CandleSeries, MergeStats};
use super::snapshot::{MarketSnapshot, SymbolSnapshot};
use super::ticker::{TickerState, TickerUpdate};
use crate::binance::{ExchangeClient, RetryPolicy, StreamEvent};
use crate::error::ExchangeError;
use crate::futures_intel::{FuturesIntel, IntelFeed};
use crate::runtime_config::IngestConfig;
use crate::shutdown::{self, Shutdown, ShutdownTrigger};
use crate::types::{now_ms, Timeframe};

const ONE_HOUR_MS: i64 = 3_600_000;

// ---------------------------------------------------------------------------
// Public report types
// ---------------------------------------------------------------------------

/// Manager health as seen by the outside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state")]
pub enum Health {
    Healthy,
    /// Running, but the ticker stream is interrupted.
    Degraded { reason: String },
    /// Ingestion halted after repeated auth failures.
    Unhealthy { reason: String },
}

/// Outcome of one poll cycle.
#[derive(Debug, Clone, Serialize)]
pub struct PollReport {
    pub started_at: DateTime<Utc>,
    pub fetched: usize,
    pub failed: usize,
    pub skipped: usize,
    pub bars: MergeStats,
    pub duration_ms: u64,
}

/// Change applied by a universe refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UniverseDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub total: usize,
}

// ---------------------------------------------------------------------------
// Per-symbol state
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct CandleState {
    series: BTreeMap<Timeframe, Arc<CandleSeries>>,
    stale: BTreeSet<Timeframe>,
}

#[derive(Debug, Default)]
struct SymbolSlot {
    ticker: RwLock<Option<TickerState>>,
    candles: RwLock<CandleState>,
    intel: RwLock<Option<FuturesIntel>>,
}

enum JobOutcome {
    Fetched(MergeStats),
    Failed,
    Skipped,
}

// ---------------------------------------------------------------------------
// MarketDataManager
// ---------------------------------------------------------------------------

pub struct MarketDataManager {
    client: Arc<dyn ExchangeClient>,
    cfg: IngestConfig,
    retry: RetryPolicy,
    slots: RwLock<HashMap<String, Arc<SymbolSlot>>>,
    auth_failures: AtomicU32,
    halt: ShutdownTrigger,
    halted: Shutdown,
    halt_reason: RwLock<Option<String>>,
    stream_issue: RwLock<Option<String>>,
    latest: RwLock<Option<Arc<MarketSnapshot>>>,
    last_poll: RwLock<Option<PollReport>>,
}

impl MarketDataManager {
    pub fn new(client: Arc<dyn ExchangeClient>, cfg: IngestConfig, retry: RetryPolicy) -> Self {
        let (halt, halted) = shutdown::channel();
        Self {
            client,
            cfg,
            retry,
            slots: RwLock::new(HashMap::new()),
            auth_failures: AtomicU32::new(0),
            halt,
            halted,
            halt_reason: RwLock::new(None),
            stream_issue: RwLock::new(None),
            latest: RwLock::new(None),
            last_poll: RwLock::new(None),
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn symbols(&self) -> Vec<String> {
        let mut out: Vec<String> = self.slots.read().keys().cloned().collect();
        out.sort();
        out
    }

    pub fn is_halted(&self) -> bool {
        self.halted.is_triggered()
    }

    pub fn health(&self) -> Health {
        if let Some(reason) = self.halt_reason.read().clone() {
            return Health::Unhealthy { reason };
        }
        match self.stream_issue.read().clone() {
            Some(reason) => Health::Degraded { reason },
            None => Health::Healthy,
        }
    }

    pub fn last_poll(&self) -> Option<PollReport> {
        self.last_poll.read().clone()
    }

    pub fn latest_snapshot(&self) -> Option<Arc<MarketSnapshot>> {
        self.latest.read().clone()
    }

    fn slot(&self, symbol: &str) -> Option<Arc<SymbolSlot>> {
        self.slots.read().get(symbol).cloned()
    }

    fn slot_handles(&self) -> Vec<(String, Arc<SymbolSlot>)> {
        let mut out: Vec<_> = self
            .slots
            .read()
            .iter()
            .map(|(s, slot)| (s.clone(), slot.clone()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    fn new_slot(&self) -> SymbolSlot {
        let series = self
            .cfg
            .timeframes
            .iter()
            .map(|tf| (*tf, Arc::new(CandleSeries::new(self.cfg.retention_for(*tf)))))
            .collect();
        SymbolSlot {
            candles: RwLock::new(CandleState {
                series,
                stale: BTreeSet::new(),
            }),
            ..SymbolSlot::default()
        }
    }

    // -------------------------------------------------------------------------
    // Failure policy
    // -------------------------------------------------------------------------

    /// Count consecutive auth failures; halt once the limit is reached.
    fn track_auth<T>(&self, result: Result<T, ExchangeError>) -> Result<T, ExchangeError> {
        match &result {
            Ok(_) => {
                self.auth_failures.store(0, Ordering::Relaxed);
            }
            Err(e) if e.is_fatal() => {
                let n = self.auth_failures.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(consecutive = n, limit = self.cfg.fatal_auth_limit, error = %e, "exchange rejected access");
                if n >= self.cfg.fatal_auth_limit {
                    self.halt_ingestion(format!("{n} consecutive auth failures: {e}"));
                }
            }
            Err(_) => {}
        }
        result
    }

    fn halt_ingestion(&self, reason: String) {
        if self.halted.is_triggered() {
            return;
        }
        error!(reason = %reason, "halting market data ingestion");
        *self.halt_reason.write() = Some(reason);
        self.halt.trigger();
    }

    // -------------------------------------------------------------------------
    // Universe
    // -------------------------------------------------------------------------

    /// Re-list tradable symbols. New symbols get empty series; removed
    /// symbols are purged. An empty listing is an error and leaves the
    /// current set untouched.
    pub async fn refresh_universe(&self) -> Result<UniverseDiff, ExchangeError> {
        let listed = self.retry.run("list_symbols", || self.client.list_symbols()).await;
        let mut universe = self.track_auth(listed)?;
        if universe.is_empty() {
            return Err(ExchangeError::Malformed {
                endpoint: "list_symbols".to_string(),
                reason: "no tradable symbols listed".to_string(),
            });
        }

        if let Some(max) = self.cfg.max_symbols {
            if universe.len() > max {
                universe = self.cap_by_volume(universe, max).await;
            }
        }

        let diff = {
            let mut slots = self.slots.write();
            let mut removed: Vec<String> = slots
                .keys()
                .filter(|s| !universe.contains(*s))
                .cloned()
                .collect();
            removed.sort();
            for s in &removed {
                slots.remove(s);
            }

            let mut added = Vec::new();
            for s in &universe {
                if !slots.contains_key(s) {
                    slots.insert(s.clone(), Arc::new(self.new_slot()));
                    added.push(s.clone());
                }
            }
            UniverseDiff {
                added,
                removed,
                total: slots.len(),
            }
        };

        info!(
            total = diff.total,
            added = diff.added.len(),
            removed = diff.removed.len(),
            "symbol universe refreshed"
        );
        Ok(diff)
    }

    /// Keep the `max` symbols with the highest 24h quote volume. Falls back to
    /// the first `max` in symbol order when tickers are unavailable.
    async fn cap_by_volume(&self, universe: BTreeSet<String>, max: usize) -> BTreeSet<String> {
        let tickers = self.retry.run("fetch_tickers", || self.client.fetch_tickers()).await;
        match self.track_auth(tickers) {
            Ok(tickers) => {
                let mut ranked: Vec<(f64, String)> = tickers
                    .into_iter()
                    .filter(|t| universe.contains(&t.symbol))
                    .map(|t| (t.volume_24h, t.symbol))
                    .collect();
                ranked.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

                let mut kept: BTreeSet<String> =
                    ranked.into_iter().take(max).map(|(_, s)| s).collect();
                // Symbols without a ticker fill any remaining room.
                for s in &universe {
                    if kept.len() >= max {
                        break;
                    }
                    kept.insert(s.clone());
                }
                kept
            }
            Err(e) => {
                warn!(error = %e, max, "could not rank symbols by volume, keeping first by name");
                universe.into_iter().take(max).collect()
            }
        }
    }

    // -------------------------------------------------------------------------
    // Tickers
    // -------------------------------------------------------------------------

    /// Seed ticker state from the REST 24h ticker. Returns tickers applied.
    pub async fn seed_tickers(&self) -> Result<usize, ExchangeError> {
        let tickers = self.retry.run("fetch_tickers", || self.client.fetch_tickers()).await;
        let tickers = self.track_auth(tickers)?;
        let applied = tickers
            .into_iter()
            .filter(|t| self.apply_ticker(t.clone()))
            .count();
        info!(applied, "ticker state seeded");
        Ok(applied)
    }

    /// Replace the symbol's ticker. Untracked symbols are ignored (`false`).
    pub fn apply_ticker(&self, update: TickerUpdate) -> bool {
        let Some(slot) = self.slot(&update.symbol) else {
            return false;
        };
        let mut state = TickerState::from_update(&update, now_ms());
        if state.pct_change_1h.is_none() {
            state.pct_change_1h = derive_change_1h(&slot.candles.read(), update.price, update.event_time);
        }
        *slot.ticker.write() = Some(state);
        true
    }

    // -------------------------------------------------------------------------
    // Candles
    // -------------------------------------------------------------------------

    /// Bars to request: full retention for an empty series, otherwise the bars
    /// elapsed since the newest stored one plus two.
    pub fn fetch_limit(&self, series: Option<&CandleSeries>, timeframe: Timeframe, now_ms: i64) -> usize {
        let retention = self.cfg.retention_for(timeframe);
        match series.and_then(CandleSeries::last) {
            None => retention,
            Some(last) => {
                let elapsed = (now_ms - last.open_time).max(0) / timeframe.duration_ms();
                (elapsed as usize).saturating_add(2).clamp(1, retention)
            }
        }
    }

    /// One poll cycle over every tracked symbol and configured timeframe.
    ///
    /// A failing symbol/timeframe is marked stale and the cycle continues.
    /// Queued jobs are skipped once `shutdown` fires or ingestion halts.
    pub async fn poll_candles(&self, shutdown: &Shutdown) -> PollReport {
        let started = Instant::now();
        let started_at = Utc::now();
        let now = now_ms();

        let jobs: Vec<(String, Arc<SymbolSlot>, Timeframe)> = self
            .slot_handles()
            .into_iter()
            .flat_map(|(sym, slot)| {
                self.cfg
                    .timeframes
                    .iter()
                    .map(move |tf| (sym.clone(), slot.clone(), *tf))
            })
            .collect();

        let outcomes: Vec<JobOutcome> = futures_util::stream::iter(jobs)
            .map(|(symbol, slot, timeframe)| async move {
                if shutdown.is_triggered() || self.is_halted() {
                    return JobOutcome::Skipped;
                }
                let limit = {
                    let candles = slot.candles.read();
                    self.fetch_limit(candles.series.get(&timeframe).map(Arc::as_ref), timeframe, now)
                };
                let fetched = self
                    .retry
                    .run("fetch_candles", || self.client.fetch_candles(&symbol, timeframe, limit))
                    .await;

                match self.track_auth(fetched) {
                    Ok(bars) => {
                        let mut candles = slot.candles.write();
                        let capacity = self.cfg.retention_for(timeframe);
                        let series = candles
                            .series
                            .entry(timeframe)
                            .or_insert_with(|| Arc::new(CandleSeries::new(capacity)));
                        let stats = Arc::make_mut(series).merge(bars);
                        candles.stale.remove(&timeframe);
                        if stats.dropped > 0 {
                            debug!(symbol = %symbol, timeframe = %timeframe, dropped = stats.dropped, "bars older than retention dropped");
                        }
                        JobOutcome::Fetched(stats)
                    }
                    Err(e) => {
                        warn!(symbol = %symbol, timeframe = %timeframe, error = %e, "candle fetch failed, series marked stale");
                        slot.candles.write().stale.insert(timeframe);
                        JobOutcome::Failed
                    }
                }
            })
            .buffer_unordered(self.cfg.poll_concurrency.max(1))
            .collect()
            .await;

        let mut report = PollReport {
            started_at,
            fetched: 0,
            failed: 0,
            skipped: 0,
            bars: MergeStats::default(),
            duration_ms: 0,
        };
        for outcome in outcomes {
            match outcome {
                JobOutcome::Fetched(stats) => {
                    report.fetched += 1;
                    report.bars.absorb(stats);
                }
                JobOutcome::Failed => report.failed += 1,
                JobOutcome::Skipped => report.skipped += 1,
            }
        }
        report.duration_ms = started.elapsed().as_millis() as u64;

        info!(
            fetched = report.fetched,
            failed = report.failed,
            skipped = report.skipped,
            inserted = report.bars.inserted,
            replaced = report.bars.replaced,
            duration_ms = report.duration_ms,
            "candle poll complete"
        );
        *self.last_poll.write() = Some(report.clone());
        report
    }

    // -------------------------------------------------------------------------
    // Intel
    // -------------------------------------------------------------------------

    /// Merge feed records into tracked symbols. On error the previous intel
    /// is kept and the error returned.
    pub async fn refresh_intel(&self, feed: &dyn IntelFeed) -> anyhow::Result<usize> {
        let records = feed.fetch().await?;
        let received = now_ms();
        let slots = self.slots.read();
        let mut merged = 0;
        for rec in &records {
            if let Some(slot) = slots.get(&rec.symbol) {
                let mut intel = slot.intel.write();
                let next = FuturesIntel::from_record(rec, received).with_previous(intel.as_ref());
                *intel = Some(next);
                merged += 1;
            }
        }
        debug!(records = records.len(), merged, "futures intel refreshed");
        Ok(merged)
    }

    // -------------------------------------------------------------------------
    // Snapshot
    // -------------------------------------------------------------------------

    /// Build and retain a consistent read-only view of all symbols.
    pub fn publish_snapshot(&self) -> Arc<MarketSnapshot> {
        let now = now_ms();
        let stale_after_ms = (self.cfg.stale_after_secs * 1000) as i64;

        let symbols = self
            .slot_handles()
            .into_iter()
            .map(|(symbol, slot)| {
                let ticker = slot.ticker.read().clone();
                let ticker_stale = ticker
                    .as_ref()
                    .is_some_and(|t| t.is_stale(now, stale_after_ms));
                let (candles, stale_timeframes) = {
                    let c = slot.candles.read();
                    (c.series.clone(), c.stale.clone())
                };
                let intel = slot.intel.read().clone();
                let snap = SymbolSnapshot {
                    symbol: symbol.clone(),
                    ticker,
                    ticker_stale,
                    candles,
                    stale_timeframes,
                    intel,
                };
                (symbol, snap)
            })
            .collect();

        let snapshot = Arc::new(MarketSnapshot::new(Utc::now(), symbols));
        *self.latest.write() = Some(snapshot.clone());
        snapshot
    }

    // -------------------------------------------------------------------------
    // Loops
    // -------------------------------------------------------------------------

    /// Poll candles every `poll_interval`, starting immediately.
    pub async fn run_poll_loop(self: Arc<Self>, shutdown: Shutdown) {
        let mut interval = tokio::time::interval(self.cfg.poll_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = self.halted.cancelled() => break,
                _ = interval.tick() => {}
            }
            self.poll_candles(&shutdown).await;
        }
        info!("candle poll loop stopped");
    }

    /// Consume the ticker stream until shutdown or halt.
    pub async fn run_ticker_stream(self: Arc<Self>, shutdown: Shutdown) {
        let mut stream = self.client.stream_tickers(shutdown.clone());
        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = self.halted.cancelled() => break,
                ev = stream.next() => ev,
            };
            match event {
                Some(StreamEvent::Connected) => {
                    if self.stream_issue.write().take().is_some() {
                        info!("ticker stream restored");
                    }
                }
                Some(StreamEvent::Tickers(updates)) => {
                    let applied = updates.into_iter().filter(|u| self.apply_ticker(u.clone())).count();
                    debug!(applied, "ticker batch applied");
                }
                Some(StreamEvent::Interrupted { reason }) => {
                    *self.stream_issue.write() = Some(reason);
                }
                None => {
                    warn!("ticker stream task ended");
                    *self.stream_issue.write() = Some("ticker stream ended".to_string());
                    break;
                }
            }
        }
        info!("ticker stream consumer stopped");
    }

    /// Refresh the universe every `universe_refresh`, first after one period.
    pub async fn run_universe_loop(self: Arc<Self>, shutdown: Shutdown) {
        let period = self.cfg.universe_refresh();
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = self.halted.cancelled() => break,
                _ = interval.tick() => {}
            }
            if let Err(e) = self.refresh_universe().await {
                warn!(error = %e, "universe refresh failed, keeping current symbols");
            }
        }
        info!("universe loop stopped");
    }

    /// Pull the auxiliary feed every `every`, starting immediately.
    pub async fn run_intel_loop(self: Arc<Self>, feed: Arc<dyn IntelFeed>, every: Duration, shutdown: Shutdown) {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }
            if let Err(e) = self.refresh_intel(feed.as_ref()).await {
                warn!(error = %e, "intel feed refresh failed, keeping previous intel");
            }
        }
        info!("intel loop stopped");
    }
}

/// 1h % change from the close one hour before `event_time`: 1m series first,
/// then the 1h series.
fn derive_change_1h(candles: &CandleState, price: f64, event_time: i64) -> Option<f64> {
    let at = event_time - ONE_HOUR_MS;
    let reference = [Timeframe::M1, Timeframe::H1]
        .iter()
        .filter(|tf| !candles.stale.contains(*tf))
        .filter_map(|tf| candles.series.get(tf))
        .find_map(|s| s.close_at_or_before(at))?;
    (reference > 0.0).then(|| (price - reference) / reference * 100.0)
}

impl std::fmt::Debug for MarketDataManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketDataManager")
            .field("symbols", &self.slots.read().len())
            .field("health", &self.health())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
