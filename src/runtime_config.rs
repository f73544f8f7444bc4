// =============================================================================
// Runtime Configuration: loaded once at startup
// =============================================================================
//
// Every tunable of the engine lives here: exchange endpoints and request
// budget, ingestion cadence and retention, detector thresholds and toggles,
// the auxiliary feed and report output.
//
// All fields carry `#[serde(default)]` so a partial (or empty) JSON file is
// valid. The config is immutable for the lifetime of the process; changing a
// threshold requires a restart.
// =============================================================================

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::types::{Severity, Timeframe};

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_true() -> bool {
    true
}

fn default_rest_url() -> String {
    "https://fapi.binance.com".to_string()
}

fn default_ws_url() -> String {
    "wss://fstream.binance.com".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_budget_weight() -> u32 {
    // Binance allows 2400 weight/min on USDⓈ-M futures; stay well below.
    1800
}

fn default_budget_window_ms() -> u64 {
    60_000
}

fn default_retry_attempts() -> u32 {
    4
}

fn default_retry_base_ms() -> u64 {
    500
}

fn default_retry_max_ms() -> u64 {
    30_000
}

fn default_reconnect_ms() -> u64 {
    5_000
}

fn default_reconnect_max_ms() -> u64 {
    60_000
}

fn default_stream_idle_secs() -> u64 {
    90
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_universe_refresh_secs() -> u64 {
    900
}

fn default_stale_after_secs() -> u64 {
    120
}

fn default_timeframes() -> Vec<Timeframe> {
    Timeframe::ALL.to_vec()
}

fn default_max_symbols() -> Option<usize> {
    Some(500)
}

fn default_quote_asset() -> Option<String> {
    Some("USDT".to_string())
}

fn default_poll_concurrency() -> usize {
    8
}

fn default_fatal_auth_limit() -> u32 {
    3
}

fn default_volume_spike_threshold() -> f64 {
    2.0
}

fn default_volume_lookback() -> usize {
    24
}

fn default_h1() -> Timeframe {
    Timeframe::H1
}

fn default_tiers_1h() -> ChangeTiers {
    ChangeTiers {
        high: 5.0,
        medium: 2.0,
        low: 1.0,
    }
}

fn default_tiers_24h() -> ChangeTiers {
    ChangeTiers {
        high: 15.0,
        medium: 8.0,
        low: 3.0,
    }
}

fn default_momentum_lookback() -> usize {
    6
}

fn default_momentum_min_run() -> usize {
    3
}

fn default_range_lookback() -> usize {
    24
}

fn default_range_break_threshold() -> f64 {
    0.02
}

fn default_consolidation_width() -> f64 {
    0.05
}

fn default_funding_threshold_pct() -> f64 {
    0.05
}

fn default_oi_jump_ratio() -> f64 {
    1.5
}

fn default_feed_interval_secs() -> u64 {
    15
}

fn default_feed_timeout_secs() -> u64 {
    30
}

fn default_eval_interval_secs() -> u64 {
    60
}

fn default_top_n() -> usize {
    10
}

// =============================================================================
// ExchangeConfig
// =============================================================================

/// Endpoints, per-call timeout, request budget and retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    #[serde(default = "default_rest_url")]
    pub rest_url: String,

    #[serde(default = "default_ws_url")]
    pub ws_url: String,

    /// Upper bound on any single REST call.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Request weight allowed per rolling window.
    #[serde(default = "default_budget_weight")]
    pub budget_weight: u32,

    #[serde(default = "default_budget_window_ms")]
    pub budget_window_ms: u64,

    /// Attempts per request including the first one.
    #[serde(default = "default_retry_attempts")]
    pub retry_max_attempts: u32,

    #[serde(default = "default_retry_base_ms")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_retry_max_ms")]
    pub retry_max_delay_ms: u64,

    /// First reconnect delay after the ticker stream drops.
    #[serde(default = "default_reconnect_ms")]
    pub stream_reconnect_ms: u64,

    #[serde(default = "default_reconnect_max_ms")]
    pub stream_reconnect_max_ms: u64,

    /// Silence on the ticker stream longer than this is treated as a drop.
    #[serde(default = "default_stream_idle_secs")]
    pub stream_idle_timeout_secs: u64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            rest_url: default_rest_url(),
            ws_url: default_ws_url(),
            request_timeout_ms: default_request_timeout_ms(),
            budget_weight: default_budget_weight(),
            budget_window_ms: default_budget_window_ms(),
            retry_max_attempts: default_retry_attempts(),
            retry_base_delay_ms: default_retry_base_ms(),
            retry_max_delay_ms: default_retry_max_ms(),
            stream_reconnect_ms: default_reconnect_ms(),
            stream_reconnect_max_ms: default_reconnect_max_ms(),
            stream_idle_timeout_secs: default_stream_idle_secs(),
        }
    }
}

impl ExchangeConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn budget_window(&self) -> Duration {
        Duration::from_millis(self.budget_window_ms)
    }

    /// Point both endpoints at the futures testnet.
    pub fn use_testnet(&mut self) {
        self.rest_url = "https://testnet.binancefuture.com".to_string();
        self.ws_url = "wss://stream.binancefuture.com".to_string();
    }
}

// =============================================================================
// IngestConfig
// =============================================================================

/// Cadence, retention and failure policy of the market data manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_universe_refresh_secs")]
    pub universe_refresh_secs: u64,

    /// A ticker not updated within this many seconds is stale.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,

    #[serde(default = "default_timeframes")]
    pub timeframes: Vec<Timeframe>,

    /// Per-timeframe ring capacity; missing entries use the timeframe default.
    #[serde(default)]
    pub retention: BTreeMap<Timeframe, usize>,

    /// Cap on the working set; the highest 24h quote-volume symbols are kept.
    #[serde(default = "default_max_symbols")]
    pub max_symbols: Option<usize>,

    /// Only contracts quoted in this asset are tracked.
    #[serde(default = "default_quote_asset")]
    pub quote_asset: Option<String>,

    /// Candle requests in flight at once during a poll cycle.
    #[serde(default = "default_poll_concurrency")]
    pub poll_concurrency: usize,

    /// Consecutive auth failures before ingestion halts.
    #[serde(default = "default_fatal_auth_limit")]
    pub fatal_auth_limit: u32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            universe_refresh_secs: default_universe_refresh_secs(),
            stale_after_secs: default_stale_after_secs(),
            timeframes: default_timeframes(),
            retention: BTreeMap::new(),
            max_symbols: default_max_symbols(),
            quote_asset: default_quote_asset(),
            poll_concurrency: default_poll_concurrency(),
            fatal_auth_limit: default_fatal_auth_limit(),
        }
    }
}

impl IngestConfig {
    pub fn retention_for(&self, timeframe: Timeframe) -> usize {
        self.retention
            .get(&timeframe)
            .copied()
            .unwrap_or_else(|| timeframe.default_retention())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn universe_refresh(&self) -> Duration {
        Duration::from_secs(self.universe_refresh_secs)
    }
}

// =============================================================================
// ThresholdConfig
// =============================================================================

/// Three-tier percentage table for a price-change window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChangeTiers {
    pub high: f64,
    pub medium: f64,
    pub low: f64,
}

impl ChangeTiers {
    /// Highest tier crossed by `abs_change`, with that tier's threshold.
    pub fn classify(&self, abs_change: f64) -> Option<(Severity, f64)> {
        if abs_change >= self.high {
            Some((Severity::High, self.high))
        } else if abs_change >= self.medium {
            Some((Severity::Medium, self.medium))
        } else if abs_change >= self.low {
            Some((Severity::Low, self.low))
        } else {
            None
        }
    }

    fn validate(&self, name: &str) -> Result<()> {
        if !(self.low > 0.0 && self.low <= self.medium && self.medium <= self.high) {
            anyhow::bail!(
                "{name} tiers must satisfy 0 < low <= medium <= high (got {:?})",
                self
            );
        }
        Ok(())
    }
}

/// Detector thresholds. Shared read-only by every evaluation cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Current bar volume / trailing average required for a spike.
    #[serde(default = "default_volume_spike_threshold")]
    pub volume_spike_threshold: f64,

    #[serde(default = "default_volume_lookback")]
    pub volume_lookback_bars: usize,

    #[serde(default = "default_h1")]
    pub volume_timeframe: Timeframe,

    #[serde(default = "default_tiers_1h")]
    pub price_change_1h: ChangeTiers,

    #[serde(default = "default_tiers_24h")]
    pub price_change_24h: ChangeTiers,

    /// Number of close-to-close moves inspected for stair-steps.
    #[serde(default = "default_momentum_lookback")]
    pub momentum_lookback_bars: usize,

    #[serde(default = "default_momentum_min_run")]
    pub momentum_min_run: usize,

    #[serde(default = "default_h1")]
    pub momentum_timeframe: Timeframe,

    #[serde(default = "default_range_lookback")]
    pub range_lookback_bars: usize,

    /// Fraction beyond the prior range high/low that counts as a break.
    #[serde(default = "default_range_break_threshold")]
    pub range_break_threshold: f64,

    /// Range width / midpoint below which the market is consolidating.
    #[serde(default = "default_consolidation_width")]
    pub consolidation_width: f64,

    #[serde(default = "default_h1")]
    pub range_timeframe: Timeframe,

    /// Absolute funding rate, in percent, that counts as an anomaly.
    #[serde(default = "default_funding_threshold_pct")]
    pub funding_rate_threshold_pct: f64,

    /// Open interest / previous open interest required for a jump.
    #[serde(default = "default_oi_jump_ratio")]
    pub oi_jump_ratio: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            volume_spike_threshold: default_volume_spike_threshold(),
            volume_lookback_bars: default_volume_lookback(),
            volume_timeframe: default_h1(),
            price_change_1h: default_tiers_1h(),
            price_change_24h: default_tiers_24h(),
            momentum_lookback_bars: default_momentum_lookback(),
            momentum_min_run: default_momentum_min_run(),
            momentum_timeframe: default_h1(),
            range_lookback_bars: default_range_lookback(),
            range_break_threshold: default_range_break_threshold(),
            consolidation_width: default_consolidation_width(),
            range_timeframe: default_h1(),
            funding_rate_threshold_pct: default_funding_threshold_pct(),
            oi_jump_ratio: default_oi_jump_ratio(),
        }
    }
}

impl ThresholdConfig {
    pub fn validate(&self) -> Result<()> {
        if self.volume_spike_threshold <= 0.0 {
            anyhow::bail!("volume_spike_threshold must be positive");
        }
        if self.volume_lookback_bars == 0
            || self.momentum_lookback_bars == 0
            || self.range_lookback_bars == 0
        {
            anyhow::bail!("lookback windows must be at least one bar");
        }
        if self.momentum_min_run == 0 || self.momentum_min_run > self.momentum_lookback_bars {
            anyhow::bail!(
                "momentum_min_run must be in 1..={} (got {})",
                self.momentum_lookback_bars,
                self.momentum_min_run
            );
        }
        if self.range_break_threshold <= 0.0 || self.consolidation_width <= 0.0 {
            anyhow::bail!("range_break_threshold and consolidation_width must be positive");
        }
        if self.funding_rate_threshold_pct <= 0.0 {
            anyhow::bail!("funding_rate_threshold_pct must be positive");
        }
        if self.oi_jump_ratio <= 1.0 {
            anyhow::bail!("oi_jump_ratio must be above 1.0 (got {})", self.oi_jump_ratio);
        }
        self.price_change_1h.validate("price_change_1h")?;
        self.price_change_24h.validate("price_change_24h")?;
        Ok(())
    }
}

// =============================================================================
// DetectorToggles
// =============================================================================

/// Independent on/off switch per detector. All default to enabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorToggles {
    #[serde(default = "default_true")]
    pub volume_spike: bool,

    #[serde(default = "default_true")]
    pub price_change: bool,

    #[serde(default = "default_true")]
    pub stair_step: bool,

    #[serde(default = "default_true")]
    pub range: bool,

    #[serde(default = "default_true")]
    pub funding: bool,

    #[serde(default = "default_true")]
    pub open_interest: bool,
}

impl Default for DetectorToggles {
    fn default() -> Self {
        Self {
            volume_spike: true,
            price_change: true,
            stair_step: true,
            range: true,
            funding: true,
            open_interest: true,
        }
    }
}

// =============================================================================
// FeedConfig / OutputConfig
// =============================================================================

/// Auxiliary intel feed: an external command printing JSON records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Program followed by its arguments. `None` disables the feed.
    #[serde(default)]
    pub command: Option<Vec<String>>,

    #[serde(default = "default_feed_interval_secs")]
    pub interval_secs: u64,

    #[serde(default = "default_feed_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            command: None,
            interval_secs: default_feed_interval_secs(),
            timeout_secs: default_feed_timeout_secs(),
        }
    }
}

/// Evaluation cadence and where reports go.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_eval_interval_secs")]
    pub eval_interval_secs: u64,

    /// When set, each cycle's report is written here as JSON.
    #[serde(default)]
    pub report_path: Option<PathBuf>,

    /// Symbols listed in the per-cycle log summary.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            eval_interval_secs: default_eval_interval_secs(),
            report_path: None,
            top_n: default_top_n(),
        }
    }
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level configuration for the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub exchange: ExchangeConfig,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub thresholds: ThresholdConfig,

    #[serde(default)]
    pub detectors: DetectorToggles,

    #[serde(default)]
    pub feed: FeedConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// A missing file yields the defaults with a warning. An unreadable or
    /// unparsable file is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(path = %path.display(), "runtime config not found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read runtime config from {}", path.display()));
            }
        };

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            rest_url = %config.exchange.rest_url,
            timeframes = ?config.ingest.timeframes,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.thresholds.validate().context("invalid thresholds")?;

        if self.ingest.timeframes.is_empty() {
            anyhow::bail!("ingest.timeframes must not be empty");
        }
        if self.ingest.poll_concurrency == 0 {
            anyhow::bail!("ingest.poll_concurrency must be at least 1");
        }
        if self.exchange.budget_weight == 0 || self.exchange.budget_window_ms == 0 {
            anyhow::bail!("exchange request budget must be non-zero");
        }
        if self.exchange.retry_max_attempts == 0 {
            anyhow::bail!("exchange.retry_max_attempts must be at least 1");
        }

        let cadences = [
            ("ingest.poll_interval_secs", self.ingest.poll_interval_secs),
            ("ingest.universe_refresh_secs", self.ingest.universe_refresh_secs),
            ("ingest.stale_after_secs", self.ingest.stale_after_secs),
            ("output.eval_interval_secs", self.output.eval_interval_secs),
            ("feed.interval_secs", self.feed.interval_secs),
            ("feed.timeout_secs", self.feed.timeout_secs),
            ("exchange.request_timeout_ms", self.exchange.request_timeout_ms),
            ("exchange.stream_reconnect_ms", self.exchange.stream_reconnect_ms),
            ("exchange.stream_idle_timeout_secs", self.exchange.stream_idle_timeout_secs),
        ];
        if let Some((name, _)) = cadences.iter().find(|(_, v)| *v == 0) {
            anyhow::bail!("{name} must be non-zero");
        }

        let t = &self.thresholds;
        let needs = [
            (self.detectors.volume_spike, t.volume_timeframe, t.volume_lookback_bars, "volume_spike"),
            (self.detectors.stair_step, t.momentum_timeframe, t.momentum_lookback_bars, "stair_step"),
            (self.detectors.range, t.range_timeframe, t.range_lookback_bars, "range"),
        ];
        for (enabled, timeframe, lookback, name) in needs {
            if !enabled {
                continue;
            }
            if !self.ingest.timeframes.contains(&timeframe) {
                anyhow::bail!("{name} detector uses {timeframe}, which is not ingested");
            }
            if lookback + 1 > self.ingest.retention_for(timeframe) {
                anyhow::bail!(
                    "{name} detector needs {} {timeframe} bars but only {} are retained",
                    lookback + 1,
                    self.ingest.retention_for(timeframe)
                );
            }
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.exchange.rest_url, "https://fapi.binance.com");
        assert_eq!(cfg.ingest.poll_interval_secs, 60);
        assert_eq!(cfg.ingest.universe_refresh_secs, 900);
        assert_eq!(cfg.ingest.retention_for(Timeframe::M1), 1440);
        assert_eq!(cfg.ingest.retention_for(Timeframe::H1), 168);
        assert!((cfg.thresholds.volume_spike_threshold - 2.0).abs() < f64::EPSILON);
        assert!((cfg.thresholds.price_change_24h.high - 15.0).abs() < f64::EPSILON);
        assert!(cfg.detectors.stair_step);
        assert!(cfg.feed.command.is_none());
        cfg.validate().expect("defaults must validate");
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.ingest.timeframes, Timeframe::ALL.to_vec());
        assert_eq!(cfg.ingest.max_symbols, Some(500));
        assert_eq!(cfg.thresholds.range_lookback_bars, 24);
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{
            "ingest": { "timeframes": ["1m", "1h"], "retention": { "1m": 120 } },
            "thresholds": { "volume_spike_threshold": 3.5 },
            "detectors": { "funding": false }
        }"#;
        let cfg: RuntimeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.ingest.timeframes, vec![Timeframe::M1, Timeframe::H1]);
        assert_eq!(cfg.ingest.retention_for(Timeframe::M1), 120);
        assert_eq!(cfg.ingest.retention_for(Timeframe::H1), 168);
        assert!((cfg.thresholds.volume_spike_threshold - 3.5).abs() < f64::EPSILON);
        assert_eq!(cfg.thresholds.volume_lookback_bars, 24);
        assert!(!cfg.detectors.funding);
        assert!(cfg.detectors.range);
        cfg.validate().unwrap();
    }

    #[test]
    fn change_tiers_pick_highest_crossed() {
        let tiers = default_tiers_24h();
        assert_eq!(tiers.classify(10.0), Some((Severity::Medium, 8.0)));
        assert_eq!(tiers.classify(15.0), Some((Severity::High, 15.0)));
        assert_eq!(tiers.classify(3.0), Some((Severity::Low, 3.0)));
        assert_eq!(tiers.classify(2.9), None);
    }

    #[test]
    fn validate_rejects_unordered_tiers() {
        let mut cfg = RuntimeConfig::default();
        cfg.thresholds.price_change_1h = ChangeTiers {
            high: 1.0,
            medium: 2.0,
            low: 0.5,
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_detector_on_missing_timeframe() {
        let mut cfg = RuntimeConfig::default();
        cfg.ingest.timeframes = vec![Timeframe::M1];
        assert!(cfg.validate().is_err());

        cfg.detectors.volume_spike = false;
        cfg.detectors.stair_step = false;
        cfg.detectors.range = false;
        cfg.validate().unwrap();
    }

    #[test]
    fn validate_rejects_lookback_beyond_retention() {
        let mut cfg = RuntimeConfig::default();
        cfg.ingest.retention.insert(Timeframe::H1, 10);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_cadences() {
        let zeroed: [fn(&mut RuntimeConfig); 6] = [
            |c| c.ingest.poll_interval_secs = 0,
            |c| c.ingest.universe_refresh_secs = 0,
            |c| c.output.eval_interval_secs = 0,
            |c| c.feed.interval_secs = 0,
            |c| c.exchange.stream_idle_timeout_secs = 0,
            |c| c.exchange.request_timeout_ms = 0,
        ];
        for zero in zeroed {
            let mut cfg = RuntimeConfig::default();
            zero(&mut cfg);
            assert!(cfg.validate().is_err());
        }
    }

    #[test]
    fn validate_rejects_oi_ratio_at_or_below_one() {
        let mut cfg = RuntimeConfig::default();
        cfg.thresholds.oi_jump_ratio = 1.0;
        assert!(cfg.validate().is_err());
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("jumptrader-{}-{name}", std::process::id()))
    }

    #[test]
    fn load_missing_file_gives_defaults() {
        let cfg = RuntimeConfig::load(temp_path("absent.json")).unwrap();
        assert_eq!(cfg.ingest.poll_interval_secs, 60);
    }

    #[test]
    fn load_malformed_file_is_an_error() {
        let path = temp_path("malformed.json");
        std::fs::write(&path, r#"{ "thresholds": { "volume_spike_threshold": "abc" } }"#).unwrap();
        let result = RuntimeConfig::load(&path);
        std::fs::remove_file(&path).unwrap();
        let err = result.unwrap_err();
        assert!(format!("{err:#}").contains("failed to parse"));
    }

    #[test]
    fn load_reads_existing_file() {
        let path = temp_path("valid.json");
        std::fs::write(&path, r#"{ "ingest": { "poll_interval_secs": 30 } }"#).unwrap();
        let result = RuntimeConfig::load(&path);
        std::fs::remove_file(&path).unwrap();
        assert_eq!(result.unwrap().ingest.poll_interval_secs, 30);
    }

    #[test]
    fn testnet_switches_both_endpoints() {
        let mut ex = ExchangeConfig::default();
        ex.use_testnet();
        assert!(ex.rest_url.contains("testnet"));
        assert!(ex.ws_url.contains("binancefuture"));
    }
}
