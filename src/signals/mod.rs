// =============================================================================
// Signals Module
// =============================================================================
//
// Threshold-based detectors evaluated over an immutable market snapshot:
// - Volume spike (bar volume vs trailing average)
// - Multi-timeframe price change (1h / 24h tier tables)
// - Stair-step momentum (accelerating same-direction moves)
// - Range breakout / consolidation
// - Funding anomaly (contrarian)
// - Open interest jump
//
// Evaluation is pure: no I/O, no wall clock. Signal timestamps come from the
// data that produced them.

pub mod funding;
pub mod open_interest;
pub mod price_change;
pub mod processor;
pub mod range;
pub mod report;
pub mod sink;
pub mod stair_step;
pub mod volume_spike;

pub use processor::SignalProcessor;
pub use report::{SignalReport, SymbolScore};
pub use sink::{JsonFileSink, LogSink, SignalSink};

use std::collections::BTreeMap;

use serde::Serialize;

use crate::market_data::SymbolSnapshot;
use crate::runtime_config::ThresholdConfig;
use crate::types::{Direction, Severity};

/// Detector output category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum SignalKind {
    VolumeSpike,
    PriceChange1h,
    PriceChange24h,
    StairStep,
    RangeBreakout,
    Consolidation,
    FundingAnomaly,
    OpenInterestJump,
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::VolumeSpike => "VolumeSpike",
            Self::PriceChange1h => "PriceChange1h",
            Self::PriceChange24h => "PriceChange24h",
            Self::StairStep => "StairStep",
            Self::RangeBreakout => "RangeBreakout",
            Self::Consolidation => "Consolidation",
            Self::FundingAnomaly => "FundingAnomaly",
            Self::OpenInterestJump => "OpenInterestJump",
        };
        f.write_str(s)
    }
}

/// One detector finding for one symbol in one evaluation cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    pub symbol: String,
    pub kind: SignalKind,
    pub direction: Option<Direction>,
    pub severity: Severity,
    /// Metric divided by its threshold; at least 1.0 for a fired signal.
    pub strength: f64,
    pub metrics: BTreeMap<&'static str, f64>,
    /// Data timestamp (bar close or ticker event), ms.
    pub timestamp_ms: i64,
}

impl Signal {
    pub fn new(symbol: &str, kind: SignalKind, severity: Severity, strength: f64, timestamp_ms: i64) -> Self {
        Self {
            symbol: symbol.to_string(),
            kind,
            direction: None,
            severity,
            strength,
            metrics: BTreeMap::new(),
            timestamp_ms,
        }
    }

    pub fn direction(mut self, direction: Option<Direction>) -> Self {
        self.direction = direction;
        self
    }

    pub fn metric(mut self, name: &'static str, value: f64) -> Self {
        self.metrics.insert(name, value);
        self
    }
}

/// A single independent detector.
///
/// Detectors append zero or more signals and skip silently when their input
/// is missing, stale or too short.
pub trait Detector: Send + Sync {
    fn name(&self) -> &'static str;

    fn evaluate(&self, symbol: &SymbolSnapshot, thresholds: &ThresholdConfig, out: &mut Vec<Signal>);
}
