// =============================================================================
// Open Interest Jump: positioning growth between intel refreshes
// =============================================================================

use super::{Detector, Signal, SignalKind};
use crate::market_data::SymbolSnapshot;
use crate::runtime_config::ThresholdConfig;
use crate::types::Severity;

#[derive(Debug, Default)]
pub struct OpenInterestDetector;

impl Detector for OpenInterestDetector {
    fn name(&self) -> &'static str {
        "open_interest"
    }

    fn evaluate(&self, symbol: &SymbolSnapshot, t: &ThresholdConfig, out: &mut Vec<Signal>) {
        let Some(intel) = symbol.intel.as_ref() else {
            return;
        };
        let Some(ratio) = intel.open_interest_ratio() else {
            return;
        };
        if !ratio.is_finite() || ratio < t.oi_jump_ratio {
            return;
        }

        // Open interest says nothing about which side is adding.
        let strength = ratio / t.oi_jump_ratio;
        out.push(
            Signal::new(
                &symbol.symbol,
                SignalKind::OpenInterestJump,
                Severity::from_strength(strength),
                strength,
                intel.received_at_ms,
            )
            .metric("oi_ratio", ratio)
            .metric("open_interest", intel.open_interest)
            .metric("previous_open_interest", intel.previous_open_interest.unwrap_or_default()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::futures_intel::{FuturesIntel, IntelRecord};

    fn intel(open_interest: f64) -> FuturesIntel {
        let rec = IntelRecord {
            symbol: "SOLUSDT".into(),
            tick_count: 10,
            funding_rate: 0.0,
            open_interest,
        };
        FuturesIntel::from_record(&rec, 7)
    }

    fn run(prev: Option<f64>, current: f64, ratio: f64) -> Vec<Signal> {
        let previous = prev.map(intel);
        let snap = SymbolSnapshot::new("SOLUSDT").with_intel(intel(current).with_previous(previous.as_ref()));
        let t = ThresholdConfig {
            oi_jump_ratio: ratio,
            ..ThresholdConfig::default()
        };
        let mut out = Vec::new();
        OpenInterestDetector.evaluate(&snap, &t, &mut out);
        out
    }

    #[test]
    fn jump_at_threshold_fires() {
        let out = run(Some(1000.0), 1500.0, 1.5);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, SignalKind::OpenInterestJump);
        assert!((out[0].strength - 1.0).abs() < 1e-12);
        assert_eq!(out[0].severity, Severity::Low);
        assert_eq!(out[0].direction, None);
        assert_eq!(out[0].timestamp_ms, 7);

        let doubled = run(Some(1000.0), 2000.0, 1.8);
        assert_eq!(doubled.len(), 1);
    }

    #[test]
    fn small_change_is_silent() {
        assert!(run(Some(1000.0), 1000.0, 1.5).is_empty());
        assert!(run(Some(1000.0), 1200.0, 1.5).is_empty());
    }

    #[test]
    fn missing_or_non_positive_history_is_silent() {
        assert!(run(None, 1500.0, 1.5).is_empty());
        assert!(run(Some(0.0), 1000.0, 1.5).is_empty());
        assert!(run(Some(1000.0), -1000.0, 1.5).is_empty());
        assert!(run(Some(-1000.0), 1000.0, 1.5).is_empty());
        assert!(run(Some(1000.0), 0.0, 1.5).is_empty());
    }
}
