// =============================================================================
// Funding Anomaly: extreme perpetual funding, read contrarian
// =============================================================================

use super::{Detector, Signal, SignalKind};
use crate::market_data::SymbolSnapshot;
use crate::runtime_config::ThresholdConfig;
use crate::types::Severity;

#[derive(Debug, Default)]
pub struct FundingDetector;

impl Detector for FundingDetector {
    fn name(&self) -> &'static str {
        "funding"
    }

    fn evaluate(&self, symbol: &SymbolSnapshot, t: &ThresholdConfig, out: &mut Vec<Signal>) {
        let Some(intel) = symbol.intel.as_ref() else {
            return;
        };
        let pct = intel.funding_rate_pct;
        if !pct.is_finite() || pct.abs() < t.funding_rate_threshold_pct {
            return;
        }

        let strength = pct.abs() / t.funding_rate_threshold_pct;
        out.push(
            Signal::new(
                &symbol.symbol,
                SignalKind::FundingAnomaly,
                Severity::from_strength(strength),
                strength,
                intel.received_at_ms,
            )
            .direction(intel.funding_bias())
            .metric("funding_rate_pct", pct)
            .metric("open_interest", intel.open_interest),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::futures_intel::{FuturesIntel, IntelRecord};
    use crate::types::Direction;

    fn snap(rate: f64) -> SymbolSnapshot {
        let rec = IntelRecord {
            symbol: "DOGEUSDT".into(),
            tick_count: 100,
            funding_rate: rate,
            open_interest: 5_000.0,
        };
        SymbolSnapshot::new("DOGEUSDT").with_intel(FuturesIntel::from_record(&rec, 42))
    }

    fn run(s: &SymbolSnapshot) -> Vec<Signal> {
        let mut out = Vec::new();
        FundingDetector.evaluate(s, &ThresholdConfig::default(), &mut out);
        out
    }

    #[test]
    fn extreme_positive_funding_leans_down() {
        let out = run(&snap(0.0012));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].direction, Some(Direction::Down));
        assert!((out[0].strength - 2.4).abs() < 1e-9);
        assert_eq!(out[0].severity, Severity::High);
        assert_eq!(out[0].timestamp_ms, 42);
    }

    #[test]
    fn negative_funding_leans_up() {
        let out = run(&snap(-0.0006));
        assert_eq!(out[0].direction, Some(Direction::Up));
    }

    #[test]
    fn normal_funding_or_no_intel_is_silent() {
        assert!(run(&snap(0.0001)).is_empty());
        assert!(run(&SymbolSnapshot::new("DOGEUSDT")).is_empty());
    }
}
