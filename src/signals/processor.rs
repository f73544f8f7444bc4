// =============================================================================
// Signal Processor: runs every enabled detector over a snapshot
// =============================================================================
//
// Symbols are visited in symbol order and detectors in a fixed order, so the
// same snapshot always yields the same report. Conflicting signals (e.g. a
// breakout and a contrarian funding read) are all emitted; ranking is left
// to the consumer.

use std::sync::Arc;

use tracing::debug;

use super::funding::FundingDetector;
use super::open_interest::OpenInterestDetector;
use super::price_change::PriceChangeDetector;
use super::range::RangeDetector;
use super::report::SignalReport;
use super::stair_step::StairStepDetector;
use super::volume_spike::VolumeSpikeDetector;
use super::Detector;
use crate::market_data::MarketSnapshot;
use crate::runtime_config::{DetectorToggles, ThresholdConfig};

pub struct SignalProcessor {
    thresholds: Arc<ThresholdConfig>,
    detectors: Vec<Box<dyn Detector>>,
}

impl SignalProcessor {
    /// Build with the enabled built-in detectors.
    pub fn new(thresholds: Arc<ThresholdConfig>, toggles: &DetectorToggles) -> Self {
        let mut detectors: Vec<Box<dyn Detector>> = Vec::new();
        if toggles.volume_spike {
            detectors.push(Box::new(VolumeSpikeDetector));
        }
        if toggles.price_change {
            detectors.push(Box::new(PriceChangeDetector));
        }
        if toggles.stair_step {
            detectors.push(Box::new(StairStepDetector));
        }
        if toggles.range {
            detectors.push(Box::new(RangeDetector));
        }
        if toggles.funding {
            detectors.push(Box::new(FundingDetector));
        }
        if toggles.open_interest {
            detectors.push(Box::new(OpenInterestDetector));
        }
        Self::with_detectors(thresholds, detectors)
    }

    pub fn with_detectors(thresholds: Arc<ThresholdConfig>, detectors: Vec<Box<dyn Detector>>) -> Self {
        Self {
            thresholds,
            detectors,
        }
    }

    pub fn detector_names(&self) -> Vec<&'static str> {
        self.detectors.iter().map(|d| d.name()).collect()
    }

    /// Evaluate every symbol in `snapshot`. Pure; no I/O.
    pub fn evaluate(&self, snapshot: &MarketSnapshot) -> SignalReport {
        let mut signals = Vec::new();
        for symbol in snapshot.symbols.values() {
            for detector in &self.detectors {
                detector.evaluate(symbol, &self.thresholds, &mut signals);
            }
        }
        debug!(
            symbols = snapshot.len(),
            signals = signals.len(),
            as_of_ms = snapshot.as_of_ms,
            "snapshot evaluated"
        );
        SignalReport {
            as_of_ms: snapshot.as_of_ms,
            symbols_evaluated: snapshot.len(),
            signals,
        }
    }
}

impl std::fmt::Debug for SignalProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalProcessor")
            .field("detectors", &self.detector_names())
            .field("thresholds", &self.thresholds)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::futures_intel::{FuturesIntel, IntelRecord};
    use crate::market_data::SymbolSnapshot;
    use crate::signals::test_support::{hourly_series, ticker};
    use crate::signals::SignalKind;
    use crate::types::Timeframe;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn busy_symbol(name: &str) -> SymbolSnapshot {
        let mut volumes = vec![100.0; 24];
        volumes.push(500.0);
        let mut closes = vec![100.0; 25];
        closes[24] = 100.4;
        SymbolSnapshot::new(name)
            .with_ticker(ticker(Some(2.5), 16.0), false)
            .with_series(Timeframe::H1, hourly_series(&closes, &volumes))
            .with_intel(FuturesIntel::from_record(
                &IntelRecord {
                    symbol: name.into(),
                    tick_count: 1,
                    funding_rate: 0.0008,
                    open_interest: 1.0,
                },
                1_700_000_000_000,
            ))
    }

    fn snapshot(published_secs: i64) -> MarketSnapshot {
        let symbols: BTreeMap<String, SymbolSnapshot> = ["ETHUSDT", "BTCUSDT", "NEWUSDT"]
            .into_iter()
            .map(|s| {
                let snap = if s == "NEWUSDT" {
                    SymbolSnapshot::new(s)
                } else {
                    busy_symbol(s)
                };
                (s.to_string(), snap)
            })
            .collect();
        let published = Utc.timestamp_opt(published_secs, 0).single().unwrap();
        MarketSnapshot::new(published, symbols)
    }

    #[test]
    fn all_detectors_fire_in_fixed_order() {
        let processor = SignalProcessor::new(Arc::new(ThresholdConfig::default()), &DetectorToggles::default());
        let report = processor.evaluate(&snapshot(1));

        assert_eq!(report.symbols_evaluated, 3);
        let btc: Vec<SignalKind> = report
            .signals
            .iter()
            .filter(|s| s.symbol == "BTCUSDT")
            .map(|s| s.kind)
            .collect();
        assert_eq!(
            btc,
            vec![
                SignalKind::VolumeSpike,
                SignalKind::PriceChange1h,
                SignalKind::PriceChange24h,
                SignalKind::Consolidation,
                SignalKind::FundingAnomaly,
            ]
        );
        // BTCUSDT is evaluated before ETHUSDT.
        assert_eq!(report.signals[0].symbol, "BTCUSDT");
        assert!(report.signals.iter().all(|s| s.symbol != "NEWUSDT"));
    }

    #[test]
    fn identical_data_gives_byte_identical_reports() {
        let processor = SignalProcessor::new(Arc::new(ThresholdConfig::default()), &DetectorToggles::default());
        let a = serde_json::to_string(&processor.evaluate(&snapshot(1))).unwrap();
        let b = serde_json::to_string(&processor.evaluate(&snapshot(999))).unwrap();
        assert!(!a.is_empty());
        assert_eq!(a, b);
    }

    #[test]
    fn disabled_detectors_do_not_run() {
        let toggles = DetectorToggles {
            volume_spike: false,
            price_change: false,
            stair_step: true,
            range: false,
            funding: false,
            open_interest: false,
        };
        let processor = SignalProcessor::new(Arc::new(ThresholdConfig::default()), &toggles);
        assert_eq!(processor.detector_names(), vec!["stair_step"]);
        assert!(processor.evaluate(&snapshot(1)).signals.is_empty());
    }

    #[test]
    fn open_interest_jump_follows_funding() {
        let previous = FuturesIntel::from_record(
            &IntelRecord {
                symbol: "BTCUSDT".into(),
                tick_count: 1,
                funding_rate: 0.0008,
                open_interest: 0.5,
            },
            1_699_999_000_000,
        );
        let mut symbol = busy_symbol("BTCUSDT");
        symbol.intel = symbol.intel.map(|i| i.with_previous(Some(&previous)));
        let snapshot = MarketSnapshot::new(Utc::now(), [("BTCUSDT".to_string(), symbol)].into_iter().collect());

        let processor = SignalProcessor::new(Arc::new(ThresholdConfig::default()), &DetectorToggles::default());
        assert_eq!(
            processor.detector_names(),
            vec!["volume_spike", "price_change", "stair_step", "range", "funding", "open_interest"]
        );
        let kinds: Vec<SignalKind> = processor.evaluate(&snapshot).signals.iter().map(|s| s.kind).collect();
        assert_eq!(kinds.last(), Some(&SignalKind::OpenInterestJump));
        assert_eq!(kinds[kinds.len() - 2], SignalKind::FundingAnomaly);
    }

    #[test]
    fn empty_snapshot_gives_empty_report() {
        let processor = SignalProcessor::new(Arc::new(ThresholdConfig::default()), &DetectorToggles::default());
        let report = processor.evaluate(&MarketSnapshot::new(Utc::now(), BTreeMap::new()));
        assert_eq!(report.symbols_evaluated, 0);
        assert!(report.signals.is_empty());
        assert_eq!(report.as_of_ms, 0);
    }
}
