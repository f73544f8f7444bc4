// =============================================================================
// Multi-timeframe Price Change: ticker 1h / 24h % change against tier tables
// =============================================================================
//
// Each window is classified independently; the highest tier crossed sets the
// severity. Strength is |change| over the window's lowest tier so that it
// grows monotonically with the move.

use super::{Detector, Signal, SignalKind};
use crate::market_data::SymbolSnapshot;
use crate::runtime_config::{ChangeTiers, ThresholdConfig};
use crate::types::Direction;

#[derive(Debug, Default)]
pub struct PriceChangeDetector;

impl Detector for PriceChangeDetector {
    fn name(&self) -> &'static str {
        "price_change"
    }

    fn evaluate(&self, symbol: &SymbolSnapshot, t: &ThresholdConfig, out: &mut Vec<Signal>) {
        let Some(ticker) = symbol.fresh_ticker() else {
            return;
        };

        let windows = [
            (SignalKind::PriceChange1h, ticker.pct_change_1h, &t.price_change_1h),
            (SignalKind::PriceChange24h, Some(ticker.pct_change_24h), &t.price_change_24h),
        ];
        for (kind, change, tiers) in windows {
            if let Some(signal) = change.and_then(|c| classify(&symbol.symbol, kind, c, tiers, ticker.event_time)) {
                out.push(signal);
            }
        }
    }
}

fn classify(symbol: &str, kind: SignalKind, change: f64, tiers: &ChangeTiers, ts: i64) -> Option<Signal> {
    if !change.is_finite() {
        return None;
    }
    let (severity, threshold) = tiers.classify(change.abs())?;
    let strength = change.abs() / tiers.low;
    Some(
        Signal::new(symbol, kind, severity, strength, ts)
            .direction(Direction::of(change))
            .metric("change_pct", change)
            .metric("tier_pct", threshold),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::test_support::ticker;
    use crate::types::Severity;

    fn run(snap: &SymbolSnapshot) -> Vec<Signal> {
        let mut out = Vec::new();
        PriceChangeDetector.evaluate(snap, &ThresholdConfig::default(), &mut out);
        out
    }

    #[test]
    fn ten_percent_daily_move_is_medium() {
        let snap = SymbolSnapshot::new("SOLUSDT").with_ticker(ticker(None, 10.0), false);
        let out = run(&snap);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, SignalKind::PriceChange24h);
        assert_eq!(out[0].severity, Severity::Medium);
        assert_eq!(out[0].direction, Some(Direction::Up));
        assert_eq!(out[0].metrics["tier_pct"], 8.0);
    }

    #[test]
    fn windows_are_classified_independently() {
        let snap = SymbolSnapshot::new("SOLUSDT").with_ticker(ticker(Some(-6.0), 4.0), false);
        let out = run(&snap);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].kind, SignalKind::PriceChange1h);
        assert_eq!(out[0].severity, Severity::High);
        assert_eq!(out[0].direction, Some(Direction::Down));
        assert_eq!(out[1].kind, SignalKind::PriceChange24h);
        assert_eq!(out[1].severity, Severity::Low);
    }

    #[test]
    fn small_moves_are_silent() {
        let snap = SymbolSnapshot::new("SOLUSDT").with_ticker(ticker(Some(0.5), 2.0), false);
        assert!(run(&snap).is_empty());
    }

    #[test]
    fn stale_or_missing_ticker_is_skipped() {
        let stale = SymbolSnapshot::new("SOLUSDT").with_ticker(ticker(Some(9.0), 20.0), true);
        assert!(run(&stale).is_empty());
        assert!(run(&SymbolSnapshot::new("SOLUSDT")).is_empty());
    }
}
