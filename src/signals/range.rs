// =============================================================================
// Range Breakout / Consolidation
// =============================================================================
//
// Prior range = high/low of the `range_lookback_bars` closed bars before the
// newest closed bar.
//   close > high × (1 + t)          → RangeBreakout Up
//   close < low  × (1 − t)          → RangeBreakout Down
//   else width / mid < consolidation → Consolidation

use super::{Detector, Signal, SignalKind};
use crate::indicators::range::PriceRange;
use crate::market_data::SymbolSnapshot;
use crate::runtime_config::ThresholdConfig;
use crate::types::{Direction, Severity};

/// Consolidation strength for a zero-width range.
const MAX_CONSOLIDATION_STRENGTH: f64 = 10.0;

#[derive(Debug, Default)]
pub struct RangeDetector;

impl Detector for RangeDetector {
    fn name(&self) -> &'static str {
        "range"
    }

    fn evaluate(&self, symbol: &SymbolSnapshot, t: &ThresholdConfig, out: &mut Vec<Signal>) {
        let Some(bars) = symbol.closed_bars(t.range_timeframe, t.range_lookback_bars + 1) else {
            return;
        };
        let Some((newest, prior)) = bars.split_last() else {
            return;
        };
        let Some(range) = PriceRange::of(prior.iter().copied()) else {
            return;
        };

        let close = newest.close;
        let upper = range.high * (1.0 + t.range_break_threshold);
        let lower = range.low * (1.0 - t.range_break_threshold);
        let width = range.width_ratio();

        let breakout = if close > upper {
            Some((Direction::Up, close / range.high - 1.0))
        } else if close < lower {
            Some((Direction::Down, 1.0 - close / range.low))
        } else {
            None
        };

        let signal = match breakout {
            Some((direction, beyond)) => {
                let strength = beyond / t.range_break_threshold;
                Signal::new(
                    &symbol.symbol,
                    SignalKind::RangeBreakout,
                    Severity::from_strength(strength),
                    strength,
                    newest.close_time,
                )
                .direction(Some(direction))
                .metric("beyond_range_pct", beyond * 100.0)
            }
            None if width < t.consolidation_width => {
                let strength = if width > 0.0 {
                    (t.consolidation_width / width).min(MAX_CONSOLIDATION_STRENGTH)
                } else {
                    MAX_CONSOLIDATION_STRENGTH
                };
                Signal::new(
                    &symbol.symbol,
                    SignalKind::Consolidation,
                    Severity::from_strength(strength),
                    strength,
                    newest.close_time,
                )
            }
            None => return,
        };

        out.push(
            signal
                .metric("range_high", range.high)
                .metric("range_low", range.low)
                .metric("range_width_pct", width * 100.0)
                .metric("close", close),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::{Candle, CandleSeries};
    use crate::types::Timeframe;

    fn series(bars: &[(f64, f64, f64)]) -> CandleSeries {
        let mut s = CandleSeries::new(bars.len());
        for (i, &(high, low, close)) in bars.iter().enumerate() {
            let open_time = i as i64 * 3_600_000;
            s.insert(Candle {
                open_time,
                close_time: open_time + 3_599_999,
                open: close,
                high,
                low,
                close,
                volume: 1.0,
                quote_volume: 1.0,
                trades_count: 1,
                is_closed: true,
            });
        }
        s
    }

    fn evaluate(bars: &[(f64, f64, f64)]) -> Vec<Signal> {
        let t = ThresholdConfig {
            range_lookback_bars: bars.len() - 1,
            ..ThresholdConfig::default()
        };
        let snap = SymbolSnapshot::new("XRPUSDT").with_series(Timeframe::H1, series(bars));
        let mut out = Vec::new();
        RangeDetector.evaluate(&snap, &t, &mut out);
        out
    }

    #[test]
    fn close_above_range_is_breakout_up() {
        let out = evaluate(&[(110.0, 90.0, 100.0), (108.0, 92.0, 100.0), (120.0, 110.0, 115.0)]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, SignalKind::RangeBreakout);
        assert_eq!(out[0].direction, Some(Direction::Up));
        // 115 / 110 - 1 = 4.5% beyond, threshold 2% → strength ≈ 2.27
        assert!((out[0].strength - (115.0 / 110.0 - 1.0) / 0.02).abs() < 1e-9);
        assert_eq!(out[0].severity, Severity::High);
    }

    #[test]
    fn close_below_range_is_breakout_down() {
        let out = evaluate(&[(110.0, 90.0, 100.0), (108.0, 92.0, 100.0), (90.0, 80.0, 87.0)]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].direction, Some(Direction::Down));
    }

    #[test]
    fn tight_prior_range_is_consolidation() {
        let out = evaluate(&[(101.0, 99.0, 100.0), (100.5, 99.5, 100.0), (100.8, 99.8, 100.2)]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, SignalKind::Consolidation);
        assert_eq!(out[0].direction, None);
        // width = 2 / 100 = 0.02 → strength 0.05 / 0.02 = 2.5
        assert!((out[0].strength - 2.5).abs() < 1e-9);
    }

    #[test]
    fn wide_range_inside_is_silent() {
        assert!(evaluate(&[(110.0, 90.0, 100.0), (108.0, 92.0, 100.0), (105.0, 95.0, 101.0)]).is_empty());
    }

    #[test]
    fn flat_range_strength_is_capped() {
        let out = evaluate(&[(100.0, 100.0, 100.0), (100.0, 100.0, 100.0), (100.0, 100.0, 100.0)]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].strength, MAX_CONSOLIDATION_STRENGTH);
    }
}
