// =============================================================================
// Volume Spike: last closed bar against its trailing average
// =============================================================================
//
//   ratio = quote_volume(newest closed bar) / mean(quote_volume of the
//           `volume_lookback_bars` bars before it)
//
// Fires when ratio >= `volume_spike_threshold`. Direction follows the spike
// bar's body.

use super::{Detector, Signal, SignalKind};
use crate::indicators::volume::volume_ratio;
use crate::market_data::SymbolSnapshot;
use crate::runtime_config::ThresholdConfig;
use crate::types::{Direction, Severity};

#[derive(Debug, Default)]
pub struct VolumeSpikeDetector;

impl Detector for VolumeSpikeDetector {
    fn name(&self) -> &'static str {
        "volume_spike"
    }

    fn evaluate(&self, symbol: &SymbolSnapshot, t: &ThresholdConfig, out: &mut Vec<Signal>) {
        let Some(bars) = symbol.closed_bars(t.volume_timeframe, t.volume_lookback_bars + 1) else {
            return;
        };
        let Some((current, history)) = bars.split_last() else {
            return;
        };
        let history: Vec<f64> = history.iter().map(|c| c.quote_volume).collect();
        let Some(ratio) = volume_ratio(current.quote_volume, &history) else {
            return;
        };
        if ratio < t.volume_spike_threshold {
            return;
        }

        let strength = ratio / t.volume_spike_threshold;
        out.push(
            Signal::new(
                &symbol.symbol,
                SignalKind::VolumeSpike,
                Severity::from_strength(strength),
                strength,
                current.close_time,
            )
            .direction(Direction::of(current.close - current.open))
            .metric("ratio", ratio)
            .metric("volume", current.quote_volume)
            .metric("average_volume", current.quote_volume / ratio),
        );
    }
}
