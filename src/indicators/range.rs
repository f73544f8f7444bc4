// =============================================================================
// Price range: high/low envelope over a set of bars
// =============================================================================

use crate::market_data::Candle;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceRange {
    pub high: f64,
    pub low: f64,
}

impl PriceRange {
    /// Envelope of `bars`; `None` when empty or the prices are not usable.
    pub fn of<'a, I>(bars: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Candle>,
    {
        let (high, low) = bars
            .into_iter()
            .fold(None, |acc: Option<(f64, f64)>, c| match acc {
                None => Some((c.high, c.low)),
                Some((h, l)) => Some((h.max(c.high), l.min(c.low))),
            })?;
        (low > 0.0 && high >= low).then_some(Self { high, low })
    }

    pub fn mid(&self) -> f64 {
        (self.high + self.low) / 2.0
    }

    /// Width as a fraction of the midpoint.
    pub fn width_ratio(&self) -> f64 {
        (self.high - self.low) / self.mid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(high: f64, low: f64) -> Candle {
        Candle {
            open_time: 0,
            close_time: 0,
            open: low,
            high,
            low,
            close: high,
            volume: 1.0,
            quote_volume: 1.0,
            trades_count: 1,
            is_closed: true,
        }
    }

    #[test]
    fn envelope_and_width() {
        let bars = [bar(102.0, 100.0), bar(104.0, 99.0), bar(101.0, 100.5)];
        let r = PriceRange::of(&bars).unwrap();
        assert_eq!(r.high, 104.0);
        assert_eq!(r.low, 99.0);
        assert!((r.width_ratio() - 5.0 / 101.5).abs() < 1e-12);
    }

    #[test]
    fn empty_or_non_positive_has_no_range() {
        assert!(PriceRange::of(&[] as &[Candle]).is_none());
        assert!(PriceRange::of(&[bar(1.0, 0.0)]).is_none());
    }
}
