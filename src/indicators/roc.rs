// =============================================================================
// Rate of Change (ROC): Momentum Indicator
// =============================================================================
//
// ROC measures the percentage change in price over a look-back period:
//   ROC = ((close - close_n) / close_n) * 100
//
// With `period = 1` it yields the close-to-close moves used for stair-step
// detection.

/// Percentage change from `from` to `to`; `None` when `from` is not positive.
pub fn pct_change(from: f64, to: f64) -> Option<f64> {
    if from > 0.0 && from.is_finite() && to.is_finite() {
        Some((to - from) / from * 100.0)
    } else {
        None
    }
}

/// Calculate the Rate of Change (ROC) for the given closing prices and period.
///
/// Returns a vector of ROC values, one per close starting at index `period`.
/// A non-positive reference close yields 0.0 for that position.
pub fn calculate_roc(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() <= period {
        return Vec::new();
    }

    (period..closes.len())
        .map(|i| pct_change(closes[i - period], closes[i]).unwrap_or(0.0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roc_basic() {
        let closes: Vec<f64> = (1..=20).map(|x| x as f64).collect();
        let roc = calculate_roc(&closes, 14);
        assert_eq!(roc.len(), 6);
        // From 1 to 15: ROC = (15-1)/1 * 100 = 1400%
        assert!((roc[0] - 1400.0).abs() < 1e-10);
    }

    #[test]
    fn roc_period_one_gives_moves() {
        let moves = calculate_roc(&[100.0, 101.0, 99.99], 1);
        assert_eq!(moves.len(), 2);
        assert!((moves[0] - 1.0).abs() < 1e-10);
        assert!((moves[1] + 1.0).abs() < 1e-10);
    }

    #[test]
    fn roc_insufficient_data() {
        let closes = vec![1.0, 2.0, 3.0];
        assert!(calculate_roc(&closes, 14).is_empty());
        assert!(calculate_roc(&closes, 0).is_empty());
    }

    #[test]
    fn pct_change_rejects_zero_base() {
        assert_eq!(pct_change(0.0, 5.0), None);
        assert_eq!(pct_change(50.0, 55.0), Some(10.0));
    }
}
