// =============================================================================
// Volume ratio: current bar against its trailing average
// =============================================================================

/// Arithmetic mean; `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// `current / mean(history)`. `None` when either side is not positive.
pub fn volume_ratio(current: f64, history: &[f64]) -> Option<f64> {
    let avg = mean(history)?;
    if current > 0.0 && avg > 0.0 {
        Some(current / avg)
    } else {
        None
    }
}
