// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free helpers used by the signal detectors. Functions
// return `Option<T>` (or an empty vector) on insufficient data or numerical
// edge cases so callers must handle them.

pub mod range;
pub mod roc;
pub mod volume;
