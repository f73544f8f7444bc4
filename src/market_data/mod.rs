pub mod candle_series;
pub mod manager;
pub mod snapshot;
pub mod ticker;

// Re-export the core types for convenient access (e.g. `use crate::market_data::Candle`).
pub use candle_series::{Candle, CandleSeries, InsertOutcome, MergeStats};
pub use manager::{Health, MarketDataManager, PollReport, UniverseDiff};
pub use snapshot::{MarketSnapshot, SymbolSnapshot};
pub use ticker::{TickerState, TickerUpdate};
