// =============================================================================
// Stair-step Momentum: accelerating same-direction close-to-close moves
// =============================================================================
//
// Over the last `momentum_lookback_bars` moves (percentage, close-to-close),
// a run continues while each move has the same sign as the previous one and
// a magnitude at least as large. A reversal, a smaller move or a flat move
// starts a new run. Only the run ending at the newest move can fire.

use super::{Detector, Signal, SignalKind};
use crate::indicators::roc::calculate_roc;
use crate::market_data::SymbolSnapshot;
use crate::runtime_config::ThresholdConfig;
use crate::types::{Direction, Severity};

/// A maximal stretch of accelerating moves.
#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    /// `None` for a flat move.
    pub direction: Option<Direction>,
    pub moves: Vec<f64>,
}

impl Run {
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn total(&self) -> f64 {
        self.moves.iter().sum()
    }
}

/// Split `moves` into runs, oldest first.
pub fn stair_runs(moves: &[f64]) -> Vec<Run> {
    let mut runs: Vec<Run> = Vec::new();
    for &m in moves {
        let direction = Direction::of(m);
        let extends = match runs.last() {
            Some(run) => {
                direction.is_some()
                    && run.direction == direction
                    && run.moves.last().is_some_and(|prev| m.abs() >= prev.abs())
            }
            None => false,
        };
        match runs.last_mut() {
            Some(run) if extends => run.moves.push(m),
            _ => runs.push(Run {
                direction,
                moves: vec![m],
            }),
        }
    }
    runs
}

#[derive(Debug, Default)]
pub struct StairStepDetector;

impl Detector for StairStepDetector {
    fn name(&self) -> &'static str {
        "stair_step"
    }

    fn evaluate(&self, symbol: &SymbolSnapshot, t: &ThresholdConfig, out: &mut Vec<Signal>) {
        let Some(bars) = symbol.closed_bars(t.momentum_timeframe, t.momentum_lookback_bars + 1) else {
            return;
        };
        let closes: Vec<f64> = bars.iter().map(|c| c.close).collect();
        let moves = calculate_roc(&closes, 1);
        let Some(last) = stair_runs(&moves).pop() else {
            return;
        };
        if last.direction.is_none() || last.len() < t.momentum_min_run {
            return;
        }
        let Some(newest) = bars.last() else {
            return;
        };

        let strength = last.len() as f64 / t.momentum_min_run as f64;
        out.push(
            Signal::new(
                &symbol.symbol,
                SignalKind::StairStep,
                Severity::from_strength(strength),
                strength,
                newest.close_time,
            )
            .direction(last.direction)
            .metric("run_length", last.len() as f64)
            .metric("run_move_pct", last.total())
            .metric("last_move_pct", last.moves.last().copied().unwrap_or_default()),
        );
    }
}
