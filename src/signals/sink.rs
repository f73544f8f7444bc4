// =============================================================================
// Signal sinks: where each cycle's report goes
// =============================================================================

use std::path::PathBuf;

use anyhow::Result;
use tracing::{debug, info};

use super::report::SignalReport;

/// Consumer of full per-cycle reports.
pub trait SignalSink: Send + Sync {
    fn publish(&self, report: &SignalReport) -> Result<()>;
}

/// Logs a one-line summary plus the top symbols.
#[derive(Debug, Clone)]
pub struct LogSink {
    top_n: usize,
}

impl LogSink {
    pub fn new(top_n: usize) -> Self {
        Self { top_n }
    }
}

impl SignalSink for LogSink {
    fn publish(&self, report: &SignalReport) -> Result<()> {
        let summary: Vec<String> = report
            .summary()
            .into_iter()
            .map(|(kind, n)| format!("{kind}={n}"))
            .collect();
        info!(
            symbols = report.symbols_evaluated,
            signals = report.signals.len(),
            as_of_ms = report.as_of_ms,
            summary = %summary.join(" "),
            "signal cycle complete"
        );
        for score in report.top_symbols(self.top_n) {
            debug!(
                symbol = %score.symbol,
                signals = score.signals,
                max_severity = %score.max_severity,
                "top symbol"
            );
        }
        Ok(())
    }
}

/// Writes each report to a JSON file for an external presentation layer.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SignalSink for JsonFileSink {
    fn publish(&self, report: &SignalReport) -> Result<()> {
        report.write_atomic(&self.path)?;
        debug!(path = %self.path.display(), "signal report written");
        Ok(())
    }
}
