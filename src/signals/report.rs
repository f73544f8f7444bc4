// =============================================================================
// Signal Report: full output of one evaluation cycle
// =============================================================================

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use super::{Signal, SignalKind};
use crate::types::Severity;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalReport {
    /// Newest data timestamp in the evaluated snapshot, ms.
    pub as_of_ms: i64,
    pub symbols_evaluated: usize,
    pub signals: Vec<Signal>,
}

/// Per-symbol ranking entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolScore {
    pub symbol: String,
    pub signals: usize,
    pub max_severity: Severity,
}

impl SignalReport {
    /// Signal count per kind.
    pub fn summary(&self) -> BTreeMap<SignalKind, usize> {
        let mut out = BTreeMap::new();
        for s in &self.signals {
            *out.entry(s.kind).or_insert(0) += 1;
        }
        out
    }

    /// Symbols ranked by signal count, then highest severity, then name.
    pub fn top_symbols(&self, n: usize) -> Vec<SymbolScore> {
        let mut by_symbol: HashMap<&str, (usize, Severity)> = HashMap::new();
        for s in &self.signals {
            let entry = by_symbol.entry(s.symbol.as_str()).or_insert((0, s.severity));
            entry.0 += 1;
            entry.1 = entry.1.max(s.severity);
        }

        let mut scores: Vec<SymbolScore> = by_symbol
            .into_iter()
            .map(|(symbol, (signals, max_severity))| SymbolScore {
                symbol: symbol.to_string(),
                signals,
                max_severity,
            })
            .collect();
        scores.sort_by(|a, b| {
            b.signals
                .cmp(&a.signals)
                .then_with(|| b.max_severity.cmp(&a.max_severity))
                .then_with(|| a.symbol.cmp(&b.symbol))
        });
        scores.truncate(n);
        scores
    }

    pub fn of_kind(&self, kind: SignalKind) -> impl Iterator<Item = &Signal> {
        self.signals.iter().filter(move |s| s.kind == kind)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialise signal report")
    }

    /// Write the report as JSON (write to `.tmp`, then rename).
    pub fn write_atomic(&self, path: &Path) -> Result<()> {
        let content = self.to_json()?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create report directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp report to {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp report to {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(symbol: &str, kind: SignalKind, severity: Severity) -> Signal {
        Signal::new(symbol, kind, severity, 1.0, 0)
    }

    fn report() -> SignalReport {
        SignalReport {
            as_of_ms: 10,
            symbols_evaluated: 4,
            signals: vec![
                sig("AAAUSDT", SignalKind::VolumeSpike, Severity::Low),
                sig("BBBUSDT", SignalKind::VolumeSpike, Severity::Low),
                sig("BBBUSDT", SignalKind::StairStep, Severity::Medium),
                sig("CCCUSDT", SignalKind::RangeBreakout, Severity::High),
                sig("CCCUSDT", SignalKind::PriceChange24h, Severity::Low),
                sig("DDDUSDT", SignalKind::Consolidation, Severity::High),
            ],
        }
    }

    #[test]
    fn summary_counts_per_kind() {
        let summary = report().summary();
        assert_eq!(summary[&SignalKind::VolumeSpike], 2);
        assert_eq!(summary[&SignalKind::StairStep], 1);
        assert!(!summary.contains_key(&SignalKind::FundingAnomaly));
    }

    #[test]
    fn top_symbols_rank_by_count_then_severity() {
        let top = report().top_symbols(3);
        let names: Vec<&str> = top.iter().map(|s| s.symbol.as_str()).collect();
        assert_eq!(names, vec!["CCCUSDT", "BBBUSDT", "DDDUSDT"]);
        assert_eq!(top[0].max_severity, Severity::High);
        assert_eq!(top[1].signals, 2);
    }

    #[test]
    fn of_kind_filters() {
        let r = report();
        let spikes: Vec<&str> = r.of_kind(SignalKind::VolumeSpike).map(|s| s.symbol.as_str()).collect();
        assert_eq!(spikes, vec!["AAAUSDT", "BBBUSDT"]);
    }

    #[test]
    fn write_atomic_leaves_no_tmp_file() {
        let dir = std::env::temp_dir().join(format!("jumptrader-report-{}", std::process::id()));
        let path = dir.join("signals.json");
        report().write_atomic(&path).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["signals"].as_array().map(Vec::len), Some(6));
        assert_eq!(written["signals"][0]["kind"], "VolumeSpike");
        assert!(!path.with_extension("json.tmp").exists());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
