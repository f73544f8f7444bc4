// =============================================================================
// Auxiliary intel feed: external command printing a JSON array
// =============================================================================
//
// Expected stdout:
// ```json
// [ { "symbol": "BTCUSDT", "tickCount": 812, "fundingRate": "0.0001",
//     "openInterest": "81234.5" }, ... ]
// ```
// Missing fields default, malformed entries are skipped. A binary that does
// not exist means "no feed" and yields an empty result.
// =============================================================================

use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use super::IntelRecord;

/// Source of per-symbol intel records.
#[async_trait]
pub trait IntelFeed: Send + Sync {
    async fn fetch(&self) -> Result<Vec<IntelRecord>>;
}

/// Runs a configured program and parses its stdout.
#[derive(Debug, Clone)]
pub struct CommandFeed {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandFeed {
    /// `argv[0]` is the program; `None` when `argv` is empty.
    pub fn new(argv: &[String], timeout: Duration) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
            timeout,
        })
    }
}

#[async_trait]
impl IntelFeed for CommandFeed {
    async fn fetch(&self) -> Result<Vec<IntelRecord>> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Err(_) => anyhow::bail!(
                "feed command '{}' timed out after {}s",
                self.program,
                self.timeout.as_secs()
            ),
            Ok(Err(e)) if e.kind() == ErrorKind::NotFound => {
                debug!(program = %self.program, "feed command not found, no intel");
                return Ok(Vec::new());
            }
            Ok(res) => res.with_context(|| format!("failed to run feed command '{}'", self.program))?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "feed command '{}' exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            );
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_records(&stdout)
    }
}

/// Parse the feed's JSON array, skipping entries that do not decode.
pub fn parse_records(text: &str) -> Result<Vec<IntelRecord>> {
    let root: serde_json::Value =
        serde_json::from_str(text.trim()).context("failed to parse feed JSON")?;
    let entries = root.as_array().context("feed output is not a JSON array")?;

    let mut records = Vec::with_capacity(entries.len());
    let mut skipped = 0usize;
    for entry in entries {
        match serde_json::from_value::<IntelRecord>(entry.clone()) {
            Ok(rec) if !rec.symbol.is_empty() => records.push(rec),
            Ok(_) => skipped += 1,
            Err(e) => {
                debug!(error = %e, "skipping malformed feed entry");
                skipped += 1;
            }
        }
    }
    if skipped > 0 {
        warn!(skipped, kept = records.len(), "feed entries skipped");
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_skips_malformed_entries() {
        let text = r#"[
            {"symbol":"BTCUSDT","tickCount":5,"fundingRate":0.0001,"openInterest":"10"},
            {"tickCount":3},
            {"symbol":"ETHUSDT","fundingRate":"not-a-number"},
            {"symbol":"SOLUSDT"}
        ]"#;
        let recs = parse_records(text).unwrap();
        let syms: Vec<&str> = recs.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(syms, vec!["BTCUSDT", "SOLUSDT"]);
        assert_eq!(recs[1].tick_count, 0);
    }

    #[test]
    fn parse_rejects_non_array() {
        assert!(parse_records(r#"{"symbol":"BTCUSDT"}"#).is_err());
        assert!(parse_records("garbage").is_err());
    }

    #[test]
    fn empty_argv_has_no_feed() {
        assert!(CommandFeed::new(&[], Duration::from_secs(1)).is_none());
    }

    #[tokio::test]
    async fn missing_binary_means_no_feed() {
        let feed = CommandFeed::new(
            &["/nonexistent/jumptrader-feed-binary".to_string()],
            Duration::from_secs(5),
        )
        .unwrap();
        assert!(feed.fetch().await.unwrap().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_output_is_parsed() {
        let feed = CommandFeed::new(
            &[
                "sh".to_string(),
                "-c".to_string(),
                r#"echo '[{"symbol":"BTCUSDT","tickCount":7,"fundingRate":"0.0002","openInterest":"1.5"}]'"#
                    .to_string(),
            ],
            Duration::from_secs(5),
        )
        .unwrap();
        let recs = feed.fetch().await.unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].tick_count, 7);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_command_is_an_error() {
        let feed = CommandFeed::new(
            &["sh".to_string(), "-c".to_string(), "exit 3".to_string()],
            Duration::from_secs(5),
        )
        .unwrap();
        assert!(feed.fetch().await.is_err());
    }
}
