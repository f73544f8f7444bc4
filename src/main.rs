// =============================================================================
// JumpTrader Signal Engine: Main Entry Point
// =============================================================================
//
// Streams and polls Binance USDⓈ-M perpetual market data for the working set
// of symbols, evaluates threshold detectors over periodic snapshots and hands
// each cycle's report to the configured sinks.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod binance;
mod error;
mod futures_intel;
mod indicators;
mod market_data;
mod runtime_config;
mod shutdown;
mod signals;
mod types;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::binance::{BinanceFuturesClient, ExchangeClient, RetryPolicy};
use crate::futures_intel::{CommandFeed, IntelFeed};
use crate::market_data::MarketDataManager;
use crate::runtime_config::RuntimeConfig;
use crate::shutdown::Shutdown;
use crate::signals::{JsonFileSink, LogSink, SignalProcessor, SignalSink};

const DEFAULT_CONFIG_PATH: &str = "jumptrader.json";
/// Upper bound on waiting for tasks after ctrl-c.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("JumpTrader signal engine starting up");

    let config_path = std::env::var("JUMPTRADER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let mut config = RuntimeConfig::load(&config_path)?;
    apply_env_overrides(&mut config)?;
    config.validate().context("invalid configuration")?;

    info!(
        rest_url = %config.exchange.rest_url,
        timeframes = ?config.ingest.timeframes,
        max_symbols = ?config.ingest.max_symbols,
        poll_interval_secs = config.ingest.poll_interval_secs,
        "configuration ready"
    );

    // ── 2. Build components ──────────────────────────────────────────────
    let binance = Arc::new(BinanceFuturesClient::new(
        &config.exchange,
        config.ingest.quote_asset.clone(),
    )?);
    let client: Arc<dyn ExchangeClient> = binance.clone();
    let manager = Arc::new(MarketDataManager::new(
        client,
        config.ingest.clone(),
        RetryPolicy::from_config(&config.exchange),
    ));
    let processor = SignalProcessor::new(Arc::new(config.thresholds.clone()), &config.detectors);
    info!(detectors = ?processor.detector_names(), "signal processor ready");

    let mut sinks: Vec<Box<dyn SignalSink>> = vec![Box::new(LogSink::new(config.output.top_n))];
    if let Some(path) = &config.output.report_path {
        info!(path = %path.display(), "writing signal reports to file");
        sinks.push(Box::new(JsonFileSink::new(path.clone())));
    }

    let feed: Option<Arc<dyn IntelFeed>> = config
        .feed
        .command
        .as_deref()
        .and_then(|argv| CommandFeed::new(argv, Duration::from_secs(config.feed.timeout_secs)))
        .map(|f| Arc::new(f) as Arc<dyn IntelFeed>);

    // ── 3. Bootstrap ─────────────────────────────────────────────────────
    let diff = manager
        .refresh_universe()
        .await
        .context("initial symbol universe refresh failed")?;
    info!(symbols = diff.total, "tracking symbols");

    if let Err(e) = manager.seed_tickers().await {
        warn!(error = %e, "could not seed tickers, waiting for the stream");
    }

    // ── 4. Spawn loops ───────────────────────────────────────────────────
    let (trigger, shutdown) = shutdown::channel();
    let mut tasks = Vec::new();

    tasks.push(tokio::spawn(manager.clone().run_ticker_stream(shutdown.clone())));
    tasks.push(tokio::spawn(manager.clone().run_poll_loop(shutdown.clone())));
    tasks.push(tokio::spawn(manager.clone().run_universe_loop(shutdown.clone())));
    if let Some(feed) = feed {
        let every = Duration::from_secs(config.feed.interval_secs);
        tasks.push(tokio::spawn(manager.clone().run_intel_loop(feed, every, shutdown.clone())));
    } else {
        info!("no intel feed configured");
    }
    tasks.push(tokio::spawn(run_signal_loop(
        manager.clone(),
        binance.clone(),
        processor,
        sinks,
        Duration::from_secs(config.output.eval_interval_secs),
        shutdown.clone(),
    )));

    // ── 5. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    trigger.trigger();

    let join_all = futures_util::future::join_all(tasks);
    match tokio::time::timeout(SHUTDOWN_GRACE, join_all).await {
        Ok(results) => {
            for r in results {
                if let Err(e) = r {
                    error!(error = %e, "task ended abnormally");
                }
            }
        }
        Err(_) => warn!(grace_secs = SHUTDOWN_GRACE.as_secs(), "tasks still running at shutdown deadline"),
    }

    let last_as_of = manager.latest_snapshot().map(|s| s.as_of_ms);
    info!(health = ?manager.health(), last_as_of = ?last_as_of, "JumpTrader signal engine stopped");
    Ok(())
}

/// Publish a snapshot, evaluate it and hand the report to every sink.
async fn run_signal_loop(
    manager: Arc<MarketDataManager>,
    binance: Arc<BinanceFuturesClient>,
    processor: SignalProcessor,
    sinks: Vec<Box<dyn SignalSink>>,
    every: Duration,
    shutdown: Shutdown,
) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {}
        }

        let snapshot = manager.publish_snapshot();
        let report = processor.evaluate(&snapshot);
        for sink in &sinks {
            if let Err(e) = sink.publish(&report) {
                warn!(error = %e, "signal sink failed");
            }
        }
        if let Some(poll) = manager.last_poll() {
            if poll.failed > 0 {
                warn!(failed = poll.failed, health = ?manager.health(), "last candle poll had failures");
            }
        }
        let budget = binance.budget().snapshot();
        debug!(
            symbols = manager.symbols().len(),
            spent = budget.spent_in_window,
            max = budget.max_weight,
            server_weight = ?budget.server_used_weight_1m,
            "request budget"
        );
    }
    info!("signal loop stopped");
}

fn apply_env_overrides(config: &mut RuntimeConfig) -> anyhow::Result<()> {
    if env_flag("BINANCE_TESTNET") {
        info!("using Binance futures testnet");
        config.exchange.use_testnet();
    }
    if let Ok(v) = std::env::var("JUMPTRADER_MAX_SYMBOLS") {
        let max: usize = v
            .trim()
            .parse()
            .with_context(|| format!("JUMPTRADER_MAX_SYMBOLS is not a number: {v}"))?;
        config.ingest.max_symbols = (max > 0).then_some(max);
    }
    if let Ok(cmd) = std::env::var("JUMPTRADER_FEED_CMD") {
        let argv: Vec<String> = cmd.split_whitespace().map(str::to_string).collect();
        config.feed.command = (!argv.is_empty()).then_some(argv);
    }
    if let Ok(path) = std::env::var("JUMPTRADER_REPORT_PATH") {
        config.output.report_path = (!path.trim().is_empty()).then(|| PathBuf::from(path.trim()));
    }
    Ok(())
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}
