//! ZONESCAN: RSI zone frequency and breakout scanner.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! restores the previous rank snapshot from disk, and runs the hourly
//! scan loop with graceful shutdown.

use anyhow::Result;
use std::time::Duration;
use tracing::{error, info, warn};

use zonescan::config::AppConfig;
use zonescan::engine::{AnalysisResult, Analyzer, TracingProgress};
use zonescan::market::binance::BinanceClient;
use zonescan::storage;
use zonescan::types::RankSnapshot;

const BANNER: &str = r#"
 _____                  ____
|__  /___  _ __   ___  / ___|  ___ __ _ _ __
  / // _ \| '_ \ / _ \ \___ \ / __/ _` | '_ \
 / /| (_) | | | |  __/  ___) | (_| (_| | | | |
/____\___/|_| |_|\___| |____/ \___\__,_|_| |_|

  RSI zone frequency + breakout scanner
  v0.1.0
"#;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    init_logging();

    let config_path =
        std::env::var("ZONESCAN_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let cfg = AppConfig::load_or_default(&config_path)?;

    println!("{BANNER}");
    info!(
        venue = %cfg.market.venue,
        concurrency = cfg.scanner.concurrency,
        interval_secs = cfg.schedule.interval_secs,
        run_once = cfg.schedule.run_once,
        "ZONESCAN starting up"
    );

    let snapshot_path = cfg.storage.snapshot_path.as_str();
    let mut previous = match storage::load_snapshot(Some(snapshot_path)) {
        Ok(Some(s)) => s,
        Ok(None) => RankSnapshot::new(),
        Err(e) => {
            warn!(error = %e, "Unreadable rank snapshot, starting fresh");
            RankSnapshot::new()
        }
    };

    let source = BinanceClient::new(&cfg.market)?;
    let analyzer = Analyzer::new(Box::new(source), cfg.scanner.clone());

    // -- Main loop -------------------------------------------------------

    let mut interval = tokio::time::interval(Duration::from_secs(cfg.schedule.interval_secs.max(1)));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        interval_secs = cfg.schedule.interval_secs,
        "Entering main loop. Press Ctrl+C to stop."
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match analyzer.run(&previous, &TracingProgress).await {
                    Ok(result) => {
                        print_result(&result);
                        if let Err(e) = storage::save_snapshot(&result.snapshot, Some(snapshot_path)) {
                            error!(error = %e, "Failed to save rank snapshot");
                        }
                        previous = result.snapshot;
                    }
                    Err(e) => {
                        // Previous ranks stay in place for the next attempt.
                        error!(error = %format!("{e:#}"), "Scan failed, continuing to next");
                    }
                }

                if cfg.schedule.run_once {
                    break;
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    info!("ZONESCAN shut down cleanly.");
    Ok(())
}

/// Print the rendered report and the breakout list.
fn print_result(result: &AnalysisResult) {
    println!("{}", result.report);

    println!("== BREAKOUT OPPORTUNITIES ==");
    if result.opportunities.is_empty() {
        println!("No breakout candidates this run.");
    }
    for (i, opp) in result.opportunities.iter().enumerate() {
        println!("{:02}. {opp}", i + 1);
    }

    info!(
        symbols = result.symbols_scanned,
        failed = result.tasks_failed,
        extreme = result.report.stats.total_extreme,
        opportunities = result.opportunities.len(),
        next_update = %result.report.next_update.format("%H:%M UTC"),
        "Scan complete"
    );
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("zonescan=info"));

    let json_logging = std::env::var("ZONESCAN_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
