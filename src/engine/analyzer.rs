//! Analysis orchestrator.
//!
//! One call to [`Analyzer::run`] is one full scan:
//!
//! 1. list the symbol universe (fatal when it fails or comes back empty)
//! 2. run one task per symbol through the [`FetchScheduler`]:
//!    a frequency pass over every timeframe feeding the zone tracker, then
//!    a breakout pass collecting the scorer's raw metrics
//! 3. score breakout candidates
//! 4. build the frequency report against the previous rank snapshot
//!
//! Per-run aggregates live in a [`ScanContext`] built at the start of the
//! run and consumed at the end; nothing survives between runs except the
//! snapshot handed back to the caller.

use anyhow::Result;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};

use crate::analysis::breakout::{BreakoutScorer, Opportunity};
use crate::analysis::report::{FrequencyReport, ReportGenerator};
use crate::analysis::rsi::compute_rsi;
use crate::analysis::zones::ZoneTracker;
use crate::config::ScannerConfig;
use crate::engine::scheduler::FetchScheduler;
use crate::market::MarketDataSource;
use crate::types::{
    BreakoutMetrics, ProgressUpdate, RankSnapshot, ScanError, SymbolClass, Timeframe,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// 1h samples needed for a volume multiplier: the last one plus its lookback.
const VOLUME_WINDOW: usize = 24;

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Receives progress milestones during a run. Calls are synchronous and
/// should return quickly.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, update: ProgressUpdate);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn on_progress(&self, update: ProgressUpdate) {
        self(update)
    }
}

/// Logs milestones through `tracing` for headless runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn on_progress(&self, update: ProgressUpdate) {
        info!(
            percentage = format!("{:.1}", update.percentage),
            "{}", update.message
        );
    }
}

fn emit(sink: &dyn ProgressSink, message: impl Into<String>, percentage: f64) {
    sink.on_progress(ProgressUpdate {
        message: message.into(),
        percentage,
    });
}

// ---------------------------------------------------------------------------
// Run context
// ---------------------------------------------------------------------------

/// Aggregates for a single run. Each symbol task only writes its own keys.
struct ScanContext {
    tracker: Mutex<ZoneTracker>,
    breakout: Mutex<HashMap<String, BreakoutMetrics>>,
}

impl ScanContext {
    fn new(universe: &[String]) -> Self {
        Self {
            tracker: Mutex::new(ZoneTracker::with_universe(universe)),
            breakout: Mutex::new(HashMap::with_capacity(universe.len())),
        }
    }

    fn observe(&self, symbol: &str, timeframe: Timeframe, value: f64, price: f64, class: SymbolClass) {
        self.tracker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .observe(symbol, timeframe, value, price, class);
    }

    fn record_breakout(&self, symbol: &str, metrics: BreakoutMetrics) {
        self.breakout
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(symbol.to_string(), metrics);
    }

    fn into_parts(self) -> (ZoneTracker, HashMap<String, BreakoutMetrics>) {
        (
            self.tracker
                .into_inner()
                .unwrap_or_else(PoisonError::into_inner),
            self.breakout
                .into_inner()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// Everything a finished run produces.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub report: FrequencyReport,
    pub opportunities: Vec<Opportunity>,
    /// Ranks to pass into the next run.
    pub snapshot: RankSnapshot,
    pub symbols_scanned: usize,
    pub tasks_failed: usize,
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

pub struct Analyzer {
    source: Box<dyn MarketDataSource>,
    cfg: ScannerConfig,
    scheduler: FetchScheduler,
    scorer: BreakoutScorer,
    reports: ReportGenerator,
}

impl Analyzer {
    pub fn new(source: Box<dyn MarketDataSource>, cfg: ScannerConfig) -> Self {
        let scheduler = FetchScheduler::new(cfg.concurrency);
        Self {
            source,
            cfg,
            scheduler,
            scorer: BreakoutScorer::new(),
            reports: ReportGenerator::new(),
        }
    }

    /// Run one full scan.
    ///
    /// Only a failed or empty symbol listing is an error; per-symbol
    /// failures are logged and leave the report sparser.
    pub async fn run(
        &self,
        previous: &RankSnapshot,
        progress: &dyn ProgressSink,
    ) -> Result<AnalysisResult> {
        emit(progress, "Fetching symbol list", 0.0);

        let symbols = self
            .source
            .list_symbols()
            .await
            .map_err(|e| ScanError::SymbolList(format!("{e:#}")))?;
        if symbols.is_empty() {
            return Err(ScanError::NoSymbols.into());
        }

        let class = self.source.class();
        info!(count = symbols.len(), venue = %class, "Symbol universe loaded");
        emit(progress, format!("Found {} symbols", symbols.len()), 5.0);

        let ctx = ScanContext::new(&symbols);
        let tasks: Vec<_> = symbols
            .iter()
            .map(|symbol| (symbol.as_str(), self.scan_symbol(&ctx, symbol, class)))
            .collect();

        let schedule = self
            .scheduler
            .run_all(tasks, |done, total| {
                let pct = 10.0 + 80.0 * done as f64 / total as f64;
                emit(progress, format!("Analyzed {done}/{total} symbols"), pct);
            })
            .await;

        emit(progress, "Scoring breakout candidates", 90.0);
        let (tracker, breakout) = ctx.into_parts();
        let prices = tracker.current_prices();
        let candidates: Vec<(&str, &BreakoutMetrics)> = symbols
            .iter()
            .filter_map(|s| breakout.get(s).map(|m| (s.as_str(), m)))
            .collect();
        let opportunities = self.scorer.score(candidates, &prices);

        emit(progress, "Building frequency report", 95.0);
        let (report, snapshot) = self.reports.generate(&tracker, previous);

        info!(
            symbols = symbols.len(),
            tracked = report.stats.total_tracked,
            overbought = report.stats.overbought,
            oversold = report.stats.oversold,
            opportunities = opportunities.len(),
            failed = schedule.failed,
            "Analysis complete"
        );
        emit(progress, "Analysis complete", 100.0);

        Ok(AnalysisResult {
            report,
            opportunities,
            snapshot,
            symbols_scanned: symbols.len(),
            tasks_failed: schedule.failed,
        })
    }

    /// Frequency pass then breakout pass for one symbol.
    ///
    /// Any error in the frequency pass fails the task; readings already
    /// recorded are kept.
    async fn scan_symbol(&self, ctx: &ScanContext, symbol: &str, class: SymbolClass) -> Result<()> {
        let period = self.cfg.rsi_period;

        for timeframe in Timeframe::ALL {
            let Some(series) = self
                .source
                .get_candles(symbol, timeframe, self.cfg.candle_limit)
                .await?
            else {
                continue;
            };
            if series.len() <= period {
                continue;
            }
            let Some(value) = compute_rsi(&series.closes(), period).filter(|v| v.is_finite())
            else {
                continue;
            };
            let Some(price) = series.last_close() else {
                continue;
            };
            ctx.observe(symbol, timeframe, value, price, class);
        }

        let mut metrics = BreakoutMetrics::default();
        if let Err(e) = self.collect_breakout(symbol, &mut metrics).await {
            warn!(symbol, error = %format!("{e:#}"), "Breakout metrics incomplete");
        }
        ctx.record_breakout(symbol, metrics);
        Ok(())
    }

    /// Fill `metrics` from short 1h, 4h and 12h series. Stops at the first
    /// error, keeping whatever was filled before it.
    async fn collect_breakout(&self, symbol: &str, metrics: &mut BreakoutMetrics) -> Result<()> {
        let period = self.cfg.rsi_period;
        let limit = self.cfg.breakout_candle_limit;

        if let Some(h1) = self.source.get_candles(symbol, Timeframe::H1, limit).await? {
            metrics.rsi_1h = compute_rsi(&h1.closes(), period);
            metrics.volume_multiplier = volume_multiplier(&h1.volumes());
        }

        if let Some(h4) = self.source.get_candles(symbol, Timeframe::H4, limit).await? {
            metrics.price_change_4h = h4.last_change_pct();
            metrics.rsi_4h = compute_rsi(&h4.closes(), period);
        }

        if let Some(h12) = self.source.get_candles(symbol, Timeframe::H12, limit).await? {
            metrics.price_change_12h = h12.last_change_pct();
        }

        debug!(symbol, complete = metrics.is_complete(), "Breakout metrics collected");
        Ok(())
    }
}

/// Last volume over the mean of the preceding volumes in the trailing
/// window. `0.0` when that mean is zero.
fn volume_multiplier(volumes: &[f64]) -> Option<f64> {
    if volumes.len() < VOLUME_WINDOW {
        return None;
    }
    let window = &volumes[volumes.len() - VOLUME_WINDOW..];
    let (last, lookback) = window.split_last()?;
    let mean = lookback.iter().sum::<f64>() / lookback.len() as f64;
    if mean > 0.0 {
        Some(last / mean)
    } else {
        Some(0.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
