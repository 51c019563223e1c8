//! End-to-end scan runs over the fixture market.

use std::sync::{Arc, Mutex};

use zonescan::analysis::breakout::SignalTier;
use zonescan::analysis::report::RankMovement;
use zonescan::engine::{Analyzer, TracingProgress};
use zonescan::storage;
use zonescan::types::{ProgressUpdate, RankSnapshot, ScanError, Timeframe, Zone};
use zonescan::config::ScannerConfig;

use crate::fixture_source::{FixtureSource, Shape};

fn analyzer(source: FixtureSource) -> Analyzer {
    Analyzer::new(Box::new(source), ScannerConfig::default())
}

fn symbols(entries: &[zonescan::analysis::report::ReportEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.symbol.as_str()).collect()
}

fn temp_path() -> String {
    let mut p = std::env::temp_dir();
    p.push(format!("zonescan_it_snapshot_{}.json", uuid::Uuid::new_v4()));
    p.to_string_lossy().to_string()
}

#[tokio::test]
async fn test_three_symbol_market_report() {
    let progress = Arc::new(Mutex::new(Vec::<ProgressUpdate>::new()));
    let sink_log = progress.clone();
    let sink = move |u: ProgressUpdate| sink_log.lock().unwrap().push(u);

    let result = analyzer(FixtureSource::three_symbol_market())
        .run(&RankSnapshot::new(), &sink)
        .await
        .unwrap();
    let report = &result.report;

    assert_eq!(symbols(&report.overbought), vec!["ALPHAUSDT", "BETAUSDT", "GAMMAUSDT"]);
    assert_eq!(symbols(&report.oversold), vec!["GAMMAUSDT"]);

    let counts: Vec<u32> = report.overbought.iter().map(|e| e.count).collect();
    assert_eq!(counts, vec![6, 3, 1]);
    assert_eq!(report.oversold[0].count, 2);

    assert_eq!(report.stats.total_tracked, 3);
    assert_eq!(report.stats.overbought, 3);
    assert_eq!(report.stats.oversold, 1);
    assert_eq!(report.stats.total_extreme, 4);

    let beta = &report.overbought[1];
    assert_eq!(beta.rank, 2);
    assert_eq!(beta.timeframe_summary(), "15m(1) | 1h(1) | 4h(1)");
    assert_eq!(beta.entries, 1);
    assert!(beta.badge.is_none());
    assert_eq!(beta.movement, RankMovement::New);

    // GAMMA enters oversold on 15m, then overbought on 1d.
    let gamma_ob = &report.overbought[2];
    assert_eq!(gamma_ob.timeframes, vec![(Timeframe::D1, 1)]);
    assert_eq!(gamma_ob.entries, 1);

    let leader = report.overbought_leader.as_ref().unwrap();
    assert_eq!(leader.symbol, "ALPHAUSDT");
    let others: Vec<&str> = leader.others.iter().map(|o| o.symbol.as_str()).collect();
    assert_eq!(others, vec!["BETAUSDT", "GAMMAUSDT"]);

    assert_eq!(result.snapshot.rank(Zone::Overbought, "GAMMAUSDT"), Some(3));
    assert_eq!(result.snapshot.rank(Zone::Oversold, "GAMMAUSDT"), Some(1));

    // Only GAMMA has a mid-range 4h RSI with a >1% last 4h move.
    assert_eq!(result.opportunities.len(), 1);
    let opp = &result.opportunities[0];
    assert_eq!(opp.symbol, "GAMMAUSDT");
    assert_eq!(opp.display_score(), 71);
    assert_eq!(opp.tier, SignalTier::Low);

    let progress = progress.lock().unwrap();
    assert_eq!(progress.first().map(|u| u.percentage), Some(0.0));
    assert_eq!(progress.last().map(|u| u.percentage), Some(100.0));
    assert!(progress.windows(2).all(|w| w[0].percentage <= w[1].percentage));
}

#[tokio::test]
async fn test_rank_movement_across_runs() {
    let path = temp_path();

    let first = analyzer(FixtureSource::three_symbol_market())
        .run(&RankSnapshot::new(), &TracingProgress)
        .await
        .unwrap();
    storage::save_snapshot(&first.snapshot, Some(&path)).unwrap();

    // BETA now climbs everywhere, ALPHA only on the short timeframes.
    let market = FixtureSource::three_symbol_market();
    market.set_shapes("BETAUSDT", [Shape::Rising; 6]);
    market.set_shapes(
        "ALPHAUSDT",
        [Shape::Rising, Shape::Rising, Shape::Rising, Shape::Choppy, Shape::Choppy, Shape::Choppy],
    );

    let previous = storage::load_snapshot(Some(&path)).unwrap().unwrap();
    let second = analyzer(market).run(&previous, &TracingProgress).await.unwrap();
    let report = &second.report;

    assert_eq!(symbols(&report.overbought), vec!["BETAUSDT", "ALPHAUSDT", "GAMMAUSDT"]);

    let beta = &report.overbought[0];
    assert_eq!(beta.movement, RankMovement::Up(1));
    assert_eq!(beta.warning(), "🚨 APPROACHING PEAK");
    assert_eq!(beta.position_change(), "⬆️+1");

    let alpha = &report.overbought[1];
    assert_eq!(alpha.movement, RankMovement::Down(1));
    assert_eq!(alpha.warning(), "⚠️ LOSING STEAM");

    assert_eq!(report.overbought[2].movement, RankMovement::Stable);
    assert_eq!(report.oversold[0].movement, RankMovement::Stable);

    std::fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn test_failing_symbol_degrades_report() {
    let market = FixtureSource::three_symbol_market();
    market.fail_symbol("BETAUSDT");

    let result = analyzer(market)
        .run(&RankSnapshot::new(), &TracingProgress)
        .await
        .unwrap();

    assert_eq!(result.tasks_failed, 1);
    assert_eq!(result.symbols_scanned, 3);
    assert_eq!(symbols(&result.report.overbought), vec!["ALPHAUSDT", "GAMMAUSDT"]);
    assert_eq!(result.report.stats.total_tracked, 2);
}

#[tokio::test]
async fn test_empty_market_is_fatal() {
    let err = analyzer(FixtureSource::new(&[]))
        .run(&RankSnapshot::new(), &TracingProgress)
        .await
        .unwrap_err();
    assert!(matches!(err.downcast_ref::<ScanError>(), Some(ScanError::NoSymbols)));
}

#[tokio::test]
async fn test_unknown_symbol_is_skipped_quietly() {
    // Listed but without any series: every request answers "no data".
    let market = FixtureSource::new(&["GHOSTUSDT", "ALPHAUSDT"]);
    market.set_shapes("ALPHAUSDT", [Shape::Rising; 6]);

    let result = analyzer(market)
        .run(&RankSnapshot::new(), &TracingProgress)
        .await
        .unwrap();

    assert_eq!(result.tasks_failed, 0);
    assert_eq!(result.report.stats.total_tracked, 1);
    assert_eq!(symbols(&result.report.overbought), vec!["ALPHAUSDT"]);
}

#[tokio::test]
async fn test_low_concurrency_gives_same_report() {
    let cfg = ScannerConfig {
        concurrency: 1,
        ..ScannerConfig::default()
    };
    let serial = Analyzer::new(Box::new(FixtureSource::three_symbol_market()), cfg)
        .run(&RankSnapshot::new(), &TracingProgress)
        .await
        .unwrap();
    let parallel = analyzer(FixtureSource::three_symbol_market())
        .run(&RankSnapshot::new(), &TracingProgress)
        .await
        .unwrap();

    assert_eq!(serial.report.overbought, parallel.report.overbought);
    assert_eq!(serial.report.oversold, parallel.report.oversold);
    assert_eq!(serial.snapshot, parallel.snapshot);
}
