//! Scanner behavior across many symbols and failing collaborators.

mod common;

use chartwatch::prelude::*;
use common::*;

fn broken_bars() -> Vec<PriceBar> {
    let mut bars = double_bottom_bars();
    bars[30].high = bars[30].low - 1.0;
    bars
}

fn provider() -> StubProvider {
    let provider = StubProvider::default();
    provider.set(series("GOOD", double_bottom_bars()));
    provider.set(series("BROKEN", broken_bars()));
    provider.set(series("EMPTY", Vec::new()));
    provider.set(series("SHORT", double_bottom_bars()[..5].to_vec()));
    provider
}

fn kind_of(report: &ScanReport, symbol: &str) -> Option<FailureKind> {
    report
        .failures
        .iter()
        .find(|f| f.symbol == symbol)
        .map(|f| f.kind)
}

#[test]
fn test_failures_are_isolated_per_symbol() {
    let scanner = Scanner::new(
        double_bottom_engine(),
        provider(),
        FixedMarketScore(50),
        MemoryStore::new(),
        CollectingSink::default(),
    );
    let registry = Registry::new();
    let symbols = ["MISSING", "BROKEN", "GOOD", "EMPTY", "SHORT"];

    let report = scanner.scan(&symbols, &registry).unwrap();
    assert_eq!(report.scanned, 5);
    assert_eq!(report.events.len(), 1);
    assert_eq!(report.events[0].record.symbol, "GOOD");
    assert_eq!(report.failures.len(), 4);
    assert_eq!(kind_of(&report, "MISSING"), Some(FailureKind::DataUnavailable));
    assert_eq!(kind_of(&report, "BROKEN"), Some(FailureKind::InvalidSeries));
    assert_eq!(kind_of(&report, "EMPTY"), Some(FailureKind::DataUnavailable));
    assert_eq!(kind_of(&report, "SHORT"), Some(FailureKind::InvalidSeries));
    assert_eq!(registry.active_count(), 1);
}

#[test]
fn test_store_failure_reported_events_still_dispatched() {
    let scanner = Scanner::new(
        double_bottom_engine(),
        provider(),
        FixedMarketScore(50),
        FailingStore,
        CollectingSink::default(),
    );
    let registry = Registry::new();

    let report = scanner.scan(&["GOOD"], &registry).unwrap();
    assert_eq!(kind_of(&report, "GOOD"), Some(FailureKind::PersistenceFailure));
    assert_eq!(report.events.len(), 1);
    assert_eq!(scanner.sink().events.lock().unwrap().len(), 1);
    assert!(scanner.hydrate(&Registry::new()).is_err());
}

#[test]
fn test_dispatch_failure_reported() {
    let scanner = Scanner::new(
        double_bottom_engine(),
        provider(),
        FixedMarketScore(50),
        MemoryStore::new(),
        FailingSink,
    );
    let registry = Registry::new();

    let report = scanner.scan(&["GOOD"], &registry).unwrap();
    assert_eq!(kind_of(&report, "GOOD"), Some(FailureKind::DispatchFailure));
    // The record is persisted regardless
    assert_eq!(scanner.store().len(), 1);
}

#[test]
fn test_batches_cover_every_symbol_in_order() {
    let provider = StubProvider::default();
    let symbols: Vec<String> = (0..7).map(|i| format!("S{}", i)).collect();
    for s in &symbols {
        provider.set(series(s, double_bottom_bars()));
    }

    let mut engine_config = EngineConfig::default();
    engine_config.scan.batch_pause_ms = 0;
    engine_config.scan.batch_size = Period::new(3).unwrap();
    engine_config.scan.workers = 2;
    let engine = EngineBuilder::new()
        .add(BuiltinMatcher::DoubleBottom(DoubleBottomMatcher::with_defaults()))
        .config(engine_config)
        .build()
        .unwrap();

    let scanner = Scanner::new(
        engine,
        provider,
        FixedMarketScore(80),
        MemoryStore::new(),
        CollectingSink::default(),
    );
    let registry = Registry::new();
    let report = scanner.scan(&symbols, &registry).unwrap();

    assert_eq!(report.scanned, 7);
    let order: Vec<&str> = report.events.iter().map(|e| e.record.symbol.as_str()).collect();
    assert_eq!(order, symbols.iter().map(String::as_str).collect::<Vec<_>>());
    assert!(report.events.iter().all(|e| e.record.market_score == 80));
    assert_eq!(registry.list_active().len(), 7);
}

#[test]
fn test_market_score_feeds_strength() {
    let registry_low = Registry::new();
    let registry_high = Registry::new();
    let low = Scanner::new(
        double_bottom_engine(),
        provider(),
        FixedMarketScore(0),
        MemoryStore::new(),
        CollectingSink::default(),
    );
    let high = Scanner::new(
        double_bottom_engine(),
        provider(),
        FixedMarketScore(100),
        MemoryStore::new(),
        CollectingSink::default(),
    );
    let a = low.scan(&["GOOD"], &registry_low).unwrap();
    let b = high.scan(&["GOOD"], &registry_high).unwrap();
    assert_eq!(
        b.events[0].record.strength_score - a.events[0].record.strength_score,
        15
    );
}

#[test]
fn test_all_matchers_on_noise_stay_in_bounds() {
    let provider = StubProvider::default();
    let bars: Vec<PriceBar> = (0..252)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.21).sin() * 6.0 + (i as f64 * 0.05).cos() * 3.0;
            bar(i, close, 1000.0 + (i % 7) as f64 * 150.0)
        })
        .collect();
    provider.set(series("WAVE", bars));

    let mut config = EngineConfig::default();
    config.scan.batch_pause_ms = 0;
    let engine = EngineBuilder::new()
        .with_all_defaults()
        .config(config)
        .build()
        .unwrap();
    let scanner = Scanner::new(
        engine,
        provider,
        FixedMarketScore(50),
        MemoryStore::new(),
        CollectingSink::default(),
    );
    let registry = Registry::new();
    let report = scanner.scan(&["WAVE"], &registry).unwrap();

    assert!(report.failures.is_empty());
    let active = registry.list_active();
    assert_eq!(active.len(), report.events.len());
    for record in active {
        assert!(record.strength_score <= 100);
        assert!(record.levels.stop_loss < record.levels.breakout_price);
        assert!(record.levels.target1 < record.levels.target2);
        assert!(record.levels.target2 < record.levels.target3);
    }
}

#[test]
fn test_engine_config_from_toml() {
    let config = EngineConfig::from_toml_str(
        r#"
        [scan]
        batch_pause_ms = 0
        lookback = 120

        [state]
        max_validity_days = 30
        "#,
    )
    .unwrap();
    let engine = EngineBuilder::new()
        .with_reversal_defaults()
        .config(config)
        .build()
        .unwrap();
    assert_eq!(engine.config().scan.lookback.get(), 120);
    assert_eq!(engine.classifier().config().max_validity_days, 30);
    assert_eq!(engine.config().levels, LevelConfig::default());
}
