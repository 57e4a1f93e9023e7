//! Benchmarks for chart pattern detection.

use std::collections::HashMap;

use chartwatch::prelude::*;
use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// Generate deterministic wave-like daily bars
fn generate_bars(n: usize) -> Vec<PriceBar> {
  let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
  let mut bars = Vec::with_capacity(n);
  let mut drift = 100.0;

  for i in 0..n {
    let change = ((i * 7 + 13) % 100) as f64 / 200.0 - 0.24; // Deterministic "random"
    drift += change;
    let close = drift + (i as f64 * 0.15).sin() * 4.0;
    let volatility = 0.5 + ((i * 3) % 10) as f64 / 10.0;
    let open = close - change;
    let volume = 1000.0 + ((i * 11) % 17) as f64 * 100.0;

    bars.push(PriceBar::new(
      start + Duration::days(i as i64),
      open,
      open.max(close) + volatility,
      open.min(close) - volatility,
      close,
      volume,
    ));
  }

  bars
}

fn generate_series(symbol: &str, n: usize) -> PriceSeries {
  PriceSeries::new(symbol, generate_bars(n)).unwrap()
}

struct BenchProvider(HashMap<String, PriceSeries>);

impl SeriesProvider for BenchProvider {
  fn fetch(&self, symbol: &str, _lookback: usize) -> std::result::Result<PriceSeries, ProviderError> {
    self.0.get(symbol).cloned().ok_or(ProviderError::NoData)
  }
}

struct NullSink;

impl EventSink for NullSink {
  fn dispatch(&self, _event: &PatternEvent) -> std::result::Result<(), DispatchError> {
    Ok(())
  }
}

fn bench_extrema(c: &mut Criterion) {
  let series = generate_series("BENCH", 252);
  let engine = EngineBuilder::new().build().unwrap();

  c.bench_function("extrema_252_bars", |b| {
    b.iter(|| {
      let _ = black_box(engine.extrema(black_box(&series)));
    })
  });
}

fn bench_single_matcher(c: &mut Criterion) {
  let series = generate_series("BENCH", 252);
  let engine = EngineBuilder::new()
    .add(BuiltinMatcher::DoubleBottom(DoubleBottomMatcher::with_defaults()))
    .build()
    .unwrap();

  c.bench_function("detect_double_bottom_252_bars", |b| {
    b.iter(|| {
      let _ = black_box(engine.detect(black_box(&series), 50));
    })
  });
}

fn bench_all_matchers(c: &mut Criterion) {
  let series = generate_series("BENCH", 252);
  let engine = EngineBuilder::new().with_all_defaults().build().unwrap();

  c.bench_function("detect_all_patterns_252_bars", |b| {
    b.iter(|| {
      let _ = black_box(engine.detect(black_box(&series), 50));
    })
  });
}

fn bench_scaling(c: &mut Criterion) {
  let engine = EngineBuilder::new().with_all_defaults().build().unwrap();

  let mut group = c.benchmark_group("scaling");

  for size in [100, 252, 500, 1000, 2500].iter() {
    let series = generate_series("BENCH", *size);

    group.bench_with_input(BenchmarkId::new("detect", size), size, |b, _| {
      b.iter(|| {
        let _ = black_box(engine.detect(black_box(&series), 50));
      })
    });
  }

  group.finish();
}

fn bench_scan_universe(c: &mut Criterion) {
  let symbols: Vec<String> = (0..100).map(|i| format!("SYM{}", i)).collect();
  let provider = BenchProvider(
    symbols
      .iter()
      .enumerate()
      .map(|(i, s)| (s.clone(), generate_series(s, 200 + i % 52)))
      .collect(),
  );

  let mut config = EngineConfig::default();
  config.scan.batch_pause_ms = 0;
  let engine = EngineBuilder::new().with_all_defaults().config(config).build().unwrap();
  let scanner = Scanner::new(engine, provider, FixedMarketScore(50), MemoryStore::new(), NullSink);

  c.bench_function("scan_100_symbols", |b| {
    b.iter(|| {
      let registry = Registry::new();
      let _ = black_box(scanner.scan(black_box(&symbols), &registry));
    })
  });
}

criterion_group!(
  benches,
  bench_extrema,
  bench_single_matcher,
  bench_all_matchers,
  bench_scaling,
  bench_scan_universe,
);

criterion_main!(benches);
