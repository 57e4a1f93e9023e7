//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{mpsc, Mutex};

use chartwatch::prelude::*;
use chrono::{Duration, NaiveDate};

pub fn day(i: usize) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(i as i64)
}

/// Bar with a symmetric 0.5% spread around the close
pub fn bar(i: usize, close: f64, volume: f64) -> PriceBar {
    PriceBar::new(day(i), close, close * 1.005, close * 0.995, close, volume)
}

/// Linear interpolation through (index, close) knots
pub fn path(knots: &[(usize, f64)]) -> Vec<f64> {
    let mut closes = Vec::new();
    for w in knots.windows(2) {
        let ((i0, p0), (i1, p1)) = (w[0], w[1]);
        for i in i0..i1 {
            let t = (i - i0) as f64 / (i1 - i0) as f64;
            closes.push(p0 + (p1 - p0) * t);
        }
    }
    if let Some(&(_, p)) = knots.last() {
        closes.push(p);
    }
    closes
}

/// 66 bars: lows of 100 and 101 either side of a 110 peak, last close 107.
///
/// Breakout 110.55, stop 96.515, targets 114.77 / 117.38 / 121.6.
pub fn double_bottom_bars() -> Vec<PriceBar> {
    path(&[(0, 120.0), (20, 100.0), (35, 110.0), (55, 101.0), (65, 107.0)])
        .into_iter()
        .enumerate()
        .map(|(i, c)| bar(i, c, 1000.0))
        .collect()
}

/// Append (close, volume) bars after `bars`
pub fn extend(mut bars: Vec<PriceBar>, tail: &[(f64, f64)]) -> Vec<PriceBar> {
    let start = bars.len();
    bars.extend(tail.iter().enumerate().map(|(k, &(c, v))| bar(start + k, c, v)));
    bars
}

pub fn series(symbol: &str, bars: Vec<PriceBar>) -> PriceSeries {
    PriceSeries::new(symbol, bars).unwrap()
}

/// Engine with only the double bottom matcher and no batch pause
pub fn double_bottom_engine() -> PatternEngine {
    let mut config = EngineConfig::default();
    config.scan.batch_pause_ms = 0;
    EngineBuilder::new()
        .add(BuiltinMatcher::DoubleBottom(DoubleBottomMatcher::with_defaults()))
        .config(config)
        .build()
        .unwrap()
}

#[derive(Debug, Default)]
pub struct StubProvider {
    series: Mutex<HashMap<String, PriceSeries>>,
}

impl StubProvider {
    pub fn set(&self, series: PriceSeries) {
        self.series
            .lock()
            .unwrap()
            .insert(series.symbol().to_string(), series);
    }
}

impl SeriesProvider for StubProvider {
    fn fetch(&self, symbol: &str, _lookback: usize) -> std::result::Result<PriceSeries, ProviderError> {
        self.series
            .lock()
            .unwrap()
            .get(symbol)
            .cloned()
            .ok_or(ProviderError::NoData)
    }
}

/// Hands out queued series in order, whatever the symbol
#[derive(Debug, Default)]
pub struct SequenceProvider {
    queue: Mutex<VecDeque<PriceSeries>>,
}

impl SequenceProvider {
    pub fn push(&self, series: PriceSeries) {
        self.queue.lock().unwrap().push_back(series);
    }
}

impl SeriesProvider for SequenceProvider {
    fn fetch(&self, _symbol: &str, _lookback: usize) -> std::result::Result<PriceSeries, ProviderError> {
        self.queue.lock().unwrap().pop_front().ok_or(ProviderError::NoData)
    }
}

/// Memory store whose first upsert signals `entered` and then waits on `release`
#[derive(Debug)]
pub struct GatedStore {
    pub inner: MemoryStore,
    entered: Mutex<Option<mpsc::Sender<()>>>,
    release: Mutex<Option<mpsc::Receiver<()>>>,
}

impl GatedStore {
    pub fn new() -> (Self, mpsc::Receiver<()>, mpsc::Sender<()>) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let store = Self {
            inner: MemoryStore::new(),
            entered: Mutex::new(Some(entered_tx)),
            release: Mutex::new(Some(release_rx)),
        };
        (store, entered_rx, release_tx)
    }
}

impl PatternStore for GatedStore {
    fn list_active(&self) -> std::result::Result<Vec<PatternRecord>, StoreError> {
        self.inner.list_active()
    }

    fn get(&self, key: &RecordKey) -> std::result::Result<Option<PatternRecord>, StoreError> {
        self.inner.get(key)
    }

    fn upsert(&self, record: &PatternRecord) -> std::result::Result<(), StoreError> {
        let entered = self.entered.lock().unwrap().take();
        if let Some(entered) = entered {
            entered.send(()).unwrap();
            let release = self.release.lock().unwrap().take();
            if let Some(release) = release {
                release.recv().unwrap();
            }
        }
        self.inner.upsert(record)
    }
}

#[derive(Debug, Default)]
pub struct CollectingSink {
    pub events: Mutex<Vec<PatternEvent>>,
}

impl EventSink for CollectingSink {
    fn dispatch(&self, event: &PatternEvent) -> std::result::Result<(), DispatchError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct FailingSink;

impl EventSink for FailingSink {
    fn dispatch(&self, _event: &PatternEvent) -> std::result::Result<(), DispatchError> {
        Err(DispatchError("transport down".into()))
    }
}

#[derive(Debug, Default)]
pub struct FailingStore;

impl PatternStore for FailingStore {
    fn list_active(&self) -> std::result::Result<Vec<PatternRecord>, StoreError> {
        Err(StoreError("database unreachable".into()))
    }

    fn get(&self, _key: &RecordKey) -> std::result::Result<Option<PatternRecord>, StoreError> {
        Err(StoreError("database unreachable".into()))
    }

    fn upsert(&self, _record: &PatternRecord) -> std::result::Result<(), StoreError> {
        Err(StoreError("database unreachable".into()))
    }
}

pub fn states(report: &ScanReport) -> Vec<PatternState> {
    report.events.iter().map(|e| e.record.state).collect()
}
