//! Scanning a symbol universe
//!
//! [`Scanner::scan`] fetches each symbol, runs the engine over a rayon pool in
//! batches, reconciles the results with a [`Registry`], persists changed
//! records and dispatches events. A failing symbol is recorded in the report
//! and never stops the batch.

use std::{
    collections::BTreeMap,
    sync::{Mutex, PoisonError},
    time::Duration,
};

use chrono::NaiveDate;
use rayon::prelude::*;

use crate::{
    registry::{PatternEvent, PatternRecord, Reconciliation, RecordKey, Registry},
    PatternEngine, PatternError, Period, PriceSeries,
};

// ============================================================
// COLLABORATORS
// ============================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("transient provider failure: {0}")]
    Transient(String),

    #[error("no data for symbol")]
    NoData,
}

/// Source of daily price history
pub trait SeriesProvider: Send + Sync {
    /// At most `lookback` of the most recent bars for `symbol`
    fn fetch(&self, symbol: &str, lookback: usize) -> std::result::Result<PriceSeries, ProviderError>;
}

/// Overall market condition, 0..=100
pub trait MarketScorer: Send + Sync {
    fn score(&self) -> u8;
}

/// A market score that never changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedMarketScore(pub u8);

impl MarketScorer for FixedMarketScore {
    fn score(&self) -> u8 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("store error: {0}")]
pub struct StoreError(pub String);

/// Persistence of pattern records. Retaining history is up to the store.
pub trait PatternStore: Send + Sync {
    fn list_active(&self) -> std::result::Result<Vec<PatternRecord>, StoreError>;

    fn get(&self, key: &RecordKey) -> std::result::Result<Option<PatternRecord>, StoreError>;

    fn upsert(&self, record: &PatternRecord) -> std::result::Result<(), StoreError>;
}

/// In-memory store; one row per (key, detected_at)
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<BTreeMap<(RecordKey, NaiveDate), PatternRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every row, active and retired, ordered by key then detection date
    pub fn records(&self) -> Vec<PatternRecord> {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PatternStore for MemoryStore {
    fn list_active(&self) -> std::result::Result<Vec<PatternRecord>, StoreError> {
        Ok(self.records().into_iter().filter(|r| r.active).collect())
    }

    fn get(&self, key: &RecordKey) -> std::result::Result<Option<PatternRecord>, StoreError> {
        let rows = self.rows.lock().map_err(|e| StoreError(e.to_string()))?;
        Ok(rows
            .iter()
            .filter(|((k, _), r)| k == key && r.active)
            .map(|(_, r)| r.clone())
            .last())
    }

    fn upsert(&self, record: &PatternRecord) -> std::result::Result<(), StoreError> {
        let mut rows = self.rows.lock().map_err(|e| StoreError(e.to_string()))?;
        rows.insert((record.key(), record.detected_at), record.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("dispatch error: {0}")]
pub struct DispatchError(pub String);

/// Receiver of lifecycle events
pub trait EventSink: Send + Sync {
    fn dispatch(&self, event: &PatternEvent) -> std::result::Result<(), DispatchError>;
}

// ============================================================
// CONFIG & REPORT
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Bars requested per symbol
    pub lookback: Period,
    /// Symbols per batch
    pub batch_size: Period,
    /// Sleep between batches, in milliseconds
    pub batch_pause_ms: u64,
    /// Worker threads; 0 uses rayon's default
    pub workers: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            lookback: Period::new_const(252),
            batch_size: Period::new_const(50),
            batch_pause_ms: 2000,
            workers: 0,
        }
    }
}

impl ScanConfig {
    #[inline]
    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    DataUnavailable,
    InvalidSeries,
    PersistenceFailure,
    DispatchFailure,
}

/// Failure attributed to one symbol
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ScanFailure {
    pub symbol: String,
    pub kind: FailureKind,
    pub message: String,
}

impl ScanFailure {
    fn new(symbol: &str, kind: FailureKind, message: impl ToString) -> Self {
        Self {
            symbol: symbol.to_string(),
            kind,
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanReport {
    /// Events in symbol order, then pattern type order
    pub events: Vec<PatternEvent>,
    pub failures: Vec<ScanFailure>,
    /// Symbols attempted
    pub scanned: usize,
}

impl ScanReport {
    fn absorb(&mut self, outcome: SymbolOutcome) {
        self.events.extend(outcome.events);
        self.failures.extend(outcome.failures);
        self.scanned += 1;
    }
}

#[derive(Debug, Default)]
struct SymbolOutcome {
    events: Vec<PatternEvent>,
    failures: Vec<ScanFailure>,
}

impl SymbolOutcome {
    fn failed(failure: ScanFailure) -> Self {
        log::warn!("{}: {:?}: {}", failure.symbol, failure.kind, failure.message);
        Self {
            events: Vec::new(),
            failures: vec![failure],
        }
    }
}

// ============================================================
// SCANNER
// ============================================================

pub struct Scanner<P, M, S, N> {
    engine: PatternEngine,
    provider: P,
    market: M,
    store: S,
    sink: N,
}

impl<P, M, S, N> Scanner<P, M, S, N>
where
    P: SeriesProvider,
    M: MarketScorer,
    S: PatternStore,
    N: EventSink,
{
    pub fn new(engine: PatternEngine, provider: P, market: M, store: S, sink: N) -> Self {
        Self {
            engine,
            provider,
            market,
            store,
            sink,
        }
    }

    #[inline]
    pub fn engine(&self) -> &PatternEngine {
        &self.engine
    }

    #[inline]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    #[inline]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[inline]
    pub fn sink(&self) -> &N {
        &self.sink
    }

    /// Seed `registry` with the store's active records
    pub fn hydrate(&self, registry: &Registry) -> std::result::Result<usize, StoreError> {
        let records = self.store.list_active()?;
        Ok(registry.hydrate(records))
    }

    /// Scan every symbol once.
    ///
    /// The market score is read once for the whole pass. Errors only when the
    /// worker pool cannot be built.
    pub fn scan<T>(&self, symbols: &[T], registry: &Registry) -> crate::Result<ScanReport>
    where
        T: AsRef<str> + Sync,
    {
        let config = self.engine.config().scan;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .build()
            .map_err(|e| PatternError::InvalidConfig(format!("worker pool: {}", e)))?;

        let market_score = self.market.score().min(100);
        let pause = config.batch_pause();
        let mut report = ScanReport::default();

        for (n, batch) in symbols.chunks(config.batch_size.get()).enumerate() {
            if n > 0 && !pause.is_zero() {
                std::thread::sleep(pause);
            }
            let outcomes: Vec<SymbolOutcome> = pool.install(|| {
                batch
                    .par_iter()
                    .map(|s| self.scan_symbol(s.as_ref(), market_score, registry))
                    .collect()
            });
            for outcome in outcomes {
                report.absorb(outcome);
            }
        }

        log::info!(
            "scanned {} symbols: {} events, {} failures, {} active",
            report.scanned,
            report.events.len(),
            report.failures.len(),
            registry.active_count()
        );
        Ok(report)
    }

    fn scan_symbol(&self, symbol: &str, market_score: u8, registry: &Registry) -> SymbolOutcome {
        let lookback = self.engine.config().scan.lookback.get();
        let series = match self.provider.fetch(symbol, lookback) {
            Ok(series) => series.truncate_to(lookback),
            Err(e) => {
                return SymbolOutcome::failed(ScanFailure::new(symbol, FailureKind::DataUnavailable, e))
            }
        };
        let Some(observation) = self.engine.observe(&series) else {
            return SymbolOutcome::failed(ScanFailure::new(
                symbol,
                FailureKind::DataUnavailable,
                "empty series",
            ));
        };

        let detections = match self.engine.detect(&series, market_score) {
            Ok(d) => d,
            Err(e) => {
                return SymbolOutcome::failed(ScanFailure::new(symbol, FailureKind::InvalidSeries, e))
            }
        };

        // Persist and dispatch under the key's lock so overlapping scans of
        // one symbol reach the store and sink in update order
        let mut failures = Vec::new();
        let reconciliation = registry.reconcile_with(
            symbol,
            &observation,
            &detections,
            market_score,
            &self.engine.classifier(),
            |part| self.publish(symbol, part, &mut failures),
        );

        SymbolOutcome {
            events: reconciliation.events,
            failures,
        }
    }

    fn publish(&self, symbol: &str, part: &Reconciliation, failures: &mut Vec<ScanFailure>) {
        for record in &part.changed {
            if let Err(e) = self.store.upsert(record) {
                let failure = ScanFailure::new(symbol, FailureKind::PersistenceFailure, e);
                log::warn!("{}: {}", record.key(), failure.message);
                failures.push(failure);
            }
        }
        for event in &part.events {
            if let Err(e) = self.sink.dispatch(event) {
                let failure = ScanFailure::new(symbol, FailureKind::DispatchFailure, e);
                log::warn!("{}: {}", event.record.key(), failure.message);
                failures.push(failure);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::levels::Levels;
    use crate::state::PatternState;
    use crate::testutil::day;
    use crate::PatternType;

    fn record(detected: usize, active: bool) -> PatternRecord {
        PatternRecord {
            symbol: "AAA".into(),
            pattern_type: PatternType::BullFlag,
            state: PatternState::Forming,
            strength_score: 50,
            levels: Levels {
                breakout_price: 110.0,
                stop_loss: 97.0,
                target1: 113.82,
                target2: 116.18,
                target3: 120.0,
            },
            volume_ratio: Some(1.0),
            distance_to_breakout_pct: 3.0,
            market_score: 50,
            active,
            detected_at: day(detected),
            updated_at: day(detected),
            anchor: day(0),
            levels_frozen: false,
            targets_hit: 0,
        }
    }

    #[test]
    fn test_memory_store_keeps_history() {
        let store = MemoryStore::new();
        store.upsert(&record(10, false)).unwrap();
        store.upsert(&record(40, true)).unwrap();
        assert_eq!(store.len(), 2);

        let key = RecordKey::new("AAA", PatternType::BullFlag);
        assert_eq!(store.get(&key).unwrap().unwrap().detected_at, day(40));
        assert_eq!(store.list_active().unwrap().len(), 1);
    }

    #[test]
    fn test_upsert_replaces_same_row() {
        let store = MemoryStore::new();
        store.upsert(&record(10, true)).unwrap();
        store.upsert(&record(10, false)).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.list_active().unwrap().is_empty());
    }

    #[test]
    fn test_scan_config_defaults() {
        let c = ScanConfig::default();
        assert_eq!(c.lookback.get(), 252);
        assert_eq!(c.batch_size.get(), 50);
        assert_eq!(c.batch_pause(), Duration::from_secs(2));
    }

    #[test]
    fn test_failure_kind_ids() {
        assert_eq!(
            serde_json::to_string(&FailureKind::PersistenceFailure).unwrap(),
            "\"PERSISTENCE_FAILURE\""
        );
    }
}
