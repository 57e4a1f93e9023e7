//! Pattern records keyed by (symbol, pattern type)
//!
//! The registry holds at most one active record per key and keeps retired
//! records as history. Each key lives in its own `Mutex` slot behind a map
//! lock, so updates to one key are serialized while different keys proceed
//! in parallel.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use chrono::NaiveDate;

use crate::{
    levels::Levels,
    state::{Observation, PatternState, StateClassifier},
    Detection, PatternType,
};

#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct RecordKey {
    pub symbol: String,
    pub pattern_type: PatternType,
}

impl RecordKey {
    pub fn new(symbol: impl Into<String>, pattern_type: PatternType) -> Self {
        Self {
            symbol: symbol.into(),
            pattern_type,
        }
    }
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.symbol, self.pattern_type)
    }
}

/// Persistent state of one tracked pattern
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PatternRecord {
    pub symbol: String,
    pub pattern_type: PatternType,
    pub state: PatternState,
    pub strength_score: u8,
    #[serde(flatten)]
    pub levels: Levels,
    pub volume_ratio: Option<f64>,
    pub distance_to_breakout_pct: f64,
    pub market_score: u8,
    pub active: bool,
    pub detected_at: NaiveDate,
    pub updated_at: NaiveDate,
    /// Date of the formation's first key point
    pub anchor: NaiveDate,
    /// Set on BREAKOUT_CONFIRMED; levels no longer follow the matcher
    pub levels_frozen: bool,
    /// Highest target reached, 0..=3; kept when the record later stops out
    #[serde(default)]
    pub targets_hit: u8,
}

impl PatternRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.symbol.clone(), self.pattern_type)
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    Created,
    StateChanged { from: PatternState },
}

/// Snapshot of a record at the moment of a lifecycle change
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PatternEvent {
    pub kind: EventKind,
    pub record: PatternRecord,
}

/// Outcome of reconciling one symbol
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    pub events: Vec<PatternEvent>,
    /// Records whose fields changed, in their post-update form
    pub changed: Vec<PatternRecord>,
}

/// Summary of the registry's active and retired records
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct RegistryStats {
    pub active: usize,
    pub retired: usize,
    /// Active records per state
    pub by_state: BTreeMap<PatternState, usize>,
    /// Active records per pattern type
    pub by_type: BTreeMap<PatternType, usize>,
    /// Active and retired records that reached BREAKOUT_CONFIRMED
    pub confirmed_breakouts: usize,
    /// Mean strength of active records
    pub mean_strength: Option<f64>,
    /// Share of retired records that reached a target, against those stopped
    /// out before any. Expired records are not counted.
    pub success_rate: Option<f64>,
}

#[derive(Debug, Default)]
struct Slot {
    active: Option<PatternRecord>,
    history: Vec<PatternRecord>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
pub struct Registry {
    slots: Mutex<HashMap<RecordKey, Arc<Mutex<Slot>>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &RecordKey) -> Arc<Mutex<Slot>> {
        lock(&self.slots).entry(key.clone()).or_default().clone()
    }

    fn existing_slot(&self, key: &RecordKey) -> Option<Arc<Mutex<Slot>>> {
        lock(&self.slots).get(key).cloned()
    }

    fn all_slots(&self) -> Vec<(RecordKey, Arc<Mutex<Slot>>)> {
        let mut slots: Vec<_> = lock(&self.slots)
            .iter()
            .map(|(k, s)| (k.clone(), s.clone()))
            .collect();
        slots.sort_by(|a, b| a.0.cmp(&b.0));
        slots
    }

    /// Seed from persisted records. Inactive records become history; of two
    /// active records for one key the later detection stays active.
    pub fn hydrate(&self, records: impl IntoIterator<Item = PatternRecord>) -> usize {
        let mut count = 0;
        for record in records {
            let slot = self.slot(&record.key());
            let mut slot = lock(&slot);
            if !record.active {
                slot.history.push(record);
            } else {
                match slot.active.take() {
                    Some(mut current) if current.detected_at > record.detected_at => {
                        let mut older = record;
                        older.active = false;
                        slot.history.push(older);
                        current.active = true;
                        slot.active = Some(current);
                    }
                    previous => {
                        if let Some(mut older) = previous {
                            older.active = false;
                            slot.history.push(older);
                        }
                        slot.active = Some(record);
                    }
                }
            }
            count += 1;
        }
        count
    }

    /// Apply one scan's detections and the latest observation for `symbol`.
    ///
    /// Keys with an active record are classified even when no detection for
    /// them is present.
    pub fn reconcile(
        &self,
        symbol: &str,
        observation: &Observation,
        detections: &[Detection],
        market_score: u8,
        classifier: &StateClassifier,
    ) -> Reconciliation {
        self.reconcile_with(symbol, observation, detections, market_score, classifier, |_| {})
    }

    /// Like [`reconcile`](Self::reconcile), handing each key's changes to
    /// `on_key` while that key is still locked.
    ///
    /// Work done in `on_key` (persisting, dispatching) is therefore ordered
    /// the same way as the updates themselves.
    pub fn reconcile_with<F>(
        &self,
        symbol: &str,
        observation: &Observation,
        detections: &[Detection],
        market_score: u8,
        classifier: &StateClassifier,
        mut on_key: F,
    ) -> Reconciliation
    where
        F: FnMut(&Reconciliation),
    {
        let mut out = Reconciliation::default();
        for pattern_type in PatternType::ALL {
            let key = RecordKey::new(symbol, pattern_type);
            let detection = detections.iter().find(|d| d.pattern_type() == pattern_type);
            let slot = match detection {
                Some(_) => self.slot(&key),
                None => match self.existing_slot(&key) {
                    Some(slot) => slot,
                    None => continue,
                },
            };
            let mut guard = lock(&slot);
            let ctx = Update {
                key: &key,
                detection,
                observation,
                market_score,
                classifier,
            };
            let mut part = Reconciliation::default();
            ctx.apply(&mut guard, &mut part);
            if !part.changed.is_empty() || !part.events.is_empty() {
                on_key(&part);
            }
            drop(guard);
            out.events.extend(part.events);
            out.changed.extend(part.changed);
        }
        out
    }

    /// Active record for a key
    pub fn get(&self, key: &RecordKey) -> Option<PatternRecord> {
        let slot = self.existing_slot(key)?;
        let slot = lock(&slot);
        slot.active.clone()
    }

    /// All active records, ordered by key
    pub fn list_active(&self) -> Vec<PatternRecord> {
        self.all_slots()
            .into_iter()
            .filter_map(|(_, slot)| {
                let slot = lock(&slot);
                slot.active.clone()
            })
            .collect()
    }

    /// Retired records for a key, oldest first
    pub fn history(&self, key: &RecordKey) -> Vec<PatternRecord> {
        match self.existing_slot(key) {
            Some(slot) => {
                let slot = lock(&slot);
                slot.history.clone()
            }
            None => Vec::new(),
        }
    }

    pub fn active_count(&self) -> usize {
        self.all_slots()
            .into_iter()
            .filter(|(_, slot)| lock(slot).active.is_some())
            .count()
    }

    /// Symbols with an active record in one of `states`, sorted and unique
    pub fn symbols_in(&self, states: &[PatternState]) -> Vec<String> {
        let symbols: BTreeSet<String> = self
            .list_active()
            .into_iter()
            .filter(|r| states.contains(&r.state))
            .map(|r| r.symbol)
            .collect();
        symbols.into_iter().collect()
    }

    /// Drop retired records last updated before `cutoff`; returns how many
    pub fn prune_history(&self, cutoff: NaiveDate) -> usize {
        let mut pruned = 0;
        for (_, slot) in self.all_slots() {
            let mut slot = lock(&slot);
            let before = slot.history.len();
            slot.history.retain(|r| r.updated_at >= cutoff);
            pruned += before - slot.history.len();
        }
        if pruned > 0 {
            log::info!("pruned {} retired records older than {}", pruned, cutoff);
        }
        pruned
    }

    pub fn stats(&self) -> RegistryStats {
        let mut stats = RegistryStats::default();
        let mut strength_sum = 0u64;
        let (mut wins, mut losses) = (0usize, 0usize);

        for (_, slot) in self.all_slots() {
            let slot = lock(&slot);
            if let Some(record) = &slot.active {
                stats.active += 1;
                *stats.by_state.entry(record.state).or_default() += 1;
                *stats.by_type.entry(record.pattern_type).or_default() += 1;
                strength_sum += u64::from(record.strength_score);
                if record.levels_frozen {
                    stats.confirmed_breakouts += 1;
                }
            }
            for record in &slot.history {
                stats.retired += 1;
                if record.levels_frozen {
                    stats.confirmed_breakouts += 1;
                }
                if record.targets_hit > 0 {
                    wins += 1;
                } else if record.state == PatternState::StoppedOut {
                    losses += 1;
                }
            }
        }

        if stats.active > 0 {
            stats.mean_strength = Some(strength_sum as f64 / stats.active as f64);
        }
        if wins + losses > 0 {
            stats.success_rate = Some(wins as f64 / (wins + losses) as f64);
        }
        stats
    }
}

/// One key's share of a reconcile pass
struct Update<'a> {
    key: &'a RecordKey,
    detection: Option<&'a Detection>,
    observation: &'a Observation,
    market_score: u8,
    classifier: &'a StateClassifier,
}

impl Update<'_> {
    fn apply(&self, slot: &mut Slot, out: &mut Reconciliation) {
        let as_of = self.observation.as_of;
        if slot.active.as_ref().is_some_and(|r| r.updated_at > as_of) {
            log::debug!("{}: ignoring observation from {}", self.key, as_of);
            return;
        }

        if let Some(record) = slot.active.as_mut() {
            let before = record.clone();
            self.refresh(record, self.detection);
            self.step(record, &mut out.events);
            if *record != before {
                out.changed.push(record.clone());
            }
        } else if let Some(mut record) = self.detection.and_then(|d| self.create(slot, d)) {
            log::debug!("{}: created in {}", self.key, record.state);
            out.events.push(PatternEvent {
                kind: EventKind::Created,
                record: record.clone(),
            });
            // A record born confirmed may already sit past its targets
            self.step(&mut record, &mut out.events);
            out.changed.push(record.clone());
            slot.active = Some(record);
        }

        if slot.active.as_ref().is_some_and(|r| !r.active) {
            if let Some(retired) = slot.active.take() {
                log::debug!("{}: retired in {}", self.key, retired.state);
                slot.history.push(retired);
            }
        }
    }

    fn create(&self, slot: &Slot, detection: &Detection) -> Option<PatternRecord> {
        let obs = self.observation;
        let anchor = detection.anchor().unwrap_or(obs.as_of);
        if slot.history.iter().any(|r| r.anchor == anchor) {
            return None;
        }

        let levels = detection.candidate.levels;
        if obs.close < levels.stop_loss {
            return None;
        }

        let state = self.classifier.classify(None, &obs.input(levels, obs.as_of));
        if state.is_terminal() {
            return None;
        }

        Some(PatternRecord {
            symbol: self.key.symbol.clone(),
            pattern_type: self.key.pattern_type,
            state,
            strength_score: detection.strength.total(),
            levels,
            volume_ratio: obs.volume.ratio(),
            distance_to_breakout_pct: levels.distance_to_breakout_pct(obs.close),
            market_score: self.market_score,
            active: true,
            detected_at: obs.as_of,
            updated_at: obs.as_of,
            anchor,
            levels_frozen: state.is_confirmed(),
            targets_hit: 0,
        })
    }

    fn refresh(&self, record: &mut PatternRecord, detection: Option<&Detection>) {
        let obs = self.observation;
        if let Some(d) = detection {
            record.strength_score = d.strength.total();
            if !record.levels_frozen {
                record.levels = d.candidate.levels;
                if let Some(anchor) = d.anchor() {
                    record.anchor = anchor;
                }
            }
        }
        record.volume_ratio = obs.volume.ratio();
        record.market_score = self.market_score;
        if !record.levels_frozen {
            record.distance_to_breakout_pct = record.levels.distance_to_breakout_pct(obs.close);
        }
        record.updated_at = obs.as_of;
    }

    fn step(&self, record: &mut PatternRecord, events: &mut Vec<PatternEvent>) {
        let input = self.observation.input(record.levels, record.detected_at);
        for next in self.classifier.advance(record.state, &input) {
            let from = record.state;
            record.state = next;
            if next.is_confirmed() {
                record.levels_frozen = true;
            }
            if let Some(k) = next.target_number() {
                record.targets_hit = record.targets_hit.max(k);
            }
            if next.is_terminal() {
                record.active = false;
            }
            log::debug!("{}: {} -> {}", self.key, from, next);
            events.push(PatternEvent {
                kind: EventKind::StateChanged { from },
                record: record.clone(),
            });
        }
    }
}
