//! Pattern lifecycle state machine
//!
//! ```text
//! FORMING → NEAR_BREAKOUT → BREAKOUT_IMMINENT → BREAKOUT_CONFIRMED
//!         → TARGET1_HIT → TARGET2_HIT → TARGET3_HIT
//! exits from any non-terminal state: STOPPED_OUT, EXPIRED
//! ```
//!
//! Rules are evaluated in precedence order and the first one that holds wins.
//! Forward rules never move a pattern backwards.

use chrono::NaiveDate;

use crate::{levels::Levels, volume::VolumeSignal, PatternError, Result};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatternState {
    Forming,
    NearBreakout,
    BreakoutImminent,
    BreakoutConfirmed,
    #[serde(rename = "TARGET1_HIT")]
    Target1Hit,
    #[serde(rename = "TARGET2_HIT")]
    Target2Hit,
    #[serde(rename = "TARGET3_HIT")]
    Target3Hit,
    StoppedOut,
    Expired,
}

impl PatternState {
    /// Forward path, in order
    pub const LADDER: [PatternState; 7] = [
        PatternState::Forming,
        PatternState::NearBreakout,
        PatternState::BreakoutImminent,
        PatternState::BreakoutConfirmed,
        PatternState::Target1Hit,
        PatternState::Target2Hit,
        PatternState::Target3Hit,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PatternState::Forming => "FORMING",
            PatternState::NearBreakout => "NEAR_BREAKOUT",
            PatternState::BreakoutImminent => "BREAKOUT_IMMINENT",
            PatternState::BreakoutConfirmed => "BREAKOUT_CONFIRMED",
            PatternState::Target1Hit => "TARGET1_HIT",
            PatternState::Target2Hit => "TARGET2_HIT",
            PatternState::Target3Hit => "TARGET3_HIT",
            PatternState::StoppedOut => "STOPPED_OUT",
            PatternState::Expired => "EXPIRED",
        }
    }

    /// Position on the forward path; None for the exits
    pub fn rank(self) -> Option<usize> {
        Self::LADDER.iter().position(|s| *s == self)
    }

    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PatternState::Target3Hit | PatternState::StoppedOut | PatternState::Expired
        )
    }

    /// At or past BREAKOUT_CONFIRMED on the forward path
    #[inline]
    pub fn is_confirmed(self) -> bool {
        matches!(
            self,
            PatternState::BreakoutConfirmed
                | PatternState::Target1Hit
                | PatternState::Target2Hit
                | PatternState::Target3Hit
        )
    }

    /// 1, 2 or 3 for the target states
    pub fn target_number(self) -> Option<u8> {
        match self {
            PatternState::Target1Hit => Some(1),
            PatternState::Target2Hit => Some(2),
            PatternState::Target3Hit => Some(3),
            _ => None,
        }
    }

    fn target(k: usize) -> PatternState {
        match k {
            1 => PatternState::Target1Hit,
            2 => PatternState::Target2Hit,
            _ => PatternState::Target3Hit,
        }
    }
}

impl std::fmt::Display for PatternState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Distance to breakout (percent) at or below which a pattern is near
    pub near_breakout_pct: f64,
    /// Distance to breakout (percent) at or below which, with volume, breakout is imminent
    pub imminent_pct: f64,
    /// Pre-confirmation patterns older than this many days expire
    pub max_validity_days: u32,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            near_breakout_pct: 2.0,
            imminent_pct: 0.5,
            max_validity_days: 60,
        }
    }
}

impl StateConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.imminent_pct.is_finite() && self.near_breakout_pct.is_finite()) {
            return Err(PatternError::InvalidValue("state distances must be finite"));
        }
        if self.imminent_pct < 0.0 || self.imminent_pct > self.near_breakout_pct {
            return Err(PatternError::InvalidConfig(format!(
                "imminent_pct {} must lie in [0, near_breakout_pct {}]",
                self.imminent_pct, self.near_breakout_pct
            )));
        }
        Ok(())
    }
}

/// Latest bar and volume of a series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub as_of: NaiveDate,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub volume: VolumeSignal,
}

impl Observation {
    /// Classifier input for a pattern detected on `detected_at`
    pub fn input(&self, levels: Levels, detected_at: NaiveDate) -> ClassifierInput {
        ClassifierInput {
            close: self.close,
            high: self.high,
            low: self.low,
            levels,
            volume: self.volume,
            age_days: (self.as_of - detected_at).num_days(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierInput {
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub levels: Levels,
    pub volume: VolumeSignal,
    pub age_days: i64,
}

impl ClassifierInput {
    #[inline]
    pub fn distance_to_breakout_pct(&self) -> f64 {
        self.levels.distance_to_breakout_pct(self.close)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StateClassifier {
    config: StateConfig,
}

impl StateClassifier {
    pub fn new(config: StateConfig) -> Self {
        Self { config }
    }

    #[inline]
    pub fn config(&self) -> &StateConfig {
        &self.config
    }

    /// State for `input`, given the current state (None for a new pattern)
    pub fn classify(&self, current: Option<PatternState>, input: &ClassifierInput) -> PatternState {
        if let Some(state) = current.filter(|s| s.is_terminal()) {
            return state;
        }

        if input.close < input.levels.stop_loss {
            return PatternState::StoppedOut;
        }

        let confirmed = current.is_some_and(PatternState::is_confirmed);
        if !confirmed && input.age_days > i64::from(self.config.max_validity_days) {
            return PatternState::Expired;
        }

        if let Some(state) = current.filter(|_| confirmed) {
            let hit = input
                .levels
                .targets()
                .iter()
                .rposition(|t| input.high >= *t)
                .map(|k| PatternState::target(k + 1));
            return match hit {
                Some(target) if target > state => target,
                _ => state,
            };
        }

        let distance = input.distance_to_breakout_pct();
        let computed = if input.close > input.levels.breakout_price && input.volume.breakout_confirmed() {
            PatternState::BreakoutConfirmed
        } else if distance <= self.config.imminent_pct && input.volume.imminent_confirmed() {
            PatternState::BreakoutImminent
        } else if distance <= self.config.near_breakout_pct {
            PatternState::NearBreakout
        } else {
            PatternState::Forming
        };

        match current {
            Some(state) if state > computed => state,
            _ => computed,
        }
    }

    /// Every state stepped through from `current`; empty when nothing changes.
    ///
    /// Targets skipped within one observation are each returned, in order.
    pub fn advance(&self, current: PatternState, input: &ClassifierInput) -> Vec<PatternState> {
        let next = self.classify(Some(current), input);
        if next == current {
            return Vec::new();
        }
        match (current.is_confirmed(), current.rank(), next.rank()) {
            (true, Some(from), Some(to)) => PatternState::LADDER[from + 1..=to].to_vec(),
            _ => vec![next],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::VolumeConfig;
    use proptest::prelude::*;

    fn levels() -> Levels {
        Levels {
            breakout_price: 100.0,
            stop_loss: 90.0,
            target1: 103.82,
            target2: 106.18,
            target3: 110.0,
        }
    }

    fn input(close: f64, high: f64, ratio: Option<f64>, age_days: i64) -> ClassifierInput {
        ClassifierInput {
            close,
            high,
            low: close,
            levels: levels(),
            volume: VolumeSignal::with_ratio(ratio, &VolumeConfig::default()),
            age_days,
        }
    }

    fn classify(current: Option<PatternState>, i: ClassifierInput) -> PatternState {
        StateClassifier::default().classify(current, &i)
    }

    #[test]
    fn test_imminent_needs_distance_and_volume() {
        // 0.3% below breakout with volume 1.6x
        assert_eq!(classify(None, input(99.7, 99.8, Some(1.6), 0)), PatternState::BreakoutImminent);
        assert_eq!(classify(None, input(99.7, 99.8, Some(1.2), 0)), PatternState::NearBreakout);
    }

    #[test]
    fn test_near_and_forming() {
        assert_eq!(classify(None, input(98.5, 98.6, Some(1.0), 0)), PatternState::NearBreakout);
        assert_eq!(classify(None, input(95.0, 95.1, Some(1.0), 0)), PatternState::Forming);
    }

    #[test]
    fn test_confirmation_needs_volume() {
        assert_eq!(classify(None, input(101.0, 101.5, Some(1.3), 0)), PatternState::BreakoutConfirmed);
        assert_eq!(classify(None, input(101.0, 101.5, Some(1.1), 0)), PatternState::NearBreakout);
        assert_eq!(classify(None, input(101.0, 101.5, None, 0)), PatternState::NearBreakout);
    }

    #[test]
    fn test_stop_takes_precedence() {
        let state = classify(Some(PatternState::Target2Hit), input(89.0, 108.0, Some(2.0), 5));
        assert_eq!(state, PatternState::StoppedOut);
    }

    #[test]
    fn test_expiry_only_before_confirmation() {
        assert_eq!(classify(Some(PatternState::NearBreakout), input(98.5, 99.0, None, 61)), PatternState::Expired);
        assert_eq!(classify(Some(PatternState::NearBreakout), input(98.5, 99.0, None, 60)), PatternState::NearBreakout);
        assert_eq!(
            classify(Some(PatternState::BreakoutConfirmed), input(101.0, 101.0, None, 200)),
            PatternState::BreakoutConfirmed
        );
    }

    #[test]
    fn test_never_moves_backwards() {
        let state = classify(Some(PatternState::BreakoutImminent), input(95.0, 95.5, Some(0.5), 3));
        assert_eq!(state, PatternState::BreakoutImminent);
        let state = classify(Some(PatternState::BreakoutConfirmed), input(99.0, 99.5, Some(0.5), 3));
        assert_eq!(state, PatternState::BreakoutConfirmed);
    }

    #[test]
    fn test_terminal_is_sticky() {
        for s in [PatternState::StoppedOut, PatternState::Expired, PatternState::Target3Hit] {
            assert_eq!(classify(Some(s), input(101.0, 101.0, Some(2.0), 0)), s);
        }
    }

    #[test]
    fn test_targets_only_after_confirmation() {
        // A pre-confirmation pattern reaching target1 just confirms
        assert_eq!(
            classify(Some(PatternState::NearBreakout), input(104.0, 104.5, Some(1.4), 1)),
            PatternState::BreakoutConfirmed
        );
        assert_eq!(
            classify(Some(PatternState::BreakoutConfirmed), input(104.0, 104.5, None, 2)),
            PatternState::Target1Hit
        );
    }

    #[test]
    fn test_advance_records_skipped_targets() {
        let c = StateClassifier::default();
        let steps = c.advance(PatternState::BreakoutConfirmed, &input(108.0, 110.5, None, 3));
        assert_eq!(
            steps,
            vec![PatternState::Target1Hit, PatternState::Target2Hit, PatternState::Target3Hit]
        );
        assert!(c.advance(PatternState::Target1Hit, &input(103.0, 103.0, None, 3)).is_empty());
        assert_eq!(
            c.advance(PatternState::Forming, &input(101.0, 101.5, Some(1.5), 3)),
            vec![PatternState::BreakoutConfirmed]
        );
    }

    #[test]
    fn test_serde_ids() {
        assert_eq!(serde_json::to_string(&PatternState::Target1Hit).unwrap(), "\"TARGET1_HIT\"");
        assert_eq!(serde_json::to_string(&PatternState::NearBreakout).unwrap(), "\"NEAR_BREAKOUT\"");
        assert_eq!(PatternState::BreakoutImminent.to_string(), "BREAKOUT_IMMINENT");
    }

    fn rank_or_exit(s: PatternState) -> usize {
        s.rank().unwrap_or(usize::MAX)
    }

    proptest! {
        #[test]
        fn prop_transitions_monotonic(
            steps in proptest::collection::vec((80.0f64..115.0, 0.0f64..5.0, proptest::option::of(0.0f64..3.0)), 1..40)
        ) {
            let c = StateClassifier::default();
            let mut state = PatternState::Forming;
            for (day, (close, lift, ratio)) in steps.into_iter().enumerate() {
                let next = c.classify(Some(state), &input(close, close + lift, ratio, day as i64));
                if state.is_terminal() {
                    prop_assert_eq!(next, state);
                } else if next.rank().is_some() {
                    prop_assert!(rank_or_exit(next) >= rank_or_exit(state));
                }
                state = next;
            }
        }
    }
}
