//! # chartwatch - Bullish Chart Pattern Detection Engine
//!
//! Detects the formation, maturation and breakout of eight bullish chart
//! shapes in daily price history, scores them, and tracks each one through a
//! breakout lifecycle.
//!
//! ## Quick Start
//!
//! ```rust
//! use chartwatch::prelude::*;
//! use chrono::{Duration, NaiveDate};
//!
//! let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//! let bars: Vec<PriceBar> = (0..80)
//!     .map(|i| {
//!         let close = 100.0 + (i as f64 * 0.3).sin() * 5.0;
//!         PriceBar::new(start + Duration::days(i), close, close + 0.5, close - 0.5, close, 1_000.0)
//!     })
//!     .collect();
//! let series = PriceSeries::new("DEMO", bars).unwrap();
//!
//! // Create engine with all eight matchers
//! let engine = EngineBuilder::new().with_all_defaults().build().unwrap();
//!
//! // Detect candidates with a neutral market score
//! let detections = engine.detect(&series, 50).unwrap();
//! for d in &detections {
//!     assert!(d.strength.total() <= 100);
//! }
//! ```

use chrono::NaiveDate;

pub mod config;
pub mod extrema;
pub mod levels;
pub mod matchers;
pub mod params;
pub mod registry;
pub mod scan;
pub mod scoring;
pub mod state;
pub mod volume;

pub mod prelude {
    pub use crate::{
        // Configuration
        config::EngineConfig,
        // Extrema
        extrema::{ExtremaConfig, ExtremaDetector, ExtremumKind, ExtremumPoint},
        // Levels
        levels::{LevelConfig, Levels, PatternCandidate},
        // Matchers
        matchers::*,
        // Parameters
        params::{get_percent, get_period, get_ratio, ParamMeta, ParamType, ParameterizedMatcher},
        // Registry
        registry::{
            EventKind, PatternEvent, PatternRecord, RecordKey, Reconciliation, Registry, RegistryStats,
        },
        // Scanning
        scan::{
            DispatchError, EventSink, FailureKind, FixedMarketScore, MarketScorer, MemoryStore,
            PatternStore, ProviderError, ScanConfig, ScanFailure, ScanReport, Scanner,
            SeriesProvider, StoreError,
        },
        // Scoring
        scoring::StrengthBreakdown,
        // State
        state::{ClassifierInput, Observation, PatternState, StateClassifier, StateConfig},
        // Volume
        volume::{VolumeConfig, VolumeSignal},
        // Engine
        BuiltinMatcher,
        Detection,
        EngineBuilder,
        OHLCVExt,
        // Errors
        PatternError,
        PatternEngine,
        PatternType,
        Period,
        PriceBar,
        PriceSeries,
        Ratio,
        Result,
        ShapeGeometry,
        ShapeMatch,
        // Core traits
        ShapeMatcher,
        SpacingBounds,
        OHLCV,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, PatternError>;

/// Errors that can occur during pattern detection
#[derive(Debug, Clone, thiserror::Error)]
pub enum PatternError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Insufficient data: need {need} bars, got {got}")]
    InsufficientData { need: usize, got: usize },

    #[error("Invalid OHLCV at index {index}: {reason}")]
    InvalidOHLCV { index: usize, reason: &'static str },

    #[error("Invalid series for {symbol}: {reason}")]
    InvalidSeries { symbol: String, reason: &'static str },

    #[error("Config file error: {0}")]
    Config(String),
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Normalized value in range 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Ratio(f64);

impl Ratio {
    /// Create a new Ratio, validating the value is in [0.0, 1.0]
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(PatternError::InvalidValue(
                "Ratio cannot be NaN or infinite",
            ));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(PatternError::OutOfRange {
                field: "Ratio",
                value,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(Self(value))
    }

    /// Create a Ratio from a compile-time constant (library internal use)
    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl serde::Serialize for Ratio {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Ratio {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Ratio::new(value).map_err(serde::de::Error::custom)
    }
}

/// Bar count (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period(usize);

impl Period {
    /// Create a new Period, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(PatternError::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl serde::Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Period::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// Core OHLCV data trait
pub trait OHLCV {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> f64;
}

/// Extension trait with computed properties for OHLCV data
pub trait OHLCVExt: OHLCV {
    #[inline]
    fn body(&self) -> f64 {
        (self.close() - self.open()).abs()
    }

    #[inline]
    fn range(&self) -> f64 {
        self.high() - self.low()
    }

    /// Where the close sits inside the bar: (close - low) / (high - low).
    /// Returns None if range ≈ 0
    #[inline]
    fn close_position(&self) -> Option<f64> {
        let range = self.range();
        (range > f64::EPSILON).then(|| (self.close() - self.low()) / range)
    }

    /// Validate OHLCV data consistency
    fn validate(&self) -> Result<()> {
        let values = [self.open(), self.high(), self.low(), self.close(), self.volume()];
        if values.iter().any(|v| v.is_nan()) {
            return Err(PatternError::InvalidOHLCV {
                index: 0,
                reason: "NaN in OHLCV",
            });
        }
        if values.iter().any(|v| v.is_infinite()) {
            return Err(PatternError::InvalidOHLCV {
                index: 0,
                reason: "Infinite value in OHLCV",
            });
        }
        if self.high() < self.low() {
            return Err(PatternError::InvalidOHLCV {
                index: 0,
                reason: "high < low",
            });
        }
        if self.low() <= 0.0 {
            return Err(PatternError::InvalidOHLCV {
                index: 0,
                reason: "non-positive price",
            });
        }
        if self.volume() < 0.0 {
            return Err(PatternError::InvalidOHLCV {
                index: 0,
                reason: "negative volume",
            });
        }
        Ok(())
    }
}

impl<T: OHLCV> OHLCVExt for T {}

// ============================================================
// PRICE DATA
// ============================================================

/// One completed daily bar
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    pub fn new(date: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self { date, open, high, low, close, volume }
    }
}

impl OHLCV for PriceBar {
    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn volume(&self) -> f64 {
        self.volume
    }
}

/// Chronologically ordered bars for one symbol
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PriceSeries {
    symbol: String,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Create a series, rejecting bars that are not in strictly ascending date order
    pub fn new(symbol: impl Into<String>, bars: Vec<PriceBar>) -> Result<Self> {
        let symbol = symbol.into();
        if bars.windows(2).any(|w| w[1].date <= w[0].date) {
            return Err(PatternError::InvalidSeries {
                symbol,
                reason: "bars not in ascending date order",
            });
        }
        Ok(Self { symbol, bars })
    }

    #[inline]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    #[inline]
    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    #[inline]
    pub fn last(&self) -> Option<&PriceBar> {
        self.bars.last()
    }

    /// Date of the most recent bar
    #[inline]
    pub fn as_of(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    /// Keep only the most recent `lookback` bars
    pub fn truncate_to(mut self, lookback: usize) -> Self {
        if self.bars.len() > lookback {
            self.bars.drain(..self.bars.len() - lookback);
        }
        self
    }

    /// Validate every bar, reporting the first bad index
    pub fn validate(&self) -> Result<()> {
        for (i, bar) in self.bars.iter().enumerate() {
            bar.validate().map_err(|e| match e {
                PatternError::InvalidOHLCV { reason, .. } => {
                    PatternError::InvalidOHLCV { index: i, reason }
                }
                other => other,
            })?;
        }
        Ok(())
    }
}

// ============================================================
// PATTERN TYPES
// ============================================================

/// The eight bullish chart shapes
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatternType {
    DoubleBottom,
    TripleBottom,
    InverseHeadShoulders,
    AscendingTriangle,
    BullFlag,
    CupHandle,
    RisingWedge,
    SymmetricalTriangle,
}

impl PatternType {
    pub const ALL: [PatternType; 8] = [
        PatternType::DoubleBottom,
        PatternType::TripleBottom,
        PatternType::InverseHeadShoulders,
        PatternType::AscendingTriangle,
        PatternType::BullFlag,
        PatternType::CupHandle,
        PatternType::RisingWedge,
        PatternType::SymmetricalTriangle,
    ];

    /// Returns the string identifier
    pub fn as_str(self) -> &'static str {
        match self {
            PatternType::DoubleBottom => "DOUBLE_BOTTOM",
            PatternType::TripleBottom => "TRIPLE_BOTTOM",
            PatternType::InverseHeadShoulders => "INVERSE_HEAD_SHOULDERS",
            PatternType::AscendingTriangle => "ASCENDING_TRIANGLE",
            PatternType::BullFlag => "BULL_FLAG",
            PatternType::CupHandle => "CUP_HANDLE",
            PatternType::RisingWedge => "RISING_WEDGE",
            PatternType::SymmetricalTriangle => "SYMMETRICAL_TRIANGLE",
        }
    }

    /// Reversal shapes form a base after a decline; the rest are continuations
    pub fn is_reversal(self) -> bool {
        matches!(
            self,
            PatternType::DoubleBottom
                | PatternType::TripleBottom
                | PatternType::InverseHeadShoulders
                | PatternType::CupHandle
        )
    }
}

impl std::fmt::Display for PatternType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Allowed and ideal spacing of a shape, in bars
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SpacingBounds {
    pub min: usize,
    pub ideal_min: usize,
    pub ideal_max: usize,
    pub max: usize,
}

impl SpacingBounds {
    pub const fn new(min: usize, ideal_min: usize, ideal_max: usize, max: usize) -> Self {
        Self { min, ideal_min, ideal_max, max }
    }
}

/// Raw measurements of a matched shape, consumed by the scorer
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ShapeGeometry {
    /// Deviation from the ideal shape, in percent (0 = perfect)
    pub deviation_pct: f64,
    /// Largest deviation the matcher accepts
    pub tolerance_pct: f64,
    /// Height of the shape, in percent
    pub amplitude_pct: f64,
    /// Smallest height the matcher accepts
    pub min_amplitude_pct: f64,
    /// Characteristic spacing in bars
    pub spacing: usize,
    pub spacing_bounds: SpacingBounds,
}

/// Output of a shape matcher, before pricing
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeMatch {
    pub pattern_type: PatternType,
    /// Key turning points in index order
    pub points: Vec<extrema::ExtremumPoint>,
    /// Resistance/neckline price
    pub breakout_price: f64,
    /// Lowest low of the formation
    pub lowest_low: f64,
    pub geometry: ShapeGeometry,
}

// ============================================================
// SHAPE MATCHER TRAIT
// ============================================================

/// A geometric test for one chart shape
pub trait ShapeMatcher: Send + Sync {
    fn pattern_type(&self) -> PatternType;

    /// Bars required before the matcher is worth running
    fn min_bars(&self) -> usize;

    /// Return the most recent qualifying formation, if any
    fn find(&self, series: &PriceSeries, extrema: &[extrema::ExtremumPoint]) -> Option<ShapeMatch>;

    fn validate_config(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================
// BUILTIN MATCHERS - generated via macro
// ============================================================

use matchers::*;

/// Macro to generate BuiltinMatcher enum without boilerplate
macro_rules! define_builtin_matchers {
    (
        $(
            $variant:ident($matcher:ty)
        ),* $(,)?
    ) => {
        /// All builtin matchers - enum dispatch
        #[derive(Debug, Clone)]
        pub enum BuiltinMatcher {
            $($variant($matcher)),*
        }

        impl BuiltinMatcher {
            #[inline]
            pub fn find(
                &self,
                series: &PriceSeries,
                extrema: &[extrema::ExtremumPoint],
            ) -> Option<ShapeMatch> {
                match self {
                    $(Self::$variant(m) => ShapeMatcher::find(m, series, extrema)),*
                }
            }

            #[inline]
            pub fn pattern_type(&self) -> PatternType {
                match self {
                    $(Self::$variant(m) => ShapeMatcher::pattern_type(m)),*
                }
            }

            #[inline]
            pub fn min_bars(&self) -> usize {
                match self {
                    $(Self::$variant(m) => ShapeMatcher::min_bars(m)),*
                }
            }

            pub fn validate_config(&self) -> Result<()> {
                match self {
                    $(Self::$variant(m) => ShapeMatcher::validate_config(m)),*
                }
            }
        }
    };
}

define_builtin_matchers! {
    // Reversal (4)
    DoubleBottom(DoubleBottomMatcher),
    TripleBottom(TripleBottomMatcher),
    InverseHeadShoulders(InverseHeadShouldersMatcher),
    CupHandle(CupHandleMatcher),

    // Continuation (4)
    AscendingTriangle(AscendingTriangleMatcher),
    BullFlag(BullFlagMatcher),
    RisingWedge(RisingWedgeMatcher),
    SymmetricalTriangle(SymmetricalTriangleMatcher),
}

// ============================================================
// PATTERN ENGINE
// ============================================================

/// A priced, scored candidate ready for the registry
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub candidate: levels::PatternCandidate,
    pub strength: scoring::StrengthBreakdown,
    pub volume: volume::VolumeSignal,
}

impl Detection {
    #[inline]
    pub fn pattern_type(&self) -> PatternType {
        self.candidate.pattern_type
    }

    /// Date of the first key point; identifies the formation across scans
    pub fn anchor(&self) -> Option<NaiveDate> {
        self.candidate.points.first().map(|p| p.date)
    }
}

/// Main pattern detection engine
#[derive(Debug, Clone)]
pub struct PatternEngine {
    matchers: Vec<BuiltinMatcher>,
    config: config::EngineConfig,
    min_strength: Option<u8>,
    pattern_filter: Option<Vec<PatternType>>,
}

impl PatternEngine {
    #[inline]
    pub fn config(&self) -> &config::EngineConfig {
        &self.config
    }

    #[inline]
    pub fn matchers(&self) -> &[BuiltinMatcher] {
        &self.matchers
    }

    /// Turning points of the series under the configured detector
    pub fn extrema(&self, series: &PriceSeries) -> Vec<extrema::ExtremumPoint> {
        extrema::ExtremaDetector::new(self.config.extrema).detect(series)
    }

    /// Volume ratio of the series tail
    pub fn volume_signal(&self, series: &PriceSeries) -> volume::VolumeSignal {
        volume::VolumeSignal::compute(series.bars(), &self.config.volume)
    }

    /// Current price/volume snapshot for state classification
    pub fn observe(&self, series: &PriceSeries) -> Option<state::Observation> {
        let last = series.last()?;
        Some(state::Observation {
            as_of: last.date,
            close: last.close,
            high: last.high,
            low: last.low,
            volume: self.volume_signal(series),
        })
    }

    pub fn classifier(&self) -> state::StateClassifier {
        state::StateClassifier::new(self.config.state)
    }

    /// Run every matcher over the series, unpriced.
    pub fn match_shapes(
        &self,
        series: &PriceSeries,
        extrema: &[extrema::ExtremumPoint],
    ) -> Vec<ShapeMatch> {
        self.matchers
            .iter()
            .filter(|m| series.len() >= m.min_bars())
            .filter_map(|m| m.find(series, extrema))
            .collect()
    }

    /// Detect, price and score candidates for one series.
    ///
    /// `market_score` is applied as-is (clamped to 100) to every candidate.
    pub fn detect(&self, series: &PriceSeries, market_score: u8) -> Result<Vec<Detection>> {
        series.validate()?;
        let need = self.config.extrema.min_span();
        if series.len() < need {
            return Err(PatternError::InsufficientData {
                need,
                got: series.len(),
            });
        }

        let extrema = self.extrema(series);
        let volume = self.volume_signal(series);
        let market_score = market_score.min(100);

        let mut detections = Vec::new();
        for shape in self.match_shapes(series, &extrema) {
            let Some(candidate) = levels::price_shape(&shape, &self.config.levels) else {
                log::debug!(
                    "{} {}: below risk-reward gate, discarded",
                    series.symbol(),
                    shape.pattern_type
                );
                continue;
            };
            let strength = scoring::score(&candidate.geometry, volume.ratio(), market_score);
            let detection = Detection {
                candidate,
                strength,
                volume,
            };
            if self.should_include(&detection) {
                log::debug!(
                    "{} {}: breakout {:.2}, stop {:.2}, strength {}",
                    series.symbol(),
                    detection.pattern_type(),
                    detection.candidate.levels.breakout_price,
                    detection.candidate.levels.stop_loss,
                    detection.strength.total()
                );
                detections.push(detection);
            }
        }

        Ok(detections)
    }

    fn should_include(&self, d: &Detection) -> bool {
        if let Some(min) = self.min_strength {
            if d.strength.total() < min {
                return false;
            }
        }
        if let Some(ref filter) = self.pattern_filter {
            if !filter.contains(&d.pattern_type()) {
                return false;
            }
        }
        true
    }

    fn validate(&self) -> Result<()> {
        self.config.validate()?;
        for m in &self.matchers {
            m.validate_config()?;
        }
        for (i, m) in self.matchers.iter().enumerate() {
            if self.matchers[..i]
                .iter()
                .any(|other| other.pattern_type() == m.pattern_type())
            {
                return Err(PatternError::InvalidConfig(format!(
                    "matcher for {} registered twice",
                    m.pattern_type()
                )));
            }
        }
        Ok(())
    }
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for creating PatternEngine instances
#[derive(Debug, Clone, Default)]
pub struct EngineBuilder {
    matchers: Vec<BuiltinMatcher>,
    config: config::EngineConfig,
    min_strength: Option<u8>,
    pattern_filter: Option<Vec<PatternType>>,
}

/// Generate an array of `BuiltinMatcher` variants using `Default::default()` for each inner type.
macro_rules! builtin_defaults {
  ($($variant:ident),* $(,)?) => {
    [$(BuiltinMatcher::$variant(Default::default())),*]
  };
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add all eight matchers with default thresholds
    pub fn with_all_defaults(self) -> Self {
        self.with_reversal_defaults().with_continuation_defaults()
    }

    /// Add double/triple bottom, inverse head & shoulders, cup & handle
    pub fn with_reversal_defaults(mut self) -> Self {
        self.matchers.extend(builtin_defaults![
            DoubleBottom,
            TripleBottom,
            InverseHeadShoulders,
            CupHandle,
        ]);
        self
    }

    /// Add ascending triangle, bull flag, rising wedge, symmetrical triangle
    pub fn with_continuation_defaults(mut self) -> Self {
        self.matchers.extend(builtin_defaults![
            AscendingTriangle,
            BullFlag,
            RisingWedge,
            SymmetricalTriangle,
        ]);
        self
    }

    /// Add a builtin matcher
    #[allow(clippy::should_implement_trait)]
    pub fn add(mut self, matcher: BuiltinMatcher) -> Self {
        self.matchers.push(matcher);
        self
    }

    /// Add with config validation
    pub fn add_checked(mut self, matcher: BuiltinMatcher) -> Result<Self> {
        matcher.validate_config()?;
        self.matchers.push(matcher);
        Ok(self)
    }

    /// Replace the engine configuration
    pub fn config(mut self, config: config::EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Drop detections scoring below `strength`
    pub fn min_strength(mut self, strength: u8) -> Self {
        self.min_strength = Some(strength);
        self
    }

    /// Filter to specific patterns only
    pub fn only_patterns(mut self, types: impl IntoIterator<Item = PatternType>) -> Self {
        self.pattern_filter = Some(types.into_iter().collect());
        self
    }

    /// Build the engine
    pub fn build(self) -> Result<PatternEngine> {
        let engine = PatternEngine {
            matchers: self.matchers,
            config: self.config,
            min_strength: self.min_strength,
            pattern_filter: self.pattern_filter,
        };
        engine.validate()?;
        Ok(engine)
    }
}

// ============================================================
// TESTS
// ============================================================
