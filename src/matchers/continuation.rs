//! Continuation shape matchers, fitted to the most recent bars
//!
//! Ascending Triangle, Bull Flag, Rising Wedge, Symmetrical Triangle

use std::collections::HashMap;

use super::helpers::{self, pct_above, pct_diff};
use crate::{
    extrema::{ExtremumKind, ExtremumPoint},
    params::{get_percent, get_period, get_ratio, ParamMeta, ParameterizedMatcher},
    PatternError, PatternType, Period, PriceSeries, Ratio, Result, ShapeGeometry, ShapeMatch,
    ShapeMatcher, SpacingBounds, OHLCV,
};

impl_with_defaults!(
    AscendingTriangleMatcher,
    BullFlagMatcher,
    RisingWedgeMatcher,
    SymmetricalTriangleMatcher,
);

/// Bounds for window-fitted shapes: span of the turning points inside the window
fn window_bounds(window: usize) -> SpacingBounds {
    SpacingBounds::new(window / 4, window / 2, window * 7 / 8, window)
}

/// Turning points inside the window, or the two anchoring bars when there are fewer than two
fn window_points(
    series: &PriceSeries,
    extrema: &[ExtremumPoint],
    start: usize,
    floor: usize,
    top: usize,
) -> Vec<ExtremumPoint> {
    let inside: Vec<ExtremumPoint> = extrema.iter().filter(|p| p.index >= start).copied().collect();
    if inside.len() >= 2 {
        return inside;
    }
    let mut points = vec![
        helpers::bar_point(series, floor, ExtremumKind::LocalMin),
        helpers::bar_point(series, top, ExtremumKind::LocalMax),
    ];
    points.sort_by_key(|p| p.index);
    points
}

fn check_window(window: Period) -> Result<()> {
    if window.get() < 4 {
        return Err(PatternError::InvalidConfig("window must be at least 4 bars".into()));
    }
    Ok(())
}

// ============================================================
// ASCENDING TRIANGLE
// ============================================================

/// Flat resistance tested repeatedly above a series of higher lows
#[derive(Debug, Clone)]
pub struct AscendingTriangleMatcher {
    pub window: Period,
    /// Maxima within this distance of the highest max count as touches
    pub touch_tolerance_pct: f64,
    pub min_touches: Period,
    pub min_rising_lows: Period,
    /// Smallest resistance height above the first low, in percent
    pub min_height_pct: f64,
}

impl Default for AscendingTriangleMatcher {
    fn default() -> Self {
        Self {
            window: Period::new_const(40),
            touch_tolerance_pct: 1.0,
            min_touches: Period::new_const(2),
            min_rising_lows: Period::new_const(2),
            min_height_pct: 3.0,
        }
    }
}

impl ShapeMatcher for AscendingTriangleMatcher {
    fn pattern_type(&self) -> PatternType {
        PatternType::AscendingTriangle
    }

    fn min_bars(&self) -> usize {
        self.window.get()
    }

    fn find(&self, series: &PriceSeries, extrema: &[ExtremumPoint]) -> Option<ShapeMatch> {
        let n = series.len();
        if n < self.window.get() {
            return None;
        }
        let start = n - self.window.get();
        let inside: Vec<ExtremumPoint> = extrema.iter().filter(|p| p.index >= start).copied().collect();
        let highs = helpers::maxima(&inside);
        let lows = helpers::minima(&inside);

        let resistance = highs.iter().copied().reduce(|best, p| if p.price > best.price { p } else { best })?;
        let touches: Vec<ExtremumPoint> = highs
            .iter()
            .filter(|p| pct_diff(resistance.price, p.price) <= self.touch_tolerance_pct)
            .copied()
            .collect();
        if touches.len() < self.min_touches.get() {
            return None;
        }

        if lows.len() < self.min_rising_lows.get() || !lows.windows(2).all(|w| w[1].price > w[0].price) {
            return None;
        }
        let base = lows[0];

        let height = pct_above(resistance.price, base.price);
        if height < self.min_height_pct {
            return None;
        }

        let spread = touches
            .iter()
            .map(|p| pct_diff(resistance.price, p.price))
            .fold(0.0, f64::max);
        let (first, last) = (touches[0], touches[touches.len() - 1]);
        let points = inside
            .iter()
            .filter(|p| p.is_min() || touches.iter().any(|t| t.index == p.index))
            .copied()
            .collect();

        Some(ShapeMatch {
            pattern_type: PatternType::AscendingTriangle,
            points,
            breakout_price: resistance.price,
            lowest_low: base.price,
            geometry: ShapeGeometry {
                deviation_pct: spread,
                tolerance_pct: self.touch_tolerance_pct,
                amplitude_pct: height,
                min_amplitude_pct: self.min_height_pct,
                spacing: last.index - first.index,
                spacing_bounds: window_bounds(self.window.get()),
            },
        })
    }

    fn validate_config(&self) -> Result<()> {
        check_window(self.window)?;
        helpers::check_percent("touch_tolerance_pct", self.touch_tolerance_pct)?;
        helpers::check_percent("min_height_pct", self.min_height_pct)
    }
}

// ============================================================
// BULL FLAG
// ============================================================

/// Sharp advance (the pole) followed by a tight consolidation (the flag)
#[derive(Debug, Clone)]
pub struct BullFlagMatcher {
    pub pole_bars: Period,
    pub min_flag_bars: Period,
    pub ideal_flag_min: Period,
    pub ideal_flag_max: Period,
    pub max_flag_bars: Period,
    /// Smallest close-to-close gain across the pole, in percent
    pub min_pole_gain_pct: f64,
    /// Largest (flag high - flag low) / mean flag close, in percent
    pub max_flag_range_pct: f64,
}

impl Default for BullFlagMatcher {
    fn default() -> Self {
        Self {
            pole_bars: Period::new_const(20),
            min_flag_bars: Period::new_const(5),
            ideal_flag_min: Period::new_const(7),
            ideal_flag_max: Period::new_const(12),
            max_flag_bars: Period::new_const(15),
            min_pole_gain_pct: 8.0,
            max_flag_range_pct: 5.0,
        }
    }
}

impl BullFlagMatcher {
    fn bounds(&self) -> SpacingBounds {
        SpacingBounds::new(
            self.min_flag_bars.get(),
            self.ideal_flag_min.get(),
            self.ideal_flag_max.get(),
            self.max_flag_bars.get(),
        )
    }

    fn evaluate(&self, series: &PriceSeries, flag_len: usize) -> Option<ShapeMatch> {
        let bars = series.bars();
        let n = bars.len();
        let pole = self.pole_bars.get();
        if n < pole + flag_len {
            return None;
        }
        let flag_start = n - flag_len;
        let pole_start = flag_start - pole;

        let gain = pct_above(bars[flag_start - 1].close(), bars[pole_start].close());
        if gain < self.min_pole_gain_pct {
            return None;
        }

        let flag_high = helpers::highest_bar(bars, flag_start, n)?;
        let flag_low = helpers::lowest_bar(bars, flag_start, n)?;
        let closes: Vec<f64> = bars[flag_start..].iter().map(|b| b.close()).collect();
        let range = (bars[flag_high].high() - bars[flag_low].low()) / helpers::mean(&closes)? * 100.0;
        if range >= self.max_flag_range_pct {
            return None;
        }

        let pole_base = helpers::lowest_bar(bars, pole_start, flag_start)?;
        let pole_top = helpers::highest_bar(bars, pole_start, flag_start)?;
        if bars[flag_low].low() <= bars[pole_base].low() || bars[flag_high].high() > bars[pole_top].high() {
            return None;
        }

        let mut points = vec![
            helpers::bar_point(series, pole_base, ExtremumKind::LocalMin),
            helpers::bar_point(series, pole_top, ExtremumKind::LocalMax),
            helpers::bar_point(series, flag_low, ExtremumKind::LocalMin),
            helpers::bar_point(series, flag_high, ExtremumKind::LocalMax),
        ];
        points.sort_by_key(|p| p.index);

        Some(ShapeMatch {
            pattern_type: PatternType::BullFlag,
            points,
            breakout_price: bars[flag_high].high(),
            lowest_low: bars[pole_base].low(),
            geometry: ShapeGeometry {
                deviation_pct: range,
                tolerance_pct: self.max_flag_range_pct,
                amplitude_pct: gain,
                min_amplitude_pct: self.min_pole_gain_pct,
                spacing: flag_len,
                spacing_bounds: self.bounds(),
            },
        })
    }
}

impl ShapeMatcher for BullFlagMatcher {
    fn pattern_type(&self) -> PatternType {
        PatternType::BullFlag
    }

    fn min_bars(&self) -> usize {
        self.pole_bars.get() + self.min_flag_bars.get()
    }

    fn find(&self, series: &PriceSeries, _extrema: &[ExtremumPoint]) -> Option<ShapeMatch> {
        // Longest qualifying flag first
        (self.min_flag_bars.get()..=self.max_flag_bars.get())
            .rev()
            .find_map(|len| self.evaluate(series, len))
    }

    fn validate_config(&self) -> Result<()> {
        helpers::check_percent("min_pole_gain_pct", self.min_pole_gain_pct)?;
        helpers::check_percent("max_flag_range_pct", self.max_flag_range_pct)?;
        helpers::check_bounds("bull_flag length", &self.bounds())
    }
}

// ============================================================
// RISING WEDGE
// ============================================================

/// Converging up-sloping trendlines, lows rising faster than highs
#[derive(Debug, Clone)]
pub struct RisingWedgeMatcher {
    pub window: Period,
    /// Smallest starting width relative to the lowest low, in percent
    pub min_height_pct: f64,
    /// Largest end width as a share of the start width, in percent
    pub max_end_width_pct: f64,
}

impl Default for RisingWedgeMatcher {
    fn default() -> Self {
        Self {
            window: Period::new_const(40),
            min_height_pct: 3.0,
            max_end_width_pct: 100.0,
        }
    }
}

impl ShapeMatcher for RisingWedgeMatcher {
    fn pattern_type(&self) -> PatternType {
        PatternType::RisingWedge
    }

    fn min_bars(&self) -> usize {
        self.window.get()
    }

    fn find(&self, series: &PriceSeries, extrema: &[ExtremumPoint]) -> Option<ShapeMatch> {
        let bars = series.bars();
        let n = bars.len();
        let window = self.window.get();
        if n < window {
            return None;
        }
        let start = n - window;
        let highs: Vec<f64> = bars[start..].iter().map(|b| b.high()).collect();
        let lows: Vec<f64> = bars[start..].iter().map(|b| b.low()).collect();

        let (high_slope, high_icpt) = helpers::linear_fit(&highs);
        let (low_slope, low_icpt) = helpers::linear_fit(&lows);
        if high_slope <= 0.0 || low_slope <= high_slope {
            return None;
        }

        let start_width = high_icpt - low_icpt;
        let end_width = start_width + (high_slope - low_slope) * (window - 1) as f64;
        if start_width <= 0.0 || end_width <= 0.0 {
            return None;
        }
        let end_ratio = end_width / start_width * 100.0;
        if end_ratio > self.max_end_width_pct {
            return None;
        }

        let floor = helpers::lowest_bar(bars, start, n)?;
        let top = helpers::highest_bar(bars, start, n)?;
        let height = start_width / bars[floor].low() * 100.0;
        if height < self.min_height_pct {
            return None;
        }

        Some(ShapeMatch {
            pattern_type: PatternType::RisingWedge,
            points: window_points(series, extrema, start, floor, top),
            breakout_price: bars[top].high(),
            lowest_low: bars[floor].low(),
            geometry: ShapeGeometry {
                deviation_pct: end_ratio,
                tolerance_pct: self.max_end_width_pct,
                amplitude_pct: height,
                min_amplitude_pct: self.min_height_pct,
                spacing: helpers::extrema_span(extrema, start).unwrap_or(window),
                spacing_bounds: window_bounds(window),
            },
        })
    }

    fn validate_config(&self) -> Result<()> {
        check_window(self.window)?;
        helpers::check_percent("min_height_pct", self.min_height_pct)?;
        helpers::check_percent("max_end_width_pct", self.max_end_width_pct)
    }
}

// ============================================================
// SYMMETRICAL TRIANGLE
// ============================================================

/// Lower highs and higher lows contracting over consecutive segments
#[derive(Debug, Clone)]
pub struct SymmetricalTriangleMatcher {
    pub window: Period,
    pub segments: Period,
    /// Last segment range must be below this share of the first
    pub max_final_range_ratio: Ratio,
    /// Smallest first-segment range relative to its low, in percent
    pub min_height_pct: f64,
}

impl Default for SymmetricalTriangleMatcher {
    fn default() -> Self {
        Self {
            window: Period::new_const(40),
            segments: Period::new_const(4),
            max_final_range_ratio: Ratio::new_const(0.8),
            min_height_pct: 4.0,
        }
    }
}

impl ShapeMatcher for SymmetricalTriangleMatcher {
    fn pattern_type(&self) -> PatternType {
        PatternType::SymmetricalTriangle
    }

    fn min_bars(&self) -> usize {
        self.window.get()
    }

    fn find(&self, series: &PriceSeries, extrema: &[ExtremumPoint]) -> Option<ShapeMatch> {
        let bars = series.bars();
        let n = bars.len();
        let segments = self.segments.get();
        let seg_len = self.window.get() / segments;
        if seg_len < 2 || n < seg_len * segments {
            return None;
        }
        let start = n - seg_len * segments;

        let mut ranges = Vec::with_capacity(segments);
        for k in 0..segments {
            let s = start + k * seg_len;
            let hi = helpers::highest_bar(bars, s, s + seg_len)?;
            let lo = helpers::lowest_bar(bars, s, s + seg_len)?;
            ranges.push((bars[hi].high() - bars[lo].low(), bars[lo].low()));
        }
        if !ranges.windows(2).all(|w| w[1].0 < w[0].0) {
            return None;
        }
        let (first_range, first_low) = ranges[0];
        let last_range = ranges[segments - 1].0;
        if last_range >= first_range * self.max_final_range_ratio.get() {
            return None;
        }

        let highs: Vec<f64> = bars[start..].iter().map(|b| b.high()).collect();
        let lows: Vec<f64> = bars[start..].iter().map(|b| b.low()).collect();
        if helpers::slope(&highs) >= 0.0 || helpers::slope(&lows) <= 0.0 {
            return None;
        }

        let height = first_range / first_low * 100.0;
        if height < self.min_height_pct {
            return None;
        }

        let last_start = start + (segments - 1) * seg_len;
        let top = helpers::highest_bar(bars, last_start, n)?;
        let floor = helpers::lowest_bar(bars, start, n)?;
        let window = seg_len * segments;

        Some(ShapeMatch {
            pattern_type: PatternType::SymmetricalTriangle,
            points: window_points(series, extrema, start, floor, top),
            breakout_price: bars[top].high(),
            lowest_low: bars[floor].low(),
            geometry: ShapeGeometry {
                deviation_pct: last_range / first_range * 100.0,
                tolerance_pct: self.max_final_range_ratio.get() * 100.0,
                amplitude_pct: height,
                min_amplitude_pct: self.min_height_pct,
                spacing: helpers::extrema_span(extrema, start).unwrap_or(window),
                spacing_bounds: window_bounds(window),
            },
        })
    }

    fn validate_config(&self) -> Result<()> {
        check_window(self.window)?;
        if self.window.get() / self.segments.get() < 2 {
            return Err(PatternError::InvalidConfig(
                "symmetrical_triangle: each segment needs at least 2 bars".into(),
            ));
        }
        helpers::check_percent("min_height_pct", self.min_height_pct)
    }
}

// ============================================================
// PARAMETER METADATA
// ============================================================

static ASCENDING_TRIANGLE_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("window", 40.0, (30.0, 60.0, 10.0), "Bars fitted"),
    ParamMeta::percent("touch_tolerance_pct", 1.0, (0.5, 2.0, 0.5), "Distance of a touch from resistance"),
    ParamMeta::period("min_touches", 2.0, (2.0, 4.0, 1.0), "Resistance touches required"),
    ParamMeta::period("min_rising_lows", 2.0, (2.0, 4.0, 1.0), "Higher lows required"),
    ParamMeta::percent("min_height_pct", 3.0, (2.0, 8.0, 1.0), "Resistance height above the first low"),
];

static BULL_FLAG_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("pole_bars", 20.0, (10.0, 30.0, 5.0), "Bars in the pole"),
    ParamMeta::period("min_flag_bars", 5.0, (3.0, 7.0, 1.0), "Shortest flag"),
    ParamMeta::period("ideal_flag_min", 7.0, (5.0, 9.0, 1.0), "Start of the ideal flag length"),
    ParamMeta::period("ideal_flag_max", 12.0, (10.0, 14.0, 1.0), "End of the ideal flag length"),
    ParamMeta::period("max_flag_bars", 15.0, (10.0, 20.0, 5.0), "Longest flag"),
    ParamMeta::percent("min_pole_gain_pct", 8.0, (5.0, 15.0, 1.0), "Pole advance"),
    ParamMeta::percent("max_flag_range_pct", 5.0, (3.0, 8.0, 1.0), "Flag range over mean flag close"),
];

static RISING_WEDGE_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("window", 40.0, (30.0, 60.0, 10.0), "Bars fitted"),
    ParamMeta::percent("min_height_pct", 3.0, (2.0, 8.0, 1.0), "Starting width over the lowest low"),
    ParamMeta::percent("max_end_width_pct", 100.0, (50.0, 100.0, 10.0), "End width as a share of the start width"),
];

static SYMMETRICAL_TRIANGLE_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("window", 40.0, (30.0, 60.0, 10.0), "Bars fitted"),
    ParamMeta::period("segments", 4.0, (3.0, 5.0, 1.0), "Segments compared"),
    ParamMeta::ratio("max_final_range_ratio", 0.8, (0.5, 0.9, 0.1), "Last range over first range"),
    ParamMeta::percent("min_height_pct", 4.0, (2.0, 8.0, 1.0), "First range over its low"),
];

impl ParameterizedMatcher for AscendingTriangleMatcher {
    fn param_meta() -> &'static [ParamMeta] {
        ASCENDING_TRIANGLE_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let m = Self {
            window: get_period(params, "window", 40)?,
            touch_tolerance_pct: get_percent(params, "touch_tolerance_pct", 1.0)?,
            min_touches: get_period(params, "min_touches", 2)?,
            min_rising_lows: get_period(params, "min_rising_lows", 2)?,
            min_height_pct: get_percent(params, "min_height_pct", 3.0)?,
        };
        m.validate_config()?;
        Ok(m)
    }

    fn pattern_type() -> PatternType {
        PatternType::AscendingTriangle
    }
}

impl ParameterizedMatcher for BullFlagMatcher {
    fn param_meta() -> &'static [ParamMeta] {
        BULL_FLAG_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let m = Self {
            pole_bars: get_period(params, "pole_bars", 20)?,
            min_flag_bars: get_period(params, "min_flag_bars", 5)?,
            ideal_flag_min: get_period(params, "ideal_flag_min", 7)?,
            ideal_flag_max: get_period(params, "ideal_flag_max", 12)?,
            max_flag_bars: get_period(params, "max_flag_bars", 15)?,
            min_pole_gain_pct: get_percent(params, "min_pole_gain_pct", 8.0)?,
            max_flag_range_pct: get_percent(params, "max_flag_range_pct", 5.0)?,
        };
        m.validate_config()?;
        Ok(m)
    }

    fn pattern_type() -> PatternType {
        PatternType::BullFlag
    }
}

impl ParameterizedMatcher for RisingWedgeMatcher {
    fn param_meta() -> &'static [ParamMeta] {
        RISING_WEDGE_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let m = Self {
            window: get_period(params, "window", 40)?,
            min_height_pct: get_percent(params, "min_height_pct", 3.0)?,
            max_end_width_pct: get_percent(params, "max_end_width_pct", 100.0)?,
        };
        m.validate_config()?;
        Ok(m)
    }

    fn pattern_type() -> PatternType {
        PatternType::RisingWedge
    }
}

impl ParameterizedMatcher for SymmetricalTriangleMatcher {
    fn param_meta() -> &'static [ParamMeta] {
        SYMMETRICAL_TRIANGLE_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let m = Self {
            window: get_period(params, "window", 40)?,
            segments: get_period(params, "segments", 4)?,
            max_final_range_ratio: get_ratio(params, "max_final_range_ratio", 0.8)?,
            min_height_pct: get_percent(params, "min_height_pct", 4.0)?,
        };
        m.validate_config()?;
        Ok(m)
    }

    fn pattern_type() -> PatternType {
        PatternType::SymmetricalTriangle
    }
}
