//! Reversal shape matchers: bases that form after a decline
//!
//! Double Bottom, Triple Bottom and Inverse Head & Shoulders are read off the
//! turning points. Cup & Handle is measured on fixed windows of raw bars.

use std::collections::HashMap;

use super::helpers::{self, pct_above, pct_diff};
use crate::{
    extrema::{ExtremumKind, ExtremumPoint},
    params::{get_flag, get_percent, get_period, get_ratio, ParamMeta, ParameterizedMatcher},
    Period, PatternType, PriceSeries, Ratio, Result, ShapeGeometry, ShapeMatch, ShapeMatcher,
    SpacingBounds, OHLCV,
};

impl_with_defaults!(
    DoubleBottomMatcher,
    TripleBottomMatcher,
    InverseHeadShouldersMatcher,
    CupHandleMatcher,
);

/// Optional bullish-close requirement on the key lows
fn lows_close_strong(
    series: &PriceSeries,
    lows: &[ExtremumPoint],
    enabled: bool,
    min_wick_ratio: Ratio,
) -> bool {
    !enabled
        || lows
            .iter()
            .all(|p| helpers::closes_strong(series, p, min_wick_ratio.get()))
}

// ============================================================
// DOUBLE BOTTOM
// ============================================================

/// Two comparable lows separated by a peak (the "W")
#[derive(Debug, Clone)]
pub struct DoubleBottomMatcher {
    /// Largest |low1 - low2| / low1, in percent
    pub max_symmetry_pct: f64,
    /// Smallest rise of the intervening peak above the mean low, in percent
    pub min_peak_height_pct: f64,
    /// How far the second low may undercut the first, in percent
    pub max_second_low_drop_pct: f64,
    pub min_spacing: Period,
    pub ideal_spacing_min: Period,
    pub ideal_spacing_max: Period,
    pub max_spacing: Period,
    pub close_confirmation: bool,
    pub min_wick_ratio: Ratio,
}

impl Default for DoubleBottomMatcher {
    fn default() -> Self {
        Self {
            max_symmetry_pct: 3.0,
            min_peak_height_pct: 3.0,
            max_second_low_drop_pct: 3.0,
            min_spacing: Period::new_const(10),
            ideal_spacing_min: Period::new_const(20),
            ideal_spacing_max: Period::new_const(40),
            max_spacing: Period::new_const(60),
            close_confirmation: false,
            min_wick_ratio: Ratio::new_const(0.6),
        }
    }
}

impl DoubleBottomMatcher {
    fn bounds(&self) -> SpacingBounds {
        SpacingBounds::new(
            self.min_spacing.get(),
            self.ideal_spacing_min.get(),
            self.ideal_spacing_max.get(),
            self.max_spacing.get(),
        )
    }

    fn evaluate(
        &self,
        series: &PriceSeries,
        extrema: &[ExtremumPoint],
        first: ExtremumPoint,
        second: ExtremumPoint,
    ) -> Option<ShapeMatch> {
        let spacing = second.index - first.index;
        if spacing < self.min_spacing.get() {
            return None;
        }

        let symmetry = pct_diff(first.price, second.price);
        if symmetry > self.max_symmetry_pct {
            return None;
        }
        if second.price < first.price * (1.0 - self.max_second_low_drop_pct / 100.0) {
            return None;
        }

        let peak = helpers::highest_max_between(extrema, first.index, second.index)?;
        let mean_low = (first.price + second.price) / 2.0;
        let height = pct_above(peak.price, mean_low);
        if height < self.min_peak_height_pct {
            return None;
        }

        if !lows_close_strong(series, &[first, second], self.close_confirmation, self.min_wick_ratio) {
            return None;
        }

        Some(ShapeMatch {
            pattern_type: PatternType::DoubleBottom,
            points: vec![first, peak, second],
            breakout_price: peak.price,
            lowest_low: first.price.min(second.price),
            geometry: ShapeGeometry {
                deviation_pct: symmetry,
                tolerance_pct: self.max_symmetry_pct,
                amplitude_pct: height,
                min_amplitude_pct: self.min_peak_height_pct,
                spacing,
                spacing_bounds: self.bounds(),
            },
        })
    }
}

impl ShapeMatcher for DoubleBottomMatcher {
    fn pattern_type(&self) -> PatternType {
        PatternType::DoubleBottom
    }

    fn min_bars(&self) -> usize {
        self.min_spacing.get() + 1
    }

    fn find(&self, series: &PriceSeries, extrema: &[ExtremumPoint]) -> Option<ShapeMatch> {
        let lows = helpers::minima(extrema);
        let max_spacing = self.max_spacing.get();
        // Latest second low first, then the nearest first low before it
        (1..lows.len()).rev().find_map(|j| {
            (0..j)
                .rev()
                .take_while(|&i| lows[j].index - lows[i].index <= max_spacing)
                .find_map(|i| self.evaluate(series, extrema, lows[i], lows[j]))
        })
    }

    fn validate_config(&self) -> Result<()> {
        helpers::check_percent("max_symmetry_pct", self.max_symmetry_pct)?;
        helpers::check_percent("min_peak_height_pct", self.min_peak_height_pct)?;
        helpers::check_percent("max_second_low_drop_pct", self.max_second_low_drop_pct)?;
        helpers::check_bounds("double_bottom spacing", &self.bounds())
    }
}

// ============================================================
// TRIPLE BOTTOM
// ============================================================

/// Three consecutive lows at a common support
#[derive(Debug, Clone)]
pub struct TripleBottomMatcher {
    /// Largest distance of any low from the mean of the three, in percent
    pub max_deviation_pct: f64,
    /// Smallest rise of the resistance above the mean low, in percent
    pub min_resistance_height_pct: f64,
    pub min_gap: Period,
    pub ideal_gap_min: Period,
    pub ideal_gap_max: Period,
    pub max_gap: Period,
    pub close_confirmation: bool,
    pub min_wick_ratio: Ratio,
}

impl Default for TripleBottomMatcher {
    fn default() -> Self {
        Self {
            max_deviation_pct: 3.0,
            min_resistance_height_pct: 3.0,
            min_gap: Period::new_const(10),
            ideal_gap_min: Period::new_const(20),
            ideal_gap_max: Period::new_const(40),
            max_gap: Period::new_const(60),
            close_confirmation: false,
            min_wick_ratio: Ratio::new_const(0.6),
        }
    }
}

impl TripleBottomMatcher {
    fn bounds(&self) -> SpacingBounds {
        SpacingBounds::new(
            self.min_gap.get(),
            self.ideal_gap_min.get(),
            self.ideal_gap_max.get(),
            self.max_gap.get(),
        )
    }

    fn evaluate(
        &self,
        series: &PriceSeries,
        extrema: &[ExtremumPoint],
        lows: &[ExtremumPoint],
    ) -> Option<ShapeMatch> {
        let (a, c) = (lows[0], lows[2]);
        let gap_ok = |g: usize| g >= self.min_gap.get() && g <= self.max_gap.get();
        if !lows.windows(2).all(|w| gap_ok(w[1].index - w[0].index)) {
            return None;
        }

        let mean = lows.iter().map(|p| p.price).sum::<f64>() / 3.0;
        let deviation = lows
            .iter()
            .map(|p| pct_diff(mean, p.price))
            .fold(0.0, f64::max);
        if deviation > self.max_deviation_pct {
            return None;
        }

        let resistance = helpers::highest_max_between(extrema, a.index, c.index)?;
        let height = pct_above(resistance.price, mean);
        if height < self.min_resistance_height_pct {
            return None;
        }

        if !lows_close_strong(series, lows, self.close_confirmation, self.min_wick_ratio) {
            return None;
        }

        let points = extrema
            .iter()
            .filter(|p| p.index >= a.index && p.index <= c.index)
            .copied()
            .collect();

        Some(ShapeMatch {
            pattern_type: PatternType::TripleBottom,
            points,
            breakout_price: resistance.price,
            lowest_low: lows.iter().map(|p| p.price).fold(f64::INFINITY, f64::min),
            geometry: ShapeGeometry {
                deviation_pct: deviation,
                tolerance_pct: self.max_deviation_pct,
                amplitude_pct: height,
                min_amplitude_pct: self.min_resistance_height_pct,
                spacing: (c.index - a.index) / 2,
                spacing_bounds: self.bounds(),
            },
        })
    }
}

impl ShapeMatcher for TripleBottomMatcher {
    fn pattern_type(&self) -> PatternType {
        PatternType::TripleBottom
    }

    fn min_bars(&self) -> usize {
        2 * self.min_gap.get() + 1
    }

    fn find(&self, series: &PriceSeries, extrema: &[ExtremumPoint]) -> Option<ShapeMatch> {
        helpers::minima(extrema)
            .windows(3)
            .rev()
            .find_map(|w| self.evaluate(series, extrema, w))
    }

    fn validate_config(&self) -> Result<()> {
        helpers::check_percent("max_deviation_pct", self.max_deviation_pct)?;
        helpers::check_percent("min_resistance_height_pct", self.min_resistance_height_pct)?;
        helpers::check_bounds("triple_bottom gaps", &self.bounds())
    }
}

// ============================================================
// INVERSE HEAD & SHOULDERS
// ============================================================

/// Three consecutive lows with the middle one deepest
#[derive(Debug, Clone)]
pub struct InverseHeadShouldersMatcher {
    pub max_shoulder_symmetry_pct: f64,
    /// Smallest depth of the head below the mean shoulder, in percent
    pub min_head_depth_pct: f64,
    pub min_span: Period,
    pub ideal_span_min: Period,
    pub ideal_span_max: Period,
    pub max_span: Period,
    pub close_confirmation: bool,
    pub min_wick_ratio: Ratio,
}

impl Default for InverseHeadShouldersMatcher {
    fn default() -> Self {
        Self {
            max_shoulder_symmetry_pct: 5.0,
            min_head_depth_pct: 5.0,
            min_span: Period::new_const(20),
            ideal_span_min: Period::new_const(40),
            ideal_span_max: Period::new_const(80),
            max_span: Period::new_const(120),
            close_confirmation: false,
            min_wick_ratio: Ratio::new_const(0.6),
        }
    }
}

impl InverseHeadShouldersMatcher {
    fn bounds(&self) -> SpacingBounds {
        SpacingBounds::new(
            self.min_span.get(),
            self.ideal_span_min.get(),
            self.ideal_span_max.get(),
            self.max_span.get(),
        )
    }

    fn evaluate(
        &self,
        series: &PriceSeries,
        extrema: &[ExtremumPoint],
        lows: &[ExtremumPoint],
    ) -> Option<ShapeMatch> {
        let (left, head, right) = (lows[0], lows[1], lows[2]);
        if head.price >= left.price || head.price >= right.price {
            return None;
        }

        let span = right.index - left.index;
        if span < self.min_span.get() || span > self.max_span.get() {
            return None;
        }

        let symmetry = pct_diff(left.price, right.price);
        if symmetry > self.max_shoulder_symmetry_pct {
            return None;
        }

        let shoulder = (left.price + right.price) / 2.0;
        let depth = (shoulder - head.price) / shoulder * 100.0;
        if depth < self.min_head_depth_pct {
            return None;
        }

        let left_peak = helpers::highest_max_between(extrema, left.index, head.index)?;
        let right_peak = helpers::highest_max_between(extrema, head.index, right.index)?;
        let neckline = if right_peak.price > left_peak.price {
            right_peak
        } else {
            left_peak
        };

        if !lows_close_strong(series, lows, self.close_confirmation, self.min_wick_ratio) {
            return None;
        }

        Some(ShapeMatch {
            pattern_type: PatternType::InverseHeadShoulders,
            points: vec![left, left_peak, head, right_peak, right],
            breakout_price: neckline.price,
            lowest_low: head.price,
            geometry: ShapeGeometry {
                deviation_pct: symmetry,
                tolerance_pct: self.max_shoulder_symmetry_pct,
                amplitude_pct: depth,
                min_amplitude_pct: self.min_head_depth_pct,
                spacing: span,
                spacing_bounds: self.bounds(),
            },
        })
    }
}

impl ShapeMatcher for InverseHeadShouldersMatcher {
    fn pattern_type(&self) -> PatternType {
        PatternType::InverseHeadShoulders
    }

    fn min_bars(&self) -> usize {
        self.min_span.get() + 1
    }

    fn find(&self, series: &PriceSeries, extrema: &[ExtremumPoint]) -> Option<ShapeMatch> {
        helpers::minima(extrema)
            .windows(3)
            .rev()
            .find_map(|w| self.evaluate(series, extrema, w))
    }

    fn validate_config(&self) -> Result<()> {
        helpers::check_percent("max_shoulder_symmetry_pct", self.max_shoulder_symmetry_pct)?;
        helpers::check_percent("min_head_depth_pct", self.min_head_depth_pct)?;
        helpers::check_bounds("inverse_head_shoulders span", &self.bounds())
    }
}

// ============================================================
// CUP & HANDLE
// ============================================================

/// Rounded cup followed by a shallow handle, on the most recent bars
#[derive(Debug, Clone)]
pub struct CupHandleMatcher {
    pub cup_bars: Period,
    pub handle_bars: Period,
    pub min_depth_pct: f64,
    pub max_depth_pct: f64,
    pub max_lip_symmetry_pct: f64,
    /// Largest std/mean of closes across the middle third of the cup
    pub max_bottom_volatility: Ratio,
    pub min_handle_depth_pct: f64,
    pub max_handle_depth_pct: f64,
}

impl Default for CupHandleMatcher {
    fn default() -> Self {
        Self {
            cup_bars: Period::new_const(70),
            handle_bars: Period::new_const(20),
            min_depth_pct: 10.0,
            max_depth_pct: 30.0,
            max_lip_symmetry_pct: 5.0,
            max_bottom_volatility: Ratio::new_const(0.05),
            min_handle_depth_pct: 3.0,
            max_handle_depth_pct: 15.0,
        }
    }
}

impl CupHandleMatcher {
    fn bounds(&self) -> SpacingBounds {
        let cup = self.cup_bars.get();
        SpacingBounds::new(cup - 2 * (cup / 3), cup / 2, cup * 6 / 7, cup)
    }
}

impl ShapeMatcher for CupHandleMatcher {
    fn pattern_type(&self) -> PatternType {
        PatternType::CupHandle
    }

    fn min_bars(&self) -> usize {
        self.cup_bars.get() + self.handle_bars.get()
    }

    fn find(&self, series: &PriceSeries, _extrema: &[ExtremumPoint]) -> Option<ShapeMatch> {
        let bars = series.bars();
        let n = bars.len();
        if n < self.min_bars() {
            return None;
        }

        let handle_start = n - self.handle_bars.get();
        let cup_start = handle_start - self.cup_bars.get();
        let third = self.cup_bars.get() / 3;

        let left = helpers::highest_bar(bars, cup_start, cup_start + third)?;
        let right = helpers::highest_bar(bars, handle_start - third, handle_start)?;
        let bottom = helpers::lowest_bar(bars, cup_start, handle_start)?;
        if bottom < cup_start + third || bottom >= handle_start - third {
            return None;
        }

        let left_lip = bars[left].high();
        let right_lip = bars[right].high();
        let cup_low = bars[bottom].low();

        let depth = (left_lip - cup_low) / left_lip * 100.0;
        if depth < self.min_depth_pct || depth > self.max_depth_pct {
            return None;
        }

        let symmetry = pct_diff(left_lip, right_lip);
        if symmetry > self.max_lip_symmetry_pct {
            return None;
        }

        // Rounded, not V-shaped
        let middle: Vec<f64> = bars[cup_start + third..handle_start - third]
            .iter()
            .map(|b| b.close())
            .collect();
        let volatility = helpers::std_dev(&middle)? / helpers::mean(&middle)?;
        if volatility > self.max_bottom_volatility.get() {
            return None;
        }

        let handle_low = helpers::lowest_bar(bars, handle_start, n)?;
        let handle_depth = (right_lip - bars[handle_low].low()) / right_lip * 100.0;
        if handle_depth < self.min_handle_depth_pct || handle_depth > self.max_handle_depth_pct {
            return None;
        }
        let midpoint = cup_low + (right_lip - cup_low) / 2.0;
        if bars[handle_low].low() <= midpoint {
            return None;
        }

        let left_point = helpers::bar_point(series, left, ExtremumKind::LocalMax);
        let right_point = helpers::bar_point(series, right, ExtremumKind::LocalMax);
        let rim = if right_lip > left_lip { right_point } else { left_point };

        Some(ShapeMatch {
            pattern_type: PatternType::CupHandle,
            points: vec![
                left_point,
                helpers::bar_point(series, bottom, ExtremumKind::LocalMin),
                right_point,
                helpers::bar_point(series, handle_low, ExtremumKind::LocalMin),
            ],
            breakout_price: rim.price,
            lowest_low: cup_low,
            geometry: ShapeGeometry {
                deviation_pct: symmetry,
                tolerance_pct: self.max_lip_symmetry_pct,
                amplitude_pct: depth,
                min_amplitude_pct: self.min_depth_pct,
                spacing: right - left,
                spacing_bounds: self.bounds(),
            },
        })
    }

    fn validate_config(&self) -> Result<()> {
        helpers::check_percent_range("cup depth", self.min_depth_pct, self.max_depth_pct)?;
        helpers::check_percent("max_lip_symmetry_pct", self.max_lip_symmetry_pct)?;
        helpers::check_percent_range(
            "handle depth",
            self.min_handle_depth_pct,
            self.max_handle_depth_pct,
        )?;
        if self.cup_bars.get() < 6 {
            return Err(crate::PatternError::InvalidConfig(
                "cup_bars must be at least 6".into(),
            ));
        }
        Ok(())
    }
}

// ============================================================
// PARAMETER METADATA
// ============================================================

static DOUBLE_BOTTOM_PARAMS: &[ParamMeta] = &[
    ParamMeta::percent("max_symmetry_pct", 3.0, (1.0, 5.0, 0.5), "Largest gap between the two lows"),
    ParamMeta::percent("min_peak_height_pct", 3.0, (2.0, 10.0, 1.0), "Peak height above the mean low"),
    ParamMeta::percent("max_second_low_drop_pct", 3.0, (0.0, 5.0, 1.0), "Allowed undercut of the first low"),
    ParamMeta::period("min_spacing", 10.0, (5.0, 20.0, 5.0), "Fewest bars between the lows"),
    ParamMeta::period("ideal_spacing_min", 20.0, (10.0, 30.0, 5.0), "Start of the ideal spacing band"),
    ParamMeta::period("ideal_spacing_max", 40.0, (30.0, 50.0, 5.0), "End of the ideal spacing band"),
    ParamMeta::period("max_spacing", 60.0, (40.0, 90.0, 10.0), "Most bars between the lows"),
    ParamMeta::ratio("min_wick_ratio", 0.6, (0.5, 0.8, 0.1), "Close position required with close_confirmation"),
];

static TRIPLE_BOTTOM_PARAMS: &[ParamMeta] = &[
    ParamMeta::percent("max_deviation_pct", 3.0, (1.0, 5.0, 0.5), "Largest distance of a low from the mean"),
    ParamMeta::percent("min_resistance_height_pct", 3.0, (2.0, 10.0, 1.0), "Resistance height above the mean low"),
    ParamMeta::period("min_gap", 10.0, (5.0, 20.0, 5.0), "Fewest bars between consecutive lows"),
    ParamMeta::period("ideal_gap_min", 20.0, (10.0, 30.0, 5.0), "Start of the ideal gap band"),
    ParamMeta::period("ideal_gap_max", 40.0, (30.0, 50.0, 5.0), "End of the ideal gap band"),
    ParamMeta::period("max_gap", 60.0, (40.0, 90.0, 10.0), "Most bars between consecutive lows"),
    ParamMeta::ratio("min_wick_ratio", 0.6, (0.5, 0.8, 0.1), "Close position required with close_confirmation"),
];

static INVERSE_HEAD_SHOULDERS_PARAMS: &[ParamMeta] = &[
    ParamMeta::percent("max_shoulder_symmetry_pct", 5.0, (2.0, 8.0, 1.0), "Largest gap between the shoulders"),
    ParamMeta::percent("min_head_depth_pct", 5.0, (3.0, 10.0, 1.0), "Head depth below the mean shoulder"),
    ParamMeta::period("min_span", 20.0, (10.0, 40.0, 10.0), "Fewest bars from shoulder to shoulder"),
    ParamMeta::period("ideal_span_min", 40.0, (30.0, 50.0, 5.0), "Start of the ideal span band"),
    ParamMeta::period("ideal_span_max", 80.0, (60.0, 100.0, 10.0), "End of the ideal span band"),
    ParamMeta::period("max_span", 120.0, (90.0, 150.0, 10.0), "Most bars from shoulder to shoulder"),
    ParamMeta::ratio("min_wick_ratio", 0.6, (0.5, 0.8, 0.1), "Close position required with close_confirmation"),
];

static CUP_HANDLE_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("cup_bars", 70.0, (50.0, 90.0, 10.0), "Bars in the cup"),
    ParamMeta::period("handle_bars", 20.0, (10.0, 30.0, 5.0), "Bars in the handle"),
    ParamMeta::percent("min_depth_pct", 10.0, (5.0, 15.0, 5.0), "Shallowest cup"),
    ParamMeta::percent("max_depth_pct", 30.0, (25.0, 40.0, 5.0), "Deepest cup"),
    ParamMeta::percent("max_lip_symmetry_pct", 5.0, (2.0, 8.0, 1.0), "Largest gap between the lips"),
    ParamMeta::ratio("max_bottom_volatility", 0.05, (0.02, 0.1, 0.01), "Std/mean of closes across the bottom"),
    ParamMeta::percent("min_handle_depth_pct", 3.0, (1.0, 5.0, 1.0), "Shallowest handle"),
    ParamMeta::percent("max_handle_depth_pct", 15.0, (10.0, 20.0, 5.0), "Deepest handle"),
];

// `close_confirmation` is read as a flag (non-zero = on) by the low-based matchers.
impl ParameterizedMatcher for DoubleBottomMatcher {
    fn param_meta() -> &'static [ParamMeta] {
        DOUBLE_BOTTOM_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let m = Self {
            max_symmetry_pct: get_percent(params, "max_symmetry_pct", 3.0)?,
            min_peak_height_pct: get_percent(params, "min_peak_height_pct", 3.0)?,
            max_second_low_drop_pct: get_percent(params, "max_second_low_drop_pct", 3.0)?,
            min_spacing: get_period(params, "min_spacing", 10)?,
            ideal_spacing_min: get_period(params, "ideal_spacing_min", 20)?,
            ideal_spacing_max: get_period(params, "ideal_spacing_max", 40)?,
            max_spacing: get_period(params, "max_spacing", 60)?,
            close_confirmation: get_flag(params, "close_confirmation", false),
            min_wick_ratio: get_ratio(params, "min_wick_ratio", 0.6)?,
        };
        m.validate_config()?;
        Ok(m)
    }

    fn pattern_type() -> PatternType {
        PatternType::DoubleBottom
    }
}

impl ParameterizedMatcher for TripleBottomMatcher {
    fn param_meta() -> &'static [ParamMeta] {
        TRIPLE_BOTTOM_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let m = Self {
            max_deviation_pct: get_percent(params, "max_deviation_pct", 3.0)?,
            min_resistance_height_pct: get_percent(params, "min_resistance_height_pct", 3.0)?,
            min_gap: get_period(params, "min_gap", 10)?,
            ideal_gap_min: get_period(params, "ideal_gap_min", 20)?,
            ideal_gap_max: get_period(params, "ideal_gap_max", 40)?,
            max_gap: get_period(params, "max_gap", 60)?,
            close_confirmation: get_flag(params, "close_confirmation", false),
            min_wick_ratio: get_ratio(params, "min_wick_ratio", 0.6)?,
        };
        m.validate_config()?;
        Ok(m)
    }

    fn pattern_type() -> PatternType {
        PatternType::TripleBottom
    }
}

impl ParameterizedMatcher for InverseHeadShouldersMatcher {
    fn param_meta() -> &'static [ParamMeta] {
        INVERSE_HEAD_SHOULDERS_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let m = Self {
            max_shoulder_symmetry_pct: get_percent(params, "max_shoulder_symmetry_pct", 5.0)?,
            min_head_depth_pct: get_percent(params, "min_head_depth_pct", 5.0)?,
            min_span: get_period(params, "min_span", 20)?,
            ideal_span_min: get_period(params, "ideal_span_min", 40)?,
            ideal_span_max: get_period(params, "ideal_span_max", 80)?,
            max_span: get_period(params, "max_span", 120)?,
            close_confirmation: get_flag(params, "close_confirmation", false),
            min_wick_ratio: get_ratio(params, "min_wick_ratio", 0.6)?,
        };
        m.validate_config()?;
        Ok(m)
    }

    fn pattern_type() -> PatternType {
        PatternType::InverseHeadShoulders
    }
}

impl ParameterizedMatcher for CupHandleMatcher {
    fn param_meta() -> &'static [ParamMeta] {
        CUP_HANDLE_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let m = Self {
            cup_bars: get_period(params, "cup_bars", 70)?,
            handle_bars: get_period(params, "handle_bars", 20)?,
            min_depth_pct: get_percent(params, "min_depth_pct", 10.0)?,
            max_depth_pct: get_percent(params, "max_depth_pct", 30.0)?,
            max_lip_symmetry_pct: get_percent(params, "max_lip_symmetry_pct", 5.0)?,
            max_bottom_volatility: get_ratio(params, "max_bottom_volatility", 0.05)?,
            min_handle_depth_pct: get_percent(params, "min_handle_depth_pct", 3.0)?,
            max_handle_depth_pct: get_percent(params, "max_handle_depth_pct", 15.0)?,
        };
        m.validate_config()?;
        Ok(m)
    }

    fn pattern_type() -> PatternType {
        PatternType::CupHandle
    }
}
