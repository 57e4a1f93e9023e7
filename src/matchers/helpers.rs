//! Shared measurements for shape matchers

use crate::{
    extrema::{ExtremumKind, ExtremumPoint},
    OHLCVExt, PatternError, PriceBar, PriceSeries, Result, SpacingBounds, OHLCV,
};

/// |a - b| / a, in percent
#[inline]
pub fn pct_diff(a: f64, b: f64) -> f64 {
    if a.abs() <= f64::EPSILON {
        return f64::INFINITY;
    }
    (a - b).abs() / a.abs() * 100.0
}

/// How far `value` sits above `base`, in percent
#[inline]
pub fn pct_above(value: f64, base: f64) -> f64 {
    if base.abs() <= f64::EPSILON {
        return 0.0;
    }
    (value - base) / base * 100.0
}

#[inline]
pub fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

/// Least-squares fit of `values` against their index: (slope, intercept)
pub fn linear_fit(values: &[f64]) -> (f64, f64) {
    let n = values.len();
    if n < 2 {
        return (0.0, values.first().copied().unwrap_or(0.0));
    }
    let n_f = n as f64;
    let x_mean = (n_f - 1.0) / 2.0;
    let y_mean = values.iter().sum::<f64>() / n_f;
    let (mut num, mut den) = (0.0, 0.0);
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }
    let slope = num / den;
    (slope, y_mean - slope * x_mean)
}

#[inline]
pub fn slope(values: &[f64]) -> f64 {
    linear_fit(values).0
}

pub fn minima(extrema: &[ExtremumPoint]) -> Vec<ExtremumPoint> {
    extrema.iter().filter(|p| p.is_min()).copied().collect()
}

pub fn maxima(extrema: &[ExtremumPoint]) -> Vec<ExtremumPoint> {
    extrema.iter().filter(|p| p.is_max()).copied().collect()
}

/// Highest local max strictly between two bar indices; ties keep the earlier
pub fn highest_max_between(extrema: &[ExtremumPoint], start: usize, end: usize) -> Option<ExtremumPoint> {
    extrema
        .iter()
        .filter(|p| p.is_max() && p.index > start && p.index < end)
        .fold(None, |best: Option<ExtremumPoint>, p| match best {
            Some(b) if b.price >= p.price => Some(b),
            _ => Some(*p),
        })
}

/// Index of the highest high in `bars[start..end]`, earliest on ties
pub fn highest_bar(bars: &[PriceBar], start: usize, end: usize) -> Option<usize> {
    (start..end.min(bars.len())).fold(None, |best: Option<usize>, i| match best {
        Some(b) if bars[b].high() >= bars[i].high() => Some(b),
        _ => Some(i),
    })
}

/// Index of the lowest low in `bars[start..end]`, earliest on ties
pub fn lowest_bar(bars: &[PriceBar], start: usize, end: usize) -> Option<usize> {
    (start..end.min(bars.len())).fold(None, |best: Option<usize>, i| match best {
        Some(b) if bars[b].low() <= bars[i].low() => Some(b),
        _ => Some(i),
    })
}

/// Turning point built from a bar: its high for a max, its low for a min
pub fn bar_point(series: &PriceSeries, index: usize, kind: ExtremumKind) -> ExtremumPoint {
    let bar = &series.bars()[index];
    let price = match kind {
        ExtremumKind::LocalMax => bar.high(),
        ExtremumKind::LocalMin => bar.low(),
    };
    ExtremumPoint {
        index,
        date: bar.date,
        price,
        kind,
    }
}

/// Close in the upper part of the bar: wick ratio above `min_ratio`
pub fn closes_strong(series: &PriceSeries, point: &ExtremumPoint, min_ratio: f64) -> bool {
    series
        .bars()
        .get(point.index)
        .and_then(|b| b.close_position())
        .is_some_and(|w| w > min_ratio)
}

/// Span between the first and last turning point at or after `start`
pub fn extrema_span(extrema: &[ExtremumPoint], start: usize) -> Option<usize> {
    let mut inside = extrema.iter().filter(|p| p.index >= start);
    let first = inside.next()?;
    let last = inside.last()?;
    Some(last.index - first.index)
}

// ============================================================
// CONFIG CHECKS
// ============================================================

pub fn check_percent(field: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(PatternError::OutOfRange {
            field,
            value,
            min: 0.0,
            max: f64::MAX,
        });
    }
    Ok(())
}

/// `min <= low <= high <= max` for a pair of percent thresholds
pub fn check_percent_range(field: &'static str, low: f64, high: f64) -> Result<()> {
    check_percent(field, low)?;
    check_percent(field, high)?;
    if low > high {
        return Err(PatternError::InvalidConfig(format!(
            "{field}: lower bound {low} above upper bound {high}"
        )));
    }
    Ok(())
}

pub fn check_bounds(field: &'static str, b: &SpacingBounds) -> Result<()> {
    if !(b.min <= b.ideal_min && b.ideal_min <= b.ideal_max && b.ideal_max <= b.max) {
        return Err(PatternError::InvalidConfig(format!(
            "{field}: spacing bounds out of order ({} / {}..{} / {})",
            b.min, b.ideal_min, b.ideal_max, b.max
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pct_helpers() {
        assert!((pct_diff(100.0, 97.0) - 3.0).abs() < 1e-9);
        assert!((pct_above(110.0, 100.0) - 10.0).abs() < 1e-9);
        assert_eq!(pct_diff(0.0, 1.0), f64::INFINITY);
    }

    #[test]
    fn test_linear_fit() {
        let (m, intercept) = linear_fit(&[1.0, 3.0, 5.0, 7.0]);
        assert!((m - 2.0).abs() < 1e-9);
        assert!((intercept - 1.0).abs() < 1e-9);
        assert_eq!(slope(&[42.0]), 0.0);
    }

    #[test]
    fn test_std_dev() {
        let sd = std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((sd - 2.0).abs() < 1e-9);
        assert!(std_dev(&[]).is_none());
    }
}
