//! Strength score of a candidate, 0..=100
//!
//! | Component | Points |
//! |-----------|--------|
//! | symmetry  | 0-30   |
//! | amplitude | 0-20   |
//! | volume    | 0-25   |
//! | market    | 0-15   |
//! | timing    | 0-10   |

use crate::{ShapeGeometry, SpacingBounds};

pub const MAX_SYMMETRY: f64 = 30.0;
pub const MAX_AMPLITUDE: f64 = 20.0;
pub const MAX_VOLUME: f64 = 25.0;
pub const MAX_MARKET: u8 = 15;
pub const MAX_TIMING: f64 = 10.0;

/// Per-component points, kept for display and tuning
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StrengthBreakdown {
    pub symmetry: f64,
    pub amplitude: f64,
    pub volume: f64,
    pub market: f64,
    pub timing: f64,
}

impl StrengthBreakdown {
    /// Rounded sum, capped at 100
    pub fn total(&self) -> u8 {
        let sum = self.symmetry + self.amplitude + self.volume + self.market + self.timing;
        sum.round().clamp(0.0, 100.0) as u8
    }
}

pub fn score(geometry: &ShapeGeometry, volume_ratio: Option<f64>, market_score: u8) -> StrengthBreakdown {
    StrengthBreakdown {
        symmetry: symmetry_points(geometry.deviation_pct, geometry.tolerance_pct),
        amplitude: amplitude_points(geometry.amplitude_pct, geometry.min_amplitude_pct),
        volume: volume_points(volume_ratio),
        market: market_points(market_score),
        timing: timing_points(geometry.spacing, &geometry.spacing_bounds),
    }
}

pub fn symmetry_points(deviation_pct: f64, tolerance_pct: f64) -> f64 {
    if tolerance_pct.is_nan() || tolerance_pct <= 0.0 || deviation_pct.is_nan() {
        return 0.0;
    }
    (MAX_SYMMETRY * (1.0 - deviation_pct / tolerance_pct)).clamp(0.0, MAX_SYMMETRY)
}

pub fn amplitude_points(amplitude_pct: f64, min_pct: f64) -> f64 {
    if amplitude_pct.is_nan() || amplitude_pct < min_pct {
        return 0.0;
    }
    if min_pct <= 0.0 {
        return MAX_AMPLITUDE;
    }
    let excess = ((amplitude_pct - min_pct) / min_pct).min(1.0);
    MAX_AMPLITUDE / 2.0 + MAX_AMPLITUDE / 2.0 * excess
}

pub fn volume_points(ratio: Option<f64>) -> f64 {
    match ratio {
        Some(r) if r >= 1.5 => 25.0,
        Some(r) if r >= 1.3 => 20.0,
        Some(r) if r >= 1.1 => 15.0,
        Some(r) if r >= 1.0 => 10.0,
        _ => 0.0,
    }
}

/// market_score × 15 / 100, integer division
pub fn market_points(market_score: u8) -> f64 {
    f64::from(u16::from(market_score.min(100)) * u16::from(MAX_MARKET) / 100)
}

/// Full points inside the ideal band, decaying linearly to half at the allowed bounds
pub fn timing_points(spacing: usize, bounds: &SpacingBounds) -> f64 {
    if spacing < bounds.min || spacing > bounds.max {
        return 0.0;
    }
    let half = MAX_TIMING / 2.0;
    let decay = |dist: usize, span: usize| {
        if span == 0 {
            MAX_TIMING
        } else {
            MAX_TIMING - half * dist as f64 / span as f64
        }
    };
    if spacing < bounds.ideal_min {
        decay(bounds.ideal_min - spacing, bounds.ideal_min - bounds.min)
    } else if spacing > bounds.ideal_max {
        decay(spacing - bounds.ideal_max, bounds.max - bounds.ideal_max)
    } else {
        MAX_TIMING
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const BOUNDS: SpacingBounds = SpacingBounds::new(10, 20, 40, 60);

    #[test]
    fn test_symmetry() {
        assert_eq!(symmetry_points(0.0, 3.0), 30.0);
        assert!((symmetry_points(1.0, 3.0) - 20.0).abs() < 1e-9);
        assert_eq!(symmetry_points(4.0, 3.0), 0.0);
    }

    #[test]
    fn test_amplitude() {
        assert_eq!(amplitude_points(2.0, 3.0), 0.0);
        assert_eq!(amplitude_points(3.0, 3.0), 10.0);
        assert_eq!(amplitude_points(4.5, 3.0), 15.0);
        assert_eq!(amplitude_points(30.0, 3.0), 20.0);
    }

    #[test]
    fn test_volume_tiers() {
        assert_eq!(volume_points(Some(1.6)), 25.0);
        assert_eq!(volume_points(Some(1.3)), 20.0);
        assert_eq!(volume_points(Some(1.15)), 15.0);
        assert_eq!(volume_points(Some(1.0)), 10.0);
        assert_eq!(volume_points(Some(0.8)), 0.0);
        assert_eq!(volume_points(None), 0.0);
    }

    #[test]
    fn test_market_integer_division() {
        assert_eq!(market_points(50), 7.0);
        assert_eq!(market_points(100), 15.0);
        assert_eq!(market_points(6), 0.0);
        assert_eq!(market_points(255), 15.0);
    }

    #[test]
    fn test_timing() {
        assert_eq!(timing_points(30, &BOUNDS), 10.0);
        assert_eq!(timing_points(10, &BOUNDS), 5.0);
        assert_eq!(timing_points(60, &BOUNDS), 5.0);
        assert_eq!(timing_points(15, &BOUNDS), 7.5);
        assert_eq!(timing_points(9, &BOUNDS), 0.0);
        assert_eq!(timing_points(61, &BOUNDS), 0.0);
    }

    #[test]
    fn test_total_rounds() {
        let b = StrengthBreakdown {
            symmetry: 20.4,
            amplitude: 20.0,
            volume: 10.0,
            market: 7.0,
            timing: 10.0,
        };
        assert_eq!(b.total(), 67);
    }

    proptest! {
        #[test]
        fn prop_total_within_bounds(
            deviation in 0.0f64..20.0,
            tolerance in 0.01f64..10.0,
            amplitude in 0.0f64..100.0,
            min_amp in 0.0f64..20.0,
            ratio in proptest::option::of(0.0f64..5.0),
            market in any::<u8>(),
            spacing in 0usize..200,
        ) {
            let geometry = ShapeGeometry {
                deviation_pct: deviation,
                tolerance_pct: tolerance,
                amplitude_pct: amplitude,
                min_amplitude_pct: min_amp,
                spacing,
                spacing_bounds: BOUNDS,
            };
            let b = score(&geometry, ratio, market);
            prop_assert!(b.total() <= 100);
            prop_assert!((0.0..=30.0).contains(&b.symmetry));
            prop_assert!((0.0..=20.0).contains(&b.amplitude));
            prop_assert!((0.0..=25.0).contains(&b.volume));
            prop_assert!((0.0..=15.0).contains(&b.market));
            prop_assert!((0.0..=10.0).contains(&b.timing));
        }
    }
}
