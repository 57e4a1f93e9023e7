//! Breakout, stop-loss and target levels for a matched shape

use crate::{
    extrema::ExtremumPoint, PatternError, PatternType, Ratio, Result, ShapeGeometry, ShapeMatch,
};

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LevelConfig {
    /// Stop sits this fraction below the lowest low
    pub stop_tolerance: Ratio,
    /// Fibonacci extensions of the pattern height, ascending
    pub target_ratios: [f64; 3],
    /// Candidates with a lower reward/risk are discarded.
    ///
    /// With the stop under the lowest low and target1 at 0.382 of the
    /// height, reward/risk stays below 0.382, so the default is 0.25
    /// rather than a conventional 2:1.
    pub min_risk_reward: f64,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            stop_tolerance: Ratio::new_const(0.03),
            target_ratios: [0.382, 0.618, 1.0],
            min_risk_reward: 0.25,
        }
    }
}

impl LevelConfig {
    pub fn validate(&self) -> Result<()> {
        let [t1, t2, t3] = self.target_ratios;
        if !(t1 > 0.0 && t1 < t2 && t2 < t3 && t3.is_finite()) {
            return Err(PatternError::InvalidConfig(
                "target_ratios must be positive and strictly ascending".into(),
            ));
        }
        if !self.min_risk_reward.is_finite() || self.min_risk_reward < 0.0 {
            return Err(PatternError::OutOfRange {
                field: "min_risk_reward",
                value: self.min_risk_reward,
                min: 0.0,
                max: f64::MAX,
            });
        }
        if self.stop_tolerance.get() >= 1.0 {
            return Err(PatternError::InvalidConfig("stop_tolerance must be below 1".into()));
        }
        Ok(())
    }
}

/// Price levels of a pattern
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Levels {
    pub breakout_price: f64,
    pub stop_loss: f64,
    pub target1: f64,
    pub target2: f64,
    pub target3: f64,
}

impl Levels {
    /// Levels from a breakout price and the formation's lowest low.
    /// None if the height is not positive.
    pub fn from_geometry(breakout_price: f64, lowest_low: f64, config: &LevelConfig) -> Option<Self> {
        let height = breakout_price - lowest_low;
        if height.is_nan() || height <= 0.0 || !breakout_price.is_finite() {
            return None;
        }
        let [r1, r2, r3] = config.target_ratios;
        Some(Self {
            breakout_price,
            stop_loss: lowest_low * (1.0 - config.stop_tolerance.get()),
            target1: breakout_price + height * r1,
            target2: breakout_price + height * r2,
            target3: breakout_price + height * r3,
        })
    }

    /// (target1 - breakout) / (breakout - stop); None when the risk is not positive
    pub fn risk_reward(&self) -> Option<f64> {
        let risk = self.breakout_price - self.stop_loss;
        (risk > 0.0).then(|| (self.target1 - self.breakout_price) / risk)
    }

    /// Targets in ascending order
    #[inline]
    pub fn targets(&self) -> [f64; 3] {
        [self.target1, self.target2, self.target3]
    }

    /// Distance of `close` below breakout, in percent (negative once above)
    #[inline]
    pub fn distance_to_breakout_pct(&self, close: f64) -> f64 {
        (self.breakout_price - close) / self.breakout_price * 100.0
    }
}

/// A shape that passed geometry and the risk-reward gate
#[derive(Debug, Clone, PartialEq)]
pub struct PatternCandidate {
    pub pattern_type: PatternType,
    pub points: Vec<ExtremumPoint>,
    pub levels: Levels,
    pub pattern_height: f64,
    pub risk_reward: f64,
    pub geometry: ShapeGeometry,
}

/// Price a shape; None when the geometry is degenerate or the reward/risk is below the gate
pub fn price_shape(shape: &ShapeMatch, config: &LevelConfig) -> Option<PatternCandidate> {
    let levels = Levels::from_geometry(shape.breakout_price, shape.lowest_low, config)?;
    let risk_reward = levels.risk_reward()?;
    if risk_reward < config.min_risk_reward {
        return None;
    }
    Some(PatternCandidate {
        pattern_type: shape.pattern_type,
        points: shape.points.clone(),
        levels,
        pattern_height: shape.breakout_price - shape.lowest_low,
        risk_reward,
        geometry: shape.geometry,
    })
}
