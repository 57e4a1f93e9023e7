//! Parameter metadata for shape matchers
//!
//! This module provides metadata about matcher parameters, enabling:
//! - Grid search over thresholds
//! - Parameter documentation
//! - Construction of matchers from a flat key/value map
//!
//! # Example
//!
//! ```rust
//! use chartwatch::params::{ParamMeta, ParamType, ParameterizedMatcher};
//! use chartwatch::prelude::*;
//!
//! // Get parameter metadata for a matcher
//! let params = DoubleBottomMatcher::param_meta();
//! for param in params {
//!     println!("{}: {:?} (default: {})", param.name, param.param_type, param.default);
//! }
//! ```

use std::collections::HashMap;

use crate::{PatternError, PatternType, Period, Ratio, Result};

// ============================================================
// PARAMETER TYPES
// ============================================================

/// Type of parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
  /// Ratio value (0.0..=1.0)
  Ratio,
  /// Period value (positive integer)
  Period,
  /// Percentage (non-negative, 3.0 means 3%)
  Percent,
}

/// Metadata for a single matcher parameter
#[derive(Debug, Clone)]
pub struct ParamMeta {
  /// Parameter name (e.g., "max_symmetry_pct")
  pub name: &'static str,
  /// Parameter type
  pub param_type: ParamType,
  /// Default value
  pub default: f64,
  /// Range for optimization: (min, max, step)
  pub range: (f64, f64, f64),
  /// Human-readable description
  pub description: &'static str,
}

impl ParamMeta {
  /// Create a new ParamMeta for a Ratio parameter
  pub const fn ratio(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Ratio, default, range, description }
  }

  /// Create a new ParamMeta for a Period parameter
  pub const fn period(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Period, default, range, description }
  }

  /// Create a new ParamMeta for a Percent parameter
  pub const fn percent(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Percent, default, range, description }
  }

  /// Generate all values for grid search
  pub fn generate_grid(&self) -> Vec<f64> {
    let (min, max, step) = self.range;
    let mut values = Vec::new();
    let mut v = min;
    while v <= max + f64::EPSILON {
      values.push(v);
      v += step;
    }
    values
  }

  /// Validate a value for this parameter
  pub fn validate(&self, value: f64) -> Result<()> {
    let (min, max, _) = self.range;
    if value < min || value > max {
      return Err(PatternError::OutOfRange { field: self.name, value, min, max });
    }
    match self.param_type {
      ParamType::Ratio => Ratio::new(value).map(|_| ()),
      ParamType::Period => {
        if value < 1.0 || value.fract() != 0.0 {
          return Err(PatternError::InvalidValue("Period must be a positive integer"));
        }
        Ok(())
      },
      ParamType::Percent => {
        if !value.is_finite() || value < 0.0 {
          return Err(PatternError::InvalidValue("Percent must be finite and non-negative"));
        }
        Ok(())
      },
    }
  }
}

// ============================================================
// PARAMETERIZED MATCHER TRAIT
// ============================================================

/// Trait for matchers that support parameterization
///
/// Implementing this trait enables:
/// - Discovery of available parameters
/// - Creation of matchers with custom parameter values
/// - Grid search over thresholds
pub trait ParameterizedMatcher: Sized {
  /// Returns metadata for all configurable parameters
  fn param_meta() -> &'static [ParamMeta];

  /// Creates a matcher with parameters from a HashMap
  ///
  /// Missing parameters use their default values.
  fn with_params(params: &HashMap<&str, f64>) -> Result<Self>;

  /// The shape this matcher recognizes
  fn pattern_type() -> PatternType;

  /// Names of every parameter, in declaration order
  fn param_names() -> Vec<&'static str> {
    Self::param_meta().iter().map(|m| m.name).collect()
  }
}

// ============================================================
// PARAMETER VALUE HELPERS
// ============================================================

/// Helper to get a Ratio from params with default fallback
pub fn get_ratio(params: &HashMap<&str, f64>, key: &str, default: f64) -> Result<Ratio> {
  let value = params.get(key).copied().unwrap_or(default);
  Ratio::new(value)
}

/// Helper to get a Period from params with default fallback
pub fn get_period(params: &HashMap<&str, f64>, key: &str, default: usize) -> Result<Period> {
  let value = params.get(key).copied().unwrap_or(default as f64);
  if value < 1.0 || value.fract() != 0.0 {
    return Err(PatternError::InvalidValue("Period must be a positive integer"));
  }
  Period::new(value as usize)
}

/// Helper to get a percentage from params with default fallback
pub fn get_percent(params: &HashMap<&str, f64>, key: &str, default: f64) -> Result<f64> {
  let value = params.get(key).copied().unwrap_or(default);
  if !value.is_finite() || value < 0.0 {
    return Err(PatternError::InvalidValue("Percent must be finite and non-negative"));
  }
  Ok(value)
}

/// Helper to get a flag (any non-zero value is true) with default fallback
pub fn get_flag(params: &HashMap<&str, f64>, key: &str, default: bool) -> bool {
  params.get(key).map_or(default, |v| *v != 0.0)
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
  use super::*;
  use crate::matchers::*;

  #[test]
  fn test_param_meta_ratio() {
    let meta = ParamMeta::ratio("test_ratio", 0.5, (0.3, 0.7, 0.1), "Test ratio parameter");

    assert_eq!(meta.name, "test_ratio");
    assert_eq!(meta.param_type, ParamType::Ratio);
    assert_eq!(meta.default, 0.5);
  }

  #[test]
  fn test_param_meta_period() {
    let meta = ParamMeta::period("test_period", 14.0, (10.0, 20.0, 2.0), "Test period parameter");

    assert_eq!(meta.name, "test_period");
    assert_eq!(meta.param_type, ParamType::Period);
    assert_eq!(meta.default, 14.0);
  }

  #[test]
  fn test_generate_grid() {
    let meta = ParamMeta::percent("test", 3.0, (1.0, 5.0, 2.0), "Test");

    let grid = meta.generate_grid();
    assert_eq!(grid.len(), 3);
    assert!((grid[0] - 1.0).abs() < f64::EPSILON);
    assert!((grid[1] - 3.0).abs() < f64::EPSILON);
    assert!((grid[2] - 5.0).abs() < f64::EPSILON);
  }

  #[test]
  fn test_validate_percent() {
    let meta = ParamMeta::percent("test", 3.0, (1.0, 5.0, 0.5), "Test");

    assert!(meta.validate(3.0).is_ok());
    assert!(meta.validate(1.0).is_ok());
    assert!(meta.validate(5.0).is_ok());
    assert!(meta.validate(0.5).is_err());
    assert!(meta.validate(5.5).is_err());
  }

  #[test]
  fn test_validate_period() {
    let meta = ParamMeta::period("test", 14.0, (10.0, 20.0, 2.0), "Test");

    assert!(meta.validate(14.0).is_ok());
    assert!(meta.validate(10.0).is_ok());
    assert!(meta.validate(20.0).is_ok());
    assert!(meta.validate(8.0).is_err());
    assert!(meta.validate(22.0).is_err());
    assert!(meta.validate(12.5).is_err());
  }

  #[test]
  fn test_get_helpers() {
    let mut params = HashMap::new();
    params.insert("ratio", 0.8);
    params.insert("period", 20.0);
    params.insert("pct", 4.5);
    params.insert("flag", 1.0);

    assert!((get_ratio(&params, "ratio", 0.5).unwrap().get() - 0.8).abs() < f64::EPSILON);
    assert!((get_ratio(&params, "missing", 0.5).unwrap().get() - 0.5).abs() < f64::EPSILON);
    assert_eq!(get_period(&params, "period", 14).unwrap().get(), 20);
    assert_eq!(get_period(&params, "missing", 14).unwrap().get(), 14);
    assert!((get_percent(&params, "pct", 3.0).unwrap() - 4.5).abs() < f64::EPSILON);
    assert!(get_flag(&params, "flag", false));
    assert!(!get_flag(&params, "missing", false));

    params.insert("bad", -1.0);
    assert!(get_percent(&params, "bad", 3.0).is_err());
    assert!(get_period(&params, "bad", 3).is_err());
  }

  fn defaults_validate<M: ParameterizedMatcher>() {
    for meta in M::param_meta() {
      assert!(meta.validate(meta.default).is_ok(), "{} default out of its own range", meta.name);
    }
    assert!(M::with_params(&HashMap::new()).is_ok());
  }

  #[test]
  fn test_every_matcher_defaults_in_range() {
    defaults_validate::<DoubleBottomMatcher>();
    defaults_validate::<TripleBottomMatcher>();
    defaults_validate::<InverseHeadShouldersMatcher>();
    defaults_validate::<CupHandleMatcher>();
    defaults_validate::<AscendingTriangleMatcher>();
    defaults_validate::<BullFlagMatcher>();
    defaults_validate::<RisingWedgeMatcher>();
    defaults_validate::<SymmetricalTriangleMatcher>();
  }

  #[test]
  fn test_with_params_overrides() {
    let mut params = HashMap::new();
    params.insert("max_symmetry_pct", 1.5);
    params.insert("min_spacing", 15.0);
    let m = DoubleBottomMatcher::with_params(&params).unwrap();
    assert_eq!(m.max_symmetry_pct, 1.5);
    assert_eq!(m.min_spacing.get(), 15);
    assert_eq!(m.max_spacing.get(), 60);
    assert_eq!(DoubleBottomMatcher::pattern_type(), PatternType::DoubleBottom);
  }

  #[test]
  fn test_with_params_rejects_inverted_bounds() {
    let mut params = HashMap::new();
    params.insert("min_spacing", 70.0);
    assert!(DoubleBottomMatcher::with_params(&params).is_err());
  }
}
