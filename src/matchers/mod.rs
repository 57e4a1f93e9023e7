//! Chart shape matchers
//!
//! # Pattern Categories
//!
//! - **Reversal (4)**: Double Bottom, Triple Bottom, Inverse Head & Shoulders, Cup & Handle
//! - **Continuation (4)**: Ascending Triangle, Bull Flag, Rising Wedge, Symmetrical Triangle
//!
//! Reversal matchers work from the turning points; continuation matchers fit
//! the most recent fixed window of bars.

pub mod helpers;

/// Generate `with_defaults()` -> `Self::default()` for multiple matcher types.
macro_rules! impl_with_defaults {
  ($($matcher:ty),* $(,)?) => {
    $(impl $matcher {
      pub fn with_defaults() -> Self { Self::default() }
    })*
  };
}

pub mod continuation;
pub mod reversal;

// Re-export all matchers for convenience
pub use continuation::*;
pub use reversal::*;
