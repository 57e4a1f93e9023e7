//! Recent-vs-average volume ratio and its confirmation gates

use crate::{PatternError, Period, Result, OHLCV};

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    pub short_window: Period,
    pub long_window: Period,
    /// Ratio at or above which a close over breakout counts as confirmed
    pub breakout_ratio: f64,
    /// Ratio at or above which a close near breakout counts as imminent
    pub imminent_ratio: f64,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            short_window: Period::new_const(3),
            long_window: Period::new_const(20),
            breakout_ratio: 1.3,
            imminent_ratio: 1.5,
        }
    }
}

impl VolumeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.short_window > self.long_window {
            return Err(PatternError::InvalidConfig(format!(
                "volume short_window {} exceeds long_window {}",
                self.short_window.get(),
                self.long_window.get()
            )));
        }
        for (field, value) in [("breakout_ratio", self.breakout_ratio), ("imminent_ratio", self.imminent_ratio)] {
            if !value.is_finite() || value < 0.0 {
                return Err(PatternError::OutOfRange {
                    field,
                    value,
                    min: 0.0,
                    max: f64::MAX,
                });
            }
        }
        Ok(())
    }
}

/// Volume ratio of the latest bars with the gates it was computed under
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VolumeSignal {
    ratio: Option<f64>,
    breakout_ratio: f64,
    imminent_ratio: f64,
}

impl VolumeSignal {
    /// mean(volume, short window) / mean(volume, long window) over the tail of `bars`.
    /// Undefined with fewer bars than the long window or a zero long average.
    pub fn compute<T: OHLCV>(bars: &[T], config: &VolumeConfig) -> Self {
        let (short, long) = (config.short_window.get(), config.long_window.get());
        let ratio = if bars.len() < long {
            None
        } else {
            let tail_mean = |k: usize| bars[bars.len() - k..].iter().map(|b| b.volume()).sum::<f64>() / k as f64;
            let average = tail_mean(long);
            (average > 0.0).then(|| tail_mean(short) / average)
        };
        Self::with_ratio(ratio, config)
    }

    /// Signal for an already known ratio
    pub fn with_ratio(ratio: Option<f64>, config: &VolumeConfig) -> Self {
        Self {
            ratio,
            breakout_ratio: config.breakout_ratio,
            imminent_ratio: config.imminent_ratio,
        }
    }

    #[inline]
    pub fn ratio(&self) -> Option<f64> {
        self.ratio
    }

    #[inline]
    pub fn breakout_confirmed(&self) -> bool {
        self.ratio.is_some_and(|r| r >= self.breakout_ratio)
    }

    #[inline]
    pub fn imminent_confirmed(&self) -> bool {
        self.ratio.is_some_and(|r| r >= self.imminent_ratio)
    }
}
