//! Engine configuration, loadable from TOML.
//!
//! Every section and key is optional; missing values take their defaults.
//!
//! ```toml
//! [levels]
//! min_risk_reward = 0.5
//!
//! [scan]
//! batch_size = 25
//! ```

use std::{fs, path::Path};

use crate::{
    extrema::ExtremaConfig, levels::LevelConfig, scan::ScanConfig, state::StateConfig,
    volume::VolumeConfig, PatternError, Result,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub extrema: ExtremaConfig,
    pub levels: LevelConfig,
    pub volume: VolumeConfig,
    pub state: StateConfig,
    pub scan: ScanConfig,
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(content).map_err(|e| PatternError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate configuration from a file path.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| PatternError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| PatternError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        self.levels.validate()?;
        self.volume.validate()?;
        self.state.validate()?;
        let need = self.extrema.min_span();
        if self.scan.lookback.get() < need {
            return Err(PatternError::InvalidConfig(format!(
                "scan lookback {} is shorter than the extrema window {}",
                self.scan.lookback.get(),
                need
            )));
        }
        Ok(())
    }
}
