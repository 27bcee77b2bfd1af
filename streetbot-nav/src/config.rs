//! Configuration loading for the navigator
//!
//! One TOML file covers every tunable: filter weights, maneuver timings,
//! control-loop limits, simulator physics, and the calibration file
//! location. Every field has a default, so a partial file (or none at all)
//! is fine.

use crate::error::{NavError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use streetbot_core::FilterConfig;
use streetbot_io::{ManeuverConfig, SimConfig};

/// Main configuration structure
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Belief filter weights and likelihoods.
    pub filter: FilterConfig,

    /// Open-loop maneuver timings.
    pub maneuvers: ManeuverConfig,

    /// Control-loop settings.
    pub control: ControlConfig,

    /// Simulated drive settings.
    pub sim: SimConfig,

    /// Sensor calibration settings.
    pub calibration: CalibrationConfig,
}

/// Control-loop settings
#[derive(Clone, Debug, Deserialize)]
pub struct ControlConfig {
    /// Starting half-width of the adjust sweep, in trim turns; the sweep
    /// widens by one every exhausted pass.
    #[serde(default = "default_adjust_start_limit")]
    pub adjust_start_limit: usize,

    /// Stop after this many intersection visits without arriving
    /// (0 = keep going).
    #[serde(default)]
    pub max_visits: u64,
}

fn default_adjust_start_limit() -> usize {
    1
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            adjust_start_limit: default_adjust_start_limit(),
            max_visits: 0,
        }
    }
}

/// Sensor calibration settings
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CalibrationConfig {
    /// Calibration file written by the interactive routine and read at
    /// startup. Pure color references are used when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl BotConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NavError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        let config: BotConfig = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_is_all_defaults() {
        let config: BotConfig = toml::from_str("").unwrap();
        assert_eq!(config.filter.move_weight, 0.7);
        assert_eq!(config.maneuvers.follow_power, 10);
        assert_eq!(config.control.adjust_start_limit, 1);
        assert_eq!(config.control.max_visits, 0);
        assert!(config.calibration.path.is_none());
    }

    #[test]
    fn test_partial_config_keeps_other_defaults() {
        let config: BotConfig = toml::from_str(
            r#"
            [filter]
            move_weight = 0.6
            decide_epsilon = 1e-4

            [control]
            max_visits = 40

            [calibration]
            path = "out/rgb.dat"
            "#,
        )
        .unwrap();

        assert_eq!(config.filter.move_weight, 0.6);
        assert_eq!(config.filter.decide_epsilon, 1e-4);
        // Untouched fields keep their defaults.
        assert_eq!(config.filter.stay_weight, 0.2);
        assert_eq!(config.control.max_visits, 40);
        assert_eq!(config.maneuvers.stride.run_ms, 400);
        assert_eq!(
            config.calibration.path.as_deref(),
            Some(Path::new("out/rgb.dat"))
        );
    }

    #[test]
    fn test_malformed_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("streetbot.toml");
        std::fs::write(&path, "[filter\nmove_weight = ").unwrap();
        assert!(BotConfig::load(&path).is_err());
    }
}
