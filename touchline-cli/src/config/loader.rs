use super::types::{RawBaselineConfig, RawTouchlineConfig, RawUncertaintyConfig};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use touchline_core::{BaselineConfig, EngineConfig, UncertaintyConfig};
use tracing::debug;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration (user + project)
    pub fn load() -> Result<EngineConfig> {
        let mut raw = RawTouchlineConfig::default();

        // Layer 1: User config
        if let Some(user_path) = Self::user_config_path()
            && user_path.exists()
        {
            raw = Self::merge_raw(raw, Self::read_raw(&user_path)?);
        }

        // Layer 2: Project config
        let project_path = Self::project_config_path();
        if project_path.exists() {
            raw = Self::merge_raw(raw, Self::read_raw(&project_path)?);
        }

        Self::finalize(raw)
    }

    /// Get user config path (platform-specific)
    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "touchline").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get project config path
    /// Can be overridden with TOUCHLINE_PROJECT_CONFIG_DIR env var
    pub fn project_config_path() -> PathBuf {
        if let Ok(dir) = std::env::var("TOUCHLINE_PROJECT_CONFIG_DIR") {
            PathBuf::from(dir).join("config.toml")
        } else {
            PathBuf::from(".touchline/config.toml")
        }
    }

    fn read_raw(path: &Path) -> Result<RawTouchlineConfig> {
        debug!(path = %path.display(), "loading config layer");
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("invalid config in {}", path.display()))
    }

    /// Merge two raw configs (overlay values override base only if explicitly set)
    fn merge_raw(base: RawTouchlineConfig, overlay: RawTouchlineConfig) -> RawTouchlineConfig {
        RawTouchlineConfig {
            alpha: overlay.alpha.or(base.alpha),
            max_iterations: overlay.max_iterations.or(base.max_iterations),
            include_uncertainty: overlay.include_uncertainty.or(base.include_uncertainty),
            seed: overlay.seed.or(base.seed),
            journey_validation: overlay.journey_validation.or(base.journey_validation),
            uncertainty: RawUncertaintyConfig {
                confidence_level: overlay
                    .uncertainty
                    .confidence_level
                    .or(base.uncertainty.confidence_level),
                bootstrap_iterations: overlay
                    .uncertainty
                    .bootstrap_iterations
                    .or(base.uncertainty.bootstrap_iterations),
                bootstrap_shapley_iterations: overlay
                    .uncertainty
                    .bootstrap_shapley_iterations
                    .or(base.uncertainty.bootstrap_shapley_iterations),
                hybrid_interval: overlay
                    .uncertainty
                    .hybrid_interval
                    .or(base.uncertainty.hybrid_interval),
            },
            baselines: RawBaselineConfig {
                half_life_days: overlay
                    .baselines
                    .half_life_days
                    .or(base.baselines.half_life_days),
            },
        }
    }

    /// Convert raw config to final config with defaults applied
    fn finalize(raw: RawTouchlineConfig) -> Result<EngineConfig> {
        let defaults = EngineConfig::default();
        let uncertainty_defaults = UncertaintyConfig::default();
        let baseline_defaults = BaselineConfig::default();

        let config = EngineConfig {
            alpha: raw.alpha.unwrap_or(defaults.alpha),
            max_iterations: raw.max_iterations.unwrap_or(defaults.max_iterations),
            include_uncertainty: raw
                .include_uncertainty
                .unwrap_or(defaults.include_uncertainty),
            seed: raw.seed.or(defaults.seed),
            journey_validation: raw
                .journey_validation
                .unwrap_or(defaults.journey_validation),
            uncertainty: UncertaintyConfig {
                confidence_level: raw
                    .uncertainty
                    .confidence_level
                    .unwrap_or(uncertainty_defaults.confidence_level),
                bootstrap_iterations: raw
                    .uncertainty
                    .bootstrap_iterations
                    .unwrap_or(uncertainty_defaults.bootstrap_iterations),
                bootstrap_shapley_iterations: raw
                    .uncertainty
                    .bootstrap_shapley_iterations
                    .unwrap_or(uncertainty_defaults.bootstrap_shapley_iterations),
                hybrid_interval: raw
                    .uncertainty
                    .hybrid_interval
                    .unwrap_or(uncertainty_defaults.hybrid_interval),
            },
            baselines: BaselineConfig {
                half_life_days: raw
                    .baselines
                    .half_life_days
                    .unwrap_or(baseline_defaults.half_life_days),
            },
        };

        config.validate().context("invalid touchline configuration")?;
        Ok(config)
    }

    /// Load config from a specific path (for testing)
    #[cfg(test)]
    pub fn load_from_path(path: &Path) -> Result<EngineConfig> {
        if path.exists() {
            Self::finalize(Self::read_raw(path)?)
        } else {
            Self::finalize(RawTouchlineConfig::default())
        }
    }
}
