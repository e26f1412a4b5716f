//! Engine configuration
//!
//! Every field has a default so a partial TOML document is enough.
//! [`EngineConfig::validate`] runs before any computation starts.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AttributionError, Result};
use crate::journey::ValidationMode;

/// Default blend weight between Markov (1 - alpha) and Shapley (alpha)
pub const DEFAULT_ALPHA: f64 = 0.5;

/// Default cap on sampled Shapley permutations
pub const DEFAULT_MAX_ITERATIONS: usize = 1000;

/// Configuration for one engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Blend weight used when the caller does not pass one (default: 0.5)
    pub alpha: f64,
    /// Maximum Shapley permutations sampled per run (default: 1000)
    pub max_iterations: usize,
    /// Whether confidence intervals are computed (default: true)
    pub include_uncertainty: bool,
    /// Fixed RNG seed; `None` draws a fresh seed for every call
    pub seed: Option<u64>,
    /// How redundant journey fields are checked (default: warn)
    pub journey_validation: ValidationMode,
    pub uncertainty: UncertaintyConfig,
    pub baselines: BaselineConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            include_uncertainty: true,
            seed: None,
            journey_validation: ValidationMode::default(),
            uncertainty: UncertaintyConfig::default(),
            baselines: BaselineConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse from a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Read and parse a TOML file
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        validate_alpha(self.alpha)?;
        if self.max_iterations == 0 {
            return Err(AttributionError::InvalidConfig(
                "max_iterations must be greater than 0".into(),
            ));
        }
        self.uncertainty.validate()?;
        self.baselines.validate()
    }
}

/// Check that a blend weight is a number within `[0, 1]`
pub fn validate_alpha(alpha: f64) -> Result<()> {
    if (0.0..=1.0).contains(&alpha) {
        Ok(())
    } else {
        Err(AttributionError::InvalidAlpha(alpha))
    }
}

/// How the hybrid model derives its confidence bounds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "method")]
pub enum HybridInterval {
    /// Percentile interval over journey resamples
    #[default]
    Bootstrap,
    /// Point estimate widened by fixed per-model half-widths blended by alpha
    FixedWidth { markov_width: f64, shapley_width: f64 },
}

/// Configuration for uncertainty estimation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UncertaintyConfig {
    /// Two-sided coverage of bootstrap intervals (default: 0.95)
    pub confidence_level: f64,
    /// Number of journey resamples (default: 200)
    pub bootstrap_iterations: usize,
    /// Shapley permutation cap inside each resample (default: 100)
    pub bootstrap_shapley_iterations: usize,
    pub hybrid_interval: HybridInterval,
}

impl Default for UncertaintyConfig {
    fn default() -> Self {
        Self {
            confidence_level: 0.95,
            bootstrap_iterations: 200,
            bootstrap_shapley_iterations: 100,
            hybrid_interval: HybridInterval::default(),
        }
    }
}

impl UncertaintyConfig {
    fn validate(&self) -> Result<()> {
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(AttributionError::InvalidConfig(format!(
                "confidence_level must be within (0, 1), got {}",
                self.confidence_level
            )));
        }
        if self.hybrid_interval == HybridInterval::Bootstrap {
            if self.bootstrap_iterations == 0 {
                return Err(AttributionError::InvalidConfig(
                    "bootstrap_iterations must be greater than 0".into(),
                ));
            }
            if self.bootstrap_shapley_iterations == 0 {
                return Err(AttributionError::InvalidConfig(
                    "bootstrap_shapley_iterations must be greater than 0".into(),
                ));
            }
        }
        if let HybridInterval::FixedWidth {
            markov_width,
            shapley_width,
        } = self.hybrid_interval
            && (markov_width < 0.0 || shapley_width < 0.0)
        {
            return Err(AttributionError::InvalidConfig(
                "fixed interval widths must be non-negative".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the heuristic baselines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    /// Half-life of time-decay credit in days (default: 7.0)
    pub half_life_days: f64,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            half_life_days: 7.0,
        }
    }
}

impl BaselineConfig {
    fn validate(&self) -> Result<()> {
        if self.half_life_days > 0.0 {
            Ok(())
        } else {
            Err(AttributionError::InvalidConfig(format!(
                "half_life_days must be positive, got {}",
                self.half_life_days
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!((config.alpha - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.max_iterations, 1000);
        assert!(config.include_uncertainty);
        assert!(config.seed.is_none());
        assert_eq!(config.journey_validation, ValidationMode::Warn);
        assert_eq!(config.uncertainty.hybrid_interval, HybridInterval::Bootstrap);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = EngineConfig {
            seed: Some(42),
            ..Default::default()
        };
        let toml = toml::to_string(&config).unwrap();
        let parsed = EngineConfig::from_toml_str(&toml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed = EngineConfig::from_toml_str(
            r#"
            alpha = 0.25
            journey_validation = "reject"

            [uncertainty.hybrid_interval]
            method = "fixed_width"
            markov_width = 0.05
            shapley_width = 0.05
            "#,
        )
        .unwrap();
        assert!((parsed.alpha - 0.25).abs() < f64::EPSILON);
        assert_eq!(parsed.max_iterations, DEFAULT_MAX_ITERATIONS);
        assert_eq!(parsed.journey_validation, ValidationMode::Reject);
        assert!(matches!(
            parsed.uncertainty.hybrid_interval,
            HybridInterval::FixedWidth { .. }
        ));
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_iterations = 50\nseed = 7").unwrap();
        let parsed = EngineConfig::from_path(file.path()).unwrap();
        assert_eq!(parsed.max_iterations, 50);
        assert_eq!(parsed.seed, Some(7));
    }

    #[test]
    fn test_validate_alpha_bounds() {
        assert!(validate_alpha(0.0).is_ok());
        assert!(validate_alpha(1.0).is_ok());
        assert!(matches!(
            validate_alpha(-0.1),
            Err(AttributionError::InvalidAlpha(_))
        ));
        assert!(matches!(
            validate_alpha(1.01),
            Err(AttributionError::InvalidAlpha(_))
        ));
        assert!(validate_alpha(f64::NAN).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_iterations() {
        let config = EngineConfig {
            max_iterations: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AttributionError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_confidence_level() {
        let mut config = EngineConfig::default();
        config.uncertainty.confidence_level = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_positive_half_life() {
        let mut config = EngineConfig::default();
        config.baselines.half_life_days = 0.0;
        assert!(config.validate().is_err());
    }
}
