use serde::Deserialize;
use touchline_core::{HybridInterval, ValidationMode};

/// Configuration as stored in TOML files (with optional fields for merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawTouchlineConfig {
    /// Default blend weight between Markov and Shapley
    pub alpha: Option<f64>,

    /// Shapley permutation cap
    pub max_iterations: Option<usize>,

    /// Compute confidence intervals
    pub include_uncertainty: Option<bool>,

    /// Fixed RNG seed
    pub seed: Option<u64>,

    /// How redundant journey fields are checked
    pub journey_validation: Option<ValidationMode>,

    #[serde(default)]
    pub uncertainty: RawUncertaintyConfig,

    #[serde(default)]
    pub baselines: RawBaselineConfig,
}

/// Uncertainty section as stored in TOML
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawUncertaintyConfig {
    pub confidence_level: Option<f64>,
    pub bootstrap_iterations: Option<usize>,
    pub bootstrap_shapley_iterations: Option<usize>,
    pub hybrid_interval: Option<HybridInterval>,
}

/// Baselines section as stored in TOML
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawBaselineConfig {
    /// Half-life of time-decay credit in days
    pub half_life_days: Option<f64>,
}
