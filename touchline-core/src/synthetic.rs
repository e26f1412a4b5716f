//! Synthetic journeys with known channel effects
//!
//! Conversion probability of a journey is the summed effect of its distinct
//! channels (capped at 0.95) plus Gaussian noise, clipped to `[0.01, 0.99]`.
//! Useful for checking that a model recovers the effects it was fed.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::error::{AttributionError, Result};
use crate::journey::Journey;
use crate::shares::ChannelShares;

/// Configuration for synthetic data generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    /// Number of journeys (default: 10000)
    pub journeys: usize,
    /// True effect per channel; the channel set is taken from its keys
    pub true_effects: ChannelShares,
    /// Standard deviation of the probability noise (default: 0.1)
    pub noise_level: f64,
    /// Longest generated path (default: 6)
    pub max_path_length: usize,
    /// Conversion value of a converting journey (default: 100.0)
    pub conversion_value: f64,
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        let true_effects = [
            ("Search", 0.35),
            ("Email", 0.25),
            ("Direct", 0.20),
            ("Social", 0.12),
            ("Display", 0.08),
        ]
        .into_iter()
        .map(|(c, v)| (c.to_string(), v))
        .collect();

        Self {
            journeys: 10_000,
            true_effects,
            noise_level: 0.1,
            max_path_length: 6,
            conversion_value: 100.0,
            seed: 42,
        }
    }
}

/// Generated journeys and the effects used to generate them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticDataset {
    pub journeys: Vec<Journey>,
    pub true_effects: ChannelShares,
}

impl SyntheticDataset {
    pub fn conversion_rate(&self) -> f64 {
        if self.journeys.is_empty() {
            return 0.0;
        }
        self.journeys.iter().filter(|j| j.conversion).count() as f64 / self.journeys.len() as f64
    }
}

/// Generate a dataset; identical configs give identical datasets
pub fn generate(config: &SyntheticConfig) -> Result<SyntheticDataset> {
    if config.true_effects.is_empty() {
        return Err(AttributionError::InvalidConfig(
            "true_effects must name at least one channel".into(),
        ));
    }
    if config.max_path_length == 0 {
        return Err(AttributionError::InvalidConfig(
            "max_path_length must be greater than 0".into(),
        ));
    }
    if !(config.noise_level >= 0.0 && config.noise_level.is_finite()) {
        return Err(AttributionError::InvalidConfig(format!(
            "noise_level must be a non-negative number, got {}",
            config.noise_level
        )));
    }
    let noise = Normal::new(0.0, config.noise_level)
        .map_err(|e| AttributionError::InvalidConfig(format!("noise_level: {}", e)))?;

    let channels: Vec<&str> = config.true_effects.keys().map(String::as_str).collect();
    let mut rng = StdRng::seed_from_u64(config.seed);
    let epoch = DateTime::<Utc>::UNIX_EPOCH;

    let journeys = (0..config.journeys)
        .map(|i| {
            let length = rng.gen_range(1..=config.max_path_length);
            let path: Vec<&str> = (0..length)
                .map(|_| channels[rng.gen_range(0..channels.len())])
                .collect();

            let mut distinct = path.clone();
            distinct.sort_unstable();
            distinct.dedup();
            let base: f64 = distinct.iter().map(|c| config.true_effects[*c]).sum();
            let probability = (base.min(0.95) + noise.sample(&mut rng)).clamp(0.01, 0.99);
            let converted = rng.gen_bool(probability);

            let mut journey = Journey::from_channels_at(
                format!("syn-{:06}", i),
                &path,
                converted,
                epoch + Duration::days(i as i64),
            );
            journey.conversion_value = if converted { config.conversion_value } else { 0.0 };
            journey
        })
        .collect();

    Ok(SyntheticDataset {
        journeys,
        true_effects: config.true_effects.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> SyntheticConfig {
        SyntheticConfig {
            journeys: 500,
            ..Default::default()
        }
    }

    #[test]
    fn test_generate_is_deterministic() {
        let first = generate(&small()).unwrap();
        let second = generate(&small()).unwrap();
        assert_eq!(first.journeys, second.journeys);
    }

    #[test]
    fn test_generated_journeys_are_consistent() {
        let dataset = generate(&small()).unwrap();
        assert_eq!(dataset.journeys.len(), 500);
        for journey in &dataset.journeys {
            assert!(!journey.path.is_empty());
            assert!(journey.path.len() <= 6);
            assert!(journey.issues().is_empty());
            assert!(dataset.true_effects.contains_key(&journey.path[0].channel));
        }
        let rate = dataset.conversion_rate();
        assert!(rate > 0.0 && rate < 1.0);
    }

    #[test]
    fn test_zero_noise_is_allowed() {
        let config = SyntheticConfig {
            noise_level: 0.0,
            journeys: 10,
            ..Default::default()
        };
        assert!(generate(&config).is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let config = SyntheticConfig {
            true_effects: BTreeMap::new(),
            ..Default::default()
        };
        assert!(generate(&config).is_err());

        let config = SyntheticConfig {
            noise_level: -1.0,
            ..Default::default()
        };
        assert!(generate(&config).is_err());
    }
}
