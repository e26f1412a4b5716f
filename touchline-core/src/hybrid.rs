//! Hybrid blend of Markov and Shapley attribution
//!
//! `hybrid[c] = (1 - alpha) * markov[c] + alpha * shapley[c]`, renormalized
//! over the union of channels either model credited.

use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{HybridInterval, UncertaintyConfig, validate_alpha};
use crate::error::Result;
use crate::journey::Journey;
use crate::markov::MarkovModel;
use crate::shapley::ShapleyModel;
use crate::shares::{self, ChannelShares};
use crate::uncertainty::{BootstrapAccumulator, ConfidenceBounds, resample};

/// Output of the hybrid model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HybridResult {
    pub channel_attributions: ChannelShares,
    pub alpha_used: f64,
    pub markov_weight: f64,
    pub shapley_weight: f64,
    pub confidence_intervals: BTreeMap<String, ConfidenceBounds>,
    /// Markov shares that went into the blend
    pub markov_shares: ChannelShares,
    /// Shapley values that went into the blend
    pub shapley_shares: ChannelShares,
}

/// Weighted blend of two share maps
#[derive(Debug, Clone, Copy)]
pub struct HybridBlender {
    alpha: f64,
}

impl HybridBlender {
    /// Fails when alpha is outside `[0, 1]`
    pub fn new(alpha: f64) -> Result<Self> {
        validate_alpha(alpha)?;
        Ok(Self { alpha })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn markov_weight(&self) -> f64 {
        1.0 - self.alpha
    }

    pub fn shapley_weight(&self) -> f64 {
        self.alpha
    }

    /// Blend and renormalize over the union of both channel sets
    pub fn blend(&self, markov: &ChannelShares, shapley: &ChannelShares) -> ChannelShares {
        let channels: BTreeSet<&String> = markov.keys().chain(shapley.keys()).collect();
        let raw: ChannelShares = channels
            .into_iter()
            .map(|c| {
                let m = markov.get(c).copied().unwrap_or(0.0);
                let s = shapley.get(c).copied().unwrap_or(0.0);
                (c.clone(), self.markov_weight() * m + self.shapley_weight() * s)
            })
            .collect();
        shares::normalize_or_uniform(&raw)
    }

    /// Point estimate widened by per-model half-widths weighted like the blend
    pub fn fixed_width_intervals(
        &self,
        blended: &ChannelShares,
        markov_width: f64,
        shapley_width: f64,
    ) -> BTreeMap<String, ConfidenceBounds> {
        let half_width = self.markov_weight() * markov_width + self.shapley_weight() * shapley_width;
        blended
            .iter()
            .map(|(c, share)| (c.clone(), ConfidenceBounds::around(*share, half_width)))
            .collect()
    }
}

/// Runs both models over the same journeys and blends them
pub struct HybridModel<'a> {
    journeys: &'a [Journey],
    blender: HybridBlender,
    max_iterations: usize,
    uncertainty: UncertaintyConfig,
}

impl<'a> HybridModel<'a> {
    pub fn new(
        journeys: &'a [Journey],
        alpha: f64,
        max_iterations: usize,
        uncertainty: UncertaintyConfig,
    ) -> Result<Self> {
        Ok(Self {
            journeys,
            blender: HybridBlender::new(alpha)?,
            max_iterations,
            uncertainty,
        })
    }

    /// Blend the two models; `rng` drives Shapley sampling first, then bootstrap
    pub fn result<R: Rng>(&self, include_uncertainty: bool, rng: &mut R) -> Result<HybridResult> {
        let (markov_shares, _) = MarkovModel::new(self.journeys).attribution();
        let shapley_shares =
            ShapleyModel::new(self.journeys, self.max_iterations, &mut *rng)?.values();
        let channel_attributions = self.blender.blend(&markov_shares, &shapley_shares);

        let confidence_intervals = if include_uncertainty {
            match self.uncertainty.hybrid_interval {
                HybridInterval::Bootstrap => self.bootstrap_intervals(&channel_attributions, rng)?,
                HybridInterval::FixedWidth {
                    markov_width,
                    shapley_width,
                } => self.blender.fixed_width_intervals(
                    &channel_attributions,
                    markov_width,
                    shapley_width,
                ),
            }
        } else {
            BTreeMap::new()
        };

        Ok(HybridResult {
            channel_attributions,
            alpha_used: self.blender.alpha(),
            markov_weight: self.blender.markov_weight(),
            shapley_weight: self.blender.shapley_weight(),
            confidence_intervals,
            markov_shares,
            shapley_shares,
        })
    }

    /// Percentile intervals from re-running both models on journey resamples
    fn bootstrap_intervals<R: Rng>(
        &self,
        blended: &ChannelShares,
        rng: &mut R,
    ) -> Result<BTreeMap<String, ConfidenceBounds>> {
        let mut acc = BootstrapAccumulator::new(blended.keys());
        if blended.is_empty() {
            return Ok(acc.intervals(self.uncertainty.confidence_level));
        }

        for _ in 0..self.uncertainty.bootstrap_iterations {
            let sample = resample(self.journeys, rng);
            let (markov, _) = MarkovModel::new(sample.iter().copied()).attribution();
            let shapley = ShapleyModel::new(
                sample.iter().copied(),
                self.uncertainty.bootstrap_shapley_iterations,
                &mut *rng,
            )?
            .values();
            acc.record(&self.blender.blend(&markov, &shapley));
        }

        debug!(
            replicates = acc.replicate_count(),
            level = self.uncertainty.confidence_level,
            "bootstrapped hybrid intervals"
        );
        Ok(acc.intervals(self.uncertainty.confidence_level))
    }
}
