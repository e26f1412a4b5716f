//! Attribution orchestrator
//!
//! Picks the model(s) to run from alpha, applies channel filtering, adds
//! per-channel metrics and assembles one [`AttributionResult`]. Each call
//! builds fresh model instances, so an engine can be shared across threads.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::time::Instant;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::config::{EngineConfig, validate_alpha};
use crate::error::Result;
use crate::hybrid::{HybridModel, HybridResult};
use crate::journey::{self, Journey};
use crate::markov::{MarkovModel, MarkovResult};
use crate::metrics::{self, ChannelMetrics};
use crate::shapley::{ShapleyModel, ShapleyResult};
use crate::uncertainty::ConfidenceBounds;

/// Attached to every result so downstream reports do not read it as causal
pub const INTERPRETATION_NOTE: &str = "Attribution shares measure each channel's contribution to \
observed conversions (association), not the causal effect of the channel. Causal claims require \
randomized or quasi-experimental evidence.";

/// Per-call knobs of [`AttributionEngine::run_analysis`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOptions {
    pub alpha: f64,
    pub include_uncertainty: bool,
    /// Keep journeys touching at least one of these channels
    pub filter_channels: Option<Vec<String>>,
    /// Overrides the configured seed for this call
    pub seed: Option<u64>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl AnalysisOptions {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            alpha: config.alpha,
            include_uncertainty: config.include_uncertainty,
            filter_channels: None,
            seed: config.seed,
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_filter(mut self, channels: Vec<String>) -> Self {
        self.filter_channels = Some(channels);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn without_uncertainty(mut self) -> Self {
        self.include_uncertainty = false;
        self
    }
}

/// Which model ran; decided by alpha
///
/// Serialized flattened into [`AttributionResult`], so the JSON carries
/// exactly one of `markov_result`, `shapley_result` or `hybrid_result`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ModelOutput {
    #[serde(rename = "markov_result")]
    Markov(MarkovResult),
    #[serde(rename = "shapley_result")]
    Shapley(ShapleyResult),
    #[serde(rename = "hybrid_result")]
    Hybrid(HybridResult),
}

impl ModelOutput {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Markov(_) => "markov",
            Self::Shapley(_) => "shapley",
            Self::Hybrid(_) => "hybrid",
        }
    }

    /// Final per-channel credit of whichever model ran
    pub fn attributions(&self) -> &BTreeMap<String, f64> {
        match self {
            Self::Markov(r) => &r.channel_attributions,
            Self::Shapley(r) => &r.channel_values,
            Self::Hybrid(r) => &r.channel_attributions,
        }
    }

    /// Per-channel bounds, `None` for Shapley or when none were computed
    pub fn confidence_intervals(&self) -> Option<&BTreeMap<String, ConfidenceBounds>> {
        let intervals = match self {
            Self::Markov(r) => &r.confidence_interval,
            Self::Shapley(_) => return None,
            Self::Hybrid(r) => &r.confidence_intervals,
        };
        (!intervals.is_empty()).then_some(intervals)
    }
}

/// Everything one analysis produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionResult {
    #[serde(flatten)]
    pub model: ModelOutput,
    pub channel_metrics: Vec<ChannelMetrics>,
    /// Journeys containing each channel
    pub channels_summary: BTreeMap<String, usize>,
    pub total_journeys: usize,
    pub total_conversions: usize,
    pub unique_channels: usize,
    pub processing_time_ms: f64,
    pub interpretation: String,
}

/// Runs attribution analyses with one configuration
#[derive(Debug, Clone, Default)]
pub struct AttributionEngine {
    config: EngineConfig,
}

impl AttributionEngine {
    /// Fails when the configuration is out of range
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Default options for this engine's configuration
    pub fn options(&self) -> AnalysisOptions {
        AnalysisOptions::from_config(&self.config)
    }

    /// Attribute conversions across channels
    ///
    /// `alpha == 0` runs Markov only, `alpha == 1` Shapley only, anything in
    /// between the hybrid blend. Alpha outside `[0, 1]` is rejected before any
    /// work starts.
    #[instrument(
        name = "engine::run_analysis",
        skip(self, journeys, options),
        fields(journeys = journeys.len(), alpha = options.alpha)
    )]
    pub fn run_analysis(
        &self,
        journeys: &[Journey],
        options: &AnalysisOptions,
    ) -> Result<AttributionResult> {
        let start = Instant::now();
        validate_alpha(options.alpha)?;
        journey::validate_journeys(journeys, self.config.journey_validation)?;

        let filter: Option<HashSet<&str>> = options
            .filter_channels
            .as_ref()
            .filter(|f| !f.is_empty())
            .map(|f| f.iter().map(String::as_str).collect());

        let kept: Cow<'_, [Journey]> = match &filter {
            Some(set) => Cow::Owned(
                journeys
                    .iter()
                    .filter(|j| j.touches_any(set))
                    .cloned()
                    .collect(),
            ),
            None => Cow::Borrowed(journeys),
        };
        let filtered: &[Journey] = &kept;

        let seed = options
            .seed
            .or(self.config.seed)
            .unwrap_or_else(rand::random::<u64>);
        let mut rng = StdRng::seed_from_u64(seed);

        let model = if options.alpha == 0.0 {
            ModelOutput::Markov(MarkovModel::new(filtered).result(options.include_uncertainty))
        } else if options.alpha == 1.0 {
            ModelOutput::Shapley(
                ShapleyModel::new(filtered, self.config.max_iterations, &mut rng)?.result(),
            )
        } else {
            let hybrid = HybridModel::new(
                filtered,
                options.alpha,
                self.config.max_iterations,
                self.config.uncertainty.clone(),
            )?;
            ModelOutput::Hybrid(hybrid.result(options.include_uncertainty, &mut rng)?)
        };

        let mut channels: BTreeSet<String> = journey::channel_universe(filtered);
        if let Some(set) = &filter {
            channels.retain(|c| set.contains(c.as_str()));
        }

        let mut channel_metrics = metrics::channel_metrics(filtered, &channels);
        fill_model_credit(&mut channel_metrics, &model);

        let channels_summary = channel_metrics
            .iter()
            .map(|m| (m.channel.clone(), m.touchpoint_count))
            .collect();
        let total_conversions = journey::count_conversions(filtered);
        let processing_time_ms = start.elapsed().as_secs_f64() * 1000.0;

        info!(
            model = model.name(),
            journeys = filtered.len(),
            conversions = total_conversions,
            channels = channels.len(),
            elapsed_ms = processing_time_ms,
            "attribution analysis complete"
        );

        Ok(AttributionResult {
            model,
            channel_metrics,
            channels_summary,
            total_journeys: filtered.len(),
            total_conversions,
            unique_channels: channels.len(),
            processing_time_ms,
            interpretation: INTERPRETATION_NOTE.to_string(),
        })
    }
}

/// Copy each model's credit onto the matching channel metrics
fn fill_model_credit(metrics: &mut [ChannelMetrics], model: &ModelOutput) {
    for m in metrics.iter_mut() {
        let channel = m.channel.as_str();
        match model {
            ModelOutput::Markov(r) => {
                m.markov_contribution = r.channel_attributions.get(channel).copied().unwrap_or(0.0);
                if let Some(bounds) = r.confidence_interval.get(channel) {
                    m.markov_confidence_low = bounds.low;
                    m.markov_confidence_high = bounds.high;
                }
            }
            ModelOutput::Shapley(r) => {
                m.shapley_value = r.channel_values.get(channel).copied().unwrap_or(0.0);
            }
            ModelOutput::Hybrid(r) => {
                m.markov_contribution = r.markov_shares.get(channel).copied().unwrap_or(0.0);
                m.shapley_value = r.shapley_shares.get(channel).copied().unwrap_or(0.0);
                m.hybrid_weighted = r.channel_attributions.get(channel).copied().unwrap_or(0.0);
            }
        }
    }
}

/// One-shot analysis with the default configuration
pub fn run_analysis(
    journeys: &[Journey],
    alpha: f64,
    include_uncertainty: bool,
    filter_channels: Option<Vec<String>>,
) -> Result<AttributionResult> {
    let options = AnalysisOptions {
        alpha,
        include_uncertainty,
        filter_channels,
        seed: None,
    };
    AttributionEngine::default().run_analysis(journeys, &options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AttributionError;
    use crate::journey::ValidationMode;
    use crate::shares::is_distribution;

    fn journeys() -> Vec<Journey> {
        vec![
            Journey::from_channels("1", &["A", "B", "C"], true),
            Journey::from_channels("2", &["B", "C"], false),
            Journey::from_channels("3", &["A"], true),
            Journey::from_channels("4", &["C"], false),
            Journey::from_channels("5", &["B", "A"], true),
        ]
    }

    fn engine() -> AttributionEngine {
        AttributionEngine::new(EngineConfig {
            seed: Some(42),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_alpha_selects_model() {
        let journeys = journeys();
        let engine = engine();

        let markov = engine
            .run_analysis(&journeys, &engine.options().with_alpha(0.0))
            .unwrap();
        assert!(matches!(markov.model, ModelOutput::Markov(_)));

        let shapley = engine
            .run_analysis(&journeys, &engine.options().with_alpha(1.0))
            .unwrap();
        assert!(matches!(shapley.model, ModelOutput::Shapley(_)));

        let hybrid = engine
            .run_analysis(
                &journeys,
                &engine.options().with_alpha(0.5).without_uncertainty(),
            )
            .unwrap();
        assert!(matches!(hybrid.model, ModelOutput::Hybrid(_)));
        assert!(is_distribution(hybrid.model.attributions()));
    }

    #[test]
    fn test_alpha_out_of_range_is_rejected() {
        let engine = engine();
        for alpha in [-0.5, 1.5, f64::NAN] {
            let err = engine
                .run_analysis(&journeys(), &engine.options().with_alpha(alpha))
                .unwrap_err();
            assert!(matches!(err, AttributionError::InvalidAlpha(_)));
        }
    }

    #[test]
    fn test_invalid_config_rejected_up_front() {
        let err = AttributionEngine::new(EngineConfig {
            max_iterations: 0,
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, AttributionError::InvalidConfig(_)));
    }

    #[test]
    fn test_empty_journeys() {
        let result = engine()
            .run_analysis(&[], &AnalysisOptions::default().with_alpha(0.0))
            .unwrap();
        assert_eq!(result.total_journeys, 0);
        assert_eq!(result.total_conversions, 0);
        assert_eq!(result.unique_channels, 0);
        assert!(result.model.attributions().is_empty());
        assert!(result.channel_metrics.is_empty());
    }

    #[test]
    fn test_filter_restricts_journeys_and_channels() {
        let journeys = journeys();
        let engine = engine();
        let options = engine
            .options()
            .with_alpha(0.0)
            .with_filter(vec!["A".to_string()]);
        let result = engine.run_analysis(&journeys, &options).unwrap();

        // journeys 1, 3 and 5 touch A
        assert_eq!(result.total_journeys, 3);
        assert_eq!(result.unique_channels, 1);
        assert_eq!(result.channels_summary.len(), 1);
        assert_eq!(result.channels_summary["A"], 3);
        assert_eq!(result.channel_metrics.len(), 1);
    }

    #[test]
    fn test_empty_filter_means_no_filter() {
        let journeys = journeys();
        let engine = engine();
        let options = engine.options().with_alpha(0.0).with_filter(Vec::new());
        let result = engine.run_analysis(&journeys, &options).unwrap();
        assert_eq!(result.total_journeys, 5);
        assert_eq!(result.unique_channels, 3);
    }

    #[test]
    fn test_metrics_carry_model_credit() {
        let journeys = journeys();
        let engine = engine();
        let result = engine
            .run_analysis(&journeys, &engine.options().with_alpha(0.0))
            .unwrap();
        let ModelOutput::Markov(markov) = &result.model else {
            panic!("expected markov output");
        };
        for m in &result.channel_metrics {
            assert_eq!(m.markov_contribution, markov.channel_attributions[&m.channel]);
            assert!(m.markov_confidence_high >= m.markov_confidence_low);
            assert_eq!(m.shapley_value, 0.0);
        }

        let result = engine
            .run_analysis(
                &journeys,
                &engine.options().with_alpha(0.4).without_uncertainty(),
            )
            .unwrap();
        let ModelOutput::Hybrid(hybrid) = &result.model else {
            panic!("expected hybrid output");
        };
        for m in &result.channel_metrics {
            assert_eq!(m.hybrid_weighted, hybrid.channel_attributions[&m.channel]);
            assert_eq!(m.shapley_value, hybrid.shapley_shares[&m.channel]);
        }
    }

    #[test]
    fn test_fixed_seed_is_reproducible() {
        let journeys = journeys();
        let engine = engine();
        let options = engine.options().with_alpha(1.0);
        let first = engine.run_analysis(&journeys, &options).unwrap();
        let second = engine.run_analysis(&journeys, &options).unwrap();
        assert_eq!(first.model, second.model);
    }

    #[test]
    fn test_confidence_intervals_accessor() {
        let journeys = journeys();
        let engine = engine();

        let markov = engine
            .run_analysis(&journeys, &engine.options().with_alpha(0.0))
            .unwrap();
        assert_eq!(markov.model.confidence_intervals().map(|c| c.len()), Some(3));

        let shapley = engine
            .run_analysis(&journeys, &engine.options().with_alpha(1.0))
            .unwrap();
        assert!(shapley.model.confidence_intervals().is_none());

        let bare = engine
            .run_analysis(&journeys, &engine.options().with_alpha(0.0).without_uncertainty())
            .unwrap();
        assert!(bare.model.confidence_intervals().is_none());
    }

    #[test]
    fn test_reject_mode_propagates_invalid_journey() {
        let engine = AttributionEngine::new(EngineConfig {
            journey_validation: ValidationMode::Reject,
            ..Default::default()
        })
        .unwrap();
        let mut bad = Journey::from_channels("bad", &["A"], true);
        bad.num_touchpoints = 4;
        let err = engine
            .run_analysis(&[bad], &engine.options().with_alpha(0.0))
            .unwrap_err();
        assert!(matches!(err, AttributionError::InvalidJourney { .. }));
    }

    #[test]
    fn test_result_serializes_single_model_key() {
        let journeys = journeys();
        let engine = engine();
        let result = engine
            .run_analysis(
                &journeys,
                &engine.options().with_alpha(0.5).without_uncertainty(),
            )
            .unwrap();
        let json = serde_json::to_value(&result).unwrap();

        assert!(json.get("hybrid_result").is_some());
        assert!(json.get("markov_result").is_none());
        assert!(json.get("shapley_result").is_none());
        assert_eq!(json["total_journeys"], 5);
        assert!(json["interpretation"].as_str().unwrap().contains("not the causal"));
    }

    #[test]
    fn test_free_function_uses_defaults() {
        let result = run_analysis(&journeys(), 0.0, true, None).unwrap();
        assert_eq!(result.total_journeys, 5);
        assert!(is_distribution(result.model.attributions()));
    }
}
