//! Markov removal-effect attribution
//!
//! Builds a first-order transition table between channels, with a synthetic
//! absorbing `conversion` state after each path's final touch, and credits
//! each channel by how much the conversion rate depends on its presence.
//!
//! The removal effect of channel `c` is
//! `max(0, (baseline - rate_without) / baseline)` where `baseline` is the
//! overall conversion rate and `rate_without` is the share of journeys
//! exposed to `c` that did not convert.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::journey::Journey;
use crate::shares::{self, ChannelShares};
use crate::uncertainty::{ConfidenceBounds, Z_95, binomial_standard_error};

/// Name of the absorbing state every path ends in
pub const CONVERSION_STATE: &str = "conversion";

/// Row-stochastic transition probabilities keyed by from-channel
pub type TransitionMatrix = BTreeMap<String, BTreeMap<String, f64>>;

/// Output of the Markov model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkovResult {
    pub channel_attributions: ChannelShares,
    pub transition_matrix: TransitionMatrix,
    pub removal_effects: ChannelShares,
    pub total_conversions: usize,
    pub confidence_interval: BTreeMap<String, ConfidenceBounds>,
}

/// How many journeys touched a channel and how many of those converted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Exposure {
    journeys: usize,
    conversions: usize,
}

/// Markov chain attribution over one set of journeys
///
/// All counts are gathered in a single pass at construction, so the model
/// never holds on to the journeys themselves.
#[derive(Debug, Clone)]
pub struct MarkovModel {
    channels: BTreeSet<String>,
    exposure: HashMap<String, Exposure>,
    transitions: HashMap<String, HashMap<String, usize>>,
    total_journeys: usize,
    total_conversions: usize,
}

impl MarkovModel {
    pub fn new<'a>(journeys: impl IntoIterator<Item = &'a Journey>) -> Self {
        let mut channels = BTreeSet::new();
        let mut exposure: HashMap<String, Exposure> = HashMap::new();
        let mut transitions: HashMap<String, HashMap<String, usize>> = HashMap::new();
        let mut total_journeys = 0;
        let mut total_conversions = 0;

        for journey in journeys {
            total_journeys += 1;
            if journey.conversion {
                total_conversions += 1;
            }

            let path: Vec<&str> = journey.channels().collect();
            let distinct: BTreeSet<&str> = path.iter().copied().collect();
            for channel in distinct {
                channels.insert(channel.to_string());
                let entry = exposure.entry(channel.to_string()).or_default();
                entry.journeys += 1;
                if journey.conversion {
                    entry.conversions += 1;
                }
            }

            for pair in path.windows(2) {
                *transitions
                    .entry(pair[0].to_string())
                    .or_default()
                    .entry(pair[1].to_string())
                    .or_default() += 1;
            }
            if let Some(last) = path.last() {
                *transitions
                    .entry(last.to_string())
                    .or_default()
                    .entry(CONVERSION_STATE.to_string())
                    .or_default() += 1;
            }
        }

        debug!(
            journeys = total_journeys,
            conversions = total_conversions,
            channels = channels.len(),
            "built markov model"
        );

        Self {
            channels,
            exposure,
            transitions,
            total_journeys,
            total_conversions,
        }
    }

    /// Channel universe, sorted
    pub fn channels(&self) -> &BTreeSet<String> {
        &self.channels
    }

    pub fn total_conversions(&self) -> usize {
        self.total_conversions
    }

    /// Overall conversion rate; zero when there are no journeys
    pub fn baseline_conversion_rate(&self) -> f64 {
        if self.total_journeys == 0 {
            return 0.0;
        }
        self.total_conversions as f64 / self.total_journeys as f64
    }

    /// Normalized transition table, one dense row per channel
    pub fn transition_matrix(&self) -> TransitionMatrix {
        let empty = HashMap::new();
        self.channels
            .iter()
            .map(|from| {
                let counts = self.transitions.get(from).unwrap_or(&empty);
                let total = counts.values().sum::<usize>().max(1) as f64;

                let mut row: BTreeMap<String, f64> = self
                    .channels
                    .iter()
                    .map(|to| {
                        let count = counts.get(to).copied().unwrap_or(0);
                        (to.clone(), count as f64 / total)
                    })
                    .collect();
                let to_conversion = counts.get(CONVERSION_STATE).copied().unwrap_or(0);
                row.insert(CONVERSION_STATE.to_string(), to_conversion as f64 / total);

                (from.clone(), row)
            })
            .collect()
    }

    /// Removal effect per channel, all zero when nothing converted
    pub fn removal_effects(&self) -> ChannelShares {
        let baseline = self.baseline_conversion_rate();

        self.channels
            .iter()
            .map(|channel| {
                let exposure = self.exposure.get(channel).copied().unwrap_or_default();
                let effect = if baseline <= 0.0 || exposure.journeys == 0 {
                    0.0
                } else {
                    let unconverted = exposure.journeys - exposure.conversions;
                    let rate_without = unconverted as f64 / exposure.journeys as f64;
                    ((baseline - rate_without) / baseline).max(0.0)
                };
                (channel.clone(), effect)
            })
            .collect()
    }

    /// Attribution shares and the removal effects they were derived from
    ///
    /// Shares fall back to `1/n` when the total removal effect is zero.
    pub fn attribution(&self) -> (ChannelShares, ChannelShares) {
        if self.total_journeys == 0 {
            return (ChannelShares::new(), ChannelShares::new());
        }
        let removal_effects = self.removal_effects();
        let attributions = shares::normalize_or_uniform(&removal_effects);
        (attributions, removal_effects)
    }

    /// 95% bounds around each channel's share
    ///
    /// Uses the binomial standard error of the baseline rate over the
    /// channel's exposed journeys.
    pub fn confidence_intervals(
        &self,
        attributions: &ChannelShares,
    ) -> BTreeMap<String, ConfidenceBounds> {
        let baseline = self.baseline_conversion_rate();
        self.channels
            .iter()
            .map(|channel| {
                let exposed = self.exposure.get(channel).map_or(0, |e| e.journeys);
                let bounds = if exposed == 0 {
                    ConfidenceBounds::default()
                } else {
                    let share = attributions.get(channel).copied().unwrap_or(0.0);
                    let se = binomial_standard_error(baseline, exposed);
                    ConfidenceBounds::around(share, Z_95 * se)
                };
                (channel.clone(), bounds)
            })
            .collect()
    }

    /// Full model output; intervals are left empty unless requested
    pub fn result(&self, include_uncertainty: bool) -> MarkovResult {
        let (channel_attributions, removal_effects) = self.attribution();
        let confidence_interval = if include_uncertainty {
            self.confidence_intervals(&channel_attributions)
        } else {
            BTreeMap::new()
        };

        MarkovResult {
            transition_matrix: self.transition_matrix(),
            channel_attributions,
            removal_effects,
            total_conversions: self.total_conversions,
            confidence_interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shares::is_distribution;

    fn toy_journeys() -> Vec<Journey> {
        vec![
            Journey::from_channels("1", &["A", "B"], true),
            Journey::from_channels("2", &["B"], false),
            Journey::from_channels("3", &["A", "B"], true),
        ]
    }

    #[test]
    fn test_empty_input() {
        let model = MarkovModel::new(&[]);
        let result = model.result(true);
        assert!(result.channel_attributions.is_empty());
        assert!(result.removal_effects.is_empty());
        assert!(result.transition_matrix.is_empty());
        assert_eq!(result.total_conversions, 0);
        assert_eq!(model.baseline_conversion_rate(), 0.0);
    }

    #[test]
    fn test_toy_removal_effects() {
        let model = MarkovModel::new(&toy_journeys());
        let (attributions, effects) = model.attribution();

        // baseline 2/3; A: every exposed journey converted -> effect 1.0
        // B: 1 of 3 exposed did not convert -> (2/3 - 1/3) / (2/3) = 0.5
        assert!((effects["A"] - 1.0).abs() < 1e-12);
        assert!((effects["B"] - 0.5).abs() < 1e-12);
        assert!((attributions["A"] - 2.0 / 3.0).abs() < 1e-12);
        assert!((attributions["B"] - 1.0 / 3.0).abs() < 1e-12);
        assert!(is_distribution(&attributions));
        for share in attributions.values() {
            assert!((0.0..=1.0).contains(share));
        }
    }

    #[test]
    fn test_transition_rows_are_stochastic() {
        let journeys = vec![
            Journey::from_channels("1", &["A", "B", "C"], true),
            Journey::from_channels("2", &["A", "C"], false),
            Journey::from_channels("3", &["B", "A"], true),
        ];
        let matrix = MarkovModel::new(&journeys).transition_matrix();

        assert_eq!(matrix.len(), 3);
        for row in matrix.values() {
            let total: f64 = row.values().sum();
            assert!((total - 1.0).abs() < 1e-12);
            assert!(row.contains_key(CONVERSION_STATE));
        }
        // A -> B once, A -> C once, A is last once
        assert!((matrix["A"]["B"] - 1.0 / 3.0).abs() < 1e-12);
        assert!((matrix["A"][CONVERSION_STATE] - 1.0 / 3.0).abs() < 1e-12);
        // C only ever ends paths
        assert!((matrix["C"][CONVERSION_STATE] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_final_touch_moves_to_conversion_state_regardless_of_outcome() {
        let journeys = vec![
            Journey::from_channels("1", &["A"], false),
            Journey::from_channels("2", &["A", "B"], false),
        ];
        let matrix = MarkovModel::new(&journeys).transition_matrix();

        // A ends journey 1 and moves to B in journey 2
        assert!((matrix["A"][CONVERSION_STATE] - 0.5).abs() < 1e-12);
        assert!((matrix["A"]["B"] - 0.5).abs() < 1e-12);
        assert!((matrix["B"][CONVERSION_STATE] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_conversions_fall_back_to_uniform() {
        let journeys = vec![
            Journey::from_channels("1", &["A", "B"], false),
            Journey::from_channels("2", &["C"], false),
        ];
        let (attributions, effects) = MarkovModel::new(&journeys).attribution();
        assert!(effects.values().all(|e| *e == 0.0));
        for share in attributions.values() {
            assert!((share - 1.0 / 3.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_confidence_intervals() {
        let model = MarkovModel::new(&toy_journeys());
        let result = model.result(true);
        let baseline: f64 = 2.0 / 3.0;

        let a = result.confidence_interval["A"];
        let se = (baseline * (1.0 - baseline) / 2.0).sqrt();
        assert!((a.high - (2.0 / 3.0 + 1.96 * se)).abs() < 1e-12);
        assert!((a.low - (2.0 / 3.0 - 1.96 * se).max(0.0)).abs() < 1e-12);
        assert!(result.confidence_interval["B"].low >= 0.0);
    }

    #[test]
    fn test_uncertainty_can_be_skipped() {
        let result = MarkovModel::new(&toy_journeys()).result(false);
        assert!(result.confidence_interval.is_empty());
        assert_eq!(result.channel_attributions.len(), 2);
    }

    #[test]
    fn test_empty_paths_count_toward_baseline_only() {
        let journeys = vec![
            Journey::from_channels("1", &["A"], true),
            Journey::from_channels("2", &[], false),
        ];
        let model = MarkovModel::new(&journeys);
        assert!((model.baseline_conversion_rate() - 0.5).abs() < 1e-12);
        assert_eq!(model.channels().len(), 1);
        assert_eq!(model.transition_matrix()["A"][CONVERSION_STATE], 1.0);
    }

    #[test]
    fn test_repeated_channel_counted_once_for_exposure() {
        let journeys = vec![
            Journey::from_channels("1", &["A", "A", "A"], true),
            Journey::from_channels("2", &["A"], false),
        ];
        let (_, effects) = MarkovModel::new(&journeys).attribution();
        // baseline 0.5, rate_without 0.5 -> no effect
        assert_eq!(effects["A"], 0.0);
    }
}
