//! Rule-based attribution baselines
//!
//! Last-touch, linear and time-decay credit over converting journeys. These
//! exist to benchmark the Markov/Shapley models against, not to replace them.

use serde::{Deserialize, Serialize};

use crate::journey::Journey;
use crate::shares::ChannelShares;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// A heuristic credit rule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Baseline {
    /// All credit to the final touchpoint
    LastTouch,
    /// Equal credit to every touchpoint
    Linear,
    /// Credit halves every `half_life_days` before the final touchpoint
    TimeDecay { half_life_days: f64 },
}

impl Baseline {
    /// The three standard baselines
    pub fn standard(half_life_days: f64) -> [Baseline; 3] {
        [
            Baseline::LastTouch,
            Baseline::Linear,
            Baseline::TimeDecay { half_life_days },
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::LastTouch => "last_touch",
            Self::Linear => "linear",
            Self::TimeDecay { .. } => "time_decay",
        }
    }

    /// Per-channel share of total conversion value
    ///
    /// Journeys with a conversion value of zero count as one unit. Empty
    /// when nothing converted.
    pub fn attribute(&self, journeys: &[Journey]) -> ChannelShares {
        let mut credit = ChannelShares::new();
        let mut total_value = 0.0;

        for journey in journeys.iter().filter(|j| j.conversion && !j.path.is_empty()) {
            let value = if journey.conversion_value > 0.0 {
                journey.conversion_value
            } else {
                1.0
            };

            for (channel, weight) in self.weights(journey) {
                *credit.entry(channel.to_string()).or_default() += value * weight;
            }
            total_value += value;
        }

        if total_value > 0.0 {
            for share in credit.values_mut() {
                *share /= total_value;
            }
        }
        credit
    }

    /// Touchpoint weights for one non-empty journey, summing to one
    fn weights<'j>(&self, journey: &'j Journey) -> Vec<(&'j str, f64)> {
        let path = &journey.path;
        match self {
            Self::LastTouch => path
                .last()
                .map(|tp| vec![(tp.channel.as_str(), 1.0)])
                .unwrap_or_default(),
            Self::Linear => {
                let share = 1.0 / path.len() as f64;
                path.iter().map(|tp| (tp.channel.as_str(), share)).collect()
            }
            Self::TimeDecay { half_life_days } => {
                let Some(latest) = path.iter().map(|tp| tp.timestamp).max() else {
                    return Vec::new();
                };
                let raw: Vec<f64> = path
                    .iter()
                    .map(|tp| {
                        let age_days =
                            (tp.timestamp - latest).num_milliseconds() as f64 / MILLIS_PER_DAY;
                        2f64.powf(age_days / half_life_days)
                    })
                    .collect();
                let total: f64 = raw.iter().sum();
                path.iter()
                    .zip(raw)
                    .map(|(tp, w)| (tp.channel.as_str(), w / total))
                    .collect()
            }
        }
    }
}
