//! Shapley value attribution by permutation sampling
//!
//! The cooperative game: the value `v(S)` of a channel coalition `S` is the
//! conversion rate among journeys whose whole path lies inside `S`. A
//! channel's Shapley value is its marginal contribution `v(S ∪ {i}) - v(S)`
//! averaged over orderings of the channel set. Exact enumeration needs `n!`
//! orderings, so `min(max_iterations, 2^n)` random permutations are sampled
//! instead.

use std::collections::{BTreeMap, HashMap};

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AttributionError, Result};
use crate::journey::Journey;
use crate::shares::{self, ChannelShares};

/// A channel's normalized value and its percentage of the total
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarginalContribution {
    pub value: f64,
    pub percentage: f64,
}

/// Output of the Shapley model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapleyResult {
    /// Normalized values, summing to one
    pub channel_values: ChannelShares,
    /// Mean marginal contributions before clipping and normalization
    pub raw_values: ChannelShares,
    pub marginal_contributions: BTreeMap<String, MarginalContribution>,
    /// Always true: sampling runs a fixed number of permutations
    pub convergence: bool,
    /// Permutations actually sampled
    pub iterations: usize,
}

impl ShapleyResult {
    fn empty() -> Self {
        Self {
            channel_values: ChannelShares::new(),
            raw_values: ChannelShares::new(),
            marginal_contributions: BTreeMap::new(),
            convergence: true,
            iterations: 0,
        }
    }
}

/// Set of channel indices, stored as a bitset
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Coalition {
    words: Vec<u64>,
}

impl Coalition {
    fn empty(channel_count: usize) -> Self {
        Self {
            words: vec![0; channel_count.div_ceil(64)],
        }
    }

    fn insert(&mut self, idx: usize) {
        self.words[idx / 64] |= 1u64 << (idx % 64);
    }

    fn with(&self, idx: usize) -> Self {
        let mut next = self.clone();
        next.insert(idx);
        next
    }

    fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    fn is_subset_of(&self, other: &Coalition) -> bool {
        self.words
            .iter()
            .zip(&other.words)
            .all(|(mine, theirs)| mine & !theirs == 0)
    }
}

/// Shapley attribution over one set of journeys
///
/// Coalition values are memoized for the lifetime of the instance, so each
/// distinct coalition is evaluated at most once. The cache is private to
/// the instance; give each request its own model.
pub struct ShapleyModel<R> {
    channels: Vec<String>,
    /// Channel footprint and outcome of every non-empty journey
    footprints: Vec<(Coalition, bool)>,
    max_iterations: usize,
    rng: R,
    cache: HashMap<Coalition, f64>,
}

impl ShapleyModel<StdRng> {
    /// Model driven by a fixed seed, for reproducible runs
    pub fn seeded<'a>(
        journeys: impl IntoIterator<Item = &'a Journey>,
        max_iterations: usize,
        seed: u64,
    ) -> Result<Self> {
        Self::new(journeys, max_iterations, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> ShapleyModel<R> {
    pub fn new<'a>(
        journeys: impl IntoIterator<Item = &'a Journey>,
        max_iterations: usize,
        rng: R,
    ) -> Result<Self> {
        if max_iterations == 0 {
            return Err(AttributionError::InvalidConfig(
                "max_iterations must be greater than 0".into(),
            ));
        }

        let journeys: Vec<&Journey> = journeys.into_iter().collect();
        let mut channels: Vec<String> = journeys
            .iter()
            .flat_map(|j| j.channels().map(str::to_string))
            .collect();
        channels.sort();
        channels.dedup();

        let index: HashMap<&str, usize> = channels
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();

        let footprints = journeys
            .iter()
            .filter(|j| !j.path.is_empty())
            .map(|j| {
                let mut coalition = Coalition::empty(channels.len());
                for channel in j.channels() {
                    coalition.insert(index[channel]);
                }
                (coalition, j.conversion)
            })
            .collect();

        Ok(Self {
            channels,
            footprints,
            max_iterations,
            rng,
            cache: HashMap::new(),
        })
    }

    /// Channel universe, sorted
    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    /// Number of distinct coalitions evaluated so far
    pub fn coalitions_evaluated(&self) -> usize {
        self.cache.len()
    }

    /// Permutations a full run samples: `min(max_iterations, 2^n)`
    pub fn sample_count(&self) -> usize {
        u32::try_from(self.channels.len())
            .ok()
            .and_then(|n| 1usize.checked_shl(n))
            .map_or(self.max_iterations, |full| full.min(self.max_iterations))
    }

    /// Conversion rate among journeys lying entirely inside `coalition`
    fn coalition_value(&mut self, coalition: &Coalition) -> f64 {
        if coalition.is_empty() {
            return 0.0;
        }
        if let Some(value) = self.cache.get(coalition) {
            return *value;
        }

        let (members, conversions) = self
            .footprints
            .iter()
            .filter(|(footprint, _)| footprint.is_subset_of(coalition))
            .fold((0usize, 0usize), |(n, c), (_, converted)| {
                (n + 1, c + usize::from(*converted))
            });
        let value = if members == 0 {
            0.0
        } else {
            conversions as f64 / members as f64
        };

        self.cache.insert(coalition.clone(), value);
        value
    }

    /// Mean marginal contribution per channel over sampled permutations
    pub fn raw_values(&mut self) -> ChannelShares {
        let n = self.channels.len();
        if n == 0 || self.footprints.is_empty() {
            return ChannelShares::new();
        }

        let samples = self.sample_count();
        let mut totals = vec![0.0; n];
        let mut order: Vec<usize> = (0..n).collect();

        for _ in 0..samples {
            order.shuffle(&mut self.rng);
            let mut coalition = Coalition::empty(n);
            let mut value = 0.0;
            for &idx in &order {
                let next = coalition.with(idx);
                let next_value = self.coalition_value(&next);
                totals[idx] += next_value - value;
                coalition = next;
                value = next_value;
            }
        }

        debug!(
            channels = n,
            samples,
            coalitions = self.cache.len(),
            "sampled shapley permutations"
        );

        // Every permutation visits every channel once.
        self.channels
            .iter()
            .zip(totals)
            .map(|(c, total)| (c.clone(), total / samples as f64))
            .collect()
    }

    /// Shapley values normalized to sum to one, `1/n` when no positive mass
    pub fn values(&mut self) -> ChannelShares {
        shares::normalize_or_uniform(&self.raw_values())
    }

    /// Full model output
    pub fn result(&mut self) -> ShapleyResult {
        let raw_values = self.raw_values();
        if raw_values.is_empty() {
            return ShapleyResult::empty();
        }

        let channel_values = shares::normalize_or_uniform(&raw_values);
        let total: f64 = channel_values.values().sum();
        let marginal_contributions = channel_values
            .iter()
            .map(|(c, value)| {
                let percentage = if total > 0.0 {
                    value / total * 100.0
                } else {
                    0.0
                };
                (
                    c.clone(),
                    MarginalContribution {
                        value: *value,
                        percentage,
                    },
                )
            })
            .collect();

        ShapleyResult {
            channel_values,
            raw_values,
            marginal_contributions,
            convergence: true,
            iterations: self.sample_count(),
        }
    }
}
