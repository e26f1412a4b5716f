//! Confidence bounds for attribution shares
//!
//! Two estimators live here: the binomial normal approximation used by the
//! Markov model, and a percentile bootstrap over journey resamples used by
//! the hybrid model.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::journey::Journey;

/// Two-sided 95% normal quantile
pub const Z_95: f64 = 1.96;

/// Interval around a channel's share
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBounds {
    pub low: f64,
    pub high: f64,
}

impl ConfidenceBounds {
    /// Interval of half-width `half_width` around `center`, floored at zero
    pub fn around(center: f64, half_width: f64) -> Self {
        Self {
            low: (center - half_width).max(0.0),
            high: (center + half_width).max(0.0),
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.low <= value && value <= self.high
    }

    pub fn width(&self) -> f64 {
        self.high - self.low
    }
}

/// Binomial standard error `sqrt(p(1-p)/n)`; zero when `n` is zero
pub fn binomial_standard_error(p: f64, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    (p * (1.0 - p) / n as f64).max(0.0).sqrt()
}

/// Linear-interpolated percentile of an ascending slice, `q` in `[0, 1]`
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let frac = rank - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * frac
        }
    }
}

/// Draw `journeys.len()` journeys with replacement
pub fn resample<'a, R: Rng + ?Sized>(journeys: &'a [Journey], rng: &mut R) -> Vec<&'a Journey> {
    if journeys.is_empty() {
        return Vec::new();
    }
    (0..journeys.len())
        .map(|_| &journeys[rng.gen_range(0..journeys.len())])
        .collect()
}

/// Collects per-channel bootstrap replicates and turns them into intervals
#[derive(Debug, Default)]
pub struct BootstrapAccumulator {
    replicates: BTreeMap<String, Vec<f64>>,
}

impl BootstrapAccumulator {
    /// Track the given channels; channels absent from a replicate count as zero
    pub fn new<'a>(channels: impl IntoIterator<Item = &'a String>) -> Self {
        Self {
            replicates: channels.into_iter().map(|c| (c.clone(), Vec::new())).collect(),
        }
    }

    pub fn record(&mut self, shares: &BTreeMap<String, f64>) {
        for (channel, values) in self.replicates.iter_mut() {
            values.push(shares.get(channel).copied().unwrap_or(0.0));
        }
    }

    pub fn replicate_count(&self) -> usize {
        self.replicates.values().next().map_or(0, Vec::len)
    }

    /// Percentile intervals at two-sided coverage `level`
    pub fn intervals(mut self, level: f64) -> BTreeMap<String, ConfidenceBounds> {
        let tail = (1.0 - level) / 2.0;
        self.replicates
            .iter_mut()
            .map(|(channel, values)| {
                values.sort_by(f64::total_cmp);
                let bounds = ConfidenceBounds {
                    low: percentile(values, tail).max(0.0),
                    high: percentile(values, 1.0 - tail).max(0.0),
                };
                (channel.clone(), bounds)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_around_clips_lower_bound() {
        let bounds = ConfidenceBounds::around(0.1, 0.3);
        assert_eq!(bounds.low, 0.0);
        assert!((bounds.high - 0.4).abs() < 1e-12);
        assert!(bounds.contains(0.2));
        assert!(!bounds.contains(0.5));
    }

    #[test]
    fn test_binomial_standard_error() {
        // sqrt(0.5 * 0.5 / 25) = 0.1
        assert!((binomial_standard_error(0.5, 25) - 0.1).abs() < 1e-12);
        assert_eq!(binomial_standard_error(0.5, 0), 0.0);
        assert_eq!(binomial_standard_error(0.0, 10), 0.0);
    }

    #[test]
    fn test_percentile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&sorted, 0.0), 1.0);
        assert_eq!(percentile(&sorted, 0.5), 3.0);
        assert_eq!(percentile(&sorted, 1.0), 5.0);
        assert!((percentile(&sorted, 0.125) - 1.5).abs() < 1e-12);
        assert_eq!(percentile(&[], 0.5), 0.0);
    }

    #[test]
    fn test_resample_keeps_size() {
        let journeys: Vec<Journey> = (0..10)
            .map(|i| Journey::from_channels(format!("j{}", i), &["A"], i % 2 == 0))
            .collect();
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(resample(&journeys, &mut rng).len(), 10);
        assert!(resample(&[], &mut rng).is_empty());
    }

    #[test]
    fn test_accumulator_intervals() {
        let channels = vec!["A".to_string(), "B".to_string()];
        let mut acc = BootstrapAccumulator::new(&channels);
        for i in 0..=100 {
            let mut shares = BTreeMap::new();
            shares.insert("A".to_string(), i as f64 / 100.0);
            acc.record(&shares);
        }
        assert_eq!(acc.replicate_count(), 101);

        let intervals = acc.intervals(0.9);
        assert!((intervals["A"].low - 0.05).abs() < 1e-9);
        assert!((intervals["A"].high - 0.95).abs() < 1e-9);
        assert_eq!(intervals["B"], ConfidenceBounds::default());
    }
}
