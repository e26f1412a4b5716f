//! Validation against known channel effects
//!
//! Measures how well an attribution recovers ground-truth contributions
//! (from simulation or experiments). This checks contribution accuracy; it
//! does not turn attribution into a causal estimate.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::baselines::Baseline;
use crate::error::{AttributionError, Result};
use crate::journey::Journey;
use crate::shares::ChannelShares;
use crate::uncertainty::ConfidenceBounds;

/// Truth values at or below this are left out of the magnitude error
const NONZERO_TRUTH: f64 = 1e-10;

/// Name under which the model's own comparison is reported
pub const MODEL_KEY: &str = "markov_shapley";

/// How closely an attribution matches ground truth
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Spearman rho over shared channels; `None` when either side is constant
    pub rank_correlation: Option<f64>,
    /// Mean absolute percentage error over channels with non-zero truth
    pub magnitude_error: Option<f64>,
    pub top_channel_match: bool,
    /// Fraction of the top-k channels (k = min(3, n)) both sides agree on
    pub top_k_overlap: f64,
    /// `1 - |expected - observed coverage|`; `None` without intervals
    pub confidence_calibration: Option<f64>,
}

/// Compare a model's shares with true effects
///
/// `expected_coverage` is the nominal level of `intervals`.
pub fn compare_to_ground_truth(
    model: &ChannelShares,
    truth: &ChannelShares,
    intervals: Option<&BTreeMap<String, ConfidenceBounds>>,
    expected_coverage: f64,
) -> Result<ValidationResult> {
    let channels: Vec<&String> = model.keys().filter(|c| truth.contains_key(*c)).collect();
    if channels.len() < 2 {
        return Err(AttributionError::InsufficientOverlap {
            found: channels.len(),
        });
    }

    let predicted: Vec<f64> = channels.iter().map(|c| model[*c]).collect();
    let actual: Vec<f64> = channels.iter().map(|c| truth[*c]).collect();

    let rank_correlation = spearman(&predicted, &actual);

    let errors: Vec<f64> = predicted
        .iter()
        .zip(&actual)
        .filter(|(_, t)| **t > NONZERO_TRUTH)
        .map(|(p, t)| (p - t).abs() / t)
        .collect();
    let magnitude_error =
        (!errors.is_empty()).then(|| errors.iter().sum::<f64>() / errors.len() as f64);

    let top_channel_match = argmax(&predicted) == argmax(&actual);

    let k = channels.len().min(3);
    let predicted_top = top_k(&predicted, k);
    let actual_top = top_k(&actual, k);
    let shared = predicted_top.iter().filter(|i| actual_top.contains(i)).count();
    let top_k_overlap = shared as f64 / k as f64;

    let confidence_calibration = intervals.and_then(|intervals| {
        let (covered, total) = channels
            .iter()
            .filter_map(|c| intervals.get(*c).map(|b| b.contains(truth[*c])))
            .fold((0usize, 0usize), |(hit, n), inside| {
                (hit + usize::from(inside), n + 1)
            });
        (total > 0).then(|| 1.0 - (expected_coverage - covered as f64 / total as f64).abs())
    });

    Ok(ValidationResult {
        rank_correlation,
        magnitude_error,
        top_channel_match,
        top_k_overlap,
        confidence_calibration,
    })
}

/// Compare the model and each baseline against the same ground truth
///
/// A baseline that credits fewer than two shared channels is skipped with a
/// warning; the model's own comparison failing is an error.
pub fn compare_against_baselines(
    model: &ChannelShares,
    journeys: &[Journey],
    truth: &ChannelShares,
    baselines: &[Baseline],
) -> Result<BTreeMap<String, ValidationResult>> {
    let mut results = BTreeMap::new();
    results.insert(
        MODEL_KEY.to_string(),
        compare_to_ground_truth(model, truth, None, 0.0)?,
    );

    for baseline in baselines {
        let shares = baseline.attribute(journeys);
        match compare_to_ground_truth(&shares, truth, None, 0.0) {
            Ok(result) => {
                results.insert(baseline.name().to_string(), result);
            }
            Err(err) => warn!(baseline = baseline.name(), "skipping baseline: {}", err),
        }
    }

    Ok(results)
}

/// Ranks starting at 1, ties sharing their average rank
fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|a, b| values[*a].total_cmp(&values[*b]));

    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for idx in &order[i..=j] {
            ranks[*idx] = rank;
        }
        i = j + 1;
    }
    ranks
}

fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;
    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        cov += (a - mean_x) * (b - mean_y);
        var_x += (a - mean_x).powi(2);
        var_y += (b - mean_y).powi(2);
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}

/// Spearman rank correlation
pub fn spearman(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    pearson(&average_ranks(x), &average_ranks(y))
}

fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
}

fn top_k(values: &[f64], k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|a, b| values[*b].total_cmp(&values[*a]));
    order.truncate(k);
    order
}

/// Model and baseline comparisons rendered as a text report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub model: ValidationResult,
    pub comparisons: BTreeMap<String, ValidationResult>,
}

impl ValidationReport {
    /// Build the full report for a model, its intervals and the baselines
    pub fn build(
        model: &ChannelShares,
        intervals: Option<&BTreeMap<String, ConfidenceBounds>>,
        expected_coverage: f64,
        journeys: &[Journey],
        truth: &ChannelShares,
        baselines: &[Baseline],
    ) -> Result<Self> {
        Ok(Self {
            model: compare_to_ground_truth(model, truth, intervals, expected_coverage)?,
            comparisons: compare_against_baselines(model, journeys, truth, baselines)?,
        })
    }

    /// Whether the model's rank correlation beats every baseline's
    pub fn outperforms_baselines(&self) -> bool {
        let Some(ours) = self.model.rank_correlation else {
            return false;
        };
        self.comparisons
            .iter()
            .filter(|(name, _)| name.as_str() != MODEL_KEY)
            .all(|(_, r)| r.rank_correlation.is_none_or(|theirs| ours > theirs))
    }
}

fn fmt_opt(value: Option<f64>, percent: bool) -> String {
    match (value, percent) {
        (Some(v), true) => format!("{:.1}%", v * 100.0),
        (Some(v), false) => format!("{:.3}", v),
        (None, _) => "n/a".to_string(),
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(60);
        let line = "-".repeat(54);
        writeln!(f, "{}", rule)?;
        writeln!(f, "ATTRIBUTION MODEL VALIDATION REPORT")?;
        writeln!(f, "{}", rule)?;
        writeln!(f)?;

        writeln!(f, "## Model performance")?;
        writeln!(
            f,
            "  Rank correlation (Spearman):  {}",
            fmt_opt(self.model.rank_correlation, false)
        )?;
        writeln!(
            f,
            "  Magnitude error (MAPE):       {}",
            fmt_opt(self.model.magnitude_error, true)
        )?;
        writeln!(
            f,
            "  Top channel match:            {}",
            if self.model.top_channel_match { "yes" } else { "no" }
        )?;
        writeln!(
            f,
            "  Top-k overlap:                {:.0}%",
            self.model.top_k_overlap * 100.0
        )?;
        if let Some(calibration) = self.model.confidence_calibration {
            writeln!(f, "  CI calibration:               {:.3}", calibration)?;
        }
        writeln!(f)?;

        writeln!(f, "## Comparison vs baselines")?;
        writeln!(f, "{}", line)?;
        writeln!(
            f,
            "{:<20} {:>10} {:>10} {:>10}",
            "Model", "Rank corr", "MAPE", "Top match"
        )?;
        writeln!(f, "{}", line)?;
        for (name, result) in &self.comparisons {
            writeln!(
                f,
                "{:<20} {:>10} {:>10} {:>10}",
                name,
                fmt_opt(result.rank_correlation, false),
                fmt_opt(result.magnitude_error, true),
                if result.top_channel_match { "yes" } else { "no" }
            )?;
        }
        writeln!(f, "{}", line)?;
        writeln!(f)?;

        writeln!(f, "## Interpretation")?;
        if self.outperforms_baselines() {
            writeln!(f, "  + Model outperforms every baseline on rank correlation")?;
        } else {
            writeln!(f, "  ! Model does not outperform all baselines on this dataset")?;
        }
        if self.model.top_channel_match {
            writeln!(f, "  + Model identifies the top contributing channel")?;
        } else {
            writeln!(f, "  ! Model does not identify the top contributing channel")?;
        }
        writeln!(f)?;

        writeln!(f, "## Caveats")?;
        writeln!(f, "  - This measures contribution accuracy, not causation")?;
        writeln!(f, "  - True causal effects require randomized experiments")
    }
}
