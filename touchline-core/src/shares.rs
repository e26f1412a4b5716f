//! Channel-keyed credit maps

use std::collections::BTreeMap;

use tracing::debug;

/// Credit per channel, ordered by channel name
pub type ChannelShares = BTreeMap<String, f64>;

/// Tolerance used when checking that shares sum to one
pub const SHARE_TOLERANCE: f64 = 1e-6;

/// Equal credit for every channel
pub fn uniform<'a>(channels: impl IntoIterator<Item = &'a String>) -> ChannelShares {
    let channels: Vec<&String> = channels.into_iter().collect();
    if channels.is_empty() {
        return ChannelShares::new();
    }
    let share = 1.0 / channels.len() as f64;
    channels.into_iter().map(|c| (c.clone(), share)).collect()
}

/// Scale raw credit so it sums to one
///
/// Negative entries carry no credit and are treated as zero. When nothing
/// positive remains every channel gets `1/n`.
pub fn normalize_or_uniform(raw: &ChannelShares) -> ChannelShares {
    let total: f64 = raw.values().map(|v| v.max(0.0)).sum();
    if total <= 0.0 || !total.is_finite() {
        if !raw.is_empty() {
            debug!(channels = raw.len(), "no positive credit, falling back to uniform shares");
        }
        return uniform(raw.keys());
    }
    raw.iter()
        .map(|(c, v)| (c.clone(), v.max(0.0) / total))
        .collect()
}

/// Whether `shares` is non-negative and sums to one within [`SHARE_TOLERANCE`]
pub fn is_distribution(shares: &ChannelShares) -> bool {
    let total: f64 = shares.values().sum();
    shares.values().all(|v| *v >= 0.0) && (total - 1.0).abs() < SHARE_TOLERANCE
}
