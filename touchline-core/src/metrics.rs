//! Per-channel descriptive metrics

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::journey::Journey;

/// Descriptive statistics and model credit for one channel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelMetrics {
    pub channel: String,
    pub markov_contribution: f64,
    pub shapley_value: f64,
    pub hybrid_weighted: f64,
    pub markov_confidence_low: f64,
    pub markov_confidence_high: f64,
    /// Journeys containing the channel at least once
    pub touchpoint_count: usize,
    /// Conversion rate among those journeys
    pub conversion_rate: f64,
    /// Mean normalized position of first occurrence, 0 = first touch, 1 = last
    pub avg_position: f64,
}

/// Count, conversion rate and average position for each channel
///
/// Channels with no journey are skipped. Model credit fields are left at
/// zero for the caller to fill in.
pub fn channel_metrics(journeys: &[Journey], channels: &BTreeSet<String>) -> Vec<ChannelMetrics> {
    channels
        .iter()
        .filter_map(|channel| {
            let mut count = 0usize;
            let mut conversions = 0usize;
            let mut position_total = 0.0;

            for journey in journeys {
                if let Some(position) = journey.first_position(channel) {
                    count += 1;
                    position_total += position;
                    if journey.conversion {
                        conversions += 1;
                    }
                }
            }

            if count == 0 {
                return None;
            }

            Some(ChannelMetrics {
                channel: channel.clone(),
                touchpoint_count: count,
                conversion_rate: conversions as f64 / count as f64,
                avg_position: position_total / count as f64,
                ..Default::default()
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channels(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_single_touch_first_position_is_zero() {
        let journeys = vec![
            Journey::from_channels("1", &["Direct"], true),
            Journey::from_channels("2", &["Direct"], false),
        ];
        let metrics = channel_metrics(&journeys, &channels(&["Direct"]));
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].avg_position, 0.0);
        assert_eq!(metrics[0].touchpoint_count, 2);
        assert!((metrics[0].conversion_rate - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_average_position_uses_first_occurrence() {
        let journeys = vec![
            Journey::from_channels("1", &["A", "B", "C"], true),
            Journey::from_channels("2", &["C", "B", "B"], false),
        ];
        let metrics = channel_metrics(&journeys, &channels(&["A", "B", "C"]));
        let by_name = |name: &str| metrics.iter().find(|m| m.channel == name).unwrap();

        assert_eq!(by_name("A").avg_position, 0.0);
        assert!((by_name("B").avg_position - 0.5).abs() < 1e-12);
        // C is last in journey 1 and first in journey 2
        assert!((by_name("C").avg_position - 0.5).abs() < 1e-12);
        assert_eq!(by_name("B").touchpoint_count, 2);
    }

    #[test]
    fn test_unknown_channel_is_skipped() {
        let journeys = vec![Journey::from_channels("1", &["A"], true)];
        let metrics = channel_metrics(&journeys, &channels(&["A", "Z"]));
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].channel, "A");
    }
}
