//! Journey and touchpoint value objects
//!
//! Journeys are owned by the caller and only ever read by the engine. The
//! channel universe is not stored anywhere: every model derives it from the
//! journeys it was handed.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{AttributionError, Result};

/// A single marketing interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TouchPoint {
    pub channel: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub context: Option<String>,
}

impl TouchPoint {
    pub fn new(channel: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            channel: channel.into(),
            timestamp,
            context: None,
        }
    }
}

/// One customer's ordered path through the funnel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Journey {
    pub journey_id: String,
    pub path: Vec<TouchPoint>,
    pub conversion: bool,
    #[serde(default)]
    pub conversion_value: f64,
    pub num_touchpoints: usize,
    pub duration_hours: f64,
}

impl Journey {
    /// Build a journey from channel names, one touchpoint per hour from the epoch
    pub fn from_channels(id: impl Into<String>, channels: &[&str], conversion: bool) -> Self {
        Self::from_channels_at(id, channels, conversion, DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Build a journey from channel names, one touchpoint per hour from `start`
    pub fn from_channels_at(
        id: impl Into<String>,
        channels: &[&str],
        conversion: bool,
        start: DateTime<Utc>,
    ) -> Self {
        let path: Vec<TouchPoint> = channels
            .iter()
            .enumerate()
            .map(|(i, c)| TouchPoint::new(*c, start + Duration::hours(i as i64)))
            .collect();
        let duration_hours = path.len().saturating_sub(1) as f64;
        Self {
            journey_id: id.into(),
            num_touchpoints: path.len(),
            path,
            conversion,
            conversion_value: if conversion { 1.0 } else { 0.0 },
            duration_hours,
        }
    }

    /// Channel names in path order (repeats included)
    pub fn channels(&self) -> impl Iterator<Item = &str> {
        self.path.iter().map(|tp| tp.channel.as_str())
    }

    pub fn contains_channel(&self, channel: &str) -> bool {
        self.channels().any(|c| c == channel)
    }

    pub fn touches_any(&self, filter: &HashSet<&str>) -> bool {
        self.channels().any(|c| filter.contains(c))
    }

    /// Normalized position of the first occurrence of `channel`
    ///
    /// 0.0 is first touch, 1.0 is last touch. Single-touch paths always
    /// report 0.0 because the denominator is floored at 1.
    pub fn first_position(&self, channel: &str) -> Option<f64> {
        let idx = self.channels().position(|c| c == channel)?;
        let span = self.path.len().saturating_sub(1).max(1);
        Some(idx as f64 / span as f64)
    }

    /// Problems with the redundant fields of this journey
    pub fn issues(&self) -> Vec<JourneyIssue> {
        let mut issues = Vec::new();

        if self.path.is_empty() {
            issues.push(JourneyIssue::EmptyPath);
        }
        if self.num_touchpoints != self.path.len() {
            issues.push(JourneyIssue::TouchpointCountMismatch {
                declared: self.num_touchpoints,
                actual: self.path.len(),
            });
        }
        if self.conversion_value < 0.0 || self.conversion_value.is_nan() {
            issues.push(JourneyIssue::NegativeConversionValue(self.conversion_value));
        }
        if self.duration_hours < 0.0 || self.duration_hours.is_nan() {
            issues.push(JourneyIssue::NegativeDuration(self.duration_hours));
        }
        if let Some(idx) = self
            .path
            .windows(2)
            .position(|w| w[1].timestamp < w[0].timestamp)
        {
            issues.push(JourneyIssue::OutOfOrder { index: idx + 1 });
        }

        issues
    }
}

/// A consistency problem found on an input journey
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JourneyIssue {
    /// No touchpoints; tolerated, contributes nothing to transitions or coalitions
    EmptyPath,
    TouchpointCountMismatch { declared: usize, actual: usize },
    NegativeConversionValue(f64),
    NegativeDuration(f64),
    /// Touchpoint at `index` is earlier than its predecessor
    OutOfOrder { index: usize },
    DuplicateId,
}

impl JourneyIssue {
    /// Whether `Reject` mode should refuse the journey
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::EmptyPath)
    }
}

impl std::fmt::Display for JourneyIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyPath => write!(f, "path is empty"),
            Self::TouchpointCountMismatch { declared, actual } => {
                write!(f, "num_touchpoints is {} but path has {}", declared, actual)
            }
            Self::NegativeConversionValue(v) => write!(f, "conversion_value {} is negative", v),
            Self::NegativeDuration(v) => write!(f, "duration_hours {} is negative", v),
            Self::OutOfOrder { index } => {
                write!(f, "touchpoint {} is earlier than the one before it", index)
            }
            Self::DuplicateId => write!(f, "journey_id appears more than once"),
        }
    }
}

/// How strictly redundant journey fields are checked
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// Trust the input, no checks
    Ignore,
    /// Log each issue and continue
    #[default]
    Warn,
    /// Fail on the first fatal issue
    Reject,
}

/// Check a batch of journeys according to `mode`
///
/// Returns every issue found as `(journey_id, issue)` pairs. Redundant
/// fields are never used in computation whichever mode is chosen.
pub fn validate_journeys(
    journeys: &[Journey],
    mode: ValidationMode,
) -> Result<Vec<(String, JourneyIssue)>> {
    if mode == ValidationMode::Ignore {
        return Ok(Vec::new());
    }

    let mut found = Vec::new();
    let mut seen = HashSet::with_capacity(journeys.len());

    for journey in journeys {
        let mut issues = journey.issues();
        if !seen.insert(journey.journey_id.as_str()) {
            issues.push(JourneyIssue::DuplicateId);
        }

        for issue in issues {
            if mode == ValidationMode::Reject && issue.is_fatal() {
                return Err(AttributionError::InvalidJourney {
                    journey_id: journey.journey_id.clone(),
                    reason: issue.to_string(),
                });
            }
            if issue.is_fatal() {
                warn!(journey_id = %journey.journey_id, "{}", issue);
            }
            found.push((journey.journey_id.clone(), issue));
        }
    }

    Ok(found)
}

/// Distinct channels across all journeys, sorted
pub fn channel_universe(journeys: &[Journey]) -> BTreeSet<String> {
    journeys
        .iter()
        .flat_map(|j| j.path.iter().map(|tp| tp.channel.clone()))
        .collect()
}

/// Number of converting journeys
pub fn count_conversions(journeys: &[Journey]) -> usize {
    journeys.iter().filter(|j| j.conversion).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_channels_fills_redundant_fields() {
        let journey = Journey::from_channels("j1", &["Search", "Email", "Direct"], true);
        assert_eq!(journey.num_touchpoints, 3);
        assert!((journey.duration_hours - 2.0).abs() < f64::EPSILON);
        assert!((journey.conversion_value - 1.0).abs() < f64::EPSILON);
        assert!(journey.issues().is_empty());
    }

    #[test]
    fn test_first_position() {
        let journey = Journey::from_channels("j1", &["A", "B", "A", "C"], false);
        assert_eq!(journey.first_position("A"), Some(0.0));
        assert!((journey.first_position("B").unwrap() - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(journey.first_position("C"), Some(1.0));
        assert_eq!(journey.first_position("Z"), None);
    }

    #[test]
    fn test_first_position_single_touch() {
        let journey = Journey::from_channels("j1", &["A"], true);
        assert_eq!(journey.first_position("A"), Some(0.0));
    }

    #[test]
    fn test_issues_detects_mismatch_and_order() {
        let mut journey = Journey::from_channels("j1", &["A", "B"], true);
        journey.num_touchpoints = 5;
        journey.path.swap(0, 1);
        journey.path[0].timestamp = journey.path[1].timestamp + Duration::hours(1);

        let issues = journey.issues();
        assert!(issues.contains(&JourneyIssue::TouchpointCountMismatch {
            declared: 5,
            actual: 2
        }));
        assert!(issues.contains(&JourneyIssue::OutOfOrder { index: 1 }));
    }

    #[test]
    fn test_empty_path_is_tolerated_in_reject_mode() {
        let journeys = vec![Journey::from_channels("empty", &[], false)];
        let issues = validate_journeys(&journeys, ValidationMode::Reject).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].1, JourneyIssue::EmptyPath);
    }

    #[test]
    fn test_reject_mode_fails_on_duplicate_id() {
        let journeys = vec![
            Journey::from_channels("same", &["A"], true),
            Journey::from_channels("same", &["B"], false),
        ];
        let err = validate_journeys(&journeys, ValidationMode::Reject).unwrap_err();
        assert!(matches!(err, AttributionError::InvalidJourney { .. }));
    }

    #[test]
    fn test_warn_mode_collects_issues() {
        let mut bad = Journey::from_channels("bad", &["A"], true);
        bad.duration_hours = -1.0;
        let journeys = vec![bad, Journey::from_channels("good", &["B"], false)];

        let issues = validate_journeys(&journeys, ValidationMode::Warn).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].0, "bad");
    }

    #[test]
    fn test_ignore_mode_skips_checks() {
        let mut bad = Journey::from_channels("bad", &["A"], true);
        bad.num_touchpoints = 9;
        let issues = validate_journeys(&[bad], ValidationMode::Ignore).unwrap();
        assert!(issues.is_empty());
    }

    #[test]
    fn test_channel_universe_is_sorted_and_distinct() {
        let journeys = vec![
            Journey::from_channels("1", &["Search", "Email"], true),
            Journey::from_channels("2", &["Email", "Direct"], false),
        ];
        let channels: Vec<_> = channel_universe(&journeys).into_iter().collect();
        assert_eq!(channels, vec!["Direct", "Email", "Search"]);
        assert_eq!(count_conversions(&journeys), 1);
    }

    #[test]
    fn test_journey_deserializes_without_optional_fields() {
        let json = r#"{
            "journey_id": "j1",
            "path": [{"channel": "Search", "timestamp": "2024-01-01T00:00:00Z"}],
            "conversion": true,
            "num_touchpoints": 1,
            "duration_hours": 0.0
        }"#;
        let journey: Journey = serde_json::from_str(json).unwrap();
        assert_eq!(journey.path[0].context, None);
        assert_eq!(journey.conversion_value, 0.0);
    }
}
