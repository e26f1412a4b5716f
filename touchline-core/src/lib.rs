//! touchline-core - Multi-touch attribution engine
//!
//! Splits credit for conversions across the marketing channels a customer
//! touched before converting. Three models are available:
//!
//! - **Markov** removal effects over a channel transition table
//! - **Shapley** values estimated by Monte-Carlo permutation sampling
//! - **Hybrid** blend `(1 - alpha) * markov + alpha * shapley`
//!
//! Every channel-keyed share map is non-negative and sums to one; degenerate
//! inputs (no journeys, no conversions, no removal mass) resolve to empty or
//! uniform shares instead of errors.
//!
//! Outputs measure contribution to observed conversions. They are
//! associative and must not be reported as causal effects.
//!
//! ```no_run
//! use touchline_core::{AnalysisOptions, AttributionEngine, Journey};
//!
//! let journeys = vec![
//!     Journey::from_channels("j1", &["Search", "Email"], true),
//!     Journey::from_channels("j2", &["Email"], false),
//! ];
//! let engine = AttributionEngine::default();
//! let result = engine
//!     .run_analysis(&journeys, &AnalysisOptions::default().with_seed(7))
//!     .unwrap();
//! println!("{:?}", result.model.attributions());
//! ```

pub mod baselines;
pub mod config;
pub mod engine;
pub mod error;
pub mod hybrid;
pub mod journey;
pub mod markov;
pub mod metrics;
pub mod shapley;
pub mod shares;
pub mod synthetic;
pub mod uncertainty;
pub mod validation;

pub use baselines::Baseline;
pub use config::{
    BaselineConfig, DEFAULT_ALPHA, DEFAULT_MAX_ITERATIONS, EngineConfig, HybridInterval,
    UncertaintyConfig,
};
pub use engine::{
    AnalysisOptions, AttributionEngine, AttributionResult, INTERPRETATION_NOTE, ModelOutput,
    run_analysis,
};
pub use error::{AttributionError, Result};
pub use hybrid::{HybridBlender, HybridModel, HybridResult};
pub use journey::{Journey, JourneyIssue, TouchPoint, ValidationMode};
pub use markov::{CONVERSION_STATE, MarkovModel, MarkovResult, TransitionMatrix};
pub use metrics::ChannelMetrics;
pub use shapley::{MarginalContribution, ShapleyModel, ShapleyResult};
pub use shares::ChannelShares;
pub use synthetic::{SyntheticConfig, SyntheticDataset};
pub use uncertainty::ConfidenceBounds;
pub use validation::{ValidationReport, ValidationResult};
