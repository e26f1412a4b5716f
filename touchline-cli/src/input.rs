//! Journey input files
//!
//! Accepts either a bare JSON array of journeys or a request object that
//! also carries per-request overrides. `-` reads from stdin.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use touchline_core::Journey;
use tracing::debug;

/// Journeys plus optional overrides, as posted by callers of the engine
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalysisRequest {
    pub journeys: Vec<Journey>,
    pub alpha: Option<f64>,
    pub include_uncertainty: Option<bool>,
    pub filter_channels: Option<Vec<String>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum InputDocument {
    Bare(Vec<Journey>),
    Request(AnalysisRequest),
}

impl From<InputDocument> for AnalysisRequest {
    fn from(doc: InputDocument) -> Self {
        match doc {
            InputDocument::Bare(journeys) => AnalysisRequest {
                journeys,
                ..Default::default()
            },
            InputDocument::Request(request) => request,
        }
    }
}

/// Parse an input document from a JSON string
pub fn parse_request(json: &str) -> Result<AnalysisRequest> {
    let doc: InputDocument = serde_json::from_str(json)
        .context("input must be a journey array or an object with a `journeys` field")?;
    Ok(doc.into())
}

/// Read an input document from a file, or stdin for `-`
pub fn load_request(path: &Path) -> Result<AnalysisRequest> {
    let contents = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read journeys from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?
    };

    let request = parse_request(&contents)?;
    debug!(journeys = request.journeys.len(), "loaded journeys");
    Ok(request)
}

/// Read a channel → value map, e.g. ground-truth effects
pub fn load_channel_map(path: &Path) -> Result<BTreeMap<String, f64>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("{} must be a JSON object of channel to number", path.display()))
}
