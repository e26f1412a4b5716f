//! Rendering helpers shared by the commands

use std::collections::BTreeMap;

use anyhow::Result;
use clap::ValueEnum;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use serde::Serialize;
use touchline_core::{AttributionResult, ConfidenceBounds};

/// Output format for command results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Format {
    #[default]
    Table,
    Json,
}

/// Pretty-print any serializable value to stdout
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn percent(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

fn header(titles: &[&str]) -> Vec<Cell> {
    titles.iter().map(|t| Cell::new(t).fg(Color::Cyan)).collect()
}

fn new_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// One row per channel with the model's credit and descriptive metrics
pub fn attribution_table(result: &AttributionResult) -> Table {
    let intervals: Option<&BTreeMap<String, ConfidenceBounds>> =
        result.model.confidence_intervals();

    let mut titles = vec!["Channel", "Credit"];
    if intervals.is_some() {
        titles.push("Interval");
    }
    titles.extend(["Journeys", "Conv. rate", "Avg position"]);

    let mut table = new_table();
    table.set_header(header(&titles));

    let credit = result.model.attributions();
    for m in &result.channel_metrics {
        let mut row = vec![
            Cell::new(&m.channel),
            Cell::new(percent(credit.get(&m.channel).copied().unwrap_or(0.0))),
        ];
        if let Some(intervals) = intervals {
            let bounds = intervals.get(&m.channel).copied().unwrap_or_default();
            row.push(Cell::new(format!(
                "{} - {}",
                percent(bounds.low),
                percent(bounds.high)
            )));
        }
        row.extend([
            Cell::new(m.touchpoint_count),
            Cell::new(percent(m.conversion_rate)),
            Cell::new(format!("{:.2}", m.avg_position)),
        ]);
        table.add_row(row);
    }

    table
}

/// Side-by-side share columns, one per named map
pub fn shares_table(columns: &[(&str, &BTreeMap<String, f64>)]) -> Table {
    let mut titles = vec!["Channel"];
    titles.extend(columns.iter().map(|(name, _)| *name));

    let mut table = new_table();
    table.set_header(header(&titles));

    let mut channels: Vec<&String> = columns.iter().flat_map(|(_, m)| m.keys()).collect();
    channels.sort();
    channels.dedup();

    for channel in channels {
        let mut row = vec![Cell::new(channel)];
        row.extend(
            columns
                .iter()
                .map(|(_, m)| Cell::new(percent(m.get(channel).copied().unwrap_or(0.0)))),
        );
        table.add_row(row);
    }

    table
}
