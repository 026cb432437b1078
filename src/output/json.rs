//! JSON report output

use crate::orchestrator::AggregatedReport;
use crate::util::time::format_wall_time;
use crate::Result;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Top-level JSON document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonReport {
    pub method: String,
    pub world_size: usize,
    pub total_secs: f64,
    pub summary: JsonSummary,
    pub ranks: Vec<JsonRankRow>,
}

/// Spread of per-rank execution times
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonSummary {
    pub min_secs: f64,
    pub max_secs: f64,
    pub mean_secs: f64,
}

/// One rank's row, mirroring the CSV columns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRankRow {
    pub rank: usize,
    pub start_time: String,
    pub end_time: String,
    pub elapsed_secs: f64,
    pub elapsed_ms: f64,
}

impl JsonReport {
    pub fn from_report(method: &str, report: &AggregatedReport) -> Self {
        Self {
            method: method.to_string(),
            world_size: report.len(),
            total_secs: report.total_secs,
            summary: JsonSummary {
                min_secs: report.min_secs(),
                max_secs: report.max_secs(),
                mean_secs: report.mean_secs(),
            },
            ranks: report
                .records
                .iter()
                .map(|r| JsonRankRow {
                    rank: r.rank,
                    start_time: format_wall_time(&r.start_time),
                    end_time: format_wall_time(&r.end_time),
                    elapsed_secs: r.elapsed_secs,
                    elapsed_ms: r.elapsed_ms,
                })
                .collect(),
        }
    }
}

/// Write the report as pretty-printed JSON
pub fn write_report(path: &Path, method: &str, report: &AggregatedReport) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create JSON report {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &JsonReport::from_report(method, report))?;
    writer
        .flush()
        .with_context(|| format!("Failed to write JSON report {}", path.display()))?;
    Ok(())
}
