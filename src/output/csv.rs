//! CSV report output
//!
//! One header row, then one row per rank in the order the leader collected
//! them. Suitable for pandas, R or a spreadsheet.

use crate::orchestrator::{AggregatedReport, TimingRecord, REPORT_HEADER};
use crate::Result;
use anyhow::Context;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// CSV writer for timing rows
pub struct CsvWriter<W: Write> {
    out: W,
}

impl CsvWriter<BufWriter<File>> {
    /// Create the file and write the header row
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        let file = File::create(path)
            .with_context(|| format!("Failed to create CSV report {}", path.display()))?;
        Self::new(BufWriter::new(file))
    }
}

impl<W: Write> CsvWriter<W> {
    /// Wrap a writer and write the header row
    pub fn new(mut out: W) -> Result<Self> {
        writeln!(out, "{}", REPORT_HEADER.join(","))?;
        Ok(Self { out })
    }

    pub fn append_record(&mut self, record: &TimingRecord) -> Result<()> {
        writeln!(self.out, "{}", record.to_line())?;
        Ok(())
    }

    /// Flush and hand back the underlying writer
    pub fn finish(mut self) -> Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Write the whole report to `path`, replacing any existing file
pub fn write_report(path: &Path, report: &AggregatedReport) -> Result<()> {
    let mut writer = CsvWriter::create(path)?;
    for record in &report.records {
        writer.append_record(record)?;
    }
    writer.finish()?;
    Ok(())
}
