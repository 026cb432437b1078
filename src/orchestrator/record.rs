//! Timing records and the aggregated report

use crate::util::time::{format_wall_time, parse_wall_time, round3, Measured};
use chrono::{DateTime, Local};
use std::fmt;
use thiserror::Error;

/// Column headers of the report, in record field order
pub const REPORT_HEADER: [&str; 5] = [
    "Rank",
    "Start Time",
    "End Time",
    "Execution Time (s)",
    "Execution Time (ms)",
];

/// A scratch record line that cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed timing record '{line}': {reason}")]
pub struct RecordParseError {
    pub line: String,
    pub reason: String,
}

/// One rank's timing for one run
///
/// Elapsed values are rounded to 3 decimals; milliseconds are derived from the
/// unrounded seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingRecord {
    pub rank: usize,
    pub start_time: DateTime<Local>,
    pub end_time: DateTime<Local>,
    pub elapsed_secs: f64,
    pub elapsed_ms: f64,
}

impl TimingRecord {
    pub fn from_measurement(rank: usize, measured: &Measured) -> Self {
        let secs = measured.elapsed.as_secs_f64();
        Self {
            rank,
            start_time: measured.start,
            end_time: measured.end,
            elapsed_secs: round3(secs),
            elapsed_ms: round3(secs * 1000.0),
        }
    }

    /// Report cells, in [`REPORT_HEADER`] order
    pub fn cells(&self) -> [String; 5] {
        [
            self.rank.to_string(),
            format_wall_time(&self.start_time),
            format_wall_time(&self.end_time),
            format!("{:.3}", self.elapsed_secs),
            format!("{:.3}", self.elapsed_ms),
        ]
    }

    /// One comma-separated line, without newline
    pub fn to_line(&self) -> String {
        self.cells().join(",")
    }

    /// Parse a line written by [`TimingRecord::to_line`]
    pub fn parse_line(line: &str) -> Result<Self, RecordParseError> {
        let fail = |reason: &str| RecordParseError {
            line: line.to_string(),
            reason: reason.to_string(),
        };

        let fields: Vec<&str> = line.trim().split(',').collect();
        if fields.len() != 5 {
            return Err(fail("expected 5 comma-separated fields"));
        }

        Ok(Self {
            rank: fields[0].trim().parse().map_err(|_| fail("invalid rank"))?,
            start_time: parse_wall_time(fields[1]).ok_or_else(|| fail("invalid start time"))?,
            end_time: parse_wall_time(fields[2]).ok_or_else(|| fail("invalid end time"))?,
            elapsed_secs: fields[3].trim().parse().map_err(|_| fail("invalid seconds"))?,
            elapsed_ms: fields[4].trim().parse().map_err(|_| fail("invalid milliseconds"))?,
        })
    }
}

impl fmt::Display for TimingRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rank {} {} -> {} {:.3}s ({:.3}ms)",
            self.rank,
            format_wall_time(&self.start_time),
            format_wall_time(&self.end_time),
            self.elapsed_secs,
            self.elapsed_ms
        )
    }
}

/// The leader's merged view of one run
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedReport {
    /// One record per rank, in scratch order
    pub records: Vec<TimingRecord>,
    /// Leader-observed wall time from the first barrier to the second
    pub total_secs: f64,
}

impl AggregatedReport {
    pub fn new(records: Vec<TimingRecord>, total_secs: f64) -> Self {
        Self {
            records,
            total_secs,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Slowest rank's elapsed seconds
    pub fn max_secs(&self) -> f64 {
        self.records
            .iter()
            .map(|r| r.elapsed_secs)
            .fold(0.0, f64::max)
    }

    /// Fastest rank's elapsed seconds
    pub fn min_secs(&self) -> f64 {
        self.records
            .iter()
            .map(|r| r.elapsed_secs)
            .reduce(f64::min)
            .unwrap_or(0.0)
    }

    /// Mean elapsed seconds across ranks
    pub fn mean_secs(&self) -> f64 {
        if self.records.is_empty() {
            return 0.0;
        }
        self.records.iter().map(|r| r.elapsed_secs).sum::<f64>() / self.records.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn measured(elapsed: Duration) -> Measured {
        let start = Local::now();
        Measured {
            start,
            end: start + chrono::Duration::from_std(elapsed).unwrap(),
            elapsed,
        }
    }

    #[test]
    fn test_from_measurement_rounding() {
        let record = TimingRecord::from_measurement(2, &measured(Duration::from_micros(12_345_678)));
        assert_eq!(record.rank, 2);
        assert_eq!(record.elapsed_secs, 12.346);
        assert_eq!(record.elapsed_ms, 12345.678);
    }

    #[test]
    fn test_ms_derived_from_unrounded_seconds() {
        let record = TimingRecord::from_measurement(0, &measured(Duration::from_nanos(10_400_600)));
        assert_eq!(record.elapsed_secs, 0.01);
        assert_eq!(record.elapsed_ms, 10.401);
    }

    #[test]
    fn test_line_round_trip() {
        let record = TimingRecord::from_measurement(7, &measured(Duration::from_millis(1500)));
        let line = record.to_line();
        assert!(line.starts_with("7,"));
        assert!(line.ends_with(",1.500,1500.000"));

        let parsed = TimingRecord::parse_line(&line).unwrap();
        assert_eq!(parsed.rank, 7);
        assert_eq!(parsed.elapsed_secs, 1.5);
        assert_eq!(parsed.elapsed_ms, 1500.0);
        assert_eq!(parsed.to_line(), line);
    }

    #[test]
    fn test_parse_line_errors() {
        assert!(TimingRecord::parse_line("").is_err());
        assert!(TimingRecord::parse_line("0,2024-01-01 00:00:00,2024-01-01 00:00:01,1.0").is_err());
        let err = TimingRecord::parse_line("x,2024-01-01 00:00:00,2024-01-01 00:00:01,1.0,1000.0")
            .unwrap_err();
        assert_eq!(err.reason, "invalid rank");
    }

    #[test]
    fn test_report_stats() {
        let records = vec![
            TimingRecord::from_measurement(0, &measured(Duration::from_millis(100))),
            TimingRecord::from_measurement(1, &measured(Duration::from_millis(300))),
        ];
        let report = AggregatedReport::new(records, 0.35);
        assert_eq!(report.len(), 2);
        assert_eq!(report.max_secs(), 0.3);
        assert_eq!(report.min_secs(), 0.1);
        assert!((report.mean_secs() - 0.2).abs() < 1e-9);
    }
}
