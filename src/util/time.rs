//! Wall-clock timing utilities
//!
//! Timing records carry both a wall-clock view (when the unit ran, comparable
//! across ranks) and a monotonic view (how long it ran, immune to clock steps).

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use std::time::{Duration, Instant};

/// Timestamp format used in scratch records and reports (second precision)
pub const WALL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A started measurement
///
/// Captures the wall-clock start for reporting and an `Instant` for the
/// elapsed computation.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    wall_start: DateTime<Local>,
    instant: Instant,
}

/// A finished measurement
#[derive(Debug, Clone, Copy)]
pub struct Measured {
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
    pub elapsed: Duration,
}

impl Stopwatch {
    /// Start measuring now
    #[inline]
    pub fn start() -> Self {
        Self {
            wall_start: Local::now(),
            instant: Instant::now(),
        }
    }

    /// Stop measuring and return both views of the interval
    pub fn stop(self) -> Measured {
        let elapsed = self.instant.elapsed();
        Measured {
            start: self.wall_start,
            end: Local::now(),
            elapsed,
        }
    }
}

/// Round to 3 decimal places
///
/// # Examples
///
/// ```
/// use rankbench::util::time::round3;
///
/// assert_eq!(round3(0.0104999), 0.01);
/// assert_eq!(round3(12.34567), 12.346);
/// ```
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Format a wall-clock timestamp as `YYYY-MM-DD HH:MM:SS`
pub fn format_wall_time(time: &DateTime<Local>) -> String {
    time.format(WALL_TIME_FORMAT).to_string()
}

/// Parse a timestamp written by [`format_wall_time`]
pub fn parse_wall_time(s: &str) -> Option<DateTime<Local>> {
    let naive = NaiveDateTime::parse_from_str(s.trim(), WALL_TIME_FORMAT).ok()?;
    Local.from_local_datetime(&naive).earliest()
}

/// Format a duration in human-readable form
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use rankbench::util::time::format_duration;
///
/// assert_eq!(format_duration(Duration::from_nanos(500)), "500ns");
/// assert_eq!(format_duration(Duration::from_micros(2500)), "2.50ms");
/// assert_eq!(format_duration(Duration::from_secs(5)), "5.00s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let nanos = duration.as_nanos();

    if nanos < 1_000 {
        format!("{}ns", nanos)
    } else if nanos < 1_000_000 {
        format!("{:.2}us", nanos as f64 / 1_000.0)
    } else if nanos < 1_000_000_000 {
        format!("{:.2}ms", nanos as f64 / 1_000_000.0)
    } else {
        format!("{:.2}s", nanos as f64 / 1_000_000_000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_stopwatch_elapsed() {
        let watch = Stopwatch::start();
        thread::sleep(Duration::from_millis(10));
        let measured = watch.stop();

        assert!(measured.elapsed >= Duration::from_millis(10));
        assert!(measured.end >= measured.start);
    }

    #[test]
    fn test_round3() {
        assert_eq!(round3(1.0), 1.0);
        assert_eq!(round3(0.0126), 0.013);
        assert_eq!(round3(10.0004), 10.0);
        assert_eq!(round3(0.010_234 * 1000.0), 10.234);
    }

    #[test]
    fn test_wall_time_round_trip() {
        let now = Local::now();
        let text = format_wall_time(&now);
        assert_eq!(text.len(), 19);

        let parsed = parse_wall_time(&text).unwrap();
        assert_eq!(format_wall_time(&parsed), text);
    }

    #[test]
    fn test_parse_wall_time_rejects_garbage() {
        assert!(parse_wall_time("yesterday").is_none());
        assert!(parse_wall_time("2024-13-01 00:00:00").is_none());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_nanos(500)), "500ns");
        assert_eq!(format_duration(Duration::from_nanos(1500)), "1.50us");
        assert_eq!(format_duration(Duration::from_micros(1500)), "1.50ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    }
}
