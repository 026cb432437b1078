//! Per-run scratch directory holding one record file per rank
//!
//! Each rank writes only `<scratch>/<rank>.txt`; the leader reads them all
//! after the closing barrier. For multi-host runs the directory must be on a
//! filesystem every rank can see.

use super::record::TimingRecord;
use anyhow::{bail, Context};
use std::fs;
use std::path::{Path, PathBuf};

const RECORD_EXTENSION: &str = "txt";

/// Remove any stale scratch directory and create an empty one
pub fn prepare_scratch(dir: &Path) -> anyhow::Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)
            .with_context(|| format!("Failed to clear scratch directory {}", dir.display()))?;
    }
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create scratch directory {}", dir.display()))?;
    Ok(())
}

/// Path of the record file for `rank`
pub fn record_path(dir: &Path, rank: usize) -> PathBuf {
    dir.join(format!("{}.{}", rank, RECORD_EXTENSION))
}

/// Write this rank's record
pub fn write_record(dir: &Path, record: &TimingRecord) -> anyhow::Result<PathBuf> {
    let path = record_path(dir, record.rank);
    match fs::write(&path, format!("{}\n", record.to_line())) {
        Ok(()) => Ok(path),
        // The leader removes the directory when it aborts the run
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !dir.exists() => bail!(
            "scratch directory {} is gone; the leader has aborted the run",
            dir.display()
        ),
        Err(e) => {
            Err(e).with_context(|| format!("Failed to write timing record {}", path.display()))
        }
    }
}

/// Read every record in the scratch directory, ordered by rank
///
/// File stems that are not rank numbers sort after numbered ones, by name.
pub fn collect_records(dir: &Path) -> anyhow::Result<Vec<TimingRecord>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read scratch directory {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some(RECORD_EXTENSION) {
            files.push(path);
        }
    }
    files.sort_by_key(|p| sort_key(p));

    let mut records = Vec::with_capacity(files.len());
    for path in files {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read timing record {}", path.display()))?;
        let record = TimingRecord::parse_line(content.trim())
            .with_context(|| format!("In {}", path.display()))?;
        records.push(record);
    }
    Ok(records)
}

/// Check that `records` holds exactly one record for each of ranks `0..world_size`
pub fn ensure_complete(records: &[TimingRecord], world_size: usize) -> anyhow::Result<()> {
    if records.len() != world_size {
        bail!(
            "expected {} timing records, found {}",
            world_size,
            records.len()
        );
    }
    for (expected, record) in records.iter().enumerate() {
        if record.rank != expected {
            bail!(
                "timing record for rank {} missing (found rank {} in its place)",
                expected,
                record.rank
            );
        }
    }
    Ok(())
}

/// Delete the scratch directory; a missing directory is not an error
pub fn remove_scratch(dir: &Path) -> anyhow::Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e)
            .with_context(|| format!("Failed to remove scratch directory {}", dir.display())),
    }
}

fn sort_key(path: &Path) -> (u64, String) {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    (stem.parse().unwrap_or(u64::MAX), stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::time::Stopwatch;
    use std::time::Duration;
    use tempfile::TempDir;

    fn record(rank: usize) -> TimingRecord {
        let mut measured = Stopwatch::start().stop();
        measured.elapsed = Duration::from_millis(10 * (rank as u64 + 1));
        TimingRecord::from_measurement(rank, &measured)
    }

    #[test]
    fn test_prepare_clears_stale_files() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("scratch");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("stale.txt"), "junk").unwrap();

        prepare_scratch(&dir).unwrap();
        assert!(dir.is_dir());
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
    }

    #[test]
    fn test_collect_orders_by_numeric_rank() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("scratch");
        prepare_scratch(&dir).unwrap();

        for rank in [10, 2, 0, 1, 9] {
            write_record(&dir, &record(rank)).unwrap();
        }
        fs::write(dir.join("notes.log"), "ignored").unwrap();

        let ranks: Vec<usize> = collect_records(&dir).unwrap().iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![0, 1, 2, 9, 10]);
    }

    #[test]
    fn test_collect_rejects_malformed_record() {
        let tmp = TempDir::new().unwrap();
        prepare_scratch(tmp.path()).unwrap();
        fs::write(tmp.path().join("0.txt"), "not,a,record").unwrap();

        let err = collect_records(tmp.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("malformed timing record"));
    }

    #[test]
    fn test_ensure_complete() {
        let records: Vec<_> = (0..3).map(record).collect();
        assert!(ensure_complete(&records, 3).is_ok());
        assert!(ensure_complete(&records, 4).is_err());

        let gapped = vec![record(0), record(2)];
        assert!(ensure_complete(&gapped, 2).is_err());
    }

    #[test]
    fn test_write_after_leader_cleanup_names_abort() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("scratch");
        prepare_scratch(&dir).unwrap();
        remove_scratch(&dir).unwrap();

        let err = write_record(&dir, &record(1)).unwrap_err();
        assert!(err.to_string().contains("leader has aborted"), "{}", err);
    }

    #[test]
    fn test_remove_missing_is_ok() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("never-created");
        assert!(remove_scratch(&dir).is_ok());

        prepare_scratch(&dir).unwrap();
        remove_scratch(&dir).unwrap();
        assert!(!dir.exists());
    }
}
