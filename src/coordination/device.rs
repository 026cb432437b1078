//! Local accelerator discovery
//!
//! Only used to derive `WorkerIdentity::local_index`; nothing else depends on
//! the device count.

use std::path::Path;

/// Number of accelerator devices visible to this process (0 if none)
///
/// `CUDA_VISIBLE_DEVICES` wins when set; otherwise `/dev/nvidia<N>` nodes are
/// counted.
pub fn device_count() -> usize {
    let visible = std::env::var("CUDA_VISIBLE_DEVICES").ok();
    device_count_from(visible.as_deref(), Path::new("/dev"))
}

/// [`device_count`] with explicit inputs
pub fn device_count_from(visible: Option<&str>, dev_dir: &Path) -> usize {
    match visible {
        Some(list) => count_visible(list),
        None => count_device_nodes(dev_dir),
    }
}

fn count_visible(list: &str) -> usize {
    let list = list.trim();
    if list.is_empty() || list == "-1" || list.eq_ignore_ascii_case("none") {
        return 0;
    }
    list.split(',').filter(|entry| !entry.trim().is_empty()).count()
}

fn count_device_nodes(dev_dir: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dev_dir) else {
        return 0;
    };

    entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .and_then(|name| name.strip_prefix("nvidia"))
                .map(|suffix| !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()))
                .unwrap_or(false)
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_visible_list() {
        let dir = TempDir::new().unwrap();
        assert_eq!(device_count_from(Some("0,1,2"), dir.path()), 3);
        assert_eq!(device_count_from(Some("3"), dir.path()), 1);
        assert_eq!(device_count_from(Some(""), dir.path()), 0);
        assert_eq!(device_count_from(Some("-1"), dir.path()), 0);
    }

    #[test]
    fn test_device_nodes() {
        let dir = TempDir::new().unwrap();
        for name in ["nvidia0", "nvidia1", "nvidiactl", "nvidia-uvm", "sda"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        assert_eq!(device_count_from(None, dir.path()), 2);
    }

    #[test]
    fn test_missing_dev_dir() {
        assert_eq!(device_count_from(None, Path::new("/nonexistent/dev")), 0);
    }
}
