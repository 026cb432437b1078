//! Process-group coordination
//!
//! Every rank runs in its own OS process. Rank 0 (the leader, chosen by
//! convention) listens on the rendezvous endpoint; every other rank connects
//! to it. Barriers are a star: members report arrival to the leader and wait
//! for its release.
//!
//! # Modules
//!
//! - `protocol`: message definitions and framing
//! - `group`: bootstrap, barrier and abort
//! - `device`: local accelerator discovery

pub mod device;
pub mod group;
pub mod protocol;

use std::io;
use std::time::Duration;
use thiserror::Error;

pub use device::device_count;
pub use group::ProcessGroup;

/// Default rendezvous port, matching the usual torchrun default
pub const DEFAULT_MASTER_PORT: u16 = 29500;

/// Default time a member keeps retrying to reach the leader
pub const DEFAULT_RENDEZVOUS_TIMEOUT: Duration = Duration::from_secs(300);

/// Coordination errors
#[derive(Debug, Error)]
pub enum CoordinationError {
    #[error("invalid process group configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to bootstrap process group: {reason}")]
    Bootstrap {
        reason: String,
        #[source]
        source: Option<io::Error>,
    },

    #[error("rank {rank} failed: {reason}")]
    PeerFailed { rank: usize, reason: String },

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("process group IO error: {0}")]
    Io(#[from] io::Error),
}

impl CoordinationError {
    pub(crate) fn bootstrap(reason: impl Into<String>) -> Self {
        Self::Bootstrap {
            reason: reason.into(),
            source: None,
        }
    }

    pub(crate) fn bootstrap_io(reason: impl Into<String>, source: io::Error) -> Self {
        Self::Bootstrap {
            reason: reason.into(),
            source: Some(source),
        }
    }
}

/// Who this process is within the group
///
/// Fixed once the group is established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerIdentity {
    pub global_rank: usize,
    pub world_size: usize,
    pub local_index: usize,
}

impl WorkerIdentity {
    /// Build an identity; `local_index` is `rank % devices`, or 0 without devices
    pub fn new(global_rank: usize, world_size: usize, devices: usize) -> Self {
        let local_index = if devices == 0 { 0 } else { global_rank % devices };
        Self {
            global_rank,
            world_size,
            local_index,
        }
    }

    /// Rank 0 owns setup, aggregation and teardown
    pub fn is_leader(&self) -> bool {
        self.global_rank == 0
    }
}

/// Process-group parameters supplied by the launcher environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupConfig {
    pub world_size: usize,
    pub rank: usize,
    pub master_addr: String,
    pub master_port: u16,
    pub rendezvous_timeout: Duration,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            world_size: 1,
            rank: 0,
            master_addr: "127.0.0.1".to_string(),
            master_port: DEFAULT_MASTER_PORT,
            rendezvous_timeout: DEFAULT_RENDEZVOUS_TIMEOUT,
        }
    }
}

impl GroupConfig {
    /// Read `WORLD_SIZE`, `RANK`, `MASTER_ADDR`, `MASTER_PORT` and
    /// `RANKBENCH_RENDEZVOUS_TIMEOUT` (seconds) from the environment
    pub fn from_env() -> Result<Self, CoordinationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`GroupConfig::from_env`], reading variables through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoordinationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            world_size: parse_var(&lookup, "WORLD_SIZE")?.unwrap_or(defaults.world_size),
            rank: parse_var(&lookup, "RANK")?.unwrap_or(defaults.rank),
            master_addr: lookup("MASTER_ADDR")
                .filter(|addr| !addr.trim().is_empty())
                .unwrap_or(defaults.master_addr),
            master_port: parse_var(&lookup, "MASTER_PORT")?.unwrap_or(defaults.master_port),
            rendezvous_timeout: parse_var::<u64, _>(&lookup, "RANKBENCH_RENDEZVOUS_TIMEOUT")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.rendezvous_timeout),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check rank and world size are consistent
    pub fn validate(&self) -> Result<(), CoordinationError> {
        if self.world_size == 0 {
            return Err(CoordinationError::InvalidConfig(
                "WORLD_SIZE must be at least 1".to_string(),
            ));
        }
        if self.rank >= self.world_size {
            return Err(CoordinationError::InvalidConfig(format!(
                "RANK {} out of range for WORLD_SIZE {}",
                self.rank, self.world_size
            )));
        }
        Ok(())
    }

    /// `host:port` of the leader
    pub fn master_endpoint(&self) -> String {
        format!("{}:{}", self.master_addr, self.master_port)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, CoordinationError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
            CoordinationError::InvalidConfig(format!("{} has invalid value '{}'", key, raw))
        }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_identity_local_index() {
        assert_eq!(WorkerIdentity::new(5, 8, 4).local_index, 1);
        assert_eq!(WorkerIdentity::new(5, 8, 0).local_index, 0);
        assert!(WorkerIdentity::new(0, 8, 0).is_leader());
        assert!(!WorkerIdentity::new(3, 8, 0).is_leader());
    }

    #[test]
    fn test_group_config_defaults() {
        let config = GroupConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, GroupConfig::default());
        assert_eq!(config.master_endpoint(), "127.0.0.1:29500");
    }

    #[test]
    fn test_group_config_from_vars() {
        let config = GroupConfig::from_lookup(lookup_from(&[
            ("WORLD_SIZE", "4"),
            ("RANK", "3"),
            ("MASTER_ADDR", "10.0.1.10"),
            ("MASTER_PORT", "23456"),
            ("RANKBENCH_RENDEZVOUS_TIMEOUT", "5"),
        ]))
        .unwrap();
        assert_eq!(config.world_size, 4);
        assert_eq!(config.rank, 3);
        assert_eq!(config.master_endpoint(), "10.0.1.10:23456");
        assert_eq!(config.rendezvous_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_group_config_rank_out_of_range() {
        let err = GroupConfig::from_lookup(lookup_from(&[("WORLD_SIZE", "2"), ("RANK", "2")]))
            .unwrap_err();
        assert!(matches!(err, CoordinationError::InvalidConfig(_)));
    }

    #[test]
    fn test_group_config_zero_world() {
        assert!(GroupConfig::from_lookup(lookup_from(&[("WORLD_SIZE", "0")])).is_err());
    }

    #[test]
    fn test_group_config_garbage() {
        let err = GroupConfig::from_lookup(lookup_from(&[("MASTER_PORT", "http")])).unwrap_err();
        assert!(err.to_string().contains("MASTER_PORT"));
    }
}
