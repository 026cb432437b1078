//! Configuration module
//!
//! Handles CLI argument parsing, TOML run files, and validation. Process-group
//! parameters come from the environment (see `coordination::GroupConfig`).

pub mod cli;
pub mod toml;
pub mod validator;

use crate::methods::{parse_method_args, MethodArgs};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default CSV report path
pub const DEFAULT_OUTPUT_PATH: &str = "test_results.csv";

/// Default scratch directory for per-rank records
pub const DEFAULT_SCRATCH_DIR: &str = ".rankbench_metadata";

/// Complete run configuration (TOML run file merged with CLI)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Method name to resolve in the registry
    #[serde(default)]
    pub method: Option<String>,
    /// Raw `k=v,k=v` method arguments
    #[serde(default)]
    pub method_args: Option<String>,
    /// Plugin libraries to load before resolving
    #[serde(default)]
    pub plugins: Vec<PathBuf>,
    /// CSV report path
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
    /// Optional JSON report path
    #[serde(default)]
    pub json_output: Option<PathBuf>,
    /// Per-run scratch directory; must be shared by all ranks
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
}

fn default_output_path() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_PATH)
}

fn default_scratch_dir() -> PathBuf {
    PathBuf::from(DEFAULT_SCRATCH_DIR)
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            method: None,
            method_args: None,
            plugins: Vec::new(),
            output_path: default_output_path(),
            json_output: None,
            scratch_dir: default_scratch_dir(),
        }
    }
}

impl RunConfig {
    /// Resolve into a [`RunPlan`], parsing the method arguments
    ///
    /// Fails on a missing method or malformed arguments, before any unit is
    /// constructed.
    pub fn plan(&self) -> anyhow::Result<RunPlan> {
        let method = self
            .method
            .clone()
            .ok_or_else(|| anyhow::anyhow!("no method configured"))?;
        let args = parse_method_args(self.method_args.as_deref().unwrap_or(""))?;

        Ok(RunPlan {
            method,
            args,
            scratch_dir: self.scratch_dir.clone(),
            output_path: self.output_path.clone(),
            json_output: self.json_output.clone(),
        })
    }
}

/// Everything the orchestrator needs for one run
#[derive(Debug, Clone, PartialEq)]
pub struct RunPlan {
    pub method: String,
    pub args: MethodArgs,
    pub scratch_dir: PathBuf,
    pub output_path: PathBuf,
    pub json_output: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::methods::ArgumentParseError;

    #[test]
    fn test_plan_parses_args() {
        let config = RunConfig {
            method: Some("Echo".to_string()),
            method_args: Some("ms=5,message=hi".to_string()),
            ..RunConfig::default()
        };
        let plan = config.plan().unwrap();
        assert_eq!(plan.method, "Echo");
        assert_eq!(plan.args.get("ms"), Some("5"));
        assert_eq!(plan.output_path, PathBuf::from(DEFAULT_OUTPUT_PATH));
    }

    #[test]
    fn test_plan_rejects_bad_args() {
        let config = RunConfig {
            method: Some("Echo".to_string()),
            method_args: Some("a=1,b".to_string()),
            ..RunConfig::default()
        };
        let err = config.plan().unwrap_err();
        assert!(err.downcast_ref::<ArgumentParseError>().is_some());
    }

    #[test]
    fn test_plan_requires_method() {
        assert!(RunConfig::default().plan().is_err());
    }
}
