//! CLI argument parsing using clap

use clap::Parser;
use std::path::PathBuf;

/// rankbench - run one method on every rank between two barriers and report
/// per-rank wall-clock timing
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "rankbench")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Native plugin library registering extra methods (repeatable)
    #[arg(long = "method-plugin", value_name = "PATH")]
    pub method_plugin: Vec<PathBuf>,

    /// Method to run on every rank
    #[arg(long = "test-method", value_name = "NAME")]
    pub test_method: Option<String>,

    /// Method arguments as comma-separated key=value pairs
    /// (e.g. --method-args 'api_url=http://host:8080/v1,api_key=your-key,model=tgi')
    #[arg(long = "method-args", value_name = "ARGS", allow_hyphen_values = true)]
    pub method_args: Option<String>,

    /// CSV report path [default: test_results.csv]
    #[arg(long = "output-path", value_name = "PATH")]
    pub output_path: Option<PathBuf>,

    /// Also write the report as JSON
    #[arg(long = "json-output", value_name = "PATH")]
    pub json_output: Option<PathBuf>,

    /// Scratch directory for per-rank records [default: .rankbench_metadata]
    #[arg(long = "scratch-dir", value_name = "PATH")]
    pub scratch_dir: Option<PathBuf>,

    /// TOML run file; command-line flags take precedence
    #[arg(long, value_name = "PATH", env = "RANKBENCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// List all available methods and exit
    #[arg(long = "list-methods")]
    pub list_methods: bool,

    /// Launch this many local ranks (single-host runs)
    #[arg(long, value_name = "N")]
    pub nproc: Option<usize>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate CLI arguments that do not depend on the run file
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(n) = self.nproc {
            if n == 0 {
                anyhow::bail!("--nproc must be at least 1");
            }
        }

        if let Some(ref name) = self.test_method {
            if name.trim().is_empty() {
                anyhow::bail!("--test-method must not be empty");
            }
        }

        Ok(())
    }
}
