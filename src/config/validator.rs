//! Run configuration validation

use super::*;
use anyhow::Result;

/// Validate a run configuration before any rank does work
///
/// Listing mode needs nothing beyond plugins; a benchmark run needs a method
/// and its arguments.
pub fn validate_config(config: &RunConfig, list_methods: bool) -> Result<()> {
    if list_methods {
        return Ok(());
    }

    match (&config.method, &config.method_args) {
        (Some(_), Some(_)) => {}
        _ => anyhow::bail!(
            "--test-method and --method-args are required unless using --list-methods"
        ),
    }

    if config.output_path.as_os_str().is_empty() {
        anyhow::bail!("output_path must not be empty");
    }
    if config.scratch_dir.as_os_str().is_empty() {
        anyhow::bail!("scratch_dir must not be empty");
    }
    if config.scratch_dir == config.output_path {
        anyhow::bail!(
            "scratch_dir and output_path must differ (scratch directory is deleted after each run)"
        );
    }
    if let Some(ref json) = config.json_output {
        if *json == config.output_path {
            anyhow::bail!("json_output and output_path must differ");
        }
    }

    Ok(())
}
