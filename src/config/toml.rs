//! TOML run file parsing

use super::RunConfig;
use crate::config::cli::Cli;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse a TOML run file
pub fn parse_toml_file(path: &Path) -> Result<RunConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse a TOML run file from a string
pub fn parse_toml_string(contents: &str) -> Result<RunConfig> {
    let config: RunConfig = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Merge CLI arguments into a run configuration (CLI takes precedence)
pub fn merge_cli_with_config(cli: &Cli, mut config: RunConfig) -> RunConfig {
    if let Some(ref method) = cli.test_method {
        config.method = Some(method.clone());
    }
    if let Some(ref args) = cli.method_args {
        config.method_args = Some(args.clone());
    }

    // Plugins accumulate: run file first, then command line
    config.plugins.extend(cli.method_plugin.iter().cloned());

    if let Some(ref path) = cli.output_path {
        config.output_path = path.clone();
    }
    if let Some(ref path) = cli.json_output {
        config.json_output = Some(path.clone());
    }
    if let Some(ref path) = cli.scratch_dir {
        config.scratch_dir = path.clone();
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::path::PathBuf;

    #[test]
    fn test_parse_minimal() {
        let config = parse_toml_string("method = \"Echo\"\n").unwrap();
        assert_eq!(config.method.as_deref(), Some("Echo"));
        assert_eq!(config.output_path, PathBuf::from("test_results.csv"));
        assert_eq!(config.scratch_dir, PathBuf::from(".rankbench_metadata"));
        assert!(config.plugins.is_empty());
    }

    #[test]
    fn test_parse_full() {
        let config = parse_toml_string(
            r#"
            method = "OpenAIChat"
            method_args = "api_url=http://localhost:8080/v1,model=tgi"
            plugins = ["plugins/libextra.so"]
            output_path = "results.csv"
            json_output = "results.json"
            scratch_dir = "/shared/scratch"
            "#,
        )
        .unwrap();

        assert_eq!(config.plugins, vec![PathBuf::from("plugins/libextra.so")]);
        assert_eq!(config.json_output, Some(PathBuf::from("results.json")));
        assert_eq!(config.scratch_dir, PathBuf::from("/shared/scratch"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(parse_toml_string("methd = \"Echo\"\n").is_err());
    }

    #[test]
    fn test_cli_overrides_file() {
        let file = parse_toml_string(
            r#"
            method = "Echo"
            method_args = "ms=5"
            plugins = ["a.so"]
            output_path = "file.csv"
            "#,
        )
        .unwrap();
        let cli = Cli::try_parse_from([
            "rankbench",
            "--test-method",
            "Command",
            "--method-plugin",
            "b.so",
            "--output-path",
            "cli.csv",
        ])
        .unwrap();

        let merged = merge_cli_with_config(&cli, file);
        assert_eq!(merged.method.as_deref(), Some("Command"));
        assert_eq!(merged.method_args.as_deref(), Some("ms=5"));
        assert_eq!(merged.plugins, vec![PathBuf::from("a.so"), PathBuf::from("b.so")]);
        assert_eq!(merged.output_path, PathBuf::from("cli.csv"));
    }

    #[test]
    fn test_parse_toml_file_missing() {
        let err = parse_toml_file(Path::new("/nonexistent/run.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
