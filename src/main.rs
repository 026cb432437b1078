//! rankbench CLI entry point

use anyhow::{Context, Result};
use log::debug;
use rankbench::config::cli::Cli;
use rankbench::config::toml::{merge_cli_with_config, parse_toml_file};
use rankbench::config::validator::validate_config;
use rankbench::config::RunConfig;
use rankbench::coordination::GroupConfig;
use rankbench::launcher;
use rankbench::orchestrator::dispatch;
use rankbench::MethodRegistry;

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_logging(cli.debug);
    cli.validate()?;

    // Launcher mode: spawn the ranks and let them do the work
    if let Some(nproc) = cli.nproc {
        if std::env::var_os("RANK").is_none() {
            return launcher::launch_local(nproc);
        }
        debug!("RANK already set, ignoring --nproc {}", nproc);
    }

    let file_config = match &cli.config {
        Some(path) => parse_toml_file(path)?,
        None => RunConfig::default(),
    };
    let config = merge_cli_with_config(&cli, file_config);
    validate_config(&config, cli.list_methods).context("Configuration validation failed")?;

    let mut registry = MethodRegistry::with_builtins();
    for plugin in &config.plugins {
        registry
            .load_external(plugin)
            .with_context(|| format!("Failed to load method plugin {}", plugin.display()))?;
    }

    let group_config = GroupConfig::from_env()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;
    let mut stdout = std::io::stdout();
    runtime.block_on(dispatch(
        &config,
        cli.list_methods,
        &group_config,
        &registry,
        &mut stdout,
    ))?;
    Ok(())
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}
