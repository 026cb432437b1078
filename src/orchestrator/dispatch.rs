//! Per-rank entry point: list the registry or run the benchmark

use super::{AggregatedReport, Benchmarker};
use crate::config::RunConfig;
use crate::coordination::{device_count, GroupConfig, ProcessGroup};
use crate::methods::MethodRegistry;
use anyhow::Context;
use log::info;
use std::io::{self, Write};

/// Write the sorted method names and loaded plugin paths to `out`
pub fn write_method_list<W: Write>(registry: &MethodRegistry, out: &mut W) -> io::Result<()> {
    writeln!(out, "Available methods:")?;
    for name in registry.list_names() {
        match registry.registration(&name) {
            Some(reg) => writeln!(out, "  {:<24} ({})", name, reg.origin)?,
            None => writeln!(out, "  {}", name)?,
        }
    }

    let plugins: Vec<_> = registry.plugin_paths().collect();
    if !plugins.is_empty() {
        writeln!(out)?;
        writeln!(out, "Plugins loaded:")?;
        for path in plugins {
            writeln!(out, "  {}", path.display())?;
        }
    }
    Ok(())
}

/// Do what this rank was asked to do
///
/// Listing mode writes the method list to `out` on rank 0 only and touches
/// nothing else: no process group, no scratch directory, no report. Otherwise
/// the group is bootstrapped and the benchmark run; the report comes back on
/// the leader.
pub async fn dispatch<W: Write>(
    config: &RunConfig,
    list_methods: bool,
    group_config: &GroupConfig,
    registry: &MethodRegistry,
    out: &mut W,
) -> anyhow::Result<Option<AggregatedReport>> {
    if list_methods {
        if group_config.rank == 0 {
            write_method_list(registry, out)?;
            out.flush()?;
        }
        return Ok(None);
    }

    let plan = config.plan()?;
    info!(
        "rankbench v{} starting rank {}/{} ({} visible device(s))",
        env!("CARGO_PKG_VERSION"),
        group_config.rank,
        group_config.world_size,
        device_count()
    );

    let mut group = ProcessGroup::bootstrap(group_config)
        .await
        .context("Failed to bootstrap process group")?;

    Benchmarker::new(plan).run(&mut group, registry).await
}
