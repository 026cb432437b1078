//! Benchmark orchestration
//!
//! One run is the same sequence on every rank:
//!
//! 1. Setup (leader): fresh scratch directory
//! 2. Barrier
//! 3. Execute: construct the unit, time its `run`, write this rank's record
//! 4. Barrier
//! 5. Aggregate (leader): collect records, write reports, remove scratch
//!
//! Any failure aborts the whole group. No partial report is ever written.

pub mod dispatch;
pub mod record;
pub mod scratch;

use crate::config::RunPlan;
use crate::coordination::{CoordinationError, ProcessGroup};
use crate::methods::plugin::panic_message;
use crate::methods::{MethodFactory, MethodRegistry};
use crate::output;
use crate::util::time::{format_duration, Measured, Stopwatch};
use anyhow::Context;
use log::{debug, error, info};
use std::error::Error as StdError;
use std::time::Instant;
use thiserror::Error;

pub use dispatch::{dispatch, write_method_list};
pub use record::{AggregatedReport, RecordParseError, TimingRecord, REPORT_HEADER};

/// A unit that could not be built or did not finish
#[derive(Debug, Error)]
pub enum UnitExecutionError {
    #[error("rank {rank}: failed to construct method '{method}': {source}")]
    Construct {
        method: String,
        rank: usize,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("rank {rank}: method '{method}' failed: {source}")]
    Run {
        method: String,
        rank: usize,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("rank {rank}: method '{method}' panicked: {message}")]
    Panicked {
        method: String,
        rank: usize,
        message: String,
    },
}

/// Drives one benchmark run on this rank
pub struct Benchmarker {
    plan: RunPlan,
}

impl Benchmarker {
    pub fn new(plan: RunPlan) -> Self {
        Self { plan }
    }

    pub fn plan(&self) -> &RunPlan {
        &self.plan
    }

    /// Run the benchmark across the group
    ///
    /// Returns the aggregated report on the leader and `None` elsewhere. On
    /// failure the rest of the group is told to abort, the leader removes the
    /// scratch directory, and the error is returned.
    pub async fn run(
        &self,
        group: &mut ProcessGroup,
        registry: &MethodRegistry,
    ) -> anyhow::Result<Option<AggregatedReport>> {
        match self.run_phases(group, registry).await {
            Ok(report) => Ok(report),
            Err(e) => {
                let failed_rank = match e.downcast_ref::<CoordinationError>() {
                    Some(CoordinationError::PeerFailed { rank, .. }) => *rank,
                    _ => group.rank(),
                };
                error!("[rank {}] run failed: {:#}", group.rank(), e);
                group.abort(failed_rank, &format!("{:#}", e)).await;

                if group.is_leader() {
                    if let Err(cleanup) = scratch::remove_scratch(&self.plan.scratch_dir) {
                        error!("{:#}", cleanup);
                    }
                }
                Err(e)
            }
        }
    }

    async fn run_phases(
        &self,
        group: &mut ProcessGroup,
        registry: &MethodRegistry,
    ) -> anyhow::Result<Option<AggregatedReport>> {
        let rank = group.rank();
        let world_size = group.world_size();
        let scratch_dir = &self.plan.scratch_dir;

        // Resolve before any barrier so an unknown name fails fast everywhere
        let factory = registry.resolve(&self.plan.method)?;

        if group.is_leader() {
            scratch::prepare_scratch(scratch_dir)?;
            info!(
                "Running '{}' on {} rank(s), scratch at {}",
                self.plan.method,
                world_size,
                scratch_dir.display()
            );
        }

        group.barrier().await.context("Setup barrier failed")?;

        let run_start = Instant::now();

        let measured = self.execute(factory, rank).await?;
        debug!("[rank {}] unit finished in {}", rank, format_duration(measured.elapsed));
        let record = TimingRecord::from_measurement(rank, &measured);
        scratch::write_record(scratch_dir, &record)?;
        info!("[rank {}] {}", rank, record);

        group.barrier().await.context("Completion barrier failed")?;

        if !group.is_leader() {
            return Ok(None);
        }

        let total_secs = run_start.elapsed().as_secs_f64();
        let records = scratch::collect_records(scratch_dir)?;
        scratch::ensure_complete(&records, world_size)?;
        let report = AggregatedReport::new(records, total_secs);

        output::csv::write_report(&self.plan.output_path, &report)?;
        info!("Report written to {}", self.plan.output_path.display());
        if let Some(json_path) = &self.plan.json_output {
            output::json::write_report(json_path, &self.plan.method, &report)?;
            info!("JSON report written to {}", json_path.display());
        }

        scratch::remove_scratch(scratch_dir)?;
        output::text::print_summary(&self.plan.method, &report);

        Ok(Some(report))
    }

    /// Build, time and drop the unit on a blocking thread
    ///
    /// Construction happens outside the timed interval.
    async fn execute(&self, factory: MethodFactory, rank: usize) -> anyhow::Result<Measured> {
        let method = self.plan.method.clone();
        let args = self.plan.args.clone();
        debug!("[rank {}] constructing '{}' with args {{{}}}", rank, method, args);

        let task_method = method.clone();
        let handle = tokio::task::spawn_blocking(move || -> Result<Measured, UnitExecutionError> {
            let mut unit = factory(&args).map_err(|e| UnitExecutionError::Construct {
                method: task_method.clone(),
                rank,
                source: e.into(),
            })?;

            let watch = Stopwatch::start();
            unit.run().map_err(|e| UnitExecutionError::Run {
                method: task_method.clone(),
                rank,
                source: e.into(),
            })?;
            Ok(watch.stop())
        });

        match handle.await {
            Ok(result) => Ok(result?),
            Err(join) if join.is_panic() => Err(UnitExecutionError::Panicked {
                method,
                rank,
                message: panic_message(&*join.into_panic()),
            }
            .into()),
            Err(join) => {
                Err(anyhow::Error::new(join).context(format!("rank {}: unit task cancelled", rank)))
            }
        }
    }
}
