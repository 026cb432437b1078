//! rankbench - barrier-synchronized multi-process benchmark runner
//!
//! rankbench starts one process per rank, has every rank execute the same named
//! method between two collective barriers, and lets rank 0 merge the per-rank
//! wall-clock timings into a single report.
//!
//! # Architecture
//!
//! - **Method registry**: name → factory mapping, built-ins plus native plugins
//! - **Coordination**: TCP process group with rendezvous and barriers
//! - **Orchestrator**: setup, barrier, timed execution, barrier, aggregation
//! - **Output**: CSV report, JSON report, console summary
//! - **Launcher**: spawns local ranks for single-host runs

pub mod config;
pub mod coordination;
pub mod launcher;
pub mod methods;
pub mod orchestrator;
pub mod output;
pub mod util;

// Re-export commonly used types
pub use config::RunConfig;
pub use coordination::{GroupConfig, ProcessGroup, WorkerIdentity};
pub use methods::{ExecutableUnit, MethodArgs, MethodFactory, MethodRegistry};
pub use orchestrator::Benchmarker;

/// Result type used throughout rankbench
pub type Result<T> = anyhow::Result<T>;
