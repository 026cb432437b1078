//! Local multi-rank launcher (`--nproc N`)
//!
//! Re-executes the current binary once per rank with the process-group
//! environment set, the way `torchrun --nproc-per-node` does on one host.

use crate::Result;
use anyhow::{bail, Context};
use log::{debug, error, info};
use std::ffi::OsString;
use std::net::TcpListener;
use std::process::{Child, Command, ExitStatus};
use std::time::Duration;

/// Ports tried for the rendezvous endpoint
pub const PORT_RANGE: std::ops::Range<u16> = 29500..29600;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Find a free local port for the leader to listen on
pub fn find_available_port() -> Result<u16> {
    for port in PORT_RANGE {
        if let Ok(listener) = TcpListener::bind(("127.0.0.1", port)) {
            drop(listener);
            debug!("Port {} is available", port);
            return Ok(port);
        }
    }

    bail!(
        "No available ports found in range {}-{}. Close other rankbench runs or set MASTER_PORT and launch ranks manually.",
        PORT_RANGE.start,
        PORT_RANGE.end - 1
    )
}

/// Arguments for a child rank: everything after the program name, minus `--nproc`
pub fn child_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    let mut out = Vec::new();
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        if arg == "--nproc" {
            iter.next();
            continue;
        }
        if arg.to_str().is_some_and(|s| s.starts_with("--nproc=")) {
            continue;
        }
        out.push(arg);
    }
    out
}

/// Spawn `nproc` ranks of the current executable and wait for all of them
///
/// If any rank exits unsuccessfully the rest are killed, since they would
/// otherwise block at their next barrier.
pub fn launch_local(nproc: usize) -> Result<()> {
    let exe_path = std::env::current_exe().context("Failed to get current executable path")?;
    let args = child_args(std::env::args_os().skip(1));
    let port = find_available_port()?;

    info!("Launching {} local rank(s), rendezvous on 127.0.0.1:{}", nproc, port);

    let mut children: Vec<(usize, Child)> = Vec::with_capacity(nproc);
    for rank in 0..nproc {
        let mut cmd = Command::new(&exe_path);
        cmd.args(&args)
            .env("WORLD_SIZE", nproc.to_string())
            .env("RANK", rank.to_string())
            .env("LOCAL_RANK", rank.to_string())
            .env("MASTER_ADDR", "127.0.0.1")
            .env("MASTER_PORT", port.to_string());

        match cmd.spawn() {
            Ok(child) => {
                debug!("Rank {} launched (PID: {})", rank, child.id());
                children.push((rank, child));
            }
            Err(e) => {
                kill_all(&mut children);
                return Err(e).with_context(|| format!("Failed to spawn rank {}", rank));
            }
        }
    }

    let failed = wait_all(&mut children)?;
    if !failed.is_empty() {
        let summary: Vec<String> = failed
            .iter()
            .map(|(rank, status)| format!("rank {} ({})", rank, status))
            .collect();
        bail!("Local run failed: {}", summary.join(", "));
    }

    info!("All {} rank(s) completed", nproc);
    Ok(())
}

/// Wait for every child; on the first failure kill the remaining ones
fn wait_all(children: &mut Vec<(usize, Child)>) -> Result<Vec<(usize, ExitStatus)>> {
    let mut failed = Vec::new();

    while !children.is_empty() {
        let mut i = 0;
        while i < children.len() {
            let (rank, child) = &mut children[i];
            match child.try_wait()? {
                Some(status) => {
                    debug!("Rank {} exited with status: {}", rank, status);
                    if !status.success() {
                        error!("Rank {} failed with status: {}", rank, status);
                        failed.push((*rank, status));
                    }
                    children.swap_remove(i);
                }
                None => i += 1,
            }
        }

        if !failed.is_empty() && !children.is_empty() {
            kill_all(children);
            break;
        }
        if !children.is_empty() {
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    failed.sort_by_key(|(rank, _)| *rank);
    Ok(failed)
}

fn kill_all(children: &mut Vec<(usize, Child)>) {
    for (rank, mut child) in children.drain(..) {
        if let Ok(Some(_)) = child.try_wait() {
            continue;
        }
        debug!("Killing rank {} (PID: {})", rank, child.id());
        if let Err(e) = child.kill() {
            debug!("Could not kill rank {}: {}", rank, e);
        }
        let _ = child.wait();
    }
}
