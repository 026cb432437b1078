//! Sample rankbench plugin
//!
//! Build with `cargo build --release` in this directory, then:
//!
//! ```text
//! rankbench --method-plugin target/release/libspin_plugin.so \
//!     --test-method Spin --method-args iterations=50000000
//! ```

use rankbench::methods::{ExecutableUnit, Method, MethodArgs, MethodRegistry};
use std::hint::black_box;

/// Busy loop of `iterations` wrapping multiply-adds
pub struct Spin {
    iterations: u64,
}

impl Method for Spin {
    fn from_args(args: &MethodArgs) -> anyhow::Result<Self> {
        Ok(Self {
            iterations: args.parse_or("iterations", 10_000_000u64)?,
        })
    }
}

impl ExecutableUnit for Spin {
    fn run(&mut self) -> anyhow::Result<()> {
        let mut acc = 0u64;
        for i in 0..self.iterations {
            acc = black_box(acc.wrapping_mul(31).wrapping_add(i));
        }
        log::debug!("spin finished, acc={}", acc);
        Ok(())
    }
}

fn register(registry: &mut MethodRegistry) -> anyhow::Result<()> {
    registry.register_method::<Spin>(["Spin", "BusyLoop"])?;
    Ok(())
}

rankbench::declare_plugin!(register);
