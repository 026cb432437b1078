//! Plugin whose entry point panics after a partial registration

use rankbench::methods::{ExecutableUnit, MethodRegistry};

struct Never;

impl ExecutableUnit for Never {
    fn run(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

fn register(registry: &mut MethodRegistry) -> anyhow::Result<()> {
    registry.register_fn("HalfRegistered", |_args| Ok(Never));
    panic!("plugin init boom");
}

rankbench::declare_plugin!(register);
