//! Sleep stub

use crate::methods::{ExecutableUnit, Method, MethodArgs};
use log::debug;
use std::time::Duration;

/// Sleeps for a fixed time
///
/// Arguments: `ms` (default 10), `message` (optional, logged at debug level).
#[derive(Debug, Clone)]
pub struct Echo {
    delay: Duration,
    message: Option<String>,
}

impl Echo {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            message: None,
        }
    }
}

impl Method for Echo {
    fn from_args(args: &MethodArgs) -> anyhow::Result<Self> {
        Ok(Self {
            delay: Duration::from_millis(args.parse_or("ms", 10u64)?),
            message: args.get("message").map(str::to_string),
        })
    }
}

impl ExecutableUnit for Echo {
    fn run(&mut self) -> anyhow::Result<()> {
        std::thread::sleep(self.delay);
        if let Some(ref message) = self.message {
            debug!("echo: {}", message);
        }
        Ok(())
    }
}
