//! Shell command method

use crate::methods::{ExecutableUnit, Method, MethodArgs};
use anyhow::Context;
use log::debug;
use std::process::{Command, Stdio};

/// Runs `shell -c cmd` and fails on a non-zero exit status
///
/// Arguments: `cmd` (required), `shell` (default `sh`). Output is discarded
/// unless `capture=true`, in which case it is logged at debug level.
#[derive(Debug, Clone)]
pub struct CommandMethod {
    shell: String,
    cmd: String,
    capture: bool,
}

impl Method for CommandMethod {
    fn from_args(args: &MethodArgs) -> anyhow::Result<Self> {
        Ok(Self {
            shell: args.get_or("shell", "sh").to_string(),
            cmd: args.require("cmd")?.to_string(),
            capture: args.parse_or("capture", false)?,
        })
    }
}

impl ExecutableUnit for CommandMethod {
    fn run(&mut self) -> anyhow::Result<()> {
        let mut command = Command::new(&self.shell);
        command.arg("-c").arg(&self.cmd).stdin(Stdio::null());

        if self.capture {
            let output = command
                .output()
                .with_context(|| format!("failed to spawn {} -c '{}'", self.shell, self.cmd))?;
            debug!("command stdout: {}", String::from_utf8_lossy(&output.stdout).trim_end());
            if !output.status.success() {
                anyhow::bail!(
                    "command '{}' exited with {}: {}",
                    self.cmd,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim_end()
                );
            }
        } else {
            let status = command
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .with_context(|| format!("failed to spawn {} -c '{}'", self.shell, self.cmd))?;
            if !status.success() {
                anyhow::bail!("command '{}' exited with {}", self.cmd, status);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::methods::parse_method_args;

    #[test]
    fn test_requires_cmd() {
        let err = CommandMethod::from_args(&MethodArgs::new()).unwrap_err();
        assert!(err.to_string().contains("cmd"));
    }

    #[test]
    fn test_success() {
        let mut method = CommandMethod::from_args(&parse_method_args("cmd=true").unwrap()).unwrap();
        method.run().unwrap();
    }

    #[test]
    fn test_failure_status() {
        let mut method =
            CommandMethod::from_args(&parse_method_args("cmd=exit 3,capture=true").unwrap()).unwrap();
        let err = method.run().unwrap_err();
        assert!(err.to_string().contains("exited with"));
    }

    #[test]
    fn test_missing_shell() {
        let mut method = CommandMethod::from_args(
            &parse_method_args("cmd=true,shell=/nonexistent/shell").unwrap(),
        )
        .unwrap();
        assert!(method.run().is_err());
    }
}
