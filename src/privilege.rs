//! Privilege boundary for host commands.
//!
//! Every external command the installer issues is modeled as an [`Action`]
//! value executed through the [`Runner`] capability, so the elevation
//! points are auditable and tests can substitute a fake runner. Elevation
//! is interactive (`sudo` prompts on the controlling terminal) and happens
//! only for actions explicitly marked elevated.

use std::process::{Command, Stdio};

use crate::error::{InstallerError, Result};

/// A host command plus whether it needs elevated rights.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub program: String,
    pub args: Vec<String>,
    pub elevated: bool,
}

impl Action {
    pub fn new(program: impl Into<String>) -> Self {
        Action {
            program: program.into(),
            args: Vec::new(),
            elevated: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn elevated(mut self) -> Self {
        self.elevated = true;
        self
    }

    /// One-line rendering for logs and error messages.
    pub fn display(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Captured result of a host command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl From<std::process::Output> for CommandOutput {
    fn from(output: std::process::Output) -> Self {
        CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// Executes actions against the host. Production code uses [`HostRunner`];
/// tests substitute a recording fake.
pub trait Runner: Send + Sync {
    fn run(&self, action: &Action) -> Result<CommandOutput>;
}

/// Runs actions directly, prefixing `sudo` for elevated actions when the
/// process is not already root.
pub struct HostRunner;

impl Runner for HostRunner {
    fn run(&self, action: &Action) -> Result<CommandOutput> {
        let mut command = if action.elevated && !nix::unistd::geteuid().is_root() {
            let mut c = Command::new("sudo");
            c.arg(&action.program);
            c.args(&action.args);
            // sudo reads the password from the controlling terminal
            c.stdin(Stdio::inherit());
            c
        } else {
            let mut c = Command::new(&action.program);
            c.args(&action.args);
            c
        };

        let output = command.output()?;
        Ok(CommandOutput::from(output))
    }
}

/// Map a failed action to the error taxonomy: an elevated failure is a
/// privilege problem, an unelevated one is a service-manager problem.
pub fn ensure_success(action: &Action, output: &CommandOutput) -> Result<()> {
    if output.success {
        return Ok(());
    }

    let detail = if output.stderr.trim().is_empty() {
        format!("`{}` failed", action.display())
    } else {
        format!("`{}` failed: {}", action.display(), output.stderr.trim())
    };

    if action.elevated {
        Err(InstallerError::PermissionDenied { detail })
    } else {
        Err(InstallerError::ServiceManager(detail))
    }
}
