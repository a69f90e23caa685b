//! Process management for the emulator subprocess

use crate::error::{EmulatorError, Result};
use std::process::Stdio;
use tokio::process::{Child, ChildStderr, Command};

/// Configuration for spawning an emulator process
#[derive(Clone, Debug)]
pub struct ProcessConfig {
    /// Path to the executable
    pub program: String,

    /// Arguments to pass to the executable
    pub args: Vec<String>,
}

impl ProcessConfig {
    /// Create a new process configuration
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Add an argument
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add several arguments
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Render the command line for logging
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Handle to a running emulator process
///
/// stdout is inherited from the parent. stderr is piped so the caller can
/// watch it for the readiness announcement. The child is killed if the
/// handle is dropped while it is still running.
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    pid: Option<u32>,
}

impl ProcessHandle {
    /// Spawn a new process, returning the handle and its piped stderr
    pub fn spawn(config: &ProcessConfig) -> Result<(Self, ChildStderr)> {
        let mut cmd = Command::new(&config.program);
        cmd.args(&config.args);

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::inherit());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn().map_err(EmulatorError::Spawn)?;
        let pid = child.id();

        let stderr = child.stderr.take().ok_or_else(|| {
            EmulatorError::Spawn(std::io::Error::other("child stderr was not captured"))
        })?;

        tracing::debug!(pid, command = %config.command_line(), "spawned emulator process");

        Ok((Self { child, pid }, stderr))
    }

    /// OS process id, if the child had one when spawned
    pub fn id(&self) -> Option<u32> {
        self.pid
    }

    /// Check if the process is still alive
    pub fn is_alive(&mut self) -> bool {
        self.child.try_wait().ok().flatten().is_none()
    }

    /// Kill the process and reap it
    pub async fn kill(&mut self) -> std::io::Result<()> {
        self.child.kill().await
    }
}
