//! External command execution behind a substitutable capability.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error, instrument};

use crate::environment::IsolatedEnvironment;
use crate::error::{ProverError, ProverResult};

/// A single external command to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl ToolInvocation {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            working_dir: None,
        }
    }

    #[must_use]
    pub fn in_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Shell-like rendering for logs and error messages
    #[must_use]
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a successful command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub stdout: String,
    pub exit_code: i32,
}

/// Runs external commands; non-zero exits are returned as errors
#[async_trait]
pub trait ExternalToolRunner: Send + Sync {
    async fn run(&self, invocation: &ToolInvocation) -> ProverResult<ToolOutput>;
}

/// Spawns real subprocesses inside the isolated environment
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    environment: IsolatedEnvironment,
    timeout: Option<Duration>,
}

impl ProcessRunner {
    #[must_use]
    pub const fn new(environment: IsolatedEnvironment, timeout: Option<Duration>) -> Self {
        Self {
            environment,
            timeout,
        }
    }

    #[must_use]
    pub const fn environment(&self) -> &IsolatedEnvironment {
        &self.environment
    }
}

#[async_trait]
impl ExternalToolRunner for ProcessRunner {
    #[instrument(skip(self), fields(command = %invocation.command_line()), level = "debug")]
    async fn run(&self, invocation: &ToolInvocation) -> ProverResult<ToolOutput> {
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .envs(self.environment.vars())
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = &invocation.working_dir {
            command.current_dir(dir);
        }

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, command.output())
                .await
                .map_err(|_| {
                    error!("⏱️ `{}` timed out after {:?}", invocation.command_line(), limit);
                    ProverError::Timeout {
                        command: invocation.command_line(),
                        limit,
                    }
                })?,
            None => command.output().await,
        };

        let output = output.map_err(|e| ProverError::ExternalToolFailure {
            command: invocation.command_line(),
            exit_code: None,
            stderr: format!("failed to spawn: {e}"),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!(
                "❌ `{}` exited with {:?}: {}",
                invocation.command_line(),
                output.status.code(),
                stderr
            );
            return Err(ProverError::ExternalToolFailure {
                command: invocation.command_line(),
                exit_code: output.status.code(),
                stderr,
            });
        }

        debug!("`{}` completed", invocation.command_line());
        Ok(ToolOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            exit_code: output.status.code().unwrap_or_default(),
        })
    }
}
