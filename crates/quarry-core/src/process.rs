//! External command execution.
//!
//! Every clone, fetch and install goes through a [`ProcessRunner`]. The
//! system implementation spawns with `kill_on_drop` and races the child
//! against the request's cancellation token, so an aborted request never
//! leaves a clone or install running in the background.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{HydrationError, HydrationResult, ProcessFailure};

/// Environment variables that would redirect git onto another repository.
pub const GIT_ENV_OVERRIDES: [&str; 4] = [
    "GIT_DIR",
    "GIT_WORK_TREE",
    "GIT_INDEX_FILE",
    "GIT_COMMON_DIR",
];

/// A command to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env_remove: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env_remove: Vec::new(),
        }
    }

    /// Build a git command with repository-redirecting variables removed.
    pub fn git(program: impl Into<String>) -> Self {
        let mut spec = Self::new(program);
        spec.env_remove = GIT_ENV_OVERRIDES.iter().map(|s| s.to_string()).collect();
        spec
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

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Render as a shell-like line for logs and error messages.
    pub fn display(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            if arg.contains(' ') {
                line.push('"');
                line.push_str(arg);
                line.push('"');
            } else {
                line.push_str(arg);
            }
        }
        line
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, or -1 when terminated by a signal.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// stdout followed by stderr, trimmed.
    pub fn combined(&self) -> String {
        let stdout = self.stdout.trim();
        let stderr = self.stderr.trim();
        match (stdout.is_empty(), stderr.is_empty()) {
            (true, true) => String::new(),
            (false, true) => stdout.to_string(),
            (true, false) => stderr.to_string(),
            (false, false) => format!("{stdout}\n{stderr}"),
        }
    }

    /// Turn a non-zero exit into a [`ProcessFailure`] cause.
    pub fn failure(&self, spec: &CommandSpec) -> ProcessFailure {
        ProcessFailure {
            command: spec.display(),
            exit_code: self.exit_code,
            output: self.combined(),
        }
    }
}

/// Spawns external commands.
///
/// A non-zero exit is returned as data; callers decide whether it is fatal.
/// Errors are reserved for spawn failures and cancellation.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(
        &self,
        spec: &CommandSpec,
        cancel: &CancellationToken,
    ) -> HydrationResult<ProcessOutput>;
}

/// [`ProcessRunner`] backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessRunner;

#[async_trait]
impl ProcessRunner for SystemProcessRunner {
    async fn run(
        &self,
        spec: &CommandSpec,
        cancel: &CancellationToken,
    ) -> HydrationResult<ProcessOutput> {
        debug!(command = %spec.display(), cwd = ?spec.cwd, "running command");

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }
        for key in &spec.env_remove {
            cmd.env_remove(key);
        }

        let child = cmd.spawn().map_err(|e| {
            HydrationError::process(format!("Failed to run `{}`", spec.display()))
                .with_hint(format!("Is `{}` installed and on PATH?", spec.program))
                .with_source(e)
        })?;

        // Dropping the wait future drops the child, and kill_on_drop reaps it.
        let output = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(HydrationError::cancelled(format!(
                    "Cancelled while running `{}`",
                    spec.display()
                )));
            }
            result = child.wait_with_output() => result.map_err(|e| {
                HydrationError::process(format!("Failed to wait for `{}`", spec.display()))
                    .with_source(e)
            })?,
        };

        Ok(ProcessOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Path argument as a string, rejecting non-UTF-8 paths.
pub fn path_arg(path: &Path) -> HydrationResult<String> {
    path.to_str().map(str::to_string).ok_or_else(|| {
        HydrationError::invalid_descriptor(format!(
            "Path is not valid UTF-8: {}",
            path.display()
        ))
    })
}
