//! Process execution for the shell.
//!
//! Three kinds of process are run:
//! - foreground snippets (`<interpreter> -c <line>`), attached to the
//!   terminal and cancellable with Ctrl-C,
//! - captured shell commands requested by the assistant, with stdout and
//!   stderr merged into one text,
//! - captured helper programs (`df`, `lsusb`, `git`) whose output is parsed.

use crate::language::{self, Language};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::{Command, Output};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, error, info};

const SIGINT: i32 = 2;

/// How a foreground process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The process exited on its own; `None` when killed by a signal.
    Exited(Option<i32>),
    /// Ctrl-C arrived while the process was running.
    Interrupted,
}

/// Combined stdout+stderr of a captured shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedOutput {
    pub success: bool,
    pub text: String,
}

// =============================================================================
// Traits for Dependency Injection
// =============================================================================

/// Trait for running system processes.
///
/// This abstraction enables testing without spawning real processes.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Runs a program to completion and captures its output.
    fn run(&self, program: &str, args: &[&str], cwd: &Path) -> Result<Output>;

    /// Checks if a program exists in PATH.
    fn program_exists(&self, program: &str) -> bool;

    /// Runs a program attached to the terminal until it exits or Ctrl-C.
    async fn run_foreground(&self, program: &str, args: &[&str], cwd: &Path) -> Result<RunOutcome>;
}

/// Default process runner using std and tokio process APIs.
pub struct SystemProcessRunner;

#[async_trait]
impl ProcessRunner for SystemProcessRunner {
    fn run(&self, program: &str, args: &[&str], cwd: &Path) -> Result<Output> {
        let mut cmd = Command::new(program);
        cmd.args(args).current_dir(cwd);
        Ok(cmd.output()?)
    }

    fn program_exists(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }

    async fn run_foreground(&self, program: &str, args: &[&str], cwd: &Path) -> Result<RunOutcome> {
        // A fresh listener only sees interrupts raised from here on.
        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut child = tokio::process::Command::new(program)
            .args(args)
            .current_dir(cwd)
            .spawn()
            .with_context(|| format!("Failed to start {}", program))?;

        tokio::select! {
            status = child.wait() => {
                // The child shares our process group, so Ctrl-C may reach it first.
                let status = status?;
                if status.signal() == Some(SIGINT) {
                    Ok(RunOutcome::Interrupted)
                } else {
                    Ok(RunOutcome::Exited(status.code()))
                }
            }
            _ = interrupt.recv() => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                Ok(RunOutcome::Interrupted)
            }
        }
    }
}

// =============================================================================
// Executor Implementation
// =============================================================================

/// Runs input lines and helper commands through a [`ProcessRunner`].
///
/// # Example
///
/// ```ignore
/// let executor = Executor::new(Arc::new(SystemProcessRunner));
/// let outcome = executor.execute_snippet("echo hi", Path::new(".")).await?;
/// ```
#[derive(Clone)]
pub struct Executor {
    runner: std::sync::Arc<dyn ProcessRunner>,
}

impl Executor {
    pub fn new(runner: std::sync::Arc<dyn ProcessRunner>) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &dyn ProcessRunner {
        self.runner.as_ref()
    }

    /// Interpreter for `line`: the classifier's verdict when installed,
    /// otherwise the fallback shell.
    pub fn interpreter_for(&self, line: &str) -> Language {
        let language = language::classify(line);
        if language == language::FALLBACK || self.runner.program_exists(language.interpreter()) {
            language
        } else {
            debug!("{} is not installed, using {}", language, language::FALLBACK);
            language::FALLBACK
        }
    }

    /// Runs `line` as `[interpreter, "-c", line]` in the foreground.
    pub async fn execute_snippet(&self, line: &str, cwd: &Path) -> Result<RunOutcome> {
        let language = self.interpreter_for(line);
        info!("Executing with {}: {}", language, line);
        self.runner
            .run_foreground(language.interpreter(), &["-c", line], cwd)
            .await
    }

    /// Runs `command` through `sh` with stderr merged into stdout.
    ///
    /// Never fails: a command that cannot be started yields its error text.
    pub fn capture_shell(&self, command: &str, cwd: &Path) -> CapturedOutput {
        info!("Executing captured command: {}", command);
        let script = format!("exec 2>&1\n{}", command);
        match self.runner.run("sh", &["-c", &script], cwd) {
            Ok(output) => CapturedOutput {
                success: output.status.success(),
                text: String::from_utf8_lossy(&output.stdout).into_owned(),
            },
            Err(e) => {
                error!("Failed to run {:?}: {}", command, e);
                CapturedOutput {
                    success: false,
                    text: e.to_string(),
                }
            }
        }
    }

    /// Runs a helper program and returns its stdout.
    ///
    /// # Errors
    ///
    /// Returns an error if the program cannot be started or exits non-zero.
    pub fn capture(&self, program: &str, args: &[&str], cwd: &Path) -> Result<String> {
        let output = self.runner.run(program, args, cwd)?;
        Self::handle_output(program, &output)
    }

    fn handle_output(program: &str, output: &Output) -> Result<String> {
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            error!("{} failed with status: {}", program, output.status);
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(anyhow!("{} failed ({}): {}", program, output.status, stderr.trim()))
        }
    }
}
