//! The interactive loop.
//!
//! Each iteration reads one line, routes it with [`dispatch::route`] and runs
//! the handler against the [`Session`]. Two things end the loop: an
//! interrupt while waiting for input, and end of input. Both flush the history
//! once and print a farewell. An interrupt while a subprocess or a chat
//! request is running only abandons that operation. Any other error is
//! printed and the loop continues.

use crate::assistant::Assistant;
use crate::aur::PackageAuditor;
use crate::builtins::{self, UsbListing};
use crate::completion::ShellHelper;
use crate::config::Config;
use crate::dir_search;
use crate::dispatch::{self, Route};
use crate::executor::{Executor, RunOutcome};
use crate::history::HistoryStore;
use crate::prompt;
use crate::session::Session;
use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{CompletionType, Editor};
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, info};

const INTERRUPTED: &str = "Interrupted. Returning to prompt...";

/// What one read from the terminal produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Line(String),
    /// Ctrl-C at the prompt.
    Interrupted,
    /// Ctrl-D or closed input.
    Eof,
}

/// Source of input lines.
pub trait LineReader {
    /// Shows `prompt` and waits for a line; `cwd` drives path completion.
    fn read_line(&mut self, prompt: &str, cwd: &Path) -> Result<ReadOutcome>;

    /// Makes `line` available to history navigation.
    fn add_history(&mut self, line: &str);
}

/// Terminal line editor with completion and in-memory history.
pub struct RustylineReader {
    editor: Editor<ShellHelper, DefaultHistory>,
}

impl RustylineReader {
    pub fn new(helper: ShellHelper, history: &HistoryStore, max_entries: usize) -> Result<Self> {
        let config = rustyline::Config::builder()
            .max_history_size(max_entries)?
            .auto_add_history(false)
            .completion_type(CompletionType::List)
            .build();
        let mut editor = Editor::<ShellHelper, DefaultHistory>::with_config(config)?;
        editor.set_helper(Some(helper));
        for entry in history.entries() {
            editor.add_history_entry(entry)?;
        }
        Ok(Self { editor })
    }
}

impl LineReader for RustylineReader {
    fn read_line(&mut self, prompt: &str, cwd: &Path) -> Result<ReadOutcome> {
        if let Some(helper) = self.editor.helper_mut() {
            helper.set_cwd(cwd);
        }
        match self.editor.readline(prompt) {
            Ok(line) => Ok(ReadOutcome::Line(line)),
            Err(ReadlineError::Interrupted) => Ok(ReadOutcome::Interrupted),
            Err(ReadlineError::Eof) => Ok(ReadOutcome::Eof),
            Err(e) => Err(e.into()),
        }
    }

    fn add_history(&mut self, line: &str) {
        if let Err(e) = self.editor.add_history_entry(line) {
            debug!("Could not add history entry: {}", e);
        }
    }
}

/// Runs `work` until it finishes or Ctrl-C arrives; `None` means interrupted.
async fn interruptible<T>(work: impl Future<Output = Result<T>>) -> Result<Option<T>> {
    let mut interrupt = signal(SignalKind::interrupt())?;
    tokio::select! {
        result = work => result.map(Some),
        _ = interrupt.recv() => {
            info!("Operation interrupted");
            Ok(None)
        }
    }
}

/// Collaborators the shell dispatches to.
pub struct Services {
    pub executor: Executor,
    pub assistant: Assistant,
    pub auditor: PackageAuditor,
}

pub struct Shell<W: Write> {
    session: Session,
    config: Config,
    executor: Executor,
    assistant: Assistant,
    auditor: PackageAuditor,
    history_path: Option<PathBuf>,
    home: Option<PathBuf>,
    out: W,
}

impl<W: Write> Shell<W> {
    pub fn new(session: Session, config: Config, services: Services, out: W) -> Self {
        Self {
            session,
            config,
            executor: services.executor,
            assistant: services.assistant,
            auditor: services.auditor,
            history_path: Config::history_path().ok(),
            home: dirs::home_dir(),
            out,
        }
    }

    pub fn with_history_path(mut self, path: PathBuf) -> Self {
        self.history_path = Some(path);
        self
    }

    pub fn with_home(mut self, home: Option<PathBuf>) -> Self {
        self.home = home;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    /// Reads and handles lines until the user leaves.
    pub async fn run(&mut self, reader: &mut dyn LineReader) -> Result<()> {
        loop {
            let virtual_env = std::env::var("VIRTUAL_ENV").ok();
            let prompt = prompt::render(
                &self.executor,
                &self.session.cwd,
                self.home.as_deref(),
                virtual_env.as_deref(),
            );
            let outcome = match reader.read_line(&prompt, &self.session.cwd) {
                Ok(outcome) => outcome,
                Err(e) => {
                    self.flush_history();
                    return Err(e.context("Could not read input"));
                }
            };

            match outcome {
                ReadOutcome::Line(line) => {
                    if !line.trim().is_empty() {
                        reader.add_history(&line);
                    }
                    if let Err(e) = self.handle_line(&line).await {
                        writeln!(self.out, "{}", format!("An error occurred: {:#}", e).bold().red())?;
                    }
                }
                ReadOutcome::Interrupted | ReadOutcome::Eof => {
                    info!("Leaving the shell ({:?})", outcome);
                    self.flush_history();
                    writeln!(self.out, "\n{}", "Exiting crust. Goodbye!".bold().red())?;
                    self.out.flush()?;
                    return Ok(());
                }
            }
        }
    }

    fn flush_history(&mut self) {
        if let Some(path) = &self.history_path {
            self.session.history.save_with_io(path, &mut self.out);
        }
    }

    /// Records, routes and handles one input line.
    pub async fn handle_line(&mut self, line: &str) -> Result<()> {
        self.session.history.push(line);
        let expanded = self.config.expand_alias(line);
        let sigil = self.config.question_sigil.clone();
        let route = dispatch::route(&expanded, &sigil);
        info!("Routing {:?}", route);

        match route {
            Route::Empty => Ok(()),
            Route::List => {
                let table = builtins::list_directory(&self.session.cwd)?;
                writeln!(self.out, "{}", table)?;
                Ok(())
            }
            Route::DiskUsage => {
                let table = builtins::disk_usage(&self.executor, &self.session.cwd)?;
                writeln!(self.out, "{}", table)?;
                Ok(())
            }
            Route::UsbDevices => {
                match builtins::usb_devices(&self.executor, &self.session.cwd)? {
                    UsbListing::Devices(table) => writeln!(self.out, "{}", table)?,
                    UsbListing::NotInstalled => writeln!(self.out, "{}", "'lsusb' not found.".bold().red())?,
                }
                Ok(())
            }
            Route::About => {
                writeln!(self.out, "{}", builtins::about().bold())?;
                Ok(())
            }
            Route::Troubleshooting => self.troubleshoot().await,
            Route::PackageCheck(package) => self.check_package(package).await,
            Route::ChangeDir(dir) => self.change_dir(dir),
            Route::Question(text) => self.ask(text).await,
            Route::Execute(command) => self.execute(command).await,
        }
    }

    async fn troubleshoot(&mut self) -> Result<()> {
        writeln!(self.out, "Connecting...")?;
        let work = builtins::troubleshoot(&self.assistant, &self.executor, &self.session.cwd);
        match interruptible(work).await? {
            Some(reply) => writeln!(self.out, "{}", reply)?,
            None => writeln!(self.out, "\n{}", INTERRUPTED.bold().red())?,
        }
        Ok(())
    }

    async fn check_package(&mut self, package: &str) -> Result<()> {
        let work = self.auditor.audit(package, &mut self.out);
        match interruptible(work).await? {
            Some(verdict) => writeln!(self.out, "{}", verdict)?,
            None => writeln!(self.out, "\n{}", INTERRUPTED.bold().red())?,
        }
        Ok(())
    }

    async fn ask(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            writeln!(self.out, "Usage: {} <question>", self.config.question_sigil)?;
            return Ok(());
        }

        let cwd = self.session.cwd.clone();
        let conversation = self.session.conversation_mut();
        let work = self.assistant.handle_question(conversation, text, &cwd, &mut self.out);
        match interruptible(work).await? {
            Some(report) => debug!("Directive report: {:?}", report),
            None => writeln!(self.out, "\n{}", INTERRUPTED.bold().red())?,
        }
        Ok(())
    }

    async fn execute(&mut self, command: &str) -> Result<()> {
        match self.executor.execute_snippet(command, &self.session.cwd).await? {
            RunOutcome::Exited(Some(0)) => {}
            RunOutcome::Exited(Some(code)) => {
                info!("Command exited with status {}", code);
                writeln!(self.out, "{}", format!("Command exited with status {}", code).yellow())?;
            }
            RunOutcome::Exited(None) => {
                writeln!(self.out, "{}", "Command terminated by a signal".yellow())?;
            }
            RunOutcome::Interrupted => {
                writeln!(self.out, "\n{}\n", INTERRUPTED.bold().red())?;
            }
        }
        Ok(())
    }

    /// Expands `~` and resolves relative paths against the session directory.
    fn expand_path(&self, arg: &str) -> Result<PathBuf> {
        let home = || self.home.clone().ok_or_else(|| anyhow!("Could not find home directory"));
        if arg == "~" {
            home()
        } else if let Some(rest) = arg.strip_prefix("~/") {
            Ok(home()?.join(rest))
        } else {
            Ok(self.session.cwd.join(arg))
        }
    }

    fn change_dir(&mut self, arg: &str) -> Result<()> {
        let target = match arg {
            "" => self.expand_path("~")?,
            "-" => match &self.session.previous_cwd {
                Some(previous) => {
                    writeln!(self.out, "{}", previous.display())?;
                    previous.clone()
                }
                None => return Err(anyhow!("cd: no previous directory")),
            },
            _ => self.expand_path(arg)?,
        };

        if target.is_dir() {
            let target = target
                .canonicalize()
                .with_context(|| format!("cd: cannot enter {}", target.display()))?;
            debug!("Changing directory to {:?}", target);
            self.session.change_dir(target);
            return Ok(());
        }

        // A bare name that is not a child of cwd: search below cwd for it.
        if arg.contains('/') || arg.starts_with('~') || arg == "-" {
            return Err(anyhow!("cd: no such directory: {}", arg));
        }
        writeln!(self.out, "Searching for '{}' under {}...", arg, self.session.cwd.display())?;
        match dir_search::find(&self.session.cwd, arg) {
            Some(found) => {
                writeln!(self.out, "{}", format!("Found directory: {}", found.display()).green())?;
                self.session.change_dir(found);
            }
            None => {
                writeln!(
                    self.out,
                    "{}",
                    format!(
                        "Directory '{}' not found in {} or its subdirectories",
                        arg,
                        self.session.cwd.display()
                    )
                    .red()
                )?;
            }
        }
        Ok(())
    }
}
