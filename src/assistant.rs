//! Conversational assistant with gated actions.
//!
//! [`Assistant::ask`] appends the user's text to the session conversation and
//! returns the reply. [`Assistant::act_on_reply`] then works through the
//! reply's directives in order:
//!
//! - `EXECUTE`: asks for approval, runs the command with output captured,
//!   feeds the output back and re-queries.
//! - `EDIT-FILE`: asks for approval, then replaces the whole file.
//! - `READ-FILE`: reads without approval, feeds the contents back and
//!   re-queries. Remaining directives of the same reply are then dropped
//!   unless `continue_after_read` is set.
//!
//! Follow-up replies are shown but their directives are not actioned.
//! Ctrl-C raised while a reply is being worked through declines the pending
//! action and drops the directives after it.

use crate::approval::{ApprovalOracle, ApprovalRequest};
use crate::chat_client::ChatClient;
use crate::conversation::{Conversation, Message};
use crate::directives::{parse_directives, Directive};
use crate::executor::Executor;
use anyhow::Result;
use async_trait::async_trait;
use colored::Colorize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal::unix::{signal, Signal, SignalKind};
use tracing::{info, warn};

const OPERATING_CONTRACT: &str = "You are an assistant integrated into crust, an interactive Linux shell. \
Questions reach you when the user types the question sigil followed by their text.\n\n\
You are able to run commands. To run one, put it on its own line as:\n\
EXECUTE <command>\n\
The user is asked to approve each command; its combined output is sent back to you in the next message. \
When you receive the output of a command, reason from it instead of asking to run it again. \
Prefer running a command over telling the user to run it. Never pretend to run a command.\n\n\
To change a file, write a line EDIT-FILE <path> followed by the complete new contents of the file. \
The contents end at the next directive line or at the end of your reply. \
Do not describe the change in words; the user approves each overwrite.\n\n\
To view a file, write a line READ-FILE <path>. Its contents are sent back to you in the next message. \
Request one file per READ-FILE line.\n\n\
Your replies are shown as plain text: do not use markdown or any other formatting. \
This message is not sent by the user.\n\n\
System information, for questions about this machine:\n";

/// What happened while working through one reply's directives.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ActionReport {
    pub executed: usize,
    pub written: usize,
    pub read: usize,
    pub declined: usize,
    pub failed: usize,
    /// Directives dropped because a READ-FILE or Ctrl-C ended the scan.
    pub skipped: usize,
}

/// Reports Ctrl-C raised while one reply's directives are actioned.
#[async_trait]
pub trait InterruptSource: Send {
    /// Forgets earlier interrupts; called before each reply.
    fn arm(&mut self);

    /// Whether Ctrl-C arrived since [`arm`](Self::arm). Stays true once seen.
    async fn raised(&mut self) -> bool;
}

/// Watches SIGINT with a listener created per reply.
#[derive(Default)]
pub struct SignalInterrupts {
    listener: Option<Signal>,
    seen: bool,
}

#[async_trait]
impl InterruptSource for SignalInterrupts {
    fn arm(&mut self) {
        self.seen = false;
        self.listener = match signal(SignalKind::interrupt()) {
            Ok(listener) => Some(listener),
            Err(e) => {
                warn!("Cannot watch for Ctrl-C: {}", e);
                None
            }
        };
    }

    async fn raised(&mut self) -> bool {
        if self.seen {
            return true;
        }
        let Some(listener) = self.listener.as_mut() else {
            return false;
        };
        // Captured commands block the runtime; let the signal driver catch up.
        tokio::task::yield_now().await;
        self.seen = tokio::select! {
            biased;
            _ = listener.recv() => true,
            _ = std::future::ready(()) => false,
        };
        self.seen
    }
}

/// Owns the remote chat client and the approval gate for one shell.
pub struct Assistant {
    client: Arc<dyn ChatClient>,
    oracle: Box<dyn ApprovalOracle>,
    executor: Executor,
    continue_after_read: bool,
    interrupts: Box<dyn InterruptSource>,
}

impl Assistant {
    pub fn new(
        client: Arc<dyn ChatClient>,
        oracle: Box<dyn ApprovalOracle>,
        executor: Executor,
        continue_after_read: bool,
    ) -> Self {
        Self {
            client,
            oracle,
            executor,
            continue_after_read,
            interrupts: Box::new(SignalInterrupts::default()),
        }
    }

    /// System message opening every conversation.
    pub fn system_prompt(&self, cwd: &Path) -> String {
        format!("{}{}", OPERATING_CONTRACT, self.system_info(cwd))
    }

    fn system_info(&self, cwd: &Path) -> String {
        let runner = self.executor.runner();
        let probe: &[&str] = if runner.program_exists("neofetch") {
            &["neofetch", "--stdout"]
        } else {
            &["uname", "-a"]
        };
        match self.executor.capture(probe[0], &probe[1..], cwd) {
            Ok(info) => info,
            Err(e) => {
                warn!("Could not collect system information: {}", e);
                "unavailable".to_string()
            }
        }
    }

    /// Sends `text` as the next user turn and returns the reply.
    ///
    /// The conversation is seeded with the system message on first use. Both
    /// the question and the reply are appended to it.
    pub async fn ask(&self, conversation: &mut Conversation, text: &str, cwd: &Path) -> Result<String> {
        if conversation.needs_seed() {
            info!("Starting a new conversation");
            conversation.push_system(self.system_prompt(cwd));
        }

        conversation.push_user(text);
        self.requery(conversation).await
    }

    /// Sends the conversation as it stands and appends the reply.
    async fn requery(&self, conversation: &mut Conversation) -> Result<String> {
        let reply = self.client.chat(conversation.messages()).await?;
        conversation.push_assistant(reply.clone());
        Ok(reply)
    }

    /// Single question in a throwaway conversation.
    pub async fn one_shot(&self, system: &str, text: &str) -> Result<String> {
        let messages = [Message::system(system), Message::user(text)];
        self.client.chat(&messages).await
    }

    /// Asks `text`, prints the reply, and actions its directives.
    pub async fn handle_question<W: Write>(
        &mut self,
        conversation: &mut Conversation,
        text: &str,
        cwd: &Path,
        out: &mut W,
    ) -> Result<ActionReport> {
        writeln!(out, "{}", "Processing prompt...".blue())?;
        let reply = self.ask(conversation, text, cwd).await?;
        writeln!(out, "{}\n{}", "AI Response:".bold().cyan(), reply)?;
        self.act_on_reply(conversation, &reply, cwd, out).await
    }

    /// Actions the directives in `reply`, in order.
    pub async fn act_on_reply<W: Write>(
        &mut self,
        conversation: &mut Conversation,
        reply: &str,
        cwd: &Path,
        out: &mut W,
    ) -> Result<ActionReport> {
        let directives = parse_directives(reply);
        let mut report = ActionReport::default();
        if directives.is_empty() {
            return Ok(report);
        }

        writeln!(out, "{}", "Scanning for commands, file edits, and reads...".green())?;
        let total = directives.len();
        self.interrupts.arm();

        for (index, directive) in directives.into_iter().enumerate() {
            if self.interrupts.raised().await {
                report.skipped = total - index;
                info!("Interrupted, {} directives skipped", report.skipped);
                writeln!(out, "{}", "Interrupted, remaining actions skipped.".yellow())?;
                break;
            }
            match directive {
                Directive::Execute { command } => {
                    self.execute(conversation, &command, cwd, out, &mut report).await?;
                }
                Directive::EditFile { path, content } => {
                    self.edit_file(&path, &content, cwd, out, &mut report).await?;
                }
                Directive::ReadFile { path } => {
                    let actioned = self.read_file(conversation, &path, cwd, out, &mut report).await?;
                    if actioned && !self.continue_after_read {
                        report.skipped = total - index - 1;
                        if report.skipped > 0 {
                            info!("READ-FILE ends the scan, {} directives skipped", report.skipped);
                        }
                        break;
                    }
                }
            }
        }

        Ok(report)
    }

    /// Asks the oracle; Ctrl-C raised while it waited counts as a no.
    async fn approved(&mut self, request: &ApprovalRequest<'_>) -> bool {
        self.oracle.approve(request) && !self.interrupts.raised().await
    }

    async fn execute<W: Write>(
        &mut self,
        conversation: &mut Conversation,
        command: &str,
        cwd: &Path,
        out: &mut W,
        report: &mut ActionReport,
    ) -> Result<()> {
        if command.is_empty() {
            writeln!(out, "{}", "Ignoring an EXECUTE line with no command.".red())?;
            report.failed += 1;
            return Ok(());
        }

        writeln!(out, "{}", "Found an execution of a command in the response".magenta())?;
        if !self.approved(&ApprovalRequest::Execute { command }).await {
            writeln!(out, "Skipped: {}", command)?;
            report.declined += 1;
            return Ok(());
        }

        let captured = self.executor.capture_shell(command, cwd);
        writeln!(out, "{}\n{}", "Command output:".green(), captured.text)?;
        if !captured.success {
            warn!("Captured command {:?} failed", command);
            writeln!(out, "{}", "The command did not succeed.".red())?;
        }
        report.executed += 1;

        conversation.push_user(format!(
            "The command `{}` has already been executed. Here's the result:\n{}",
            command, captured.text
        ));
        writeln!(out, "{}", "Sending command output back to AI...".yellow())?;
        let follow_up = self.requery(conversation).await?;
        writeln!(out, "{}\n{}", "New AI Response:".bold().cyan(), follow_up)?;
        Ok(())
    }

    async fn edit_file<W: Write>(
        &mut self,
        path: &str,
        content: &str,
        cwd: &Path,
        out: &mut W,
        report: &mut ActionReport,
    ) -> Result<()> {
        let Some(target) = resolve(path, cwd) else {
            writeln!(out, "{}", "Ignoring an EDIT-FILE line with no path.".red())?;
            report.failed += 1;
            return Ok(());
        };

        writeln!(out, "{} {}", "Found a file edit request for:".magenta(), target.display())?;
        if !self.approved(&ApprovalRequest::OverwriteFile { path: &target }).await {
            writeln!(out, "Left unchanged: {}", target.display())?;
            report.declined += 1;
            return Ok(());
        }

        match fs::write(&target, content) {
            Ok(()) => {
                info!("Wrote {} bytes to {:?}", content.len(), target);
                writeln!(out, "{}", format!("File {} written.", target.display()).green())?;
                report.written += 1;
            }
            Err(e) => {
                warn!("Could not write {:?}: {}", target, e);
                writeln!(out, "{}", format!("Could not write file {}: {}", target.display(), e).red())?;
                report.failed += 1;
            }
        }
        Ok(())
    }

    /// Returns whether the file was read and sent back.
    async fn read_file<W: Write>(
        &mut self,
        conversation: &mut Conversation,
        path: &str,
        cwd: &Path,
        out: &mut W,
        report: &mut ActionReport,
    ) -> Result<bool> {
        let Some(target) = resolve(path, cwd) else {
            writeln!(out, "{}", "Ignoring a READ-FILE line with no path.".red())?;
            report.failed += 1;
            return Ok(false);
        };

        writeln!(out, "{} {}", "AI requested to read file:".bold().cyan(), target.display())?;
        let contents = match fs::read_to_string(&target) {
            Ok(contents) => contents,
            Err(e) => {
                warn!("Could not read {:?}: {}", target, e);
                writeln!(out, "{}", format!("Could not read file {}: {}", target.display(), e).red())?;
                report.failed += 1;
                return Ok(false);
            }
        };

        report.read += 1;
        conversation.push_user(format!("Contents of `{}`:\n{}", path, contents));
        writeln!(out, "{}", "Re-querying AI with file contents...".yellow())?;
        let follow_up = self.requery(conversation).await?;
        writeln!(out, "{}\n{}", "New AI Response:".bold().cyan(), follow_up)?;
        Ok(true)
    }
}

/// Resolves a directive path against the session directory.
fn resolve(path: &str, cwd: &Path) -> Option<PathBuf> {
    let path = path.trim();
    if path.is_empty() {
        return None;
    }
    let expanded = match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map(|home| home.join(rest)),
        None => None,
    };
    Some(expanded.unwrap_or_else(|| cwd.join(path)))
}
