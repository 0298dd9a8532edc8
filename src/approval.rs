//! Yes/no confirmation before the assistant changes anything.
//!
//! Every EXECUTE and EDIT-FILE directive passes through an [`ApprovalOracle`]
//! before it has any effect. The console implementation asks on the terminal;
//! tests inject a scripted oracle.

use anyhow::Result;
use std::fmt;
use std::io::{self, BufRead, Write};
use std::path::Path;
use tracing::{info, warn};

/// A side effect waiting for confirmation.
#[derive(Debug, Clone, Copy)]
pub enum ApprovalRequest<'a> {
    Execute { command: &'a str },
    OverwriteFile { path: &'a Path },
}

impl fmt::Display for ApprovalRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalRequest::Execute { command } => {
                write!(f, "OK if I execute this command? yes/no: {}", command)
            }
            ApprovalRequest::OverwriteFile { path } => {
                write!(f, "OK if I overwrite this file? yes/no: {}", path.display())
            }
        }
    }
}

/// Decides whether a gated action may proceed.
pub trait ApprovalOracle: Send {
    fn approve(&mut self, request: &ApprovalRequest<'_>) -> bool;
}

/// Asks the user on stdin/stdout.
///
/// `yes`/`y` approves, `no`/`n` declines, anything else asks again. End of
/// input declines.
///
/// # Example
///
/// ```no_run
/// use crust::approval::{ApprovalRequest, ConsoleApproval};
///
/// let approved = ConsoleApproval.ask_with_io(
///     &ApprovalRequest::Execute { command: "rm -rf build" },
///     &mut std::io::stdin().lock(),
///     &mut std::io::stdout(),
/// )?;
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleApproval;

impl ConsoleApproval {
    /// Prompts using custom I/O streams.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or writing fails.
    pub fn ask_with_io<R: BufRead, W: Write>(
        &self,
        request: &ApprovalRequest<'_>,
        input: &mut R,
        output: &mut W,
    ) -> Result<bool> {
        loop {
            write!(output, "{} ", request)?;
            output.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                writeln!(output)?;
                info!("No answer for {:?}, declining", request);
                return Ok(false);
            }

            match line.trim().to_lowercase().as_str() {
                "yes" | "y" => {
                    info!("User approved {:?}", request);
                    return Ok(true);
                }
                "no" | "n" => {
                    info!("User declined {:?}", request);
                    return Ok(false);
                }
                _ => {
                    writeln!(output, "Please answer yes or no.")?;
                }
            }
        }
    }
}

impl ApprovalOracle for ConsoleApproval {
    fn approve(&mut self, request: &ApprovalRequest<'_>) -> bool {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        let mut output = io::stdout();
        match self.ask_with_io(request, &mut input, &mut output) {
            Ok(approved) => approved,
            Err(e) => {
                warn!("Approval prompt failed, declining: {}", e);
                false
            }
        }
    }
}
