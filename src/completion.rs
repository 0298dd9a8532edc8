//! Tab completion for the interactive prompt.
//!
//! Candidates come from one of three sources, chosen by the shape of the
//! token under the cursor:
//!
//! - `~` or `~/...`: entries of the home directory (or below it), shown with
//!   the `~` prefix kept.
//! - the first word on the line, with no `/`: known command names.
//! - anything else: filesystem paths relative to the session directory.
//!
//! Directories get a trailing `/`. Candidate lists are deduplicated and sorted.

use crate::session::KnownCommands;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

const SEPARATOR: char = '/';

/// Computes completion candidates for a token of an input line.
#[derive(Debug, Clone)]
pub struct CompletionEngine {
    commands: Arc<KnownCommands>,
    home: Option<PathBuf>,
    cwd: PathBuf,
    matches: Vec<String>,
}

impl CompletionEngine {
    pub fn new(commands: Arc<KnownCommands>, home: Option<PathBuf>, cwd: PathBuf) -> Self {
        Self {
            commands,
            home,
            cwd,
            matches: Vec::new(),
        }
    }

    pub fn set_cwd(&mut self, cwd: &Path) {
        if self.cwd != cwd {
            self.cwd = cwd.to_path_buf();
        }
    }

    /// Readline-style completion entry point.
    ///
    /// `state == 0` recomputes the candidate list for
    /// `line[token_start..token_end]`; every call returns the `state`-th
    /// candidate of the current list, or `None` past its end.
    pub fn complete(
        &mut self,
        line: &str,
        token_start: usize,
        token_end: usize,
        state: usize,
    ) -> Option<String> {
        if state == 0 {
            self.matches = self.candidates(line, token_start, token_end);
        }
        self.matches.get(state).cloned()
    }

    /// All candidates for `line[token_start..token_end]`.
    pub fn candidates(&self, line: &str, token_start: usize, token_end: usize) -> Vec<String> {
        let Some(token) = line.get(token_start..token_end) else {
            return Vec::new();
        };
        let before = line.get(..token_start).unwrap_or_default();

        let found = if token.starts_with('~') {
            self.home_candidates(token)
        } else if before.trim().is_empty() && !token.contains(SEPARATOR) {
            self.commands
                .starting_with(token)
                .map(str::to_string)
                .collect()
        } else {
            path_candidates(&self.cwd, token, "")
        };

        debug!("Completion for {:?}: {} candidates", token, found.len());
        found.into_iter().collect()
    }

    fn home_candidates(&self, token: &str) -> BTreeSet<String> {
        let Some(home) = &self.home else {
            return BTreeSet::new();
        };
        let rest = &token[1..];
        if rest.is_empty() {
            return path_candidates(home, "", "~/");
        }
        match rest.strip_prefix(SEPARATOR) {
            Some(relative) => path_candidates(home, relative, "~/"),
            // ~user forms are not expanded.
            None => BTreeSet::new(),
        }
    }
}

/// Entries of `base/<dir part of token>` whose names start with the token's
/// last component. Each candidate is `display_prefix` + the token's dir part +
/// the entry name.
fn path_candidates(base: &Path, token: &str, display_prefix: &str) -> BTreeSet<String> {
    let (dir_part, fragment) = match token.rfind(SEPARATOR) {
        Some(idx) => token.split_at(idx + 1),
        None => ("", token),
    };
    let dir = if dir_part.is_empty() {
        base.to_path_buf()
    } else {
        base.join(dir_part)
    };

    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Cannot list {:?} for completion: {}", dir, e);
            return BTreeSet::new();
        }
    };

    let mut found = BTreeSet::new();
    for entry in entries.flatten() {
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if !name.starts_with(fragment) {
            continue;
        }
        let mut candidate = format!("{display_prefix}{dir_part}{name}");
        if entry.path().is_dir() {
            candidate.push(SEPARATOR);
        }
        found.insert(candidate);
    }
    found
}

/// Byte index where the whitespace-delimited token ending at `pos` starts.
pub fn token_start(line: &str, pos: usize) -> usize {
    let head = line.get(..pos).unwrap_or(line);
    head.char_indices()
        .rev()
        .find(|(_, c)| c.is_whitespace())
        .map(|(idx, c)| idx + c.len_utf8())
        .unwrap_or(0)
}

/// Line-editor glue: completion only, no hints or highlighting.
pub struct ShellHelper {
    engine: CompletionEngine,
}

impl ShellHelper {
    pub fn new(engine: CompletionEngine) -> Self {
        Self { engine }
    }

    pub fn set_cwd(&mut self, cwd: &Path) {
        self.engine.set_cwd(cwd);
    }
}

impl Helper for ShellHelper {}

impl Completer for ShellHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let start = token_start(line, pos);
        let candidates = self
            .engine
            .candidates(line, start, pos)
            .into_iter()
            .map(|candidate| Pair {
                display: candidate.clone(),
                replacement: candidate,
            })
            .collect();
        Ok((start, candidates))
    }
}

impl Hinter for ShellHelper {
    type Hint = String;
}

impl Highlighter for ShellHelper {}

impl Validator for ShellHelper {}
