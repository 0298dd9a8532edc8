//! Bounded, persisted log of accepted input lines.
//!
//! The file format is plain text, one entry per line, oldest first. Loading
//! and saving are best-effort: a missing file starts an empty history and a
//! failed save prints one warning without interrupting the shell.

use anyhow::Result;
use std::collections::VecDeque;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Default upper bound on stored entries.
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

#[derive(Debug, Clone)]
pub struct HistoryStore {
    entries: VecDeque<String>,
    max_entries: usize,
}

impl HistoryStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_entries: max_entries.max(1),
        }
    }

    /// Replaces the in-memory history with the contents of `path`.
    ///
    /// Only the newest `max_entries` lines are kept.
    pub fn load(&mut self, path: &Path) {
        self.entries.clear();
        match fs::read_to_string(path) {
            Ok(content) => {
                for line in content.lines().filter(|l| !l.trim().is_empty()) {
                    self.push(line);
                }
                debug!("Loaded {} history entries from {:?}", self.entries.len(), path);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No history file at {:?}, starting empty", path);
            }
            Err(e) => {
                warn!("Could not read history file {:?}: {}", path, e);
            }
        }
    }

    /// Appends an accepted line, evicting the oldest entry past the bound.
    pub fn push(&mut self, line: &str) {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return;
        }
        self.entries.push_back(line.to_string());
        while self.entries.len() > self.max_entries {
            self.entries.pop_front();
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes the history to `path`, reporting a failure on `output`.
    ///
    /// Returns whether the file was written.
    pub fn save_with_io<W: Write>(&self, path: &Path, output: &mut W) -> bool {
        match self.write_to(path) {
            Ok(()) => {
                debug!("Saved {} history entries to {:?}", self.entries.len(), path);
                true
            }
            Err(e) => {
                warn!("Could not save history to {:?}: {}", path, e);
                let _ = writeln!(output, "Warning: Could not save command history: {}", e);
                false
            }
        }
    }

    /// Writes the history to `path`, reporting a failure on stdout.
    pub fn save(&self, path: &Path) -> bool {
        self.save_with_io(path, &mut io::stdout())
    }

    fn write_to(&self, path: &Path) -> Result<()> {
        let mut content = String::new();
        for entry in &self.entries {
            content.push_str(entry);
            content.push('\n');
        }
        fs::write(path, content)?;
        Ok(())
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}
