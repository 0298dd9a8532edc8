//! Mutable state owned by one shell lifetime.

use crate::conversation::Conversation;
use crate::history::HistoryStore;
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::ops::Bound;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Names of the shell's own line vocabulary, offered by command completion.
pub const BUILTIN_COMMANDS: &[&str] = &[
    "about",
    "capk",
    "cd",
    "df",
    "disk",
    "ls",
    "lsusb",
    "troubleshooting",
];

/// Fixed set of command names, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct KnownCommands {
    names: BTreeSet<String>,
}

impl KnownCommands {
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Built-ins, the given extra names (aliases), and every executable on `PATH`.
    pub fn load<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut commands = Self::from_names(BUILTIN_COMMANDS.iter().copied());
        commands.names.extend(extra.into_iter().map(Into::into));

        if let Some(path) = env::var_os("PATH") {
            for dir in env::split_paths(&path) {
                let Ok(entries) = fs::read_dir(&dir) else {
                    continue;
                };
                for entry in entries.flatten() {
                    let is_executable = entry
                        .metadata()
                        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
                        .unwrap_or(false);
                    if is_executable {
                        if let Some(name) = entry.file_name().to_str() {
                            commands.names.insert(name.to_string());
                        }
                    }
                }
            }
        }

        debug!("Loaded {} known commands", commands.names.len());
        commands
    }

    /// Names starting with `prefix`, in sorted order.
    pub fn starting_with<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.names
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(move |name| name.starts_with(prefix))
            .map(String::as_str)
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.names.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// State threaded through every iteration of the shell loop.
///
/// Only the dispatch loop holds a mutable reference; components receive the
/// slice they need (a working directory, the conversation) per call.
#[derive(Debug)]
pub struct Session {
    pub cwd: PathBuf,
    pub previous_cwd: Option<PathBuf>,
    /// Created by the first question and reused by every later one.
    pub conversation: Option<Conversation>,
    pub history: HistoryStore,
    pub known_commands: Arc<KnownCommands>,
}

impl Session {
    pub fn new(cwd: PathBuf, history: HistoryStore, known_commands: Arc<KnownCommands>) -> Self {
        Self {
            cwd,
            previous_cwd: None,
            conversation: None,
            history,
            known_commands,
        }
    }

    /// Moves to `dir`, remembering the old directory for `cd -`.
    pub fn change_dir(&mut self, dir: PathBuf) {
        let old = std::mem::replace(&mut self.cwd, dir);
        self.previous_cwd = Some(old);
    }

    /// The active conversation, created on first use.
    pub fn conversation_mut(&mut self) -> &mut Conversation {
        self.conversation.get_or_insert_with(Conversation::new)
    }
}
