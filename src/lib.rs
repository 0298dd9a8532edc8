//! Crust - an interactive shell with an integrated assistant.
//!
//! Every input line is classified and routed to exactly one handler:
//!
//! - **Built-ins** (`ls`, `df -h`, `lsusb`, `about`, `troubleshooting`,
//!   `capk <pkg>`, `cd <dir>`) are handled in-process.
//! - **Questions** (lines starting with `.question`) go to a conversational
//!   assistant that may ask to run commands, overwrite files or read files.
//!   Running a command or overwriting a file always needs a yes/no approval.
//! - **Everything else** runs as `<interpreter> -c <line>`, where the
//!   interpreter (python3, bash, zsh, fish) is picked by a keyword classifier.
//!
//! # Architecture
//!
//! - [`shell`] - The read/route/handle loop and its exit paths
//! - [`dispatch`] - Pure line classification into a [`dispatch::Route`]
//! - [`session`] - Per-shell state: cwd, conversation, history, known commands
//! - [`language`] - Keyword classifier choosing the interpreter
//! - [`executor`] - Foreground and captured process execution
//! - [`assistant`] - Conversation management and directive actioning
//! - [`directives`] - Parser for `EXECUTE` / `EDIT-FILE` / `READ-FILE` lines
//! - [`conversation`] - Role-tagged message history
//! - [`chat_client`] - Remote chat service (Cohere, or an offline mock)
//! - [`approval`] - Yes/no gate for side effects requested by the assistant
//! - [`dir_search`] - Cycle-safe directory search used by `cd`
//! - [`completion`] - Tab completion for commands and paths
//! - [`history`] - Bounded, persisted input history
//! - [`builtins`], [`table`] - Table-rendering built-ins
//! - [`aur`] - PKGBUILD security review for `capk`
//! - [`prompt`] - Prompt string with git information
//! - [`config`] - TOML configuration and environment overrides
//! - [`http_client`] - HTTP abstraction
//!
//! # Example
//!
//! ```ignore
//! use crust::dispatch::{route, Route};
//! use crust::language::{classify, Language};
//!
//! assert_eq!(route("cd projects", ".question"), Route::ChangeDir("projects"));
//! assert_eq!(classify("import os; print(os.name)"), Language::Python);
//! ```
//!
//! # Configuration
//!
//! ```bash
//! # Store the Cohere API key in ~/.crust/config.toml
//! crust --set-api-key <key>
//!
//! # Try the shell without a key
//! CRUST_USE_MOCK=1 crust
//!
//! # Review an AUR package without starting the shell
//! crust capk yay
//! ```

pub mod approval;
pub mod assistant;
pub mod aur;
pub mod builtins;
pub mod chat_client;
pub mod completion;
pub mod config;
pub mod conversation;
pub mod dir_search;
pub mod directives;
pub mod dispatch;
pub mod executor;
pub mod history;
pub mod http_client;
pub mod language;
pub mod prompt;
pub mod session;
pub mod shell;
pub mod table;
