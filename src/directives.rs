//! Line protocol the assistant uses to request actions.
//!
//! A reply line starting with one of the sigils below is a directive:
//!
//! ```text
//! EXECUTE <command>
//! EDIT-FILE <path>
//! <file content, up to the next directive line>
//! READ-FILE <path>
//! ```

pub const EXECUTE: &str = "EXECUTE";
pub const EDIT_FILE: &str = "EDIT-FILE";
pub const READ_FILE: &str = "READ-FILE";

/// An action requested by the assistant. Parsed, actioned, then discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Execute { command: String },
    EditFile { path: String, content: String },
    ReadFile { path: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sigil {
    Execute,
    EditFile,
    ReadFile,
}

/// Splits a directive line into its sigil and trimmed argument.
///
/// The sigil must be followed by whitespace or end the line, so `EXECUTED`
/// is ordinary text.
fn split_directive(line: &str) -> Option<(Sigil, &str)> {
    let table = [
        (EXECUTE, Sigil::Execute),
        (EDIT_FILE, Sigil::EditFile),
        (READ_FILE, Sigil::ReadFile),
    ];

    table.iter().find_map(|(text, sigil)| {
        let rest = line.strip_prefix(*text)?;
        if rest.is_empty() || rest.starts_with(char::is_whitespace) {
            Some((*sigil, rest.trim()))
        } else {
            None
        }
    })
}

/// True when `line` starts a directive.
pub fn is_directive_line(line: &str) -> bool {
    split_directive(line).is_some()
}

/// All directives in `reply`, in line order.
pub fn parse_directives(reply: &str) -> Vec<Directive> {
    let lines: Vec<&str> = reply.lines().collect();
    let mut directives = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let Some((sigil, argument)) = split_directive(lines[i]) else {
            i += 1;
            continue;
        };
        i += 1;

        match sigil {
            Sigil::Execute => directives.push(Directive::Execute {
                command: argument.to_string(),
            }),
            Sigil::ReadFile => directives.push(Directive::ReadFile {
                path: argument.to_string(),
            }),
            Sigil::EditFile => {
                let start = i;
                while i < lines.len() && !is_directive_line(lines[i]) {
                    i += 1;
                }
                directives.push(Directive::EditFile {
                    path: argument.to_string(),
                    content: lines[start..i].join("\n"),
                });
            }
        }
    }

    directives
}
