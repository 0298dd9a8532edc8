//! Keyword-based guess of which interpreter a line of input is written for.
//!
//! Each supported target owns a fixed keyword set. A snippet scores one point
//! per keyword that occurs in it as a literal, case-sensitive substring. The
//! highest score wins; ties go to the target declared first in
//! [`KEYWORD_TABLE`], and an all-zero score falls back to [`FALLBACK`] so that
//! ordinary one-word commands still run as shell commands.

use std::fmt;

/// An interpreter that generic input lines can be handed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Python,
    Bash,
    Zsh,
    Fish,
}

impl Language {
    /// Program name used to run a snippet as `<interpreter> -c <snippet>`.
    pub fn interpreter(&self) -> &'static str {
        match self {
            Language::Python => "python3",
            Language::Bash => "bash",
            Language::Zsh => "zsh",
            Language::Fish => "fish",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.interpreter())
    }
}

/// Target used when no keyword of any target matches.
pub const FALLBACK: Language = Language::Bash;

/// Keyword sets in tie-breaking priority order.
pub const KEYWORD_TABLE: &[(Language, &[&str])] = &[
    (
        Language::Python,
        &["def ", "import ", "print(", "class ", "self", "lambda"],
    ),
    (
        Language::Bash,
        &["#!/bin/bash", "echo ", "fi", "then", "$(", "${", "[[", "]]"],
    ),
    (
        Language::Zsh,
        &["#!/bin/zsh", "autoload", "zmodload", "bindkey", "compdef"],
    ),
    (
        Language::Fish,
        &["#!/usr/bin/env fish", "function ", "set ", "end", "for ", "in "],
    ),
];

fn normalize(snippet: &str) -> String {
    snippet.replace('"', "'").trim().to_string()
}

/// Per-target keyword hit counts, in [`KEYWORD_TABLE`] order.
pub fn scores(snippet: &str) -> Vec<(Language, usize)> {
    let code = normalize(snippet);
    KEYWORD_TABLE
        .iter()
        .map(|(language, keywords)| {
            let hits = keywords.iter().filter(|kw| code.contains(*kw)).count();
            (*language, hits)
        })
        .collect()
}

/// Picks the interpreter for `snippet`.
pub fn classify(snippet: &str) -> Language {
    let mut best: Option<(Language, usize)> = None;
    for (language, score) in scores(snippet) {
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((language, score)),
        }
    }

    match best {
        Some((language, score)) if score > 0 => language,
        _ => FALLBACK,
    }
}
