//! Tab completion of command names.
//!
//! [`CompletionState`] is the pure state machine: it decides what a tab press
//! does given the typed text and the candidates for it. [`ShellHelper`] plugs
//! it into the `rustyline` editor and performs the terminal side effects.

use crate::external;
use log::debug;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context as LineContext, Helper};
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::io::{self, Write};

const BELL: &[u8] = b"\x07";

/// What a single tab press should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Nothing matches.
    Nothing,
    /// Replace the typed text with this string.
    Replace(String),
    /// Ambiguous on the first press: ring the bell, leave the line alone.
    Bell,
    /// Ambiguous on a repeated press: show every candidate.
    List(Vec<String>),
}

/// Completion session state, kept between tab presses.
#[derive(Debug, Clone, Default)]
pub struct CompletionState {
    last_text: Option<String>,
    last_matches: Vec<String>,
    press_count: u8,
}

impl CompletionState {
    /// Decide what a tab press on `text` does.
    ///
    /// `candidates` is only called when `text` differs from the previous press
    /// and must return the matching names sorted and deduplicated.
    pub fn complete<F>(&mut self, text: &str, candidates: F) -> Completion
    where
        F: FnOnce(&str) -> Vec<String>,
    {
        if self.last_text.as_deref() != Some(text) {
            self.last_text = Some(text.to_string());
            self.last_matches = candidates(text);
            self.press_count = 0;
        }

        match self.last_matches.as_slice() {
            [] => Completion::Nothing,
            [only] => Completion::Replace(format!("{} ", only)),
            matches => {
                let prefix = longest_common_prefix(matches);
                if prefix.len() > text.len() {
                    Completion::Replace(prefix.to_string())
                } else if self.press_count == 0 {
                    self.press_count = 1;
                    Completion::Bell
                } else {
                    self.press_count = 0;
                    Completion::List(matches.to_vec())
                }
            }
        }
    }
}

/// The longest string every candidate starts with.
pub fn longest_common_prefix(strings: &[String]) -> &str {
    let Some((first, rest)) = strings.split_first() else {
        return "";
    };
    let mut len = first.len();
    for s in rest {
        len = first
            .char_indices()
            .zip(s.chars())
            .take_while(|((_, a), b)| a == b)
            .map(|((i, a), _)| i + a.len_utf8())
            .last()
            .unwrap_or(0)
            .min(len);
        if len == 0 {
            break;
        }
    }
    &first[..len]
}

/// The first word of `line` if the cursor at `pos` is still inside it.
///
/// Returns the byte offset where the word starts and the text typed so far.
/// Once the line contains a separator after its first word, there is nothing
/// to complete.
pub fn first_word(line: &str, pos: usize) -> Option<(usize, &str)> {
    let trimmed = line.trim_start();
    if trimmed.contains(char::is_whitespace) {
        return None;
    }
    let start = line.len() - trimmed.len();
    let end = pos.max(start).min(line.len());
    line.get(start..end).map(|text| (start, text))
}

/// Builtin names and `PATH` executables starting with `prefix`, sorted and deduplicated.
pub fn command_candidates<'a>(
    prefix: &str,
    builtins: impl IntoIterator<Item = &'a str>,
    search_paths: &OsStr,
) -> Vec<String> {
    let mut names: BTreeSet<String> = builtins
        .into_iter()
        .filter(|name| name.starts_with(prefix))
        .map(str::to_string)
        .collect();
    names.extend(external::executables_with_prefix(search_paths, prefix));
    names.into_iter().collect()
}

/// `rustyline` helper wiring [`CompletionState`] to the terminal.
pub struct ShellHelper {
    state: RefCell<CompletionState>,
    builtins: Vec<&'static str>,
    prompt: String,
}

impl ShellHelper {
    pub fn new(builtins: Vec<&'static str>, prompt: impl Into<String>) -> Self {
        Self {
            state: RefCell::new(CompletionState::default()),
            builtins,
            prompt: prompt.into(),
        }
    }

    fn candidates(&self, prefix: &str) -> Vec<String> {
        let search_paths = std::env::var_os("PATH").unwrap_or_default();
        command_candidates(prefix, self.builtins.iter().copied(), &search_paths)
    }

    fn ring_bell(&self, out: &mut dyn Write) -> io::Result<()> {
        out.write_all(BELL)?;
        out.flush()
    }

    /// Print the candidates on a fresh line and redraw the prompt with `text`.
    fn list(&self, matches: &[String], text: &str, out: &mut dyn Write) -> io::Result<()> {
        write!(out, "\n{}\n{}{}", matches.join("  "), self.prompt, text)?;
        out.flush()
    }
}

impl Completer for ShellHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &LineContext<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let Some((start, text)) = first_word(line, pos) else {
            return Ok((pos, Vec::new()));
        };
        let outcome = self
            .state
            .borrow_mut()
            .complete(text, |prefix| self.candidates(prefix));
        debug!("completion of {:?}: {:?}", text, outcome);

        match outcome {
            Completion::Replace(replacement) => Ok((
                start,
                vec![Pair {
                    display: replacement.clone(),
                    replacement,
                }],
            )),
            Completion::Bell => {
                self.ring_bell(&mut io::stdout())?;
                Ok((pos, Vec::new()))
            }
            Completion::List(matches) => {
                self.list(&matches, text, &mut io::stdout())?;
                Ok((pos, Vec::new()))
            }
            Completion::Nothing => Ok((pos, Vec::new())),
        }
    }
}

impl Hinter for ShellHelper {
    type Hint = String;
}

impl Highlighter for ShellHelper {}

impl Validator for ShellHelper {}

impl Helper for ShellHelper {}
