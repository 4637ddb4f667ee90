//! Turns a token sequence into a [`Pipeline`] of [`Stage`]s.
//!
//! Parsing happens in two passes over plain strings: the token list is first
//! split on standalone `|` tokens, then each segment has its redirection
//! operators resolved into [`Redirections`].

use regex::Regex;
use std::sync::LazyLock;

/// Matches `>`, `1>`, `2>`, `>>`, `1>>` and `2>>` as whole tokens.
static REDIRECT_OP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<fd>[12]?)(?P<op>>>?)$").expect("valid redirect regex"));

const PIPE_OP: &str = "|";

/// Which standard stream a redirection rebinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

/// A single `> file` style redirection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirection {
    pub stream: StreamKind,
    pub path: String,
    /// `>>` opens the target in append mode, `>` truncates it.
    pub append: bool,
}

/// The redirections attached to one stage; at most one per stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Redirections {
    pub stdout: Option<Redirection>,
    pub stderr: Option<Redirection>,
}

impl Redirections {
    fn set(&mut self, redirection: Redirection) {
        match redirection.stream {
            StreamKind::Stdout => self.stdout = Some(redirection),
            StreamKind::Stderr => self.stderr = Some(redirection),
        }
    }
}

/// One command of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub name: String,
    pub args: Vec<String>,
    pub redirections: Redirections,
}

/// Stages connected by pipes, stdout of stage `i` feeding stdin of stage `i + 1`.
///
/// Always holds at least one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
}

fn parse_redirect_op(token: &str) -> Option<(StreamKind, bool)> {
    let caps = REDIRECT_OP.captures(token)?;
    let stream = match &caps["fd"] {
        "2" => StreamKind::Stderr,
        _ => StreamKind::Stdout,
    };
    Some((stream, &caps["op"] == ">>"))
}

/// Extracts redirection operators and their targets from `tokens`.
///
/// Every recognized operator consumes itself and the following token. When the
/// same stream is redirected twice the later operator wins. An operator at the
/// very end of the list has no target and is dropped without effect.
pub fn resolve_redirections(tokens: Vec<String>) -> (Vec<String>, Redirections) {
    let mut remaining = Vec::with_capacity(tokens.len());
    let mut redirections = Redirections::default();
    let mut iter = tokens.into_iter();

    while let Some(token) = iter.next() {
        match parse_redirect_op(&token) {
            Some((stream, append)) => {
                if let Some(path) = iter.next() {
                    redirections.set(Redirection { stream, path, append });
                }
            }
            None => remaining.push(token),
        }
    }

    (remaining, redirections)
}

/// Splits `tokens` on standalone `|` tokens, dropping empty segments.
pub fn split_pipeline(tokens: Vec<String>) -> Vec<Vec<String>> {
    let mut segments = Vec::new();
    let mut current = Vec::new();

    for token in tokens {
        if token == PIPE_OP {
            if !current.is_empty() {
                segments.push(std::mem::take(&mut current));
            }
        } else {
            current.push(token);
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }

    segments
}

/// Builds a pipeline from the tokens of one line.
///
/// Segments left with no command name once their redirections are removed
/// are skipped. Returns `None` when nothing is left to run.
pub fn construct_pipeline(tokens: Vec<String>) -> Option<Pipeline> {
    let stages: Vec<Stage> = split_pipeline(tokens)
        .into_iter()
        .filter_map(|segment| {
            let (words, redirections) = resolve_redirections(segment);
            let mut words = words.into_iter();
            let name = words.next()?;
            Some(Stage {
                name,
                args: words.collect(),
                redirections,
            })
        })
        .collect();

    if stages.is_empty() {
        None
    } else {
        Some(Pipeline { stages })
    }
}
