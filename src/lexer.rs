//! Lexical analysis (tokenization) of a single input line.
//!
//! The lexer turns raw text into an ordered list of argument strings. Quoting
//! follows the usual POSIX shell conventions for the subset the shell supports:
//! single quotes, double quotes and backslash escapes. Operators such as `|` or
//! `>` are not special here; they only become operators when they end up as a
//! standalone token (see [`crate::parser`]).

use std::fmt;

/// Errors that can occur during the lexical analysis process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexingError {
    /// A closing quote (single or double) was not found.
    UnterminatedQuote,
    /// The line ended right after an unquoted backslash.
    TrailingEscape,
}

impl fmt::Display for LexingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexingError::UnterminatedQuote => write!(f, "unterminated quote"),
            LexingError::TrailingEscape => write!(f, "no character to escape at end of line"),
        }
    }
}

impl std::error::Error for LexingError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Start,
    ReadingWord,
    ReadingSingleQuote,
    ReadingDoubleQuote,
}

struct LexingFSM {
    input: Vec<char>,
    pos: usize,
    state: LexingState,
    buffer: String,
}

impl LexingFSM {
    fn new(line: &str) -> Self {
        LexingFSM {
            input: line.chars().collect(),
            pos: 0,
            state: LexingState::Start,
            buffer: String::new(),
        }
    }

    /// Runs the machine over the whole line.
    ///
    /// Quoted regions and escapes never end a token; only unquoted whitespace
    /// does. A token that ends up empty (e.g. `''`) is not emitted.
    fn make_tokens(&mut self) -> Result<Vec<String>, LexingError> {
        let mut out = Vec::new();

        while let Some(ch) = self.read_char() {
            match self.state {
                LexingState::Start => self.handle_start(ch)?,
                LexingState::ReadingWord => self.handle_word(ch, &mut out)?,
                LexingState::ReadingSingleQuote => self.handle_single_quote(ch),
                LexingState::ReadingDoubleQuote => self.handle_double_quote(ch),
            }
        }

        match self.state {
            LexingState::ReadingSingleQuote | LexingState::ReadingDoubleQuote => {
                return Err(LexingError::UnterminatedQuote);
            }
            LexingState::Start | LexingState::ReadingWord => {}
        }

        self.finish_word(&mut out);
        Ok(out)
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn handle_start(&mut self, ch: char) -> Result<(), LexingError> {
        if is_separator(ch) {
            return Ok(());
        }
        self.state = LexingState::ReadingWord;
        self.handle_unquoted(ch)
    }

    fn handle_word(&mut self, ch: char, out: &mut Vec<String>) -> Result<(), LexingError> {
        if is_separator(ch) {
            self.finish_word(out);
            self.state = LexingState::Start;
            return Ok(());
        }
        self.handle_unquoted(ch)
    }

    fn handle_unquoted(&mut self, ch: char) -> Result<(), LexingError> {
        match ch {
            '\\' => {
                let escaped = self.read_char().ok_or(LexingError::TrailingEscape)?;
                self.buffer.push(escaped);
            }
            '\'' => self.state = LexingState::ReadingSingleQuote,
            '"' => self.state = LexingState::ReadingDoubleQuote,
            c => self.buffer.push(c),
        }
        Ok(())
    }

    fn handle_single_quote(&mut self, ch: char) {
        match ch {
            '\'' => self.state = LexingState::ReadingWord,
            c => self.buffer.push(c),
        }
    }

    fn handle_double_quote(&mut self, ch: char) {
        match ch {
            '"' => self.state = LexingState::ReadingWord,
            '\\' if matches!(self.peek_char(), Some('\\' | '"')) => {
                if let Some(escaped) = self.read_char() {
                    self.buffer.push(escaped);
                }
            }
            c => self.buffer.push(c),
        }
    }

    fn finish_word(&mut self, out: &mut Vec<String>) {
        if !self.buffer.is_empty() {
            out.push(std::mem::take(&mut self.buffer));
        }
    }
}

fn is_separator(ch: char) -> bool {
    ch == ' ' || ch == '\t'
}

/// The main entry point function to perform lexical analysis.
///
/// Returns the tokens of `line` in order. An empty or whitespace-only line
/// yields an empty vector.
pub fn split_into_tokens(line: &str) -> Result<Vec<String>, LexingError> {
    LexingFSM::new(line).make_tokens()
}
