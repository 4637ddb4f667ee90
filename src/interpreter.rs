use crate::command::{Context, ExitCode, Registry};
use crate::completion::ShellHelper;
use crate::config::Config;
use crate::env::Environment;
use crate::history::History;
use crate::lexer::split_into_tokens;
use crate::parser::construct_pipeline;
use crate::pipeline;
use anyhow::{Context as _, Result};
use log::{debug, info, warn};
use rustyline::config::BellStyle;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{CompletionType, Editor};
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::Path;

/// Whether the loop should keep reading after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// A minimal shell-like interpreter that runs one input line at a time.
///
/// The interpreter owns all shell state: the [`Environment`], the in-memory
/// [`History`] and the table of builtins. Lines are recorded, tokenized,
/// split into a pipeline and executed; anything that goes wrong is reported
/// and the interpreter is ready for the next line.
///
/// Example
/// ```
/// use tinysh::{Flow, Interpreter};
/// let mut sh = Interpreter::default();
/// assert_eq!(sh.execute_line("echo hello"), Flow::Continue);
/// assert_eq!(sh.last_status(), Some(0));
/// assert_eq!(sh.history().entries(), ["echo hello"]);
/// assert_eq!(sh.execute_line("exit"), Flow::Exit);
/// ```
pub struct Interpreter {
    env: Environment,
    history: History,
    builtins: Registry,
    last_status: Option<ExitCode>,
}

impl Interpreter {
    /// Create a new interpreter with a custom set of builtins.
    pub fn new(builtins: Registry) -> Self {
        Self {
            env: Environment::new(),
            history: History::new(),
            builtins,
            last_status: None,
        }
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Exit status of the last stage of the most recent pipeline.
    pub fn last_status(&self) -> Option<ExitCode> {
        self.last_status
    }

    /// Record, parse and run one line of input.
    pub fn execute_line(&mut self, line: &str) -> Flow {
        self.history.record(line);

        let tokens = match split_into_tokens(line) {
            Ok(tokens) => tokens,
            Err(e) => {
                eprintln!("tinysh: syntax error: {}", e);
                return Flow::Continue;
            }
        };
        let Some(pipeline) = construct_pipeline(tokens) else {
            return Flow::Continue;
        };
        debug!("running {:?}", pipeline);

        let mut ctx = Context {
            env: &mut self.env,
            history: &mut self.history,
            builtins: &self.builtins,
        };
        let outcome = pipeline::execute(&pipeline, &mut ctx);
        self.last_status = outcome.status();

        if outcome.should_exit {
            Flow::Exit
        } else {
            Flow::Continue
        }
    }

    /// Read and execute lines until end of input or `exit`.
    ///
    /// When a history file is configured, it is loaded before the first
    /// prompt and the lines entered in this session are appended to it when
    /// the loop ends.
    pub fn repl(&mut self, config: &Config) -> Result<()> {
        let history_path = config.history_path();
        if let Some(path) = &history_path {
            self.load_history(path);
        }

        let prompt = config.shell.prompt.as_str();
        let mut source = LineSource::open(prompt, self.builtins.names().collect())?;
        while let Some(line) = source.read_line(prompt)? {
            if self.execute_line(&line) == Flow::Exit {
                break;
            }
        }
        info!("leaving the main loop");

        if let Some(path) = &history_path {
            if let Err(e) = self.history.append_new(path) {
                warn!("cannot save history to {}: {}", path.display(), e);
                eprintln!("tinysh: {}: {}", path.display(), e);
            }
        }
        Ok(())
    }

    fn load_history(&mut self, path: &Path) {
        match self.history.read_from(path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("no history at {}", path.display());
            }
            Err(e) => {
                warn!("cannot load history from {}: {}", path.display(), e);
                eprintln!("tinysh: {}: {}", path.display(), e);
            }
        }
    }
}

impl Default for Interpreter {
    /// Create an interpreter with the default builtins.
    fn default() -> Self {
        Self::new(Registry::default())
    }
}

/// Where input lines come from.
enum LineSource {
    /// An interactive terminal with line editing and tab completion.
    Editor(Box<Editor<ShellHelper, DefaultHistory>>),
    /// Anything else: a pipe or a file.
    Plain(io::StdinLock<'static>),
}

impl LineSource {
    fn open(prompt: &str, builtins: Vec<&'static str>) -> Result<Self> {
        if !io::stdin().is_terminal() {
            return Ok(LineSource::Plain(io::stdin().lock()));
        }

        let config = rustyline::Config::builder()
            .completion_type(CompletionType::List)
            .bell_style(BellStyle::None)
            .auto_add_history(false)
            .build();
        let mut editor =
            Editor::with_config(config).context("cannot initialize the line editor")?;
        editor.set_helper(Some(ShellHelper::new(builtins, prompt)));
        Ok(LineSource::Editor(Box::new(editor)))
    }

    /// The next line without its terminator, or `None` at end of input.
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        match self {
            LineSource::Editor(editor) => loop {
                match editor.readline(prompt) {
                    Ok(line) => {
                        if !line.trim().is_empty() {
                            editor.add_history_entry(line.as_str())?;
                        }
                        return Ok(Some(line));
                    }
                    Err(ReadlineError::Interrupted) => continue,
                    Err(ReadlineError::Eof) => return Ok(None),
                    Err(e) => return Err(e).context("cannot read input"),
                }
            },
            LineSource::Plain(stdin) => {
                let mut out = io::stdout();
                write!(out, "{}", prompt)?;
                out.flush()?;

                let mut raw = Vec::new();
                if stdin.read_until(b'\n', &mut raw).context("cannot read input")? == 0 {
                    return Ok(None);
                }
                if raw.ends_with(b"\n") {
                    raw.pop();
                    if raw.ends_with(b"\r") {
                        raw.pop();
                    }
                }
                // Bytes that are not UTF-8 become U+FFFD instead of ending the loop.
                let line = String::from_utf8_lossy(&raw).into_owned();
                Ok(Some(line))
            }
        }
    }
}
