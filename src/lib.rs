//! A small interactive POSIX-like shell.
//!
//! Input lines are tokenized by [`lexer`], turned into a pipeline of stages
//! with their output redirections by [`parser`], and run by [`pipeline`]:
//! builtins run inside the shell when they stand alone, all
//! other stages are separate processes connected with pipes. The main entry
//! point is [`Interpreter`], which owns the shell state and drives the loop.
//!
//! The public modules [`command`] and [`env`] expose the traits and types for
//! implementing additional builtins and for inspecting the shell environment.

mod builtin;
pub mod command;
pub mod completion;
pub mod config;
pub mod env;
mod external;
pub mod history;
mod interpreter;
mod io_adapters;
pub mod lexer;
pub mod logging;
pub mod parser;
pub mod pipeline;

/// Just a convenient re-export of the interactive command runner.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::{Flow, Interpreter};
