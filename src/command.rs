use crate::env::Environment;
use crate::history::History;
use anyhow::Result;
use std::io::Write;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// Shell state a builtin may read or mutate while it runs.
pub struct Context<'a> {
    pub env: &'a mut Environment,
    pub history: &'a mut History,
    pub builtins: &'a Registry,
}

/// Object-safe trait for a builtin that has been created with its arguments.
pub trait ExecutableCommand {
    /// Executes the command against the given output streams.
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        ctx: &mut Context<'_>,
    ) -> Result<ExitCode>;
}

/// Factory that tries to create a command from a name and its arguments.
///
/// Returns `None` when the factory doesn't recognize the `name`.
pub trait CommandFactory {
    /// The command name this factory answers to.
    fn name(&self) -> &'static str;

    /// Attempt to create a command instance for the provided name and arguments.
    fn try_create(&self, name: &str, args: &[&str]) -> Option<Box<dyn ExecutableCommand>>;
}

/// The fixed table of builtins known to the shell.
///
/// Names that no factory recognizes fall through to the external-command path.
pub struct Registry {
    factories: Vec<Box<dyn CommandFactory>>,
}

impl Registry {
    pub fn new(factories: Vec<Box<dyn CommandFactory>>) -> Self {
        Self { factories }
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.factories.iter().map(|f| f.name())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names().any(|n| n == name)
    }

    pub fn create(&self, name: &str, args: &[&str]) -> Option<Box<dyn ExecutableCommand>> {
        self.factories
            .iter()
            .find_map(|factory| factory.try_create(name, args))
    }
}
