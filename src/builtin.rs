use crate::command::{CommandFactory, Context, ExecutableCommand, ExitCode, Registry};
use crate::external::find_command_path;
use crate::io_adapters::describe_io_error;
use anyhow::{Result, anyhow};
use argh::{EarlyExit, FromArgs};
use log::debug;
use std::io::Write;
use std::path::Path;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// against the streams they are handed, without spawning a program of their own.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "echo" or "cd".
    fn name() -> &'static str;

    /// Executes the command using provided output streams and shell state.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    fn execute(
        self,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        ctx: &mut Context<'_>,
    ) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        ctx: &mut Context<'_>,
    ) -> Result<ExitCode> {
        match <T as BuiltinCommand>::execute(*self, stdout, stderr, ctx) {
            Ok(x) => Ok(x),
            Err(e) => {
                writeln!(stderr, "{:#}", e)?;
                Ok(1)
            }
        }
    }
}

struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        _ctx: &mut Context<'_>,
    ) -> Result<ExitCode> {
        let (out, status): (&mut dyn Write, ExitCode) = if self.is_error {
            (stderr, 1)
        } else {
            (stdout, 0)
        };
        write!(out, "{}", self.output)?;
        if !self.output.ends_with('\n') {
            writeln!(out)?;
        }
        Ok(status)
    }
}

/// Factory creating one builtin type.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn name(&self) -> &'static str {
        T::name()
    }

    fn try_create(&self, name: &str, args: &[&str]) -> Option<Box<dyn ExecutableCommand>> {
        if name == T::name() {
            Some(match T::from_args(&[name], args) {
                Ok(cmd) => Box::new(cmd),
                Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                    output,
                    is_error: status.is_err(),
                }),
            })
        } else {
            None
        }
    }
}

impl Default for Registry {
    /// The shell's builtins: `exit`, `echo`, `type`, `pwd`, `cd` and `history`.
    fn default() -> Self {
        Registry::new(vec![
            Box::new(Factory::<Exit>::default()),
            Box::new(Factory::<Echo>::default()),
            Box::new(Factory::<Type>::default()),
            Box::new(Factory::<Pwd>::default()),
            Box::new(Factory::<Cd>::default()),
            Box::new(Factory::<HistoryCommand>::default()),
        ])
    }
}

/// Exit the shell. An optional status argument is accepted and ignored.
pub struct Exit {
    pub code: Option<String>,
}

impl FromArgs for Exit {
    fn from_args(_command_name: &[&str], args: &[&str]) -> Result<Self, EarlyExit> {
        Ok(Exit {
            code: args.first().map(|s| s.to_string()),
        })
    }
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(
        self,
        _stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        ctx: &mut Context<'_>,
    ) -> Result<ExitCode> {
        if let Some(code) = self.code {
            debug!("exit: ignoring status argument {:?}", code);
        }
        ctx.env.should_exit = true;
        Ok(0)
    }
}

/// Write the arguments to standard output, separated by spaces and followed by a newline.
///
/// No options are recognized; every argument is printed as-is.
pub struct Echo {
    pub args: Vec<String>,
}

impl FromArgs for Echo {
    fn from_args(_command_name: &[&str], args: &[&str]) -> Result<Self, EarlyExit> {
        Ok(Echo {
            args: args.iter().map(|s| s.to_string()).collect(),
        })
    }
}

impl BuiltinCommand for Echo {
    fn name() -> &'static str {
        "echo"
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        _ctx: &mut Context<'_>,
    ) -> Result<ExitCode> {
        writeln!(stdout, "{}", self.args.join(" "))?;
        Ok(0)
    }
}

/// Display how a command name would be interpreted.
///
/// Only the first argument is looked up, taken verbatim.
pub struct Type {
    pub name: Option<String>,
}

impl FromArgs for Type {
    fn from_args(_command_name: &[&str], args: &[&str]) -> Result<Self, EarlyExit> {
        Ok(Type {
            name: args.first().map(|s| s.to_string()),
        })
    }
}

impl BuiltinCommand for Type {
    fn name() -> &'static str {
        "type"
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        ctx: &mut Context<'_>,
    ) -> Result<ExitCode> {
        let Some(name) = self.name else {
            return Ok(0);
        };
        if ctx.builtins.contains(&name) {
            writeln!(stdout, "{} is a shell builtin", name)?;
            return Ok(0);
        }
        match find_command_path(&ctx.env.search_paths(), Path::new(&name)) {
            Some(path) => {
                writeln!(stdout, "{} is {}", name, path.display())?;
                Ok(0)
            }
            None => {
                writeln!(stdout, "{}: not found", name)?;
                Ok(1)
            }
        }
    }
}

/// Print the current working directory to standard output. Arguments are ignored.
pub struct Pwd {}

impl FromArgs for Pwd {
    fn from_args(_command_name: &[&str], _args: &[&str]) -> Result<Self, EarlyExit> {
        Ok(Pwd {})
    }
}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        ctx: &mut Context<'_>,
    ) -> Result<ExitCode> {
        writeln!(stdout, "{}", ctx.env.current_dir.display())?;
        Ok(0)
    }
}

/// Change the current working directory.
///
/// The first argument is the target, taken verbatim; `~` and `~/path` are
/// expanded. Without a target the directory is left unchanged.
pub struct Cd {
    pub target: Option<String>,
}

impl FromArgs for Cd {
    fn from_args(_command_name: &[&str], args: &[&str]) -> Result<Self, EarlyExit> {
        Ok(Cd {
            target: args.first().map(|s| s.to_string()),
        })
    }
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(
        self,
        _stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        ctx: &mut Context<'_>,
    ) -> Result<ExitCode> {
        let Some(target) = self.target else {
            return Ok(0);
        };
        let expanded = shellexpand::tilde_with_context(&target, || ctx.env.home_dir());
        ctx.env
            .change_dir(Path::new(expanded.as_ref()))
            .map_err(|e| anyhow!("cd: {}: {}", target, describe_io_error(&e)))?;
        debug!("cd: now in {}", ctx.env.current_dir.display());
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Display or manipulate the history list.
struct HistoryArgs {
    #[argh(option, short = 'r')]
    /// append the lines of a history file to the list.
    pub read: Option<String>,

    #[argh(option, short = 'w')]
    /// write the whole list to a history file, replacing its contents.
    pub write: Option<String>,

    #[argh(option, short = 'a')]
    /// append the lines added since the last read or write to a history file.
    pub append: Option<String>,

    #[argh(positional)]
    /// show only the last N entries.
    pub count: Option<usize>,
}

/// `history` with its options resolved.
pub struct HistoryCommand {
    pub read: Option<String>,
    pub write: Option<String>,
    pub append: Option<String>,
    pub count: Option<usize>,
}

impl FromArgs for HistoryCommand {
    fn from_args(command_name: &[&str], args: &[&str]) -> Result<Self, EarlyExit> {
        // A negative count selects no entries rather than naming an option.
        if let [count] = args {
            if count.parse::<i64>().is_ok_and(|n| n < 0) {
                return Ok(HistoryCommand {
                    read: None,
                    write: None,
                    append: None,
                    count: Some(0),
                });
            }
        }
        let HistoryArgs {
            read,
            write,
            append,
            count,
        } = HistoryArgs::from_args(command_name, args)?;
        Ok(HistoryCommand {
            read,
            write,
            append,
            count,
        })
    }
}

fn history_error(path: &str, err: &std::io::Error) -> anyhow::Error {
    anyhow!("history: {}: {}", path, describe_io_error(err))
}

impl BuiltinCommand for HistoryCommand {
    fn name() -> &'static str {
        "history"
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        ctx: &mut Context<'_>,
    ) -> Result<ExitCode> {
        if let Some(path) = self.read {
            ctx.history
                .read_from(Path::new(&path))
                .map_err(|e| history_error(&path, &e))?;
        } else if let Some(path) = self.write {
            ctx.history
                .write_all(Path::new(&path))
                .map_err(|e| history_error(&path, &e))?;
        } else if let Some(path) = self.append {
            ctx.history
                .append_new(Path::new(&path))
                .map_err(|e| history_error(&path, &e))?;
        } else {
            ctx.history.show(self.count, stdout)?;
        }
        Ok(0)
    }
}
