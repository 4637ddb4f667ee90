use crate::parser::Redirection;
use nix::errno::Errno;
use std::fs::{File, OpenOptions};
use std::io::{self, Result as IoResult, Write};

/// Open a redirection target for writing, creating it if needed.
///
/// `>>` targets are opened in append mode, `>` targets are truncated.
pub fn open_target(redirection: &Redirection) -> IoResult<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true);
    if redirection.append {
        options.append(true);
    } else {
        options.truncate(true);
    }
    options.open(&redirection.path)
}

/// Output stream of a builtin running inside the shell process.
///
/// Either one of the shell's own standard streams or a redirection file.
pub enum Sink {
    Stdout(io::Stdout),
    Stderr(io::Stderr),
    File(File),
}

impl Sink {
    /// The redirection target if there is one, the shell's stdout otherwise.
    pub fn stdout(redirection: Option<&Redirection>) -> IoResult<Self> {
        match redirection {
            Some(r) => open_target(r).map(Sink::File),
            None => Ok(Sink::Stdout(io::stdout())),
        }
    }

    /// The redirection target if there is one, the shell's stderr otherwise.
    pub fn stderr(redirection: Option<&Redirection>) -> IoResult<Self> {
        match redirection {
            Some(r) => open_target(r).map(Sink::File),
            None => Ok(Sink::Stderr(io::stderr())),
        }
    }
}

impl Write for Sink {
    fn write(&mut self, data: &[u8]) -> IoResult<usize> {
        match self {
            Sink::Stdout(s) => s.write(data),
            Sink::Stderr(s) => s.write(data),
            Sink::File(f) => f.write(data),
        }
    }

    fn flush(&mut self) -> IoResult<()> {
        match self {
            Sink::Stdout(s) => s.flush(),
            Sink::Stderr(s) => s.flush(),
            Sink::File(f) => f.flush(),
        }
    }
}

/// Human-readable OS error text without the `(os error N)` suffix.
pub fn describe_io_error(err: &io::Error) -> String {
    match err.raw_os_error() {
        Some(code) => Errno::from_raw(code).desc().to_string(),
        None => err.to_string(),
    }
}
