//! In-memory command history with optional persistence to a plain text file.

use log::debug;
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Ordered log of submitted lines.
///
/// `last_written` counts how many entries are already known to be in the
/// persistent store, so `history -a` only appends what is new.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History {
    entries: Vec<String>,
    last_written: usize,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn last_written(&self) -> usize {
        self.last_written
    }

    /// Append a submitted line. Blank lines are not recorded.
    pub fn record(&mut self, line: &str) {
        if !line.trim().is_empty() {
            self.entries.push(line.to_string());
        }
    }

    /// Print entries as `    <index>  <line>`, 1-based.
    ///
    /// With `limit`, only the last `limit` entries are shown, keeping their
    /// original indices.
    pub fn show(&self, limit: Option<usize>, out: &mut dyn Write) -> io::Result<()> {
        let start = limit.map_or(0, |n| self.entries.len().saturating_sub(n));
        for (i, line) in self.entries.iter().enumerate().skip(start) {
            writeln!(out, "    {}  {}", i + 1, line)?;
        }
        Ok(())
    }

    /// Overwrite `path` with every entry.
    pub fn write_all(&mut self, path: &Path) -> io::Result<()> {
        let file = fs::File::create(path)?;
        write_lines(file, &self.entries)?;
        self.last_written = self.entries.len();
        debug!("wrote {} history entries to {}", self.entries.len(), path.display());
        Ok(())
    }

    /// Append every non-empty line of `path` to the log.
    ///
    /// Entries read this way count as already persisted.
    pub fn read_from(&mut self, path: &Path) -> io::Result<()> {
        let reader = BufReader::new(fs::File::open(path)?);
        let before = self.entries.len();
        for line in reader.lines() {
            let line = line?;
            if !line.is_empty() {
                self.entries.push(line);
            }
        }
        self.last_written = self.entries.len();
        debug!(
            "read {} history entries from {}",
            self.entries.len() - before,
            path.display()
        );
        Ok(())
    }

    /// Append the entries added since the last write or read to `path`.
    pub fn append_new(&mut self, path: &Path) -> io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let pending = &self.entries[self.last_written.min(self.entries.len())..];
        write_lines(file, pending)?;
        debug!("appended {} history entries to {}", pending.len(), path.display());
        self.last_written = self.entries.len();
        Ok(())
    }
}

fn write_lines(file: fs::File, lines: &[String]) -> io::Result<()> {
    let mut out = BufWriter::new(file);
    for line in lines {
        writeln!(out, "{}", line)?;
    }
    out.flush()
}
