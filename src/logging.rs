//! Diagnostic logging to a file through the `log` facade.
//!
//! The terminal belongs to the commands the shell runs, so log records only
//! ever go to the configured file.

use anyhow::{Context as _, Result, bail};
use log::LevelFilter;
use simplelog::{ConfigBuilder, WriteLogger};
use std::fs::{self, OpenOptions};
use std::path::Path;

/// Parse a level name from the config file or the command line.
pub fn parse_level(level: &str) -> Result<LevelFilter> {
    match level.trim().to_ascii_lowercase().as_str() {
        "off" => Ok(LevelFilter::Off),
        "error" => Ok(LevelFilter::Error),
        "warn" | "warning" => Ok(LevelFilter::Warn),
        "info" => Ok(LevelFilter::Info),
        "debug" => Ok(LevelFilter::Debug),
        "trace" => Ok(LevelFilter::Trace),
        other => bail!("unknown log level {:?}", other),
    }
}

/// Install a file logger at `level`, appending to `file`.
///
/// `off` installs nothing. Parent directories of `file` are created.
pub fn init(level: &str, file: &Path) -> Result<()> {
    let level = parse_level(level)?;
    if level == LevelFilter::Off {
        return Ok(());
    }

    if let Some(dir) = file.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("cannot create log directory {}", dir.display()))?;
    }
    let sink = OpenOptions::new()
        .create(true)
        .append(true)
        .open(file)
        .with_context(|| format!("cannot open log file {}", file.display()))?;

    let config = ConfigBuilder::new().set_thread_level(LevelFilter::Off).build();
    WriteLogger::init(level, config, sink).context("cannot install logger")?;
    log::info!("tinysh {} started, pid {}", env!("CARGO_PKG_VERSION"), std::process::id());
    Ok(())
}
