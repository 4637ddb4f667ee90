use anyhow::Result;
use argh::FromArgs;
use std::path::PathBuf;
use tinysh::Interpreter;
use tinysh::config::Config;
use tinysh::logging;

/// A small interactive POSIX-like shell.
#[derive(FromArgs, Debug)]
struct Args {
    /// configuration file to use instead of ~/.config/tinysh/config.toml
    #[argh(option)]
    config: Option<PathBuf>,

    /// log level: off, error, warn, info, debug or trace
    #[argh(option)]
    log_level: Option<String>,

    /// run a single command line and exit
    #[argh(option, short = 'c')]
    command: Option<String>,
}

fn main() -> Result<()> {
    let args: Args = argh::from_env();
    let config = Config::load(args.config.as_deref())?;

    let level = args.log_level.as_deref().unwrap_or(&config.log.level);
    if let Err(e) = logging::init(level, &config.log_path()) {
        eprintln!("tinysh: logging disabled: {:#}", e);
    }
    log::debug!("{:?}", args);

    let mut shell = Interpreter::default();
    match args.command {
        Some(line) => {
            shell.execute_line(&line);
        }
        None => shell.repl(&config)?,
    }
    Ok(())
}
