use anyhow::{Context as _, Result};
use log::debug;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Embedded default configuration.
const DEFAULT_CONFIG: &str = include_str!("../config.default.toml");

/// Location of the user overlay, relative to `$HOME`.
const USER_CONFIG: &str = ".config/tinysh/config.toml";

// ── Final (merged) config types ──

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub shell: ShellConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ShellConfig {
    pub prompt: String,
    /// Persistent history store; loaded at startup and appended to on exit.
    #[serde(default)]
    pub history_file: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LogConfig {
    /// One of `off`, `error`, `warn`, `info`, `debug`, `trace`.
    pub level: String,
    pub file: String,
}

// ── Overlay types (user config that overrides defaults) ──

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ConfigOverlay {
    #[serde(default)]
    shell: ShellOverlay,
    #[serde(default)]
    log: LogOverlay,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ShellOverlay {
    prompt: Option<String>,
    history_file: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct LogOverlay {
    level: Option<String>,
    file: Option<String>,
}

impl Default for Config {
    /// The embedded default configuration.
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("embedded default config must parse")
    }
}

impl Config {
    /// Load configuration with resolution order:
    /// 1. Start with embedded defaults
    /// 2. Apply the overlay from `explicit`, or from `~/.config/tinysh/config.toml`
    ///    if that exists
    ///
    /// A missing or malformed explicit file is an error. A malformed user file
    /// is reported on stderr and skipped.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();
        match explicit {
            Some(path) => {
                let overlay = read_overlay(path)?;
                config.apply_overlay(overlay);
            }
            None => {
                if let Some(path) = user_config_path().filter(|p| p.exists()) {
                    match read_overlay(&path) {
                        Ok(overlay) => config.apply_overlay(overlay),
                        Err(e) => eprintln!("tinysh: {:#}", e),
                    }
                }
            }
        }
        Ok(config)
    }

    #[cfg(test)]
    fn from_overlay_str(content: &str) -> Result<Self> {
        let overlay: ConfigOverlay = toml::from_str(content)?;
        let mut config = Self::default();
        config.apply_overlay(overlay);
        Ok(config)
    }

    fn apply_overlay(&mut self, overlay: ConfigOverlay) {
        if let Some(v) = overlay.shell.prompt {
            self.shell.prompt = v;
        }
        if let Some(v) = overlay.shell.history_file {
            self.shell.history_file = Some(v);
        }
        if let Some(v) = overlay.log.level {
            self.log.level = v;
        }
        if let Some(v) = overlay.log.file {
            self.log.file = v;
        }
    }

    /// The history store to use, if any.
    ///
    /// `HISTFILE` wins over the configured value; `~` is expanded from `HOME`.
    pub fn history_path(&self) -> Option<PathBuf> {
        let histfile = std::env::var("HISTFILE").ok().filter(|v| !v.is_empty());
        histfile
            .or_else(|| self.shell.history_file.clone())
            .map(|p| expand_home(&p))
    }

    /// The log file with `~` expanded from `HOME`.
    pub fn log_path(&self) -> PathBuf {
        expand_home(&self.log.file)
    }
}

fn user_config_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")?;
    Some(Path::new(&home).join(USER_CONFIG))
}

fn read_overlay(path: &Path) -> Result<ConfigOverlay> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read config {}", path.display()))?;
    let overlay = toml::from_str(&content)
        .with_context(|| format!("config parse error in {}", path.display()))?;
    debug!("loaded config overlay from {}", path.display());
    Ok(overlay)
}

fn expand_home(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_file(tag: &str, content: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "config_test_{}_{}_{}.toml",
            tag,
            std::process::id(),
            nanos
        ));
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn embedded_defaults_parse() {
        let config: Config = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.shell.prompt, "$ ");
        assert_eq!(config.shell.history_file, None);
        assert_eq!(config.log.level, "off");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn empty_overlay_keeps_defaults() {
        assert_eq!(Config::from_overlay_str("").unwrap(), Config::default());
    }

    #[test]
    fn overlay_scalars_override() {
        let config = Config::from_overlay_str(
            r#"
            [shell]
            prompt = "> "
            history_file = "/tmp/hist"

            [log]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.shell.prompt, "> ");
        assert_eq!(config.shell.history_file.as_deref(), Some("/tmp/hist"));
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.log.file, Config::default().log.file);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Config::from_overlay_str("[shell]\npromt = \"> \"\n").is_err());
    }

    #[test]
    fn explicit_file_is_loaded() {
        let path = temp_file("explicit", "[shell]\nprompt = \"% \"\n");
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.shell.prompt, "% ");
        let _ = fs::remove_file(path);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = Config::load(Some(Path::new("/nonexistent/tinysh.toml"))).unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/tinysh.toml"));
    }

    #[test]
    fn malformed_explicit_file_is_an_error() {
        let path = temp_file("bad", "[shell\n");
        assert!(Config::load(Some(&path)).is_err());
        let _ = fs::remove_file(path);
    }

    #[test]
    fn absolute_paths_are_not_expanded() {
        assert_eq!(expand_home("/var/log/x.log"), PathBuf::from("/var/log/x.log"));
    }
}
