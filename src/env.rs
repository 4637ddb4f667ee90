use std::collections::HashMap;
use std::env as stdenv;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

/// Mutable, user-level view of the process environment used by the interpreter.
///
/// The environment contains:
/// - `vars`: a map of environment variables (PATH, HOME, ...) consulted before the
///   real process environment.
/// - `current_dir`: the working directory, kept in sync with the process by [`Environment::change_dir`].
/// - `should_exit`: a flag the `exit` builtin raises so the main loop knows to terminate.
#[derive(Debug, Clone)]
pub struct Environment {
    pub vars: HashMap<String, String>,
    pub current_dir: PathBuf,
    pub should_exit: bool,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    /// Capture the current process state into a new `Environment` instance.
    pub fn new() -> Self {
        let vars = stdenv::vars().collect();
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            vars,
            current_dir,
            should_exit: false,
        }
    }

    /// Get the value of an environment variable.
    ///
    /// Looks up the key in `self.vars` first, falling back to `std::env::var`.
    pub fn get_var(&self, key: &str) -> Option<String> {
        self.vars
            .get(key)
            .cloned()
            .or_else(|| stdenv::var(key).ok())
    }

    /// Set or override an environment variable in `self.vars`.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    /// The colon-separated directory list used to find executables.
    pub fn search_paths(&self) -> OsString {
        self.get_var("PATH").map(OsString::from).unwrap_or_default()
    }

    pub fn home_dir(&self) -> Option<String> {
        self.get_var("HOME")
    }

    /// Change the working directory of the whole process.
    ///
    /// On failure the directory is left untouched.
    pub fn change_dir(&mut self, target: &Path) -> io::Result<()> {
        stdenv::set_current_dir(target)?;
        self.current_dir = stdenv::current_dir().unwrap_or_else(|_| self.current_dir.join(target));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::env::Environment;
    use std::collections::HashMap;
    use std::env as stdenv;

    #[test]
    fn test_env_set_and_get_var() {
        let mut env = Environment {
            vars: HashMap::new(),
            current_dir: stdenv::current_dir().unwrap(),
            should_exit: false,
        };

        // initially absent
        assert_eq!(env.get_var("SOME_RANDOM_ENV_VAR_12345"), None);

        env.set_var("KEY", "VALUE");

        assert_eq!(env.get_var("KEY"), Some("VALUE".to_string()));
    }

    #[test]
    fn test_env_reads_from_process_env() {
        let env = Environment::new();
        assert!(env.get_var("PATH").is_some());
    }

    #[test]
    fn test_overridden_search_paths_and_home() {
        let mut env = Environment::new();
        env.set_var("PATH", "/nowhere:/elsewhere");
        env.set_var("HOME", "/home/tester");
        assert_eq!(env.search_paths(), "/nowhere:/elsewhere");
        assert_eq!(env.home_dir().as_deref(), Some("/home/tester"));
    }
}
