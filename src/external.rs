//! Locating and launching programs that are not builtins.

use crate::command::ExitCode;
use crate::env::Environment;
use nix::errno::Errno;
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::ffi::{CString, OsStr};
use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Exit status of a stage whose program could not be found.
pub const NOT_FOUND: ExitCode = 127;
/// Exit status of a stage whose program was found but could not be executed.
pub const NOT_EXECUTABLE: ExitCode = 126;

/// Resolve a command path the way a typical shell would.
///
/// Behavior:
/// - Absolute path: returns it if it is an executable file.
/// - Relative with multiple components (e.g., `bin/sh`) or `./`-prefixed: returns it
///   if it is an executable file.
/// - Single path component (no separators): search each directory in `search_paths`
///   (PATH) and return the first executable match.
/// - Empty path: returns `None`.
///
/// Returns either a borrowed reference to the provided `path` or an owned `PathBuf`
/// when the result is discovered via PATH lookup.
pub fn find_command_path<'a>(search_paths: &OsStr, path: &'a Path) -> Option<Cow<'a, Path>> {
    if path.is_absolute() {
        return find_by_path(path).map(Cow::Borrowed);
    }

    let mut components = path.components();
    let first = components.next();
    let second = components.next();
    match (first, second) {
        (None, None) => None,
        (Some(x), None) if !path.starts_with("./") => {
            find_in_path(search_paths, x.as_os_str()).map(Cow::Owned)
        }
        _ => find_by_path(path).map(Cow::Borrowed),
    }
}

fn find_in_path(search_paths: &OsStr, cmd: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(search_paths)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(cmd))
        .find(|path| is_executable(path))
}

fn find_by_path(path: &Path) -> Option<&Path> {
    if is_executable(path) { Some(path) } else { None }
}

/// A regular file with at least one execute bit set.
pub fn is_executable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Names of executables found in any `search_paths` directory that start
/// with `prefix`, deduplicated and sorted.
///
/// Unreadable directories are skipped.
pub fn executables_with_prefix(search_paths: &OsStr, prefix: &str) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for dir in std::env::split_paths(search_paths) {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.starts_with(prefix) && !names.contains(&name) && is_executable(&entry.path()) {
                names.insert(name);
            }
        }
    }
    names
}

/// Replace the current process image with the program `name`.
///
/// Only returns on failure, after reporting it on stderr, with the status the
/// process should exit with. Meant to be called in a freshly forked child.
pub fn exec(env: &Environment, name: &str, args: &[String]) -> ExitCode {
    let search_paths = env.search_paths();
    let Some(program) = find_command_path(&search_paths, Path::new(name)) else {
        eprintln!("{}: command not found", name);
        return NOT_FOUND;
    };

    let argv: Result<Vec<CString>, _> = std::iter::once(name)
        .chain(args.iter().map(String::as_str))
        .map(CString::new)
        .collect();
    let (program, argv) = match (CString::new(program.as_os_str().as_bytes()), argv) {
        (Ok(program), Ok(argv)) => (program, argv),
        _ => {
            eprintln!("{}: argument contains a NUL byte", name);
            return NOT_EXECUTABLE;
        }
    };

    let errno = match nix::unistd::execv(&program, &argv) {
        Ok(never) => match never {},
        Err(errno) => errno,
    };
    match errno {
        Errno::ENOENT => {
            eprintln!("{}: command not found", name);
            NOT_FOUND
        }
        e => {
            eprintln!("{}: {}", name, e.desc());
            NOT_EXECUTABLE
        }
    }
}
