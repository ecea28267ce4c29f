use crate::command::ExitCode;
use nix::unistd::{Uid, User};
use std::collections::HashMap;
use std::env as stdenv;
use std::ffi::CString;
use std::path::{Path, PathBuf};

/// Mutable, user-level view of the process environment owned by the shell.
///
/// The environment contains:
/// - `vars`: the variables visible to `$NAME` substitution and handed to every
///   spawned child as its `envp`.
/// - `current_dir`: the working directory, kept in sync with the process one by `cd`.
/// - `exit_request`: set by the `exit` builtin; the shell loop terminates with it.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Key-value store of environment variables (e.g., PATH, HOME).
    pub vars: HashMap<String, String>,
    /// The current working directory for command execution.
    pub current_dir: PathBuf,
    /// Exit status requested by `exit`, if any.
    pub exit_request: Option<ExitCode>,
}

impl Environment {
    /// Capture the current process state into a new `Environment` instance.
    ///
    /// Variables whose name or value is not valid UTF-8 are skipped.
    pub fn new() -> Self {
        let mut vars = HashMap::new();
        for (k, v) in stdenv::vars_os() {
            match (k.into_string(), v.into_string()) {
                (Ok(k), Ok(v)) => {
                    vars.insert(k, v);
                }
                (k, _) => tracing::warn!(name = ?k, "skipping non UTF-8 environment variable"),
            }
        }
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::with_vars(vars, current_dir)
    }

    pub fn with_vars(vars: HashMap<String, String>, current_dir: PathBuf) -> Self {
        Self {
            vars,
            current_dir,
            exit_request: None,
        }
    }

    pub fn get_var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Set or override a variable; visible to every child spawned afterwards.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    /// Home directory of the invoking user: `HOME`, else the password database.
    pub fn home_dir(&self) -> Option<PathBuf> {
        if let Some(home) = self.get_var("HOME").filter(|h| !h.is_empty()) {
            return Some(PathBuf::from(home));
        }
        match User::from_uid(Uid::current()) {
            Ok(Some(user)) => Some(user.dir),
            _ => None,
        }
    }

    /// Interpret `path` relative to the shell's working directory.
    pub fn resolve_path(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.current_dir.join(path)
        }
    }

    /// Variables as `NAME=value` C strings, sorted by name.
    pub fn envp(&self) -> Vec<CString> {
        let mut pairs: Vec<_> = self.vars.iter().collect();
        pairs.sort();
        pairs
            .into_iter()
            .filter_map(|(k, v)| match CString::new(format!("{k}={v}")) {
                Ok(entry) => Some(entry),
                Err(_) => {
                    tracing::warn!(name = %k, "dropping environment variable containing NUL");
                    None
                }
            })
            .collect()
    }

    pub fn request_exit(&mut self, code: ExitCode) {
        self.exit_request = Some(code);
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
