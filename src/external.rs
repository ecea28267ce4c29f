use crate::builtin::Builtin;
use crate::env::Environment;
use crate::error::ExecError;
use std::ffi::{CString, OsStr};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// What a pipeline stage runs, prepared in the shell before any fork so the
/// child only has to call `execve`.
#[derive(Debug)]
pub enum Program {
    /// A builtin isolated in its own child.
    Builtin { builtin: Builtin, argv: Vec<String> },
    /// An executable found on disk.
    External {
        name: String,
        path: CString,
        argv: Vec<CString>,
    },
    /// Nothing matched; the child reports it and exits with status 255.
    NotFound { name: String },
}

impl Program {
    pub fn prepare(argv: Vec<String>, env: &Environment) -> Result<Program, ExecError> {
        let name = argv.first().cloned().unwrap_or_default();
        if let Some(builtin) = Builtin::lookup(&name) {
            return Ok(Program::Builtin { builtin, argv });
        }
        let Some(path) = find_command_path(env.get_var("PATH"), &env.current_dir, &name) else {
            return Ok(Program::NotFound { name });
        };
        let path = CString::new(path.as_os_str().as_bytes())?;
        let argv = argv
            .into_iter()
            .map(CString::new)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Program::External { name, path, argv })
    }

    pub fn name(&self) -> &str {
        match self {
            Program::Builtin { builtin, .. } => builtin.name(),
            Program::External { name, .. } | Program::NotFound { name } => name,
        }
    }
}

/// Resolve a command name the way a typical shell would.
///
/// Behavior:
/// - Empty name: `None`.
/// - Name containing a `/` (absolute, `./foo`, `bin/foo`): the path itself,
///   relative to `current_dir`, if it exists. Whether it can actually be executed
///   is left to `execve`, which reports the precise reason.
/// - Otherwise: the first executable regular file named `name` in the
///   directories of `search_paths` (`PATH`); an empty entry means `current_dir`.
pub fn find_command_path(search_paths: Option<&str>, current_dir: &Path, name: &str) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }
    if name.contains('/') {
        let path = current_dir.join(name);
        return path.exists().then_some(path);
    }
    let search_paths = search_paths?;
    std::env::split_paths(OsStr::new(search_paths))
        .map(|dir| {
            if dir.as_os_str().is_empty() {
                current_dir.join(name)
            } else {
                current_dir.join(dir).join(name)
            }
        })
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs::{self, File};

    fn make_executable(path: &Path) {
        File::create(path).unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn absolute_existing() {
        let res = find_command_path(Some("/bin"), Path::new("/"), "/bin/sh");
        assert_eq!(res, Some(PathBuf::from("/bin/sh")));
    }

    #[test]
    fn absolute_nonexisting() {
        assert_eq!(find_command_path(Some("/bin"), Path::new("/"), "/bin/nonexisting"), None);
    }

    #[test]
    fn single_component_found_in_path() {
        let found = find_command_path(Some("/nonexistent:/bin"), Path::new("/"), "sh")
            .expect("Expected to find 'sh' in /bin via PATH search");
        assert_eq!(found, PathBuf::from("/bin/sh"));
    }

    #[test]
    fn single_component_not_found_in_path() {
        assert_eq!(find_command_path(Some("/bin"), Path::new("/"), "nonexisting"), None);
        assert_eq!(find_command_path(None, Path::new("/"), "sh"), None);
    }

    #[test]
    fn non_executable_file_is_skipped_in_path() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("plain");
        let bin = dir.path().join("bin");
        fs::create_dir(&plain).unwrap();
        fs::create_dir(&bin).unwrap();
        File::create(plain.join("tool")).unwrap();
        make_executable(&bin.join("tool"));

        let search = format!("{}:{}", plain.display(), bin.display());
        let found = find_command_path(Some(&search), Path::new("/"), "tool");
        assert_eq!(found, Some(bin.join("tool")));
    }

    #[test]
    fn relative_paths_use_current_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("bin")).unwrap();
        make_executable(&dir.path().join("bin").join("tool"));
        make_executable(&dir.path().join("foo"));

        assert_eq!(
            find_command_path(Some("/bin"), dir.path(), "bin/tool"),
            Some(dir.path().join("bin/tool"))
        );
        assert_eq!(
            find_command_path(Some("/bin"), dir.path(), "./foo"),
            Some(dir.path().join("./foo"))
        );
    }

    #[test]
    fn empty_name_is_none() {
        assert_eq!(find_command_path(Some("/bin"), Path::new("/"), ""), None);
    }

    #[test]
    fn prepare_classifies_programs() {
        let mut env = Environment::with_vars(HashMap::new(), PathBuf::from("/"));
        env.set_var("PATH", "/bin:/usr/bin");

        let argv = |s: &[&str]| s.iter().map(|a| a.to_string()).collect::<Vec<_>>();
        assert!(matches!(
            Program::prepare(argv(&["pwd"]), &env).unwrap(),
            Program::Builtin { builtin: Builtin::Pwd, .. }
        ));
        match Program::prepare(argv(&["sh", "-c", "true"]), &env).unwrap() {
            Program::External { name, argv, .. } => {
                assert_eq!(name, "sh");
                assert_eq!(argv.len(), 3);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            Program::prepare(argv(&["no-such-command-xyz"]), &env).unwrap(),
            Program::NotFound { .. }
        ));
        assert!(matches!(
            Program::prepare(argv(&["sh", "a\0b"]), &env),
            Err(ExecError::Nul(_))
        ));
    }
}
