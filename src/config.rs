//! Shell configuration and command-line flags.

use crate::env::Environment;
use crate::history::HistoryFile;
use argh::FromArgs;
use std::path::PathBuf;

pub const DEFAULT_PROMPT: &str = "$ ";

#[derive(FromArgs, Debug)]
/// A small interactive shell with pipelines, redirections and history recall.
pub struct Args {
    #[argh(option, short = 'c')]
    /// run a single command line and exit with its status
    pub command: Option<String>,

    #[argh(option)]
    /// history file to read at startup and append to (default: ~/.shell_history)
    pub history_file: Option<PathBuf>,

    #[argh(switch)]
    /// do not read or write a history file
    pub no_history: bool,

    #[argh(option, default = "String::from(DEFAULT_PROMPT)")]
    /// prompt text
    pub prompt: String,

    #[argh(switch)]
    /// make `export` stop at the first invalid assignment
    pub export_stop_on_error: bool,
}

/// What `export` does after an argument fails to assign.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportMode {
    /// Every argument is processed; the status reports whether any failed.
    #[default]
    Independent,
    /// The first failure aborts the remaining arguments.
    StopOnError,
}

#[derive(Debug, Clone)]
pub struct ShellConfig {
    pub prompt: String,
    /// `None` disables the history file entirely.
    pub history_path: Option<PathBuf>,
    pub export_mode: ExportMode,
}

impl Default for ShellConfig {
    /// Prompt `$ `, no history file, independent `export`.
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            history_path: None,
            export_mode: ExportMode::Independent,
        }
    }
}

impl ShellConfig {
    /// Build the configuration from parsed flags.
    ///
    /// The history file defaults to `~/.shell_history`; `-c` and `--no-history`
    /// disable it.
    pub fn from_args(args: &Args, env: &Environment) -> Self {
        let history_path = if args.no_history || args.command.is_some() {
            None
        } else {
            args.history_file
                .clone()
                .or_else(|| HistoryFile::default_path(env))
        };
        Self {
            prompt: args.prompt.clone(),
            history_path,
            export_mode: if args.export_stop_on_error {
                ExportMode::StopOnError
            } else {
                ExportMode::Independent
            },
        }
    }
}
