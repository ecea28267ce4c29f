//! The history log and its backing file.
//!
//! Entries are raw command lines, 1-indexed for display and recall. A recall
//! line (`!!`, `!N`) is never stored itself: the shell stores the recalled
//! content instead.

use crate::env::Environment;
use crate::error::RecallError;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const HISTORY_FILE_NAME: &str = ".shell_history";

/// Append-only, in-memory history of accepted command lines.
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Vec<String>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<String>) -> Self {
        Self { entries }
    }

    pub fn push(&mut self, line: impl Into<String>) {
        self.entries.push(line.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Entry at 1-based `index`.
    pub fn get(&self, index: usize) -> Option<&str> {
        index
            .checked_sub(1)
            .and_then(|i| self.entries.get(i))
            .map(String::as_str)
    }

    /// Resolve a recall line.
    ///
    /// Returns `None` when `line` is not a recall (does not start with `!`).
    pub fn recall(&self, line: &str) -> Option<Result<String, RecallError>> {
        let rest = line.trim_end().strip_prefix('!')?;
        let found = if rest == "!" {
            self.entries.last().cloned().ok_or(RecallError::Empty)
        } else {
            rest.parse::<usize>()
                .ok()
                .and_then(|n| self.get(n))
                .map(str::to_string)
                .ok_or(RecallError::InvalidNumber)
        };
        Some(found)
    }

    /// Write entries as `{index:>width}  {line}`, where `width` is the number of
    /// digits of the largest index. `last` limits the listing to the last N entries.
    pub fn write_listing(&self, last: Option<usize>, out: &mut dyn Write) -> io::Result<()> {
        let len = self.entries.len();
        let width = len.to_string().len();
        let skip = last.map_or(0, |n| len.saturating_sub(n));
        for (i, entry) in self.entries.iter().enumerate().skip(skip) {
            writeln!(out, "{:>width$}  {}", i + 1, entry)?;
        }
        Ok(())
    }
}

/// Line-per-record history file.
#[derive(Debug, Clone)]
pub struct HistoryFile {
    path: PathBuf,
}

impl HistoryFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.shell_history` for the invoking user.
    pub fn default_path(env: &Environment) -> Option<PathBuf> {
        env.home_dir().map(|home| home.join(HISTORY_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record. A missing file is an empty history.
    pub fn load(&self) -> io::Result<Vec<String>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(String::from_utf8_lossy(&bytes)
                .lines()
                .map(str::to_string)
                .collect()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    pub fn append(&self, line: &str) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")
    }
}
