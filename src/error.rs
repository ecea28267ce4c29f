//! Error types of the shell components.
//!
//! - [`LexError`] / [`ParseError`] - malformed input lines
//! - [`RedirectError`] - redirection syntax and file access
//! - [`ExecError`] - pipeline construction (pipes, processes)
//! - [`RecallError`] - `!!` / `!N` history recall
//!
//! None of them is fatal to the shell: the interpreter reports the error and
//! reads the next line.

use crate::command::RedirectOp;
use std::ffi::NulError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LexError {
    #[error("syntax error: unmatched {0} quote")]
    UnmatchedQuote(char),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("syntax error: empty command in pipeline")]
    EmptyStage,
}

#[derive(Debug, Error)]
pub enum RedirectError {
    #[error("syntax error: missing file name after `{0}`")]
    MissingTarget(RedirectOp),
    #[error("{}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ExecError {
    #[error(transparent)]
    Redirect(#[from] RedirectError),
    #[error("syntax error: missing command in pipeline stage {0}")]
    MissingCommand(usize),
    #[error("argument contains a NUL byte: {0}")]
    Nul(#[from] NulError),
    #[error("Failed to create pipe: {0}")]
    Pipe(#[source] nix::Error),
    #[error("Failed to create new process: {0}")]
    Fork(#[source] nix::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecallError {
    #[error("No commands in history")]
    Empty,
    #[error("Invalid number")]
    InvalidNumber,
}
