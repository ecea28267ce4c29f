//! A small interactive shell: pipelines, file redirections, a handful of
//! builtins and a history log with `!!` / `!N` recall.
//!
//! A line goes through the [`lexer`] and [`parser`] into a [`Pipeline`]; the
//! [`pipeline`] module resolves each stage's redirections, forks one process
//! per stage connected by pipes and waits for all of them. [`Interpreter`] ties
//! these together with the [`History`] and the [`Environment`] that builtins
//! such as `cd` and `export` mutate.

mod builtin;
pub mod command;
pub mod config;
pub mod env;
pub mod error;
mod external;
pub mod history;
mod interpreter;
mod io_adapters;
pub mod lexer;
pub mod parser;
pub mod pipeline;
pub mod redirect;
pub mod signals;

pub use builtin::Builtin;
pub use command::{ExitCode, Pipeline};
pub use config::{Args, ExportMode, ShellConfig};
pub use env::Environment;
pub use history::History;
pub use interpreter::{Flow, Interpreter, ShellContext};
pub use io_adapters::{Binding, StdStreams};
