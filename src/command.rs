use std::fmt;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// A stage terminated by signal `s` reports `128 + s`, like POSIX shells do.
pub type ExitCode = i32;

/// Status reported for a stage whose program could not be found or executed.
pub const EXEC_FAILURE: ExitCode = 255;

/// Kind of a redirection operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectOp {
    /// `< path`
    Input,
    /// `> path`
    Output,
    /// `>> path`
    Append,
}

impl fmt::Display for RedirectOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RedirectOp::Input => "<",
            RedirectOp::Output => ">",
            RedirectOp::Append => ">>",
        })
    }
}

/// A token of one pipeline stage, after quoting, escaping and expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Word(String),
    Redirect(RedirectOp),
}

impl Token {
    pub fn word(s: impl Into<String>) -> Self {
        Token::Word(s.into())
    }
}

/// One command of a pipeline, bounded by `|` delimiters.
///
/// Redirection operators stay in the token list until the stage is resolved
/// (see [`crate::redirect::resolve`]); after that the first word is the command
/// name and the remaining words are its arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stage {
    pub tokens: Vec<Token>,
}

impl Stage {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// The full sequence of stages from one input line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
}

impl Pipeline {
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
