use crate::command::{RedirectOp, Stage, Token};
use crate::env::Environment;
use crate::error::RedirectError;
use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;

/// Permission bits of files created by `>` and `>>`.
const CREATE_MODE: u32 = 0o600;

/// A stage with its redirections applied.
#[derive(Debug, Default)]
pub struct ResolvedStage {
    /// Command name followed by its arguments.
    pub argv: Vec<String>,
    /// Source of `<`, if any.
    pub input: Option<File>,
    /// Sink of `>` or `>>`, if any.
    pub output: Option<File>,
}

impl ResolvedStage {
    pub fn command_name(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }
}

/// Extract and open the redirections of one stage.
///
/// Directives are opened left to right; a later directive of the same
/// direction replaces (and closes) the earlier one. Files are opened
/// close-on-exec, so they reach a child only through an explicit `dup2`.
pub fn resolve(stage: &Stage, env: &Environment) -> Result<ResolvedStage, RedirectError> {
    let mut resolved = ResolvedStage::default();
    let mut tokens = stage.tokens.iter();

    while let Some(token) = tokens.next() {
        match token {
            Token::Word(word) => resolved.argv.push(word.clone()),
            Token::Redirect(op) => {
                let target = match tokens.next() {
                    Some(Token::Word(target)) => target,
                    _ => return Err(RedirectError::MissingTarget(*op)),
                };
                let file = open_target(*op, target, env)?;
                match op {
                    RedirectOp::Input => resolved.input = Some(file),
                    RedirectOp::Output | RedirectOp::Append => resolved.output = Some(file),
                }
            }
        }
    }

    Ok(resolved)
}

fn open_target(op: RedirectOp, target: &str, env: &Environment) -> Result<File, RedirectError> {
    let path = env.resolve_path(target);
    let mut options = OpenOptions::new();
    match op {
        RedirectOp::Input => options.read(true),
        RedirectOp::Output => options.write(true).create(true).truncate(true).mode(CREATE_MODE),
        RedirectOp::Append => options.append(true).create(true).mode(CREATE_MODE),
    };
    tracing::debug!(%op, path = %path.display(), "opening redirection");
    options
        .open(&path)
        .map_err(|source| RedirectError::Open { path, source })
}
