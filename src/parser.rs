use crate::command::{Pipeline, Stage, Token};
use crate::env::Environment;
use crate::error::ParseError;
use crate::lexer::{self, Lexeme, Word};

/// Turn a raw input line into a [`Pipeline`].
///
/// A blank line yields a pipeline with zero stages.
pub fn parse_line(line: &str, env: &Environment) -> Result<Pipeline, ParseError> {
    let lexemes = lexer::split_into_lexemes(line)?;
    construct_pipeline(lexemes, env)
}

/// Split lexemes on `|` into stages, expanding every word.
pub fn construct_pipeline(lexemes: Vec<Lexeme>, env: &Environment) -> Result<Pipeline, ParseError> {
    if lexemes.is_empty() {
        return Ok(Pipeline::default());
    }

    let mut stages = Vec::new();
    let mut current = Stage::default();
    for lexeme in lexemes {
        match lexeme {
            Lexeme::Pipe => {
                if current.is_empty() {
                    return Err(ParseError::EmptyStage);
                }
                stages.push(std::mem::take(&mut current));
            }
            Lexeme::Redirect(op) => current.tokens.push(Token::Redirect(op)),
            Lexeme::Word(word) => current.tokens.push(Token::Word(expand_word(word, env))),
        }
    }
    if current.is_empty() {
        return Err(ParseError::EmptyStage);
    }
    stages.push(current);

    Ok(Pipeline { stages })
}

/// Variable substitution, then tilde expansion.
///
/// `$NAME` is replaced only when the whole rest of the word names a set
/// variable; anything else is left as typed.
fn expand_word(word: Word, env: &Environment) -> String {
    if word.expands_var {
        return match env.get_var(&word.text[1..]) {
            Some(value) if word.text.len() > 1 => value.to_string(),
            _ => word.text,
        };
    }
    if word.expands_tilde {
        if let Some(home) = env.home_dir() {
            return format!("{}{}", home.display(), &word.text[1..]);
        }
    }
    word.text
}
