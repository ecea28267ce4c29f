//! Lexical analysis (tokenization) of one input line.
//!
//! The lexer is a single forward scan over the characters of the line. Escapes
//! are resolved as they are met, so an escaped delimiter (`\|`, `\>`, `\ `) is
//! never mistaken for a real one, and quoting is tracked per character so that
//! later expansion knows whether a leading `$` or `~` was typed bare.

use crate::command::RedirectOp;
use crate::error::LexError;

/// A word before variable and tilde expansion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Word {
    pub text: String,
    /// The first character is a `$` typed outside single quotes and not escaped.
    pub expands_var: bool,
    /// The first character is a `~` typed outside any quotes and not escaped.
    pub expands_tilde: bool,
}

impl Word {
    pub fn literal(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// Represents a lexeme resulting from lexical analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lexeme {
    Word(Word),
    /// The pipe operator, `|`.
    Pipe,
    /// One of `<`, `>`, `>>`.
    Redirect(RedirectOp),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Unquoted,
    ReadingSingleQuote,
    ReadingDoubleQuote,
}

/// How a character reached the word buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Bare,
    Escaped,
    SingleQuoted,
    DoubleQuoted,
}

struct LexingFSM {
    input: Vec<char>,
    pos: usize,
    state: LexingState,
    current: Option<Word>,
    /// The current word ends in a backslash produced by `\\`.
    continues: bool,
    out: Vec<Lexeme>,
}

impl LexingFSM {
    fn new(line: &str) -> Self {
        LexingFSM {
            input: line.chars().collect(),
            pos: 0,
            state: LexingState::Unquoted,
            current: None,
            continues: false,
            out: Vec::new(),
        }
    }

    /// Runs the machine to the end of the input.
    ///
    /// # Returns
    /// The lexemes in input order, or [`LexError::UnmatchedQuote`] if the line ends
    /// inside a quoted section.
    fn make_lexemes(mut self) -> Result<Vec<Lexeme>, LexError> {
        while let Some(ch) = self.read_char() {
            match self.state {
                LexingState::Unquoted => self.handle_unquoted(ch),
                LexingState::ReadingSingleQuote => self.handle_quoted(ch, '\'', Origin::SingleQuoted),
                LexingState::ReadingDoubleQuote => self.handle_quoted(ch, '"', Origin::DoubleQuoted),
            }
        }

        match self.state {
            LexingState::ReadingSingleQuote => return Err(LexError::UnmatchedQuote('\'')),
            LexingState::ReadingDoubleQuote => return Err(LexError::UnmatchedQuote('"')),
            LexingState::Unquoted => {}
        }

        self.finish_word();
        Ok(self.out)
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn handle_unquoted(&mut self, ch: char) {
        match ch {
            ' ' | '\t' | '\n' | '\r' => {
                if self.continues {
                    self.skip_blanks();
                    if self.peek_char().is_some_and(|c| !matches!(c, '|' | '<' | '>')) {
                        self.join_continuation();
                        return;
                    }
                }
                self.finish_word();
            }
            '|' => self.push_operator(Lexeme::Pipe),
            '<' => self.push_operator(Lexeme::Redirect(RedirectOp::Input)),
            '>' => {
                // longest match: `>>` before `>`
                let op = if self.peek_char() == Some('>') {
                    self.read_char();
                    RedirectOp::Append
                } else {
                    RedirectOp::Output
                };
                self.push_operator(Lexeme::Redirect(op));
            }
            '\'' => {
                self.start_word();
                self.state = LexingState::ReadingSingleQuote;
            }
            '"' => {
                self.start_word();
                self.state = LexingState::ReadingDoubleQuote;
            }
            '\\' => match self.read_char() {
                Some(next) => self.push_char(resolve_escape(next).unwrap_or(next), Origin::Escaped),
                // nothing left to continue onto
                None => self.push_char('\\', Origin::Escaped),
            },
            c => self.push_char(c, Origin::Bare),
        }
    }

    fn handle_quoted(&mut self, ch: char, closing: char, origin: Origin) {
        if ch == closing {
            self.state = LexingState::Unquoted;
            return;
        }
        if ch == '\\' {
            if let Some(resolved) = self.peek_char().and_then(resolve_escape) {
                self.read_char();
                self.push_char(resolved, Origin::Escaped);
                return;
            }
        }
        self.push_char(ch, origin);
    }

    fn skip_blanks(&mut self) {
        while matches!(self.peek_char(), Some(' ' | '\t' | '\n' | '\r')) {
            self.pos += 1;
        }
    }

    /// `a\\ b` is one word `a b`: the trailing backslash becomes a single space.
    fn join_continuation(&mut self) {
        if let Some(word) = self.current.as_mut() {
            word.text.pop();
            word.text.push(' ');
        }
        self.continues = false;
    }

    fn start_word(&mut self) {
        self.current.get_or_insert_with(Word::default);
    }

    fn push_char(&mut self, ch: char, origin: Origin) {
        let word = self.current.get_or_insert_with(Word::default);
        if word.text.is_empty() {
            word.expands_var = ch == '$' && matches!(origin, Origin::Bare | Origin::DoubleQuoted);
            word.expands_tilde = ch == '~' && origin == Origin::Bare;
        }
        word.text.push(ch);
        self.continues = ch == '\\' && origin == Origin::Escaped;
    }

    fn push_operator(&mut self, lexeme: Lexeme) {
        self.finish_word();
        self.out.push(lexeme);
    }

    fn finish_word(&mut self) {
        self.continues = false;
        if let Some(word) = self.current.take() {
            self.out.push(Lexeme::Word(word));
        }
    }
}

/// The escapes recognized everywhere, including inside quotes.
fn resolve_escape(ch: char) -> Option<char> {
    match ch {
        '\\' => Some('\\'),
        'n' => Some('\n'),
        'r' => Some('\r'),
        't' => Some('\t'),
        '"' => Some('"'),
        _ => None,
    }
}

/// Performs lexical analysis of one input line.
///
/// # Returns
/// `Result<Vec<Lexeme>, LexError>`: the lexemes on success, or a `LexError`
/// if a quote is left open.
pub fn split_into_lexemes(line: &str) -> Result<Vec<Lexeme>, LexError> {
    LexingFSM::new(line).make_lexemes()
}
