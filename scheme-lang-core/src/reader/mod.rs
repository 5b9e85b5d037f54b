pub mod error;

use crate::lexer::{Token, TokenKind, Tokenizer};
use crate::object::{Object, Symbol};
pub use error::ReadError;

/// Reads one S-expression per call from a character stream.
pub struct Reader<I: Iterator<Item = char>> {
    tokens: Tokenizer<I>,
}

impl<I: Iterator<Item = char>> Reader<I> {
    pub fn new(input: I) -> Self {
        Self {
            tokens: Tokenizer::new(input),
        }
    }

    /// Characters consumed from the input so far. After a successful `read`
    /// this is just past the expression that was returned.
    pub fn position(&self) -> usize {
        self.tokens.position()
    }

    /// `Ok(None)` means the stream ended cleanly between expressions.
    pub fn read(&mut self) -> Result<Option<Object>, ReadError> {
        match self.tokens.next() {
            None => Ok(None),
            Some(Token {
                kind: TokenKind::RParen,
                start,
                ..
            }) => Err(ReadError::UnmatchedCloseParen { position: start }),
            Some(token) => self.read_datum(token).map(Some),
        }
    }

    fn read_datum(&mut self, token: Token) -> Result<Object, ReadError> {
        match token.kind {
            TokenKind::Number(value) => Ok(Object::Number(value)),
            TokenKind::String(value) => Ok(Object::String(value)),
            TokenKind::Symbol(name) => Ok(Object::Symbol(Symbol::from(name))),
            TokenKind::LParen => self.read_list(token.start),
            TokenKind::Quote => {
                let quoted = match self.tokens.next() {
                    None => {
                        return Err(ReadError::UnterminatedQuote {
                            position: token.start,
                        })
                    }
                    Some(Token {
                        kind: TokenKind::RParen,
                        ..
                    }) => {
                        return Err(ReadError::QuotedCloseParen {
                            position: token.start,
                        })
                    }
                    Some(next) => self.read_datum(next)?,
                };
                Ok(Object::list([Object::symbol("quote"), quoted]))
            }
            TokenKind::RParen => Err(ReadError::UnmatchedCloseParen {
                position: token.start,
            }),
            TokenKind::UnterminatedString => Err(ReadError::UnterminatedString {
                position: token.start,
            }),
            TokenKind::InvalidNumber(text) => Err(ReadError::InvalidNumber {
                text,
                position: token.start,
            }),
            TokenKind::Illegal(character) => Err(ReadError::UnexpectedCharacter {
                character,
                position: token.start,
            }),
        }
    }

    fn read_list(&mut self, start: usize) -> Result<Object, ReadError> {
        let mut elements = Vec::new();
        loop {
            match self.tokens.next() {
                None => return Err(ReadError::UnterminatedList { position: start }),
                Some(Token {
                    kind: TokenKind::RParen,
                    ..
                }) => return Ok(Object::list(elements)),
                Some(token) => elements.push(self.read_datum(token)?),
            }
        }
    }
}

impl<I: Iterator<Item = char>> Iterator for Reader<I> {
    type Item = Result<Object, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read().transpose()
    }
}

/// Reads every expression in `input`, failing on the first syntax error.
pub fn read_all(input: &str) -> Result<Vec<Object>, ReadError> {
    Reader::new(input.chars()).collect()
}
