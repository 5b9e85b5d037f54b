use std::rc::Rc;

use thiserror::Error;

/// Positions are character offsets into the stream being read.
#[derive(Debug, PartialEq, Clone, Error)]
pub enum ReadError {
    #[error("unmatched ')' at position {position}")]
    UnmatchedCloseParen { position: usize },
    #[error("unterminated list starting at position {position}")]
    UnterminatedList { position: usize },
    #[error("unterminated string starting at position {position}")]
    UnterminatedString { position: usize },
    #[error("quote at position {position} has nothing to quote")]
    UnterminatedQuote { position: usize },
    #[error("quote at position {position} is followed by ')'")]
    QuotedCloseParen { position: usize },
    #[error("invalid number {text:?} at position {position}")]
    InvalidNumber { text: Rc<str>, position: usize },
    #[error("unexpected character {character:?} at position {position}")]
    UnexpectedCharacter { character: char, position: usize },
}

impl ReadError {
    /// True when the input simply ended too early, so more input could still
    /// complete it.
    pub fn is_incomplete(&self) -> bool {
        matches!(
            self,
            ReadError::UnterminatedList { .. }
                | ReadError::UnterminatedString { .. }
                | ReadError::UnterminatedQuote { .. }
        )
    }
}
