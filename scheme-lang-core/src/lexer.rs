use std::iter::Peekable;
use std::rc::Rc;

#[derive(Debug, PartialEq, Clone)]
pub enum TokenKind {
    Illegal(char),
    UnterminatedString,
    InvalidNumber(Rc<str>),

    Number(f64),
    String(Rc<str>),
    Symbol(Rc<str>),

    LParen,
    RParen,
    Quote,
}

/// `start` and `end` are character offsets into the stream.
#[derive(Debug, PartialEq, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

/// Lazily tokenizes any character stream; nothing past the current token is
/// pulled from the underlying iterator except a single character of lookahead.
pub struct Tokenizer<I: Iterator<Item = char>> {
    iter: Peekable<I>,
    position: usize,
}

impl<I: Iterator<Item = char>> Tokenizer<I> {
    pub fn new(input: I) -> Self {
        Self {
            iter: input.peekable(),
            position: 0,
        }
    }

    /// Characters consumed so far. Lookahead that was only peeked at is not
    /// counted.
    pub fn position(&self) -> usize {
        self.position
    }

    fn is_delimiter(ch: char) -> bool {
        ch.is_whitespace() || matches!(ch, '\'' | '(' | ')' | ';' | '"')
    }

    fn is_symbol_char(ch: char) -> bool {
        !Self::is_delimiter(ch) && !ch.is_control()
    }

    fn is_numeric(text: &str) -> bool {
        let mut chars = text.chars();
        match chars.next() {
            Some(ch) if ch.is_ascii_digit() => true,
            Some('+' | '-' | '.') => chars.next().is_some_and(|ch| ch.is_ascii_digit()),
            _ => false,
        }
    }

    fn next_char(&mut self) -> Option<char> {
        let ch = self.iter.next()?;
        self.position += 1;
        Some(ch)
    }

    fn next_char_if(&mut self, predicate: impl FnOnce(&char) -> bool) -> Option<char> {
        let ch = self.iter.next_if(predicate)?;
        self.position += 1;
        Some(ch)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.next_char_if(|ch| ch.is_whitespace()).is_some() {}
            if self.next_char_if(|ch| *ch == ';').is_none() {
                break;
            }
            while self.next_char_if(|ch| *ch != '\n').is_some() {}
        }
    }

    fn read_atom(&mut self, first: char, start: usize) -> Token {
        let mut text = String::from(first);
        while let Some(ch) = self.next_char_if(|ch| Self::is_symbol_char(*ch)) {
            text.push(ch);
        }

        let kind = if Self::is_numeric(&text) {
            match text.parse::<f64>() {
                Ok(value) => TokenKind::Number(value),
                Err(_) => TokenKind::InvalidNumber(text.into()),
            }
        } else {
            TokenKind::Symbol(text.into())
        };
        Token {
            kind,
            start,
            end: self.position,
        }
    }

    /// Content is kept verbatim; a backslash only stops the next `"` from
    /// closing the literal.
    fn read_string(&mut self, start: usize) -> Token {
        let mut text = String::new();
        loop {
            match self.next_char() {
                Some('"') => break,
                Some('\\') => {
                    text.push('\\');
                    match self.next_char() {
                        Some(ch) => text.push(ch),
                        None => return self.unterminated_string(start),
                    }
                }
                Some(ch) => text.push(ch),
                None => return self.unterminated_string(start),
            }
        }

        Token {
            kind: TokenKind::String(text.into()),
            start,
            end: self.position,
        }
    }

    fn unterminated_string(&self, start: usize) -> Token {
        Token {
            kind: TokenKind::UnterminatedString,
            start,
            end: self.position,
        }
    }
}

impl<I: Iterator<Item = char>> Iterator for Tokenizer<I> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.skip_whitespace_and_comments();

        let start = self.position;
        let ch = self.next_char()?;
        let tok = match ch {
            '(' => Token {
                kind: TokenKind::LParen,
                start,
                end: self.position,
            },
            ')' => Token {
                kind: TokenKind::RParen,
                start,
                end: self.position,
            },
            '\'' => Token {
                kind: TokenKind::Quote,
                start,
                end: self.position,
            },
            '"' => self.read_string(start),
            c if Self::is_symbol_char(c) => self.read_atom(c, start),
            _ => Token {
                kind: TokenKind::Illegal(ch),
                start,
                end: self.position,
            },
        };
        Some(tok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Tokenizer::new(input.chars())
            .map(|token| token.kind)
            .collect::<Vec<_>>()
    }

    #[test]
    fn test_positions() {
        let output = Tokenizer::new("(a 12)".chars()).collect::<Vec<_>>();

        assert_eq!(
            output,
            vec![
                Token {
                    kind: TokenKind::LParen,
                    start: 0,
                    end: 1
                },
                Token {
                    kind: TokenKind::Symbol("a".into()),
                    start: 1,
                    end: 2
                },
                Token {
                    kind: TokenKind::Number(12.0),
                    start: 3,
                    end: 5
                },
                Token {
                    kind: TokenKind::RParen,
                    start: 5,
                    end: 6
                },
            ]
        );
    }

    #[test]
    fn test_atoms() {
        let input = "42 3.25 -7 +1 .5 - ... set-car! null? <= \"hi there\"";
        let expected_output = vec![
            TokenKind::Number(42.0),
            TokenKind::Number(3.25),
            TokenKind::Number(-7.0),
            TokenKind::Number(1.0),
            TokenKind::Number(0.5),
            TokenKind::Symbol("-".into()),
            TokenKind::Symbol("...".into()),
            TokenKind::Symbol("set-car!".into()),
            TokenKind::Symbol("null?".into()),
            TokenKind::Symbol("<=".into()),
            TokenKind::String("hi there".into()),
        ];

        assert_eq!(kinds(input), expected_output);
    }

    #[test]
    fn test_structural_characters_split_atoms() {
        let input = "'(foo\"bar\")baz";
        let expected_output = vec![
            TokenKind::Quote,
            TokenKind::LParen,
            TokenKind::Symbol("foo".into()),
            TokenKind::String("bar".into()),
            TokenKind::RParen,
            TokenKind::Symbol("baz".into()),
        ];

        assert_eq!(kinds(input), expected_output);
    }

    #[test]
    fn test_comments() {
        let input = "; leading comment
    (define x 1) ; trailing
    ;; another
    x";
        let expected_output = vec![
            TokenKind::LParen,
            TokenKind::Symbol("define".into()),
            TokenKind::Symbol("x".into()),
            TokenKind::Number(1.0),
            TokenKind::RParen,
            TokenKind::Symbol("x".into()),
        ];

        assert_eq!(kinds(input), expected_output);
    }

    #[test]
    fn test_strings_are_verbatim() {
        assert_eq!(
            kinds(r#""a\"b\n""#),
            vec![TokenKind::String(r#"a\"b\n"#.into())]
        );
        assert_eq!(kinds("\"open"), vec![TokenKind::UnterminatedString]);
    }

    #[test]
    fn test_invalid_tokens() {
        assert_eq!(
            kinds("12abc"),
            vec![TokenKind::InvalidNumber("12abc".into())]
        );
        assert_eq!(kinds("\u{7}"), vec![TokenKind::Illegal('\u{7}')]);
    }
}
