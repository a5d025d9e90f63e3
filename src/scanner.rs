use crate::error::Error;
use crate::number::Number;
use crate::token::{Token, TokenType, KEYWORDS};

pub struct Scanner<'a> {
    source: &'a [u8],
    tokens: Vec<Token>,
    start: usize,
    current: usize,
    line: usize,
    first_error: Option<Error>,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Scanner {
            source: source.as_bytes(),
            tokens: Vec::new(),
            start: 0,
            current: 0,
            line: 1,
            first_error: None,
        }
    }

    pub fn scan_tokens(mut self) -> Result<Vec<Token>, Error> {
        while !self.is_at_end() {
            self.start = self.current;
            self.scan_token();
        }
        self.tokens
            .push(Token::new(TokenType::Eof, String::new(), self.line));
        log::trace!("scanned {} tokens", self.tokens.len());

        match self.first_error {
            Some(err) => Err(err),
            None => Ok(self.tokens),
        }
    }

    fn scan_token(&mut self) {
        let c = self.advance();
        match c {
            b'(' => self.add_token(TokenType::LeftParen),
            b')' => self.add_token(TokenType::RightParen),
            b'{' => self.add_token(TokenType::LeftBrace),
            b'}' => self.add_token(TokenType::RightBrace),
            b',' => self.add_token(TokenType::Comma),
            b'.' => self.add_token(TokenType::Dot),
            b'-' => self.add_token(TokenType::Minus),
            b'+' => self.add_token(TokenType::Plus),
            b';' => self.add_token(TokenType::Semicolon),
            b'*' => self.add_token(TokenType::Star),
            b'!' => {
                let kind = if self.matches(b'=') {
                    TokenType::BangEqual
                } else {
                    TokenType::Bang
                };
                self.add_token(kind);
            }
            b'=' => {
                let kind = if self.matches(b'=') {
                    TokenType::EqualEqual
                } else {
                    TokenType::Equal
                };
                self.add_token(kind);
            }
            b'<' => {
                let kind = if self.matches(b'=') {
                    TokenType::LessEqual
                } else {
                    TokenType::Less
                };
                self.add_token(kind);
            }
            b'>' => {
                let kind = if self.matches(b'=') {
                    TokenType::GreaterEqual
                } else {
                    TokenType::Greater
                };
                self.add_token(kind);
            }
            b'/' => {
                if self.matches(b'/') {
                    while self.peek() != b'\n' && !self.is_at_end() {
                        self.advance();
                    }
                } else {
                    self.add_token(TokenType::Slash);
                }
            }
            b' ' | b'\r' | b'\t' => {}
            b'\n' => self.line += 1,
            b'"' => self.string(),
            c if c.is_ascii_digit() => self.number(),
            c if c.is_ascii_alphabetic() || c == b'_' => self.identifier(),
            _ => self.error(format!("Unexpected character '{}'.", c as char)),
        }
    }

    fn string(&mut self) {
        while self.peek() != b'"' && !self.is_at_end() {
            if self.peek() == b'\n' {
                self.line += 1;
            }
            self.advance();
        }

        if self.is_at_end() {
            self.error("Unterminated string.".to_string());
            return;
        }

        self.advance();

        let value = String::from_utf8_lossy(&self.source[self.start + 1..self.current - 1])
            .into_owned();
        self.add_token(TokenType::String { literal: value });
    }

    fn number(&mut self) {
        let mut is_float = false;
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        if self.peek() == b'.' && self.peek_next().is_ascii_digit() {
            is_float = true;
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        let text = std::str::from_utf8(&self.source[self.start..self.current]).unwrap();
        let literal = if is_float {
            Number::Float(text.parse().unwrap())
        } else {
            Number::Int(text.parse().unwrap())
        };
        self.add_token(TokenType::Number { literal });
    }

    fn identifier(&mut self) {
        while self.peek().is_ascii_alphanumeric() || self.peek() == b'_' {
            self.advance();
        }
        let text = std::str::from_utf8(&self.source[self.start..self.current]).unwrap();
        let kind = KEYWORDS.get(text).cloned().unwrap_or(TokenType::Identifier);
        self.add_token(kind);
    }

    fn matches(&mut self, expected: u8) -> bool {
        if self.is_at_end() || self.source[self.current] != expected {
            return false;
        }
        self.current += 1;
        true
    }

    fn peek(&self) -> u8 {
        if self.is_at_end() {
            b'\0'
        } else {
            self.source[self.current]
        }
    }

    fn peek_next(&self) -> u8 {
        if self.current + 1 >= self.source.len() {
            b'\0'
        } else {
            self.source[self.current + 1]
        }
    }

    fn advance(&mut self) -> u8 {
        let c = self.source[self.current];
        self.current += 1;
        c
    }

    fn add_token(&mut self, token_type: TokenType) {
        let text =
            String::from_utf8_lossy(&self.source[self.start..self.current]).into_owned();
        self.tokens.push(Token::new(token_type, text, self.line));
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn error(&mut self, message: String) {
        let err = Error::lex(self.line, message);
        eprintln!("{err}");
        if self.first_error.is_none() {
            self.first_error = Some(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenType> {
        Scanner::new(source)
            .scan_tokens()
            .unwrap()
            .into_iter()
            .map(|t| t.token_type)
            .collect()
    }

    #[test]
    fn scans_punctuation_and_operators() {
        let kinds = kinds("(){}==!=<=");
        assert_eq!(
            kinds,
            vec![
                TokenType::LeftParen,
                TokenType::RightParen,
                TokenType::LeftBrace,
                TokenType::RightBrace,
                TokenType::EqualEqual,
                TokenType::BangEqual,
                TokenType::LessEqual,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn distinguishes_integer_from_float_literals() {
        let kinds = kinds("3 3.0");
        assert_eq!(
            kinds,
            vec![
                TokenType::Number {
                    literal: Number::Int(3)
                },
                TokenType::Number {
                    literal: Number::Float(3.0)
                },
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn recognizes_keywords_including_input() {
        let kinds = kinds("class input fun foo");
        assert_eq!(
            kinds,
            vec![
                TokenType::Class,
                TokenType::Input,
                TokenType::Fun,
                TokenType::Identifier,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn unterminated_string_is_a_lexical_error() {
        assert!(Scanner::new("\"abc").scan_tokens().is_err());
    }
}
