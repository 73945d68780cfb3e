use ordered_float::OrderedFloat;
use tracing::{error, instrument};

use crate::{LoxError, Result, object::Literal, token::Token, token_type::TokenType};

pub struct Scanner {
    source: String,
    tokens: Vec<Token>,
    current: usize,
    start: usize,
    line: usize,
}

impl Scanner {
    pub fn new(source: String) -> Self {
        Self {
            source,
            tokens: Vec::new(),
            current: 0,
            start: 0,
            line: 1,
        }
    }

    /// Scans the whole source, reporting each lexical error as it is found
    /// and carrying on, so the token stream is complete either way. Always
    /// ends with an EOF token on the final line.
    #[instrument(skip(self), level = "trace")]
    pub fn scan_tokens(mut self) -> (Vec<Token>, bool) {
        let mut had_error = false;
        let eof = self.source.len();

        while self.current < eof {
            self.start = self.current;
            if let Err(err) = self.scan_token() {
                error!(?err, "Error while scanning");
                eprintln!("{err}");
                had_error = true;
            }
        }
        self.tokens
            .push(Token::new(TokenType::Eof, "", Literal::Null, self.line));

        (self.tokens, had_error)
    }

    fn scan_token(&mut self) -> Result<()> {
        let c = self.advance();
        let mut if_equals_else = |is_equal: TokenType, not_equal: TokenType| {
            let token_type = if self.advance_if_is('=') {
                is_equal
            } else {
                not_equal
            };
            self.add_token(token_type);
        };
        match c {
            '(' => self.add_token(TokenType::LeftParen),
            ')' => self.add_token(TokenType::RightParen),
            '{' => self.add_token(TokenType::LeftBrace),
            '}' => self.add_token(TokenType::RightBrace),
            ',' => self.add_token(TokenType::Comma),
            '.' => self.add_token(TokenType::Dot),
            '-' => self.add_token(TokenType::Minus),
            '+' => self.add_token(TokenType::Plus),
            ';' => self.add_token(TokenType::Semicolon),
            '*' => self.add_token(TokenType::Star),
            '!' => if_equals_else(TokenType::BangEqual, TokenType::Bang),
            '=' => if_equals_else(TokenType::EqualEqual, TokenType::Equal),
            '<' => if_equals_else(TokenType::LessEqual, TokenType::Less),
            '>' => if_equals_else(TokenType::GreaterEqual, TokenType::Greater),
            '/' => {
                if self.peek() == '/' {
                    // Comment runs to end of line
                    while self.peek() != '\n' && !self.is_at_end() {
                        self.advance();
                    }
                } else {
                    self.add_token(TokenType::Slash);
                }
            }
            ' ' | '\r' | '\t' => (),
            '\n' => {
                self.line += 1;
            }
            '"' => self.string()?,
            '0'..='9' => self.number(),
            c if is_alpha(c) => self.identifier(),
            _ => {
                return Err(LoxError::Scan {
                    line: self.line,
                    message: format!("Unexpected character: {c}"),
                });
            }
        }

        Ok(())
    }

    fn advance(&mut self) -> char {
        let next = self.source.as_bytes()[self.current] as char;
        self.current += 1;
        next
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn add_token(&mut self, token_type: TokenType) {
        self.add_token_with_literal(token_type, Literal::Null)
    }

    fn add_token_with_literal(&mut self, token_type: TokenType, literal: Literal) {
        let text = &self.source[self.start..self.current];
        self.tokens
            .push(Token::new(token_type, text, literal, self.line))
    }

    fn advance_if_is(&mut self, expected: char) -> bool {
        if self.is_at_end() {
            return false;
        }
        if self.source.as_bytes()[self.current] as char != expected {
            return false;
        }

        self.current += 1;
        true
    }

    fn peek(&self) -> char {
        if self.is_at_end() {
            return '\0';
        }
        self.source.as_bytes()[self.current] as char
    }

    fn peek_next(&self) -> char {
        if self.current + 1 >= self.source.len() {
            return '\0';
        }
        self.source.as_bytes()[self.current + 1] as char
    }

    /// Strings may span lines and carry no escape processing; the literal is
    /// the raw character run between the quotes.
    fn string(&mut self) -> Result<()> {
        let opening_line = self.line;
        while self.peek() != '"' && !self.is_at_end() {
            if self.peek() == '\n' {
                self.line += 1;
            }
            self.advance();
        }

        if self.is_at_end() {
            return Err(LoxError::Scan {
                line: opening_line,
                message: "Unterminated string.".to_string(),
            });
        }

        // The closing "
        self.advance();

        let val = &self.source[self.start + 1..self.current - 1];
        self.add_token_with_literal(TokenType::String, Literal::String(val.to_string()));
        Ok(())
    }

    fn number(&mut self) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        // A fractional part needs a digit after the '.', otherwise the dot is
        // left for the next token
        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            self.advance();
        }

        while self.peek().is_ascii_digit() {
            self.advance();
        }

        let as_float: f64 = self.source[self.start..self.current]
            .parse::<f64>()
            .expect("Better be a number");
        self.add_token_with_literal(TokenType::Number, Literal::Number(OrderedFloat(as_float)))
    }

    fn identifier(&mut self) {
        while is_alphanumeric(self.peek()) {
            self.advance();
        }

        let text = &self.source[self.start..self.current];
        let token_type = match TokenType::try_from_identifier(text) {
            Some(tt) => tt,
            None => TokenType::Identifier,
        };

        // Plain identifiers carry their name as the literal; keywords don't
        let literal = match token_type {
            TokenType::Identifier => Literal::String(text.to_string()),
            _ => Literal::Null,
        };
        self.add_token_with_literal(token_type, literal);
    }
}

fn is_alpha(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_alphanumeric(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    fn kinds(source: &str) -> Vec<TokenType> {
        let (tokens, had_error) = Scanner::new(source.to_string()).scan_tokens();
        assert!(!had_error, "unexpected scan error in {source:?}");
        tokens.into_iter().map(|t| t.typ).collect()
    }

    #[test]
    fn ends_with_exactly_one_eof() {
        let (tokens, _) = Scanner::new("var x = 1;".to_string()).scan_tokens();
        let eofs = tokens.iter().filter(|t| t.typ == TokenType::Eof).count();
        assert_eq!(eofs, 1);
        assert_eq!(tokens.last().unwrap().typ, TokenType::Eof);
    }

    #[test]
    fn maximal_munch_on_two_char_operators() {
        assert_eq!(
            kinds("! != = == < <= > >="),
            vec![
                TokenType::Bang,
                TokenType::BangEqual,
                TokenType::Equal,
                TokenType::EqualEqual,
                TokenType::Less,
                TokenType::LessEqual,
                TokenType::Greater,
                TokenType::GreaterEqual,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn identifiers_carry_their_name_as_literal() {
        let (tokens, _) = Scanner::new("foo var".to_string()).scan_tokens();
        assert_eq!(tokens[0].literal, Literal::String("foo".to_string()));
        assert_eq!(tokens[1].literal, Literal::Null);
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(
            kinds("class foo fun classy _bar"),
            vec![
                TokenType::Class,
                TokenType::Identifier,
                TokenType::Fun,
                TokenType::Identifier,
                TokenType::Identifier,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn trailing_dot_is_not_part_of_a_number() {
        assert_eq!(
            kinds("123."),
            vec![TokenType::Number, TokenType::Dot, TokenType::Eof]
        );
        let (tokens, _) = Scanner::new("123.".to_string()).scan_tokens();
        assert_eq!(tokens[0].literal, Literal::Number(OrderedFloat(123.0)));
    }

    #[test]
    fn fractional_number_literal() {
        let (tokens, _) = Scanner::new("3.25".to_string()).scan_tokens();
        assert_eq!(tokens[0].literal, Literal::Number(OrderedFloat(3.25)));
        assert_eq!(tokens[0].lexeme, "3.25");
    }

    #[test]
    fn string_spans_lines_and_tracks_them() {
        let (tokens, had_error) = Scanner::new("\"a\nb\" x".to_string()).scan_tokens();
        assert!(!had_error);
        assert_eq!(tokens[0].literal, Literal::String("a\nb".to_string()));
        assert_eq!(tokens[0].line, 2);
        assert_eq!(tokens[1].line, 2);
    }

    #[test]
    fn no_escape_processing_in_strings() {
        let (tokens, _) = Scanner::new(r#""a\nb""#.to_string()).scan_tokens();
        assert_eq!(tokens[0].literal, Literal::String(r"a\nb".to_string()));
    }

    #[test]
    fn unterminated_string_reports_but_keeps_scanning() {
        let (tokens, had_error) = Scanner::new("\"abc".to_string()).scan_tokens();
        assert!(had_error);
        assert_eq!(tokens.last().unwrap().typ, TokenType::Eof);
    }

    #[test]
    fn unexpected_character_reports_and_continues() {
        let (tokens, had_error) = Scanner::new("@ 1".to_string()).scan_tokens();
        assert!(had_error);
        assert_eq!(
            tokens.iter().map(|t| t.typ).collect::<Vec<_>>(),
            vec![TokenType::Number, TokenType::Eof]
        );
    }

    #[test]
    fn comments_are_skipped_to_end_of_line() {
        assert_eq!(
            kinds("1 // comment ; hiding\n2"),
            vec![TokenType::Number, TokenType::Number, TokenType::Eof]
        );
    }
}
