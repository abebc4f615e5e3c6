//! Character stream to token list.
//!
//! Single linear scan with one character of lookahead. Whitespace, line
//! comments (`//`), and block comments (`/* */`, non-nesting) are consumed
//! before every token. The lexer does not recover from an unknown character
//! or a malformed number: it reports the error and stops scanning.

use crate::diagnostics::{Diagnostics, Position};
use crate::token::{get_keyword, Token, TokenType};

pub struct Lexer<'a> {
    source: &'a [u8],
    index: usize,
    line: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer {
            source: source.as_bytes(),
            index: 0,
            line: 1,
        }
    }

    fn current(&self) -> u8 {
        self.source.get(self.index).copied().unwrap_or(0)
    }

    fn peek(&self, depth: usize) -> u8 {
        self.source.get(self.index + depth).copied().unwrap_or(0)
    }

    fn advance(&mut self) {
        if self.current() == b'\n' {
            self.line += 1;
        }
        self.index += 1;
    }

    fn matches(&mut self, c: u8) -> bool {
        if self.peek(1) == c {
            self.advance();
            true
        } else {
            false
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.current() {
                b' ' | b'\t' | b'\r' | b'\n' => self.advance(),
                b'/' if self.peek(1) == b'/' => {
                    while self.current() != b'\n' && self.current() != 0 {
                        self.advance();
                    }
                }
                b'/' if self.peek(1) == b'*' => {
                    self.advance();
                    self.advance();
                    loop {
                        if self.current() == 0 {
                            return;
                        }
                        if self.current() == b'*' && self.peek(1) == b'/' {
                            self.advance();
                            self.advance();
                            break;
                        }
                        self.advance();
                    }
                }
                _ => return,
            }
        }
    }

    fn pos(&self, start: usize, end: usize) -> Position {
        Position::new(start, end, self.line)
    }

    fn lex_one(&mut self, diagnostics: &mut Diagnostics) -> Token {
        self.skip_whitespace_and_comments();

        let c = self.current();
        if c.is_ascii_digit() {
            return self.lex_number(diagnostics);
        }
        if c.is_ascii_alphabetic() || c == b'_' {
            return self.lex_name();
        }

        let start = self.index;

        macro_rules! single {
            ($kind:expr, $lex:expr) => {{
                self.advance();
                Token::new($kind, $lex, self.pos(start, start))
            }};
        }

        macro_rules! maybe_double {
            ($double_kind:expr, $double_lex:expr, $single_kind:expr, $single_lex:expr) => {{
                if self.matches(b'=') {
                    self.advance();
                    Token::new($double_kind, $double_lex, self.pos(start, start + 1))
                } else {
                    self.advance();
                    Token::new($single_kind, $single_lex, self.pos(start, start))
                }
            }};
        }

        match c {
            b'(' => single!(TokenType::LeftParen, "("),
            b')' => single!(TokenType::RightParen, ")"),
            b'{' => single!(TokenType::LeftBrace, "{"),
            b'}' => single!(TokenType::RightBrace, "}"),
            b'[' => single!(TokenType::LeftBracket, "["),
            b']' => single!(TokenType::RightBracket, "]"),
            b';' => single!(TokenType::Semicolon, ";"),
            b',' => single!(TokenType::Comma, ","),
            b'.' => single!(TokenType::Dot, "."),
            b'^' => single!(TokenType::Cap, "^"),
            b'&' => single!(TokenType::Ampersand, "&"),
            b'~' => single!(TokenType::Tilde, "~"),
            b'%' => single!(TokenType::Percent, "%"),
            b':' => single!(TokenType::Colon, ":"),
            b'|' => single!(TokenType::Pipe, "|"),
            b'+' => maybe_double!(TokenType::PlusEqual, "+=", TokenType::Plus, "+"),
            b'*' => maybe_double!(TokenType::StarEqual, "*=", TokenType::Star, "*"),
            b'/' => maybe_double!(TokenType::SlashEqual, "/=", TokenType::Slash, "/"),
            b'!' => maybe_double!(TokenType::BangEqual, "!=", TokenType::Bang, "!"),
            b'=' => maybe_double!(TokenType::EqualEqual, "==", TokenType::Equal, "="),
            b'<' => maybe_double!(TokenType::LessEqual, "<=", TokenType::Less, "<"),
            b'>' => maybe_double!(TokenType::GreaterEqual, ">=", TokenType::Greater, ">"),
            b'-' => {
                if self.peek(1) == b'>' {
                    self.advance();
                    self.advance();
                    Token::new(TokenType::Arrow, "->", self.pos(start, start + 1))
                } else if self.matches(b'=') {
                    self.advance();
                    Token::new(TokenType::MinusEqual, "-=", self.pos(start, start + 1))
                } else {
                    self.advance();
                    Token::new(TokenType::Minus, "-", self.pos(start, start))
                }
            }
            b'"' => {
                // Reserved for string literals; not implemented.
                self.advance();
                Token::new(TokenType::Error, "", self.pos(start, start))
            }
            0 => Token::new(TokenType::Eof, "EOF", self.pos(start, start)),
            other => {
                diagnostics.report(
                    format!("Unkown Character '{}'", other as char),
                    self.pos(start, start),
                );
                self.advance();
                Token::new(TokenType::Error, "", self.pos(start, start))
            }
        }
    }

    fn lex_number(&mut self, diagnostics: &mut Diagnostics) -> Token {
        let start = self.index;
        let mut lexeme = String::new();
        let mut is_float = false;

        while self.current().is_ascii_digit() || self.current() == b'.' {
            if self.current() == b'.' {
                if is_float {
                    let at = self.index;
                    diagnostics.report("Unexpected '.'", self.pos(at, at));
                    return Token::new(TokenType::Error, "Unexpected '.'", self.pos(at, at));
                }
                is_float = true;
            }
            lexeme.push(self.current() as char);
            self.advance();
        }

        let end = self.index - 1;
        let kind = if is_float {
            TokenType::FloatLiteral
        } else {
            TokenType::IntLiteral
        };
        Token::new(kind, lexeme, self.pos(start, end))
    }

    fn lex_name(&mut self) -> Token {
        let start = self.index;
        let mut lexeme = String::new();

        while self.current().is_ascii_alphanumeric() || self.current() == b'_' {
            lexeme.push(self.current() as char);
            self.advance();
        }

        let end = self.index.saturating_sub(1);
        let kind = get_keyword(&lexeme).unwrap_or(TokenType::Identifier);
        Token::new(kind, lexeme, self.pos(start, end))
    }

    /// Scan the entire source, returning a token list terminated by `Eof`.
    /// Stops early if `diagnostics` has accumulated an error.
    pub fn analyze(mut self, diagnostics: &mut Diagnostics) -> Vec<Token> {
        let mut tokens = Vec::new();
        while self.current() != 0 && !diagnostics.has_errors() {
            tokens.push(self.lex_one(diagnostics));
        }
        tokens.push(Token::new(TokenType::Eof, "EOF", self.pos(self.index, self.index)));
        tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> (Vec<Token>, Diagnostics) {
        let mut diagnostics = Diagnostics::new("test.an");
        let tokens = Lexer::new(source).analyze(&mut diagnostics);
        (tokens, diagnostics)
    }

    #[test]
    fn empty_source_is_just_eof() {
        let (tokens, diags) = lex("");
        assert!(!diags.has_errors());
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenType::Eof);
    }

    #[test]
    fn integer_literal() {
        let (tokens, _) = lex("42");
        assert_eq!(tokens[0].kind, TokenType::IntLiteral);
        assert_eq!(tokens[0].lexeme, "42");
    }

    #[test]
    fn float_literal() {
        let (tokens, _) = lex("3.14");
        assert_eq!(tokens[0].kind, TokenType::FloatLiteral);
        assert_eq!(tokens[0].lexeme, "3.14");
    }

    #[test]
    fn second_dot_is_an_error() {
        let (_, diags) = lex("1.2.3");
        assert!(diags.has_errors());
    }

    #[test]
    fn keyword_vs_identifier() {
        let (tokens, _) = lex("fn counter");
        assert_eq!(tokens[0].kind, TokenType::Fn);
        assert_eq!(tokens[1].kind, TokenType::Identifier);
        assert_eq!(tokens[1].lexeme, "counter");
    }

    #[test]
    fn two_char_operators() {
        let (tokens, _) = lex("-> == != <= >= += -= *= /=");
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenType::Arrow,
                TokenType::EqualEqual,
                TokenType::BangEqual,
                TokenType::LessEqual,
                TokenType::GreaterEqual,
                TokenType::PlusEqual,
                TokenType::MinusEqual,
                TokenType::StarEqual,
                TokenType::SlashEqual,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn line_comment_is_skipped() {
        let (tokens, _) = lex("1 // comment\n2");
        assert_eq!(tokens[0].lexeme, "1");
        assert_eq!(tokens[1].lexeme, "2");
        assert_eq!(tokens[1].position.line, 2);
    }

    #[test]
    fn block_comment_is_skipped() {
        let (tokens, _) = lex("1 /* block\ncomment */ 2");
        assert_eq!(tokens[0].lexeme, "1");
        assert_eq!(tokens[1].lexeme, "2");
    }

    #[test]
    fn unknown_character_reports_error() {
        let (tokens, diags) = lex("@");
        assert!(diags.has_errors());
        assert_eq!(tokens[0].kind, TokenType::Error);
        assert!(diags.errors()[0].message.contains('@'));
    }

    #[test]
    fn unknown_character_stops_further_lexing() {
        let (tokens, _) = lex("@ 1 2 3");
        // Error token followed immediately by Eof; the rest is unscanned.
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[1].kind, TokenType::Eof);
    }

    #[test]
    fn minus_does_not_confuse_arrow_and_minus_equal() {
        let (tokens, _) = lex("- -= ->");
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenType::Minus,
                TokenType::MinusEqual,
                TokenType::Arrow,
                TokenType::Eof
            ]
        );
    }
}
