//! Script lexer/tokenizer
//!
//! Turns exercise source text (a JavaScript subset) into tokens. Template
//! literals, regular expressions and BigInt literals are outside the subset
//! and are reported as syntax errors.

mod token;

pub use token::{Keyword, Token, TokenKind};

use crate::error::{Error, Result, SourceLocation};

/// A lexer for script source code
pub struct Lexer<'src> {
    /// Source code being lexed
    source: &'src str,
    /// Current position in bytes
    pos: usize,
    /// Current line number (1-indexed)
    line: u32,
    /// Current column number (1-indexed)
    column: u32,
}

impl<'src> Lexer<'src> {
    /// Create a new lexer for the given source code
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn location(&self) -> SourceLocation {
        SourceLocation {
            line: self.line,
            column: self.column,
            offset: self.pos,
        }
    }

    fn error(&self, message: impl Into<String>, location: SourceLocation) -> Error {
        Error::lexer_error_with_context(message, location, self.source)
    }

    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn peek_next(&self) -> Option<char> {
        let mut chars = self.source[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    /// Consume `next` if it is the upcoming character
    fn eat(&mut self, next: char) -> bool {
        if self.peek() == Some(next) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Skip whitespace and comments
    fn skip_whitespace_and_comments(&mut self) -> Result<()> {
        loop {
            while let Some(c) = self.peek() {
                if c.is_whitespace() {
                    self.advance();
                } else {
                    break;
                }
            }

            if self.peek() == Some('/') {
                if self.peek_next() == Some('/') {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                    continue;
                } else if self.peek_next() == Some('*') {
                    let start_loc = self.location();
                    self.advance(); // /
                    self.advance(); // *
                    loop {
                        match self.peek() {
                            None => return Err(self.error("Unterminated comment", start_loc)),
                            Some('*') if self.peek_next() == Some('/') => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            _ => {
                                self.advance();
                            }
                        }
                    }
                    continue;
                }
            }

            return Ok(());
        }
    }

    fn is_id_start(c: char) -> bool {
        c == '_' || c == '$' || unicode_xid::UnicodeXID::is_xid_start(c)
    }

    fn is_id_continue(c: char) -> bool {
        c == '_' || c == '$' || unicode_xid::UnicodeXID::is_xid_continue(c)
    }

    fn scan_identifier(&mut self) -> Token<'src> {
        let start = self.pos;
        let start_loc = self.location();

        while let Some(c) = self.peek() {
            if Self::is_id_continue(c) {
                self.advance();
            } else {
                break;
            }
        }

        let text = &self.source[start..self.pos];
        let kind = match Keyword::lookup(text) {
            Some(keyword) => TokenKind::Keyword(keyword),
            None => TokenKind::Identifier,
        };

        Token {
            kind,
            text,
            location: start_loc,
        }
    }

    fn scan_digits(&mut self, accept: impl Fn(char) -> bool) {
        while let Some(c) = self.peek() {
            if accept(c) || c == '_' {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn scan_number(&mut self) -> Result<Token<'src>> {
        let start = self.pos;
        let start_loc = self.location();

        if self.peek() == Some('0') {
            match self.peek_next() {
                Some('x') | Some('X') => {
                    self.advance();
                    self.advance();
                    self.scan_digits(|c| c.is_ascii_hexdigit());
                }
                Some('b') | Some('B') => {
                    self.advance();
                    self.advance();
                    self.scan_digits(|c| c == '0' || c == '1');
                }
                Some('o') | Some('O') => {
                    self.advance();
                    self.advance();
                    self.scan_digits(|c| ('0'..='7').contains(&c));
                }
                _ => {}
            }
        }

        if self.pos == start {
            self.scan_digits(|c| c.is_ascii_digit());

            if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
                self.scan_digits(|c| c.is_ascii_digit());
            }

            if matches!(self.peek(), Some('e') | Some('E')) {
                self.advance();
                if matches!(self.peek(), Some('+') | Some('-')) {
                    self.advance();
                }
                self.scan_digits(|c| c.is_ascii_digit());
            }
        }

        if self.peek().is_some_and(Self::is_id_start) {
            return Err(self.error(
                "Identifier starts immediately after numeric literal",
                self.location(),
            ));
        }

        Ok(Token {
            kind: TokenKind::NumberLiteral,
            text: &self.source[start..self.pos],
            location: start_loc,
        })
    }

    fn scan_string(&mut self, quote: char) -> Result<Token<'src>> {
        let start = self.pos;
        let start_loc = self.location();
        self.advance(); // Opening quote

        loop {
            match self.peek() {
                None | Some('\n') | Some('\r') => {
                    return Err(self.error("Unterminated string literal", start_loc));
                }
                Some('\\') => {
                    self.advance();
                    self.advance();
                }
                Some(c) if c == quote => {
                    self.advance();
                    break;
                }
                _ => {
                    self.advance();
                }
            }
        }

        Ok(Token {
            kind: TokenKind::StringLiteral,
            text: &self.source[start..self.pos],
            location: start_loc,
        })
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Result<Token<'src>> {
        self.skip_whitespace_and_comments()?;

        let start_loc = self.location();
        let Some(c) = self.peek() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                text: "",
                location: start_loc,
            });
        };

        if Self::is_id_start(c) {
            return Ok(self.scan_identifier());
        }

        if c.is_ascii_digit() || (c == '.' && self.peek_next().is_some_and(|n| n.is_ascii_digit()))
        {
            return self.scan_number();
        }

        if c == '"' || c == '\'' {
            return self.scan_string(c);
        }

        let start = self.pos;
        self.advance();

        let kind = match c {
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '{' => TokenKind::LeftBrace,
            '}' => TokenKind::RightBrace,
            '[' => TokenKind::LeftBracket,
            ']' => TokenKind::RightBracket,
            ';' => TokenKind::Semicolon,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            '.' => TokenKind::Dot,
            '?' => {
                if self.eat('?') {
                    TokenKind::QuestionQuestion
                } else {
                    TokenKind::Question
                }
            }
            '+' => {
                if self.eat('+') {
                    TokenKind::PlusPlus
                } else if self.eat('=') {
                    TokenKind::PlusEquals
                } else {
                    TokenKind::Plus
                }
            }
            '-' => {
                if self.eat('-') {
                    TokenKind::MinusMinus
                } else if self.eat('=') {
                    TokenKind::MinusEquals
                } else {
                    TokenKind::Minus
                }
            }
            '*' => {
                if self.eat('*') {
                    TokenKind::StarStar
                } else if self.eat('=') {
                    TokenKind::StarEquals
                } else {
                    TokenKind::Star
                }
            }
            '/' => {
                if self.eat('=') {
                    TokenKind::SlashEquals
                } else {
                    TokenKind::Slash
                }
            }
            '%' => {
                if self.eat('=') {
                    TokenKind::PercentEquals
                } else {
                    TokenKind::Percent
                }
            }
            '<' => {
                if self.eat('=') {
                    TokenKind::LessEquals
                } else {
                    TokenKind::Less
                }
            }
            '>' => {
                if self.eat('=') {
                    TokenKind::GreaterEquals
                } else {
                    TokenKind::Greater
                }
            }
            '=' => {
                if self.eat('=') {
                    if self.eat('=') {
                        TokenKind::EqualsEqualsEquals
                    } else {
                        TokenKind::EqualsEquals
                    }
                } else if self.eat('>') {
                    TokenKind::Arrow
                } else {
                    TokenKind::Equals
                }
            }
            '!' => {
                if self.eat('=') {
                    if self.eat('=') {
                        TokenKind::BangEqualsEquals
                    } else {
                        TokenKind::BangEquals
                    }
                } else {
                    TokenKind::Bang
                }
            }
            '&' if self.eat('&') => TokenKind::AmpersandAmpersand,
            '|' if self.eat('|') => TokenKind::PipePipe,
            '`' => {
                return Err(self.error("Template literals are not supported", start_loc));
            }
            _ => {
                return Err(self.error(format!("Unexpected character '{}'", c), start_loc));
            }
        };

        Ok(Token {
            kind,
            text: &self.source[start..self.pos],
            location: start_loc,
        })
    }

    /// Tokenize the entire source into a vector of tokens
    pub fn tokenize(&mut self) -> Result<Vec<Token<'src>>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_empty_source() {
        let mut lexer = Lexer::new("");
        let token = lexer.next_token().unwrap();
        assert_eq!(token.kind, TokenKind::Eof);
    }

    #[test]
    fn test_identifiers() {
        let mut lexer = Lexer::new("foo bar _private $jquery");
        assert_eq!(lexer.next_token().unwrap().text, "foo");
        assert_eq!(lexer.next_token().unwrap().text, "bar");
        assert_eq!(lexer.next_token().unwrap().text, "_private");
        assert_eq!(lexer.next_token().unwrap().text, "$jquery");
    }

    #[test]
    fn test_keywords() {
        assert_eq!(
            kinds("let const function of"),
            vec![
                TokenKind::Keyword(Keyword::Let),
                TokenKind::Keyword(Keyword::Const),
                TokenKind::Keyword(Keyword::Function),
                TokenKind::Keyword(Keyword::Of),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        let mut lexer = Lexer::new("42 3.14 0xFF 0b1010 0o777 1e10 .5");
        assert_eq!(lexer.next_token().unwrap().text, "42");
        assert_eq!(lexer.next_token().unwrap().text, "3.14");
        assert_eq!(lexer.next_token().unwrap().text, "0xFF");
        assert_eq!(lexer.next_token().unwrap().text, "0b1010");
        assert_eq!(lexer.next_token().unwrap().text, "0o777");
        assert_eq!(lexer.next_token().unwrap().text, "1e10");
        assert_eq!(lexer.next_token().unwrap().text, ".5");
    }

    #[test]
    fn test_strings() {
        let mut lexer = Lexer::new(r#""hello" 'world' "with \"escape""#);
        assert_eq!(lexer.next_token().unwrap().text, r#""hello""#);
        assert_eq!(lexer.next_token().unwrap().text, "'world'");
        assert_eq!(lexer.next_token().unwrap().text, r#""with \"escape""#);
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("=== !== => ?? && || ** +="),
            vec![
                TokenKind::EqualsEqualsEquals,
                TokenKind::BangEqualsEquals,
                TokenKind::Arrow,
                TokenKind::QuestionQuestion,
                TokenKind::AmpersandAmpersand,
                TokenKind::PipePipe,
                TokenKind::StarStar,
                TokenKind::PlusEquals,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments() {
        let mut lexer = Lexer::new("foo // comment\nbar /* block */ baz");
        assert_eq!(lexer.next_token().unwrap().text, "foo");
        let bar = lexer.next_token().unwrap();
        assert_eq!(bar.text, "bar");
        assert_eq!(bar.location.line, 2);
        assert_eq!(lexer.next_token().unwrap().text, "baz");
    }

    #[test]
    fn test_unterminated_string_is_error() {
        let err = Lexer::new("let s = 'abc").tokenize().unwrap_err();
        assert!(err.to_string().contains("Unterminated string literal"));
    }

    #[test]
    fn test_template_literal_rejected() {
        assert!(Lexer::new("`x`").tokenize().is_err());
    }
}
