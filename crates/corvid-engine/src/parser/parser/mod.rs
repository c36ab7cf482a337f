//! Parser for the Corvid language
//!
//! A recursive descent parser over the pre-tokenized input. Errors are
//! collected and the parser resynchronizes at the next declaration or
//! statement boundary so one mistake does not hide the rest of the file.

pub mod decl;
pub mod error;
pub mod expr;
pub mod precedence;
pub mod stmt;
pub mod types;

use crate::parser::ast::{Ident, SourceFile};
use crate::parser::lexer::Lexer;
use crate::parser::token::{Span, Token};

pub use error::{ParseError, ParseErrorKind};

/// Parser state for the Corvid programming language.
pub struct Parser {
    /// Pre-tokenized input, always terminated by `Token::Eof`
    tokens: Vec<(Token, Span)>,
    /// Current position in token stream
    pos: usize,
    /// Accumulated parse errors
    errors: Vec<ParseError>,
}

impl Parser {
    /// Create a new parser from source code.
    pub fn new(source: &str) -> Result<Self, Vec<ParseError>> {
        let tokens = Lexer::new(source)
            .tokenize()
            .map_err(|errors| errors.iter().map(ParseError::from_lex).collect::<Vec<_>>())?;
        Ok(Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
        })
    }

    /// Parse the entire source file.
    ///
    /// Returns the file on success, or all accumulated errors on failure.
    pub fn parse(mut self, path: impl Into<String>) -> Result<SourceFile, Vec<ParseError>> {
        let start_span = self.current_span();

        let mut namespace = Vec::new();
        if self.check(&Token::Namespace) {
            match self.parse_path_directive(Token::Namespace) {
                Ok(path) => namespace = path,
                Err(err) => {
                    self.errors.push(err);
                    self.synchronize();
                }
            }
        }

        let mut imports = Vec::new();
        while self.check(&Token::Use) {
            match self.parse_path_directive(Token::Use) {
                Ok(path) => imports.push(path),
                Err(err) => {
                    self.errors.push(err);
                    self.synchronize();
                }
            }
        }

        let mut declarations = Vec::new();
        while !self.at_eof() {
            let before = self.pos;
            match decl::parse_declaration(&mut self) {
                Ok(decl) => declarations.push(decl),
                Err(err) => {
                    self.errors.push(err);
                    self.synchronize();
                    if self.pos == before {
                        self.advance();
                    }
                }
            }
        }

        if !self.errors.is_empty() {
            return Err(self.errors);
        }

        let span = self.combine_spans(&start_span, &self.current_span());
        Ok(SourceFile {
            path: path.into(),
            namespace,
            imports,
            declarations,
            span,
        })
    }

    /// `namespace a.b;` or `use a.b;`
    fn parse_path_directive(&mut self, keyword: Token) -> Result<Vec<Ident>, ParseError> {
        self.expect(keyword)?;
        let mut path = vec![self.expect_identifier()?];
        while self.check(&Token::Dot) {
            self.advance();
            path.push(self.expect_identifier()?);
        }
        self.expect(Token::Semicolon)?;
        Ok(path)
    }

    // ========================================================================
    // Token Management
    // ========================================================================

    /// Get the current token.
    #[inline]
    pub fn current(&self) -> &Token {
        &self.tokens[self.pos].0
    }

    /// Get the current token's span.
    #[inline]
    pub fn current_span(&self) -> Span {
        self.tokens[self.pos].1
    }

    /// Peek at the next token.
    #[inline]
    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos + 1).map(|(tok, _)| tok)
    }

    /// Span of the most recently consumed token.
    pub fn previous_span(&self) -> Span {
        self.tokens[self.pos.saturating_sub(1)].1
    }

    /// Advance to the next token, returning the previous current token.
    pub fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].0.clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    /// Check if the current token matches the given kind.
    #[inline]
    pub fn check(&self, expected: &Token) -> bool {
        std::mem::discriminant(self.current()) == std::mem::discriminant(expected)
    }

    /// Consume the current token if it matches.
    pub fn eat(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Check if we've reached EOF.
    #[inline]
    pub fn at_eof(&self) -> bool {
        matches!(self.current(), Token::Eof)
    }

    /// Consume the current token if it matches the expected kind.
    pub fn expect(&mut self, expected: Token) -> Result<Token, ParseError> {
        if self.check(&expected) {
            Ok(self.advance())
        } else {
            Err(self.unexpected_token(&[expected]))
        }
    }

    /// Consume an identifier token.
    pub fn expect_identifier(&mut self) -> Result<Ident, ParseError> {
        let span = self.current_span();
        match self.current().clone() {
            Token::Identifier(name) => {
                self.advance();
                Ok(Ident::new(name, span))
            }
            _ => Err(self.unexpected_token(&[Token::Identifier(String::new())])),
        }
    }

    /// Create an "unexpected token" error at the current position.
    pub fn unexpected_token(&self, expected: &[Token]) -> ParseError {
        let span = self.current_span();
        if self.at_eof() {
            ParseError::unexpected_eof(expected.to_vec(), span)
        } else {
            ParseError::unexpected_token(expected.to_vec(), self.current().clone(), span)
        }
    }

    /// Record an error and keep parsing.
    pub fn record(&mut self, error: ParseError) {
        self.errors.push(error);
    }

    /// Combine two spans into a single span.
    pub fn combine_spans(&self, start: &Span, end: &Span) -> Span {
        Span {
            start: start.start,
            end: end.end,
            line: start.line,
            column: start.column,
        }
    }

    /// Span from `start` to the end of the last consumed token.
    pub fn span_from(&self, start: &Span) -> Span {
        self.combine_spans(start, &self.previous_span())
    }

    /// Skip tokens until the next declaration or statement boundary.
    pub fn synchronize(&mut self) {
        while !self.at_eof() {
            match self.current() {
                Token::Semicolon => {
                    self.advance();
                    return;
                }
                Token::RightBrace => {
                    self.advance();
                    return;
                }
                tok if tok.starts_statement() => return,
                _ => {
                    self.advance();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::Decl;

    #[test]
    fn test_parser_new() {
        let parser = Parser::new("class A {}").unwrap();
        assert!(matches!(parser.current(), Token::Class));
        assert!(matches!(parser.peek(), Some(Token::Identifier(_))));
    }

    #[test]
    fn test_parse_namespace_and_imports() {
        let file = Parser::new("namespace app.models; use app.util; fn main() {}")
            .unwrap()
            .parse("main.cv")
            .unwrap();
        assert_eq!(file.namespace_path(), "app.models");
        assert_eq!(file.imports.len(), 1);
        assert_eq!(file.declarations.len(), 1);
        assert!(matches!(file.declarations[0], Decl::Function(_)));
    }

    #[test]
    fn test_errors_are_collected() {
        let errors = Parser::new("class { } fn ( {")
            .unwrap()
            .parse("bad.cv")
            .unwrap_err();
        assert!(errors.len() >= 2);
    }
}
