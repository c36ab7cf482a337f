//! Parse error types

use crate::parser::token::{Span, Token};
use std::fmt;

/// A parse error with location and contextual information.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    /// The kind of error that occurred
    pub kind: ParseErrorKind,
    /// Source location of the error
    pub span: Span,
    /// Human-readable error message
    pub message: String,
}

/// The kind of parse error.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseErrorKind {
    /// Unexpected token found
    UnexpectedToken { expected: Vec<Token>, found: Token },
    /// Unexpected end of file
    UnexpectedEof { expected: Vec<Token> },
    /// Invalid syntax
    InvalidSyntax { reason: String },
    /// Lexical error surfaced through the parser
    Lex,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Parse error at {}:{}: {}",
            self.span.line, self.span.column, self.message
        )
    }
}

impl std::error::Error for ParseError {}

fn describe(expected: &[Token]) -> String {
    expected
        .iter()
        .map(|tok| format!("'{}'", tok))
        .collect::<Vec<_>>()
        .join(", ")
}

impl ParseError {
    /// Create an "unexpected token" error.
    pub fn unexpected_token(expected: Vec<Token>, found: Token, span: Span) -> Self {
        let message = if expected.len() == 1 {
            format!("Expected {}, found '{}'", describe(&expected), found)
        } else {
            format!("Expected one of {}, found '{}'", describe(&expected), found)
        };
        Self {
            kind: ParseErrorKind::UnexpectedToken { expected, found },
            span,
            message,
        }
    }

    /// Create an "unexpected EOF" error.
    pub fn unexpected_eof(expected: Vec<Token>, span: Span) -> Self {
        let message = format!("Unexpected end of file, expected {}", describe(&expected));
        Self {
            kind: ParseErrorKind::UnexpectedEof { expected },
            span,
            message,
        }
    }

    /// Create an "invalid syntax" error.
    pub fn invalid_syntax(reason: impl Into<String>, span: Span) -> Self {
        let reason = reason.into();
        Self {
            message: format!("Invalid syntax: {}", reason),
            kind: ParseErrorKind::InvalidSyntax { reason },
            span,
        }
    }

    pub(crate) fn from_lex(error: &crate::parser::lexer::LexError) -> Self {
        Self {
            kind: ParseErrorKind::Lex,
            span: error.span(),
            message: error.to_string(),
        }
    }
}
