//! Lexer for the Corvid programming language.
//!
//! Wraps the `logos`-generated tokenizer and attaches line/column
//! information to every token span.

use crate::parser::token::{Span, Token};
use logos::Logos;
use thiserror::Error;

/// Lexical errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LexError {
    /// A character sequence that is not a valid token
    #[error("Unexpected character(s) '{text}' at {line}:{column}")]
    UnexpectedCharacter {
        text: String,
        span: Span,
        line: u32,
        column: u32,
    },
}

impl LexError {
    pub fn span(&self) -> Span {
        match self {
            LexError::UnexpectedCharacter { span, .. } => *span,
        }
    }
}

/// Tokenizer over one source file.
pub struct Lexer<'a> {
    source: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(source.match_indices('\n').map(|(idx, _)| idx + 1));
        Self {
            source,
            line_starts,
        }
    }

    /// Tokenize the whole input. The returned stream always ends with `Token::Eof`.
    pub fn tokenize(&self) -> Result<Vec<(Token, Span)>, Vec<LexError>> {
        let mut tokens = Vec::new();
        let mut errors = Vec::new();
        let mut lex = Token::lexer(self.source);

        while let Some(result) = lex.next() {
            let range = lex.span();
            let span = self.span_for(range.start, range.end);
            match result {
                Ok(token) => tokens.push((token, span)),
                Err(()) => errors.push(LexError::UnexpectedCharacter {
                    text: self.source[range].to_string(),
                    span,
                    line: span.line,
                    column: span.column,
                }),
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        let end = self.source.len();
        tokens.push((Token::Eof, self.span_for(end, end)));
        Ok(tokens)
    }

    fn span_for(&self, start: usize, end: usize) -> Span {
        let line_idx = match self.line_starts.binary_search(&start) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        };
        let column = start - self.line_starts[line_idx];
        Span::new(start, end, line_idx as u32 + 1, column as u32 + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|(tok, _)| tok)
            .collect()
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            kinds("class Box selfish self"),
            vec![
                Token::Class,
                Token::Identifier("Box".to_string()),
                Token::Identifier("selfish".to_string()),
                Token::SelfValue,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("42 3.5"),
            vec![Token::IntLiteral(42), Token::FloatLiteral(3.5), Token::Eof]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(kinds("// nothing here\n;"), vec![Token::Semicolon, Token::Eof]);
    }

    #[test]
    fn test_line_and_column() {
        let tokens = Lexer::new("a\n  b").tokenize().unwrap();
        assert_eq!(tokens[1].1.line, 2);
        assert_eq!(tokens[1].1.column, 3);
    }

    #[test]
    fn test_unexpected_character() {
        let errors = Lexer::new("a # b").tokenize().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(&errors[0], LexError::UnexpectedCharacter { text, .. } if text == "#"));
    }
}
