//! Operator precedence table for expression parsing.

use crate::parser::ast::BinaryOp;
use crate::parser::token::Token;

/// Operator precedence level (higher = tighter binding).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    None = 0,
    Assignment = 1,     // =
    LogicalOr = 2,      // ||
    LogicalAnd = 3,     // &&
    Equality = 4,       // ==, !=
    Relational = 5,     // <, >, <=, >=
    Additive = 6,       // +, -
    Multiplicative = 7, // *, /, %
}

/// Get the precedence of a binary operator token.
pub fn get_precedence(token: &Token) -> Precedence {
    match token {
        Token::Equal => Precedence::Assignment,
        Token::PipePipe => Precedence::LogicalOr,
        Token::AmpAmp => Precedence::LogicalAnd,
        Token::EqualEqual | Token::BangEqual => Precedence::Equality,
        Token::Less | Token::LessEqual | Token::Greater | Token::GreaterEqual => {
            Precedence::Relational
        }
        Token::Plus | Token::Minus => Precedence::Additive,
        Token::Star | Token::Slash | Token::Percent => Precedence::Multiplicative,
        _ => Precedence::None,
    }
}

/// Map a token to its binary operator, if it is one.
pub fn binary_op(token: &Token) -> Option<BinaryOp> {
    Some(match token {
        Token::PipePipe => BinaryOp::Or,
        Token::AmpAmp => BinaryOp::And,
        Token::EqualEqual => BinaryOp::Equal,
        Token::BangEqual => BinaryOp::NotEqual,
        Token::Less => BinaryOp::Less,
        Token::LessEqual => BinaryOp::LessEqual,
        Token::Greater => BinaryOp::Greater,
        Token::GreaterEqual => BinaryOp::GreaterEqual,
        Token::Plus => BinaryOp::Add,
        Token::Minus => BinaryOp::Subtract,
        Token::Star => BinaryOp::Multiply,
        Token::Slash => BinaryOp::Divide,
        Token::Percent => BinaryOp::Modulo,
        _ => return None,
    })
}

impl Precedence {
    /// Numeric binding power; operands of a left-associative operator bind one level tighter.
    pub fn level(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_ordering() {
        assert!(get_precedence(&Token::Star) > get_precedence(&Token::Plus));
        assert!(get_precedence(&Token::Plus) > get_precedence(&Token::Less));
        assert!(get_precedence(&Token::AmpAmp) > get_precedence(&Token::PipePipe));
        assert_eq!(get_precedence(&Token::Semicolon), Precedence::None);
    }
}
