//! Expression parsing (precedence climbing)

use super::precedence::{binary_op, get_precedence, Precedence};
use super::types::{parse_type, parse_type_args};
use super::{ParseError, Parser};
use crate::parser::ast::{Expr, Literal, UnaryOp};
use crate::parser::token::Token;

/// Parse a full expression, including assignment.
pub fn parse_expression(parser: &mut Parser) -> Result<Expr, ParseError> {
    let start = parser.current_span();
    let target = parse_binary(parser, Precedence::LogicalOr.level())?;

    if parser.eat(&Token::Equal) {
        match target {
            Expr::Identifier(_) | Expr::Member { .. } => {}
            _ => {
                return Err(ParseError::invalid_syntax(
                    "invalid assignment target",
                    target.span(),
                ))
            }
        }
        // right associative
        let value = parse_expression(parser)?;
        return Ok(Expr::Assign {
            target: Box::new(target),
            value: Box::new(value),
            span: parser.span_from(&start),
        });
    }

    Ok(target)
}

fn parse_binary(parser: &mut Parser, min_level: u8) -> Result<Expr, ParseError> {
    let start = parser.current_span();
    let mut left = parse_unary(parser)?;

    loop {
        let prec = get_precedence(parser.current());
        if prec <= Precedence::Assignment || prec.level() < min_level {
            break;
        }
        let Some(op) = binary_op(parser.current()) else {
            break;
        };
        parser.advance();
        let right = parse_binary(parser, prec.level() + 1)?;
        left = Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
            span: parser.span_from(&start),
        };
    }

    Ok(left)
}

fn parse_unary(parser: &mut Parser) -> Result<Expr, ParseError> {
    let start = parser.current_span();
    let op = match parser.current() {
        Token::Minus => Some(UnaryOp::Negate),
        Token::Bang => Some(UnaryOp::Not),
        _ => None,
    };

    let mut expr = match op {
        Some(op) => {
            parser.advance();
            let operand = parse_unary(parser)?;
            Expr::Unary {
                op,
                operand: Box::new(operand),
                span: parser.span_from(&start),
            }
        }
        None => parse_postfix(parser)?,
    };

    while parser.eat(&Token::As) {
        let ty = parse_type(parser)?;
        expr = Expr::Cast {
            expr: Box::new(expr),
            ty,
            span: parser.span_from(&start),
        };
    }
    Ok(expr)
}

fn parse_postfix(parser: &mut Parser) -> Result<Expr, ParseError> {
    let start = parser.current_span();
    let mut expr = parse_primary(parser)?;

    loop {
        match parser.current() {
            Token::Dot => {
                parser.advance();
                let member = parser.expect_identifier()?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    member,
                    span: parser.span_from(&start),
                };
            }
            Token::LeftBracket => {
                let type_args = parse_type_args(parser)?;
                let args = parse_arguments(parser)?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    type_args,
                    args,
                    span: parser.span_from(&start),
                };
            }
            Token::LeftParen => {
                let args = parse_arguments(parser)?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    type_args: Vec::new(),
                    args,
                    span: parser.span_from(&start),
                };
            }
            _ => return Ok(expr),
        }
    }
}

fn parse_arguments(parser: &mut Parser) -> Result<Vec<Expr>, ParseError> {
    parser.expect(Token::LeftParen)?;
    let mut args = Vec::new();
    if !parser.check(&Token::RightParen) {
        loop {
            args.push(parse_expression(parser)?);
            if !parser.eat(&Token::Comma) {
                break;
            }
        }
    }
    parser.expect(Token::RightParen)?;
    Ok(args)
}

fn parse_primary(parser: &mut Parser) -> Result<Expr, ParseError> {
    let span = parser.current_span();
    match parser.current().clone() {
        Token::IntLiteral(value) => {
            parser.advance();
            Ok(Expr::Literal {
                value: Literal::Int(value),
                span,
            })
        }
        Token::FloatLiteral(value) => {
            parser.advance();
            Ok(Expr::Literal {
                value: Literal::Float(value),
                span,
            })
        }
        Token::True | Token::False => {
            let value = matches!(parser.advance(), Token::True);
            Ok(Expr::Literal {
                value: Literal::Bool(value),
                span,
            })
        }
        Token::Identifier(_) => Ok(Expr::Identifier(parser.expect_identifier()?)),
        Token::SelfValue => {
            parser.advance();
            Ok(Expr::SelfValue(span))
        }
        Token::Base => {
            parser.advance();
            Ok(Expr::Base(span))
        }
        Token::New => {
            parser.advance();
            let ty = parse_type(parser)?;
            let args = parse_arguments(parser)?;
            Ok(Expr::New {
                ty,
                args,
                span: parser.span_from(&span),
            })
        }
        Token::SizeOf => {
            parser.advance();
            parser.expect(Token::LeftParen)?;
            let ty = parse_type(parser)?;
            parser.expect(Token::RightParen)?;
            Ok(Expr::SizeOf {
                ty,
                span: parser.span_from(&span),
            })
        }
        Token::LeftParen => {
            parser.advance();
            let expr = parse_expression(parser)?;
            parser.expect(Token::RightParen)?;
            Ok(expr)
        }
        _ => Err(parser.unexpected_token(&[
            Token::IntLiteral(0),
            Token::Identifier(String::new()),
            Token::LeftParen,
        ])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::BinaryOp;

    fn parse(source: &str) -> Expr {
        let mut parser = Parser::new(source).unwrap();
        parse_expression(&mut parser).unwrap()
    }

    #[test]
    fn test_left_associative_arithmetic() {
        // (a - b) - c
        match parse("a - b - c") {
            Expr::Binary { op, left, .. } => {
                assert_eq!(op, BinaryOp::Subtract);
                assert!(matches!(*left, Expr::Binary { op: BinaryOp::Subtract, .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_multiplication_binds_tighter() {
        match parse("a + b * c") {
            Expr::Binary { op, right, .. } => {
                assert_eq!(op, BinaryOp::Add);
                assert!(matches!(*right, Expr::Binary { op: BinaryOp::Multiply, .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_assignment_is_right_associative() {
        match parse("a = b = 1") {
            Expr::Assign { value, .. } => assert!(matches!(*value, Expr::Assign { .. })),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_generic_call_and_member_chain() {
        match parse("app.util.max[i32](1, 2)") {
            Expr::Call {
                callee,
                type_args,
                args,
                ..
            } => {
                assert_eq!(type_args.len(), 1);
                assert_eq!(args.len(), 2);
                assert_eq!(callee.as_path().unwrap().len(), 3);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_new_cast_and_size_of() {
        assert!(matches!(parse("new Box[i32]()"), Expr::New { .. }));
        assert!(matches!(parse("x as i64"), Expr::Cast { .. }));
        assert!(matches!(parse("size_of(Dog)"), Expr::SizeOf { .. }));
        assert!(parse("base()").is_base_call());
    }

    #[test]
    fn test_invalid_assignment_target() {
        let mut parser = Parser::new("1 = 2").unwrap();
        assert!(parse_expression(&mut parser).is_err());
    }
}
