//! Statement parsing

use super::expr::parse_expression;
use super::types::{parse_type, starts_type};
use super::{ParseError, Parser};
use crate::parser::ast::{Block, Stmt, VarDecl};
use crate::parser::token::Token;

/// Parse `{ stmt* }`.
pub fn parse_block(parser: &mut Parser) -> Result<Block, ParseError> {
    let start = parser.current_span();
    parser.expect(Token::LeftBrace)?;

    let mut statements = Vec::new();
    while !parser.check(&Token::RightBrace) && !parser.at_eof() {
        let before = parser.pos;
        match parse_statement(parser) {
            Ok(stmt) => statements.push(stmt),
            Err(err) => {
                parser.record(err);
                parser.synchronize();
                if parser.pos == before {
                    parser.advance();
                }
            }
        }
    }
    parser.expect(Token::RightBrace)?;

    Ok(Block {
        statements,
        span: parser.span_from(&start),
    })
}

/// Parse a single statement.
pub fn parse_statement(parser: &mut Parser) -> Result<Stmt, ParseError> {
    match parser.current() {
        Token::Var | Token::Let => parse_var(parser),
        Token::Return => parse_return(parser),
        Token::If => parse_if(parser),
        Token::While => parse_while(parser),
        Token::LeftBrace => parse_block(parser).map(Stmt::Block),
        _ => {
            let expr = parse_expression(parser)?;
            parser.expect(Token::Semicolon)?;
            Ok(Stmt::Expr(expr))
        }
    }
}

fn parse_var(parser: &mut Parser) -> Result<Stmt, ParseError> {
    let start = parser.current_span();
    let is_mutable = matches!(parser.advance(), Token::Var);
    let name = parser.expect_identifier()?;

    let ty = if starts_type(parser) {
        Some(parse_type(parser)?)
    } else {
        None
    };
    let initializer = if parser.eat(&Token::Equal) {
        Some(parse_expression(parser)?)
    } else {
        None
    };
    parser.expect(Token::Semicolon)?;

    if ty.is_none() && initializer.is_none() {
        return Err(ParseError::invalid_syntax(
            format!("variable '{}' needs a type or an initializer", name.name),
            parser.span_from(&start),
        ));
    }

    Ok(Stmt::Var(VarDecl {
        name,
        ty,
        initializer,
        is_mutable,
        span: parser.span_from(&start),
    }))
}

fn parse_return(parser: &mut Parser) -> Result<Stmt, ParseError> {
    let start = parser.current_span();
    parser.expect(Token::Return)?;
    let value = if parser.check(&Token::Semicolon) {
        None
    } else {
        Some(parse_expression(parser)?)
    };
    parser.expect(Token::Semicolon)?;
    Ok(Stmt::Return {
        value,
        span: parser.span_from(&start),
    })
}

fn parse_if(parser: &mut Parser) -> Result<Stmt, ParseError> {
    let start = parser.current_span();
    parser.expect(Token::If)?;
    let condition = parse_expression(parser)?;
    let then_branch = parse_block(parser)?;

    let else_branch = if parser.eat(&Token::Else) {
        if parser.check(&Token::If) {
            // `else if` nests as a block holding the inner `if`
            let nested_start = parser.current_span();
            let nested = parse_if(parser)?;
            Some(Block {
                statements: vec![nested],
                span: parser.span_from(&nested_start),
            })
        } else {
            Some(parse_block(parser)?)
        }
    } else {
        None
    };

    Ok(Stmt::If {
        condition,
        then_branch,
        else_branch,
        span: parser.span_from(&start),
    })
}

fn parse_while(parser: &mut Parser) -> Result<Stmt, ParseError> {
    let start = parser.current_span();
    parser.expect(Token::While)?;
    let condition = parse_expression(parser)?;
    let body = parse_block(parser)?;
    Ok(Stmt::While {
        condition,
        body,
        span: parser.span_from(&start),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::Expr;

    fn parse(source: &str) -> Stmt {
        let mut parser = Parser::new(source).unwrap();
        parse_statement(&mut parser).unwrap()
    }

    #[test]
    fn test_var_with_type_and_initializer() {
        match parse("var x i64 = 1 + 2;") {
            Stmt::Var(decl) => {
                assert!(decl.is_mutable);
                assert!(decl.ty.is_some());
                assert!(matches!(decl.initializer, Some(Expr::Binary { .. })));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_var_requires_type_or_initializer() {
        let mut parser = Parser::new("let x;").unwrap();
        assert!(parse_statement(&mut parser).is_err());
    }

    #[test]
    fn test_else_if_chain() {
        match parse("if a { return 1; } else if b { return 2; } else { return 3; }") {
            Stmt::If { else_branch, .. } => {
                let block = else_branch.unwrap();
                assert!(matches!(block.statements[0], Stmt::If { .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_while_loop() {
        assert!(matches!(
            parse("while i < 10 { i = i + 1; }"),
            Stmt::While { .. }
        ));
    }
}
