//! Type expression parsing

use super::{ParseError, Parser};
use crate::parser::ast::TypeExpr;
use crate::parser::token::Token;

/// Parse a type: `[]Inner` or `a.b.Name[Args]`.
pub fn parse_type(parser: &mut Parser) -> Result<TypeExpr, ParseError> {
    let start = parser.current_span();

    if parser.check(&Token::LeftBracket) {
        parser.advance();
        parser.expect(Token::RightBracket)?;
        let inner = parse_type(parser)?;
        return Ok(TypeExpr::Slice {
            inner: Box::new(inner),
            span: parser.span_from(&start),
        });
    }

    let mut path = vec![parser.expect_identifier()?];
    while parser.check(&Token::Dot) {
        parser.advance();
        path.push(parser.expect_identifier()?);
    }

    let type_args = if parser.check(&Token::LeftBracket) {
        parse_type_args(parser)?
    } else {
        Vec::new()
    };

    Ok(TypeExpr::Named {
        path,
        type_args,
        span: parser.span_from(&start),
    })
}

/// Parse `[T, U]`.
pub fn parse_type_args(parser: &mut Parser) -> Result<Vec<TypeExpr>, ParseError> {
    parser.expect(Token::LeftBracket)?;
    let mut args = Vec::new();
    if !parser.check(&Token::RightBracket) {
        loop {
            args.push(parse_type(parser)?);
            if !parser.eat(&Token::Comma) {
                break;
            }
        }
    }
    parser.expect(Token::RightBracket)?;
    Ok(args)
}

/// True if the current token can start a type.
pub fn starts_type(parser: &Parser) -> bool {
    matches!(parser.current(), Token::Identifier(_) | Token::LeftBracket)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> TypeExpr {
        let mut parser = Parser::new(source).unwrap();
        parse_type(&mut parser).unwrap()
    }

    #[test]
    fn test_generic_type() {
        match parse("models.Box[i32, []u8]") {
            TypeExpr::Named {
                path, type_args, ..
            } => {
                assert_eq!(path.len(), 2);
                assert_eq!(type_args.len(), 2);
                assert!(matches!(type_args[1], TypeExpr::Slice { .. }));
            }
            other => panic!("unexpected type {:?}", other),
        }
    }
}
