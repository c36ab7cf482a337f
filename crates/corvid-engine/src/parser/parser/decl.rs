//! Declaration parsing

use super::stmt::parse_block;
use super::types::{parse_type, starts_type};
use super::{expr::parse_expression, ParseError, Parser};
use crate::parser::ast::*;
use crate::parser::token::{Span, Token};

/// Attributes and modifiers that may precede a declaration.
#[derive(Default)]
struct Modifiers {
    attributes: Vec<Attribute>,
    visibility: Visibility,
    is_static: bool,
    is_open: bool,
    is_override: bool,
    start: Option<Span>,
}

fn parse_modifiers(parser: &mut Parser) -> Result<Modifiers, ParseError> {
    let mut mods = Modifiers::default();
    loop {
        let span = parser.current_span();
        match parser.current() {
            Token::At => {
                parser.advance();
                let name = parser.expect_identifier()?;
                mods.attributes.push(Attribute { name });
            }
            Token::Pub => {
                parser.advance();
                mods.visibility = Visibility::Public;
            }
            Token::Static => {
                parser.advance();
                mods.is_static = true;
            }
            Token::Open => {
                parser.advance();
                mods.is_open = true;
            }
            Token::Override => {
                parser.advance();
                mods.is_override = true;
            }
            _ => return Ok(mods),
        }
        mods.start.get_or_insert(span);
    }
}

/// Parse one top-level declaration.
pub fn parse_declaration(parser: &mut Parser) -> Result<Decl, ParseError> {
    let mods = parse_modifiers(parser)?;
    let start = mods.start.unwrap_or_else(|| parser.current_span());

    match parser.current() {
        Token::Class => {
            parser.advance();
            Ok(Decl::Class(parse_structure_body(parser, mods, start, false)?))
        }
        Token::Protocol => {
            parser.advance();
            Ok(Decl::Protocol(parse_structure_body(parser, mods, start, false)?))
        }
        Token::Module => {
            parser.advance();
            Ok(Decl::Module(parse_structure_body(parser, mods, start, true)?))
        }
        Token::Enum => parse_enum(parser, mods, start).map(Decl::Enum),
        Token::Fn => parse_function(parser, mods, start, true).map(Decl::Function),
        _ => Err(parser.unexpected_token(&[
            Token::Class,
            Token::Protocol,
            Token::Module,
            Token::Enum,
            Token::Fn,
        ])),
    }
}

fn parse_structure_body(
    parser: &mut Parser,
    mods: Modifiers,
    start: Span,
    members_static: bool,
) -> Result<StructureDecl, ParseError> {
    let name = parser.expect_identifier()?;
    let type_params = parse_type_params(parser)?;

    let mut supertypes = Vec::new();
    if parser.eat(&Token::Colon) {
        loop {
            supertypes.push(parse_type(parser)?);
            if !parser.eat(&Token::Comma) {
                break;
            }
        }
    }

    parser.expect(Token::LeftBrace)?;

    let mut fields = Vec::new();
    let mut functions = Vec::new();
    let mut init = None;

    while !parser.check(&Token::RightBrace) && !parser.at_eof() {
        let before = parser.pos;
        match parse_member(parser, members_static) {
            Ok(Member::Field(field)) => fields.push(field),
            Ok(Member::Function(func)) => functions.push(func),
            Ok(Member::Init(decl)) => {
                if init.is_some() {
                    parser.record(ParseError::invalid_syntax(
                        "a structure may declare only one 'init'",
                        decl.span,
                    ));
                } else {
                    init = Some(decl);
                }
            }
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

    Ok(StructureDecl {
        name,
        type_params,
        supertypes,
        is_inheritable: mods.is_open,
        visibility: mods.visibility,
        attributes: mods.attributes,
        fields,
        functions,
        init,
        span: parser.span_from(&start),
    })
}

enum Member {
    Field(FieldDecl),
    Function(FunctionDecl),
    Init(InitDecl),
}

fn parse_member(parser: &mut Parser, members_static: bool) -> Result<Member, ParseError> {
    let mut mods = parse_modifiers(parser)?;
    mods.is_static |= members_static;
    let start = mods.start.unwrap_or_else(|| parser.current_span());

    match parser.current() {
        Token::Var | Token::Let => parse_field(parser, mods, start).map(Member::Field),
        Token::Fn => parse_function(parser, mods, start, false).map(Member::Function),
        Token::Init => {
            parser.advance();
            let params = parse_params(parser)?;
            let body = parse_block(parser)?;
            Ok(Member::Init(InitDecl {
                params,
                body,
                visibility: mods.visibility,
                span: parser.span_from(&start),
            }))
        }
        _ => Err(parser.unexpected_token(&[Token::Var, Token::Let, Token::Fn, Token::Init])),
    }
}

fn parse_field(parser: &mut Parser, mods: Modifiers, start: Span) -> Result<FieldDecl, ParseError> {
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

    let mut getter = None;
    let mut setter = None;
    if parser.eat(&Token::LeftBrace) {
        while !parser.check(&Token::RightBrace) && !parser.at_eof() {
            let accessor_start = parser.current_span();
            match parser.current() {
                Token::Get => {
                    parser.advance();
                    getter = Some(parse_block(parser)?);
                }
                Token::Set => {
                    parser.advance();
                    parser.expect(Token::LeftParen)?;
                    let param = parser.expect_identifier()?;
                    parser.expect(Token::RightParen)?;
                    let body = parse_block(parser)?;
                    setter = Some(Setter {
                        param,
                        body,
                        span: parser.span_from(&accessor_start),
                    });
                }
                _ => return Err(parser.unexpected_token(&[Token::Get, Token::Set])),
            }
        }
        parser.expect(Token::RightBrace)?;
    } else {
        parser.expect(Token::Semicolon)?;
    }

    Ok(FieldDecl {
        name,
        ty,
        initializer,
        is_mutable,
        is_static: mods.is_static,
        visibility: mods.visibility,
        attributes: mods.attributes,
        getter,
        setter,
        span: parser.span_from(&start),
    })
}

fn parse_function(
    parser: &mut Parser,
    mods: Modifiers,
    start: Span,
    top_level: bool,
) -> Result<FunctionDecl, ParseError> {
    parser.expect(Token::Fn)?;
    let name = parser.expect_identifier()?;
    let type_params = parse_type_params(parser)?;
    let params = parse_params(parser)?;

    let return_type = if starts_type(parser) {
        Some(parse_type(parser)?)
    } else {
        None
    };

    let body = if parser.eat(&Token::Semicolon) {
        None
    } else {
        Some(parse_block(parser)?)
    };

    Ok(FunctionDecl {
        name,
        type_params,
        params,
        return_type,
        body,
        is_static: mods.is_static || top_level,
        is_override: mods.is_override,
        visibility: mods.visibility,
        attributes: mods.attributes,
        span: parser.span_from(&start),
    })
}

fn parse_type_params(parser: &mut Parser) -> Result<Vec<Ident>, ParseError> {
    let mut params = Vec::new();
    if parser.eat(&Token::LeftBracket) {
        loop {
            params.push(parser.expect_identifier()?);
            if !parser.eat(&Token::Comma) {
                break;
            }
        }
        parser.expect(Token::RightBracket)?;
    }
    Ok(params)
}

fn parse_params(parser: &mut Parser) -> Result<Vec<Param>, ParseError> {
    parser.expect(Token::LeftParen)?;
    let mut params = Vec::new();
    if !parser.check(&Token::RightParen) {
        loop {
            let name = parser.expect_identifier()?;
            let ty = if starts_type(parser) {
                Some(parse_type(parser)?)
            } else {
                None
            };
            params.push(Param {
                span: parser.span_from(&name.span),
                name,
                ty,
            });
            if !parser.eat(&Token::Comma) {
                break;
            }
        }
    }
    parser.expect(Token::RightParen)?;
    Ok(params)
}

fn parse_enum(parser: &mut Parser, mods: Modifiers, start: Span) -> Result<EnumDecl, ParseError> {
    parser.expect(Token::Enum)?;
    let name = parser.expect_identifier()?;
    parser.expect(Token::LeftBrace)?;
    let mut variants = Vec::new();
    while !parser.check(&Token::RightBrace) {
        variants.push(parser.expect_identifier()?);
        if !parser.eat(&Token::Comma) {
            break;
        }
    }
    parser.expect(Token::RightBrace)?;
    Ok(EnumDecl {
        name,
        variants,
        visibility: mods.visibility,
        span: parser.span_from(&start),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> SourceFile {
        Parser::new(source).unwrap().parse("test.cv").unwrap()
    }

    #[test]
    fn test_generic_class_with_field() {
        let file = parse("class Box[T] { pub var x T; }");
        let Decl::Class(class) = &file.declarations[0] else {
            panic!("expected class");
        };
        assert_eq!(class.name.name, "Box");
        assert_eq!(class.type_params.len(), 1);
        assert_eq!(class.fields.len(), 1);
        assert!(class.fields[0].is_mutable);
        assert_eq!(class.fields[0].visibility, Visibility::Public);
    }

    #[test]
    fn test_class_with_supertypes_and_init() {
        let file = parse(
            "open class Dog : Animal, Named { init(legs, name i32) { base(); } override fn Speak() i32 { return 1; } }",
        );
        let Decl::Class(class) = &file.declarations[0] else {
            panic!("expected class");
        };
        assert!(class.is_inheritable);
        assert_eq!(class.supertypes.len(), 2);
        let init = class.init.as_ref().unwrap();
        assert!(init.params[0].ty.is_none());
        assert!(init.params[1].ty.is_some());
        assert!(class.functions[0].is_override);
    }

    #[test]
    fn test_field_accessors() {
        let file = parse("module M { var x i32 { get { return 1; } set(v) { } } }");
        let Decl::Module(module) = &file.declarations[0] else {
            panic!("expected module");
        };
        let field = &module.fields[0];
        assert!(field.is_static);
        assert!(field.getter.is_some());
        assert_eq!(field.setter.as_ref().unwrap().param.name, "v");
    }

    #[test]
    fn test_foreign_function_and_enum() {
        let file = parse("@foreign fn puts(v i32) i32; enum Color { Red, Green, }");
        let Decl::Function(func) = &file.declarations[0] else {
            panic!("expected function");
        };
        assert!(is_foreign(&func.attributes));
        assert!(func.body.is_none());
        let Decl::Enum(e) = &file.declarations[1] else {
            panic!("expected enum");
        };
        assert_eq!(e.variants.len(), 2);
    }
}
