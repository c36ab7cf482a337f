//! Token definitions for the Corvid programming language.
//!
//! Tokens are produced by the `logos`-derived lexer. Keyword tokens must be
//! declared before the identifier regex so they win the longest-match tie.

use logos::Logos;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A token in the Corvid programming language.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r"//[^\n]*")]
pub enum Token {
    // Declarations
    #[token("namespace")]
    Namespace,
    #[token("use")]
    Use,
    #[token("class")]
    Class,
    #[token("protocol")]
    Protocol,
    #[token("module")]
    Module,
    #[token("enum")]
    Enum,
    #[token("fn")]
    Fn,
    #[token("init")]
    Init,
    #[token("var")]
    Var,
    #[token("let")]
    Let,
    #[token("get")]
    Get,
    #[token("set")]
    Set,

    // Modifiers
    #[token("pub")]
    Pub,
    #[token("static")]
    Static,
    #[token("open")]
    Open,
    #[token("override")]
    Override,

    // Control flow
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("return")]
    Return,

    // Keyword values
    #[token("self")]
    SelfValue,
    #[token("base")]
    Base,
    #[token("new")]
    New,
    #[token("size_of")]
    SizeOf,
    #[token("as")]
    As,
    #[token("true")]
    True,
    #[token("false")]
    False,

    // Literals
    #[regex(r"[0-9]+\.[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    FloatLiteral(f64),
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i128>().ok())]
    IntLiteral(i128),
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Identifier(String),

    // Punctuation
    #[token("(")]
    LeftParen,
    #[token(")")]
    RightParen,
    #[token("{")]
    LeftBrace,
    #[token("}")]
    RightBrace,
    #[token("[")]
    LeftBracket,
    #[token("]")]
    RightBracket,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,
    #[token("@")]
    At,

    // Operators
    #[token("=")]
    Equal,
    #[token("==")]
    EqualEqual,
    #[token("!=")]
    BangEqual,
    #[token("!")]
    Bang,
    #[token("<")]
    Less,
    #[token("<=")]
    LessEqual,
    #[token(">")]
    Greater,
    #[token(">=")]
    GreaterEqual,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("&&")]
    AmpAmp,
    #[token("||")]
    PipePipe,

    /// End of input, appended by the lexer.
    Eof,
}

impl Token {
    /// Returns true if the token can start a declaration or a statement.
    pub fn starts_statement(&self) -> bool {
        matches!(
            self,
            Token::Class
                | Token::Protocol
                | Token::Module
                | Token::Enum
                | Token::Fn
                | Token::Init
                | Token::Var
                | Token::Let
                | Token::If
                | Token::While
                | Token::Return
                | Token::Pub
                | Token::Static
                | Token::Open
                | Token::Override
                | Token::At
        )
    }
}

/// Source location information for a token or syntax node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(start: usize, end: usize, line: u32, column: u32) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn slice<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }

    pub fn merge(&self, other: &Span) -> Span {
        let (line, column) = if self.start <= other.start {
            (self.line, self.column)
        } else {
            (other.line, other.column)
        };
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            line,
            column,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Token::Namespace => "namespace",
            Token::Use => "use",
            Token::Class => "class",
            Token::Protocol => "protocol",
            Token::Module => "module",
            Token::Enum => "enum",
            Token::Fn => "fn",
            Token::Init => "init",
            Token::Var => "var",
            Token::Let => "let",
            Token::Get => "get",
            Token::Set => "set",
            Token::Pub => "pub",
            Token::Static => "static",
            Token::Open => "open",
            Token::Override => "override",
            Token::If => "if",
            Token::Else => "else",
            Token::While => "while",
            Token::Return => "return",
            Token::SelfValue => "self",
            Token::Base => "base",
            Token::New => "new",
            Token::SizeOf => "size_of",
            Token::As => "as",
            Token::True => "true",
            Token::False => "false",
            Token::FloatLiteral(v) => return write!(f, "{}", v),
            Token::IntLiteral(v) => return write!(f, "{}", v),
            Token::Identifier(name) => return write!(f, "{}", name),
            Token::LeftParen => "(",
            Token::RightParen => ")",
            Token::LeftBrace => "{",
            Token::RightBrace => "}",
            Token::LeftBracket => "[",
            Token::RightBracket => "]",
            Token::Comma => ",",
            Token::Semicolon => ";",
            Token::Colon => ":",
            Token::Dot => ".",
            Token::At => "@",
            Token::Equal => "=",
            Token::EqualEqual => "==",
            Token::BangEqual => "!=",
            Token::Bang => "!",
            Token::Less => "<",
            Token::LessEqual => "<=",
            Token::Greater => ">",
            Token::GreaterEqual => ">=",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::AmpAmp => "&&",
            Token::PipePipe => "||",
            Token::Eof => "end of file",
        };
        f.write_str(text)
    }
}
