//! Abstract Syntax Tree for Corvid.
//!
//! The syntax tree is immutable once parsed. Every node carries the `Span`
//! it was parsed from; name resolution happens later against the symbol
//! table built by the binder.

use serde::{Deserialize, Serialize};

use crate::parser::token::Span;

/// An identifier with its location.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }
}

/// A declaration-level attribute such as `@foreign`.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: Ident,
}

/// Attribute that suppresses name mangling and default-value synthesis.
pub const FOREIGN_ATTRIBUTE: &str = "foreign";

/// Returns true if `attributes` contains `@foreign`.
pub fn is_foreign(attributes: &[Attribute]) -> bool {
    attributes
        .iter()
        .any(|attr| attr.name.name == FOREIGN_ATTRIBUTE)
}

/// Declared visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Visibility {
    #[default]
    Private,
    Public,
}

// ============================================================================
// Source file
// ============================================================================

/// One parsed source file.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    /// Path or display name of the file
    pub path: String,
    /// Declared namespace (`namespace a.b;`); empty for the root namespace
    pub namespace: Vec<Ident>,
    /// Imported namespaces (`use a.b;`)
    pub imports: Vec<Vec<Ident>>,
    /// Top-level declarations in source order
    pub declarations: Vec<Decl>,
    pub span: Span,
}

impl SourceFile {
    /// Dotted namespace path, e.g. `"app.models"`.
    pub fn namespace_path(&self) -> String {
        join_path(&self.namespace)
    }
}

/// Joins identifiers with `.`.
pub fn join_path(segments: &[Ident]) -> String {
    segments
        .iter()
        .map(|s| s.name.as_str())
        .collect::<Vec<_>>()
        .join(".")
}

// ============================================================================
// Declarations
// ============================================================================

/// Top-level or member declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Function(FunctionDecl),
    Class(StructureDecl),
    Protocol(StructureDecl),
    Module(StructureDecl),
    Enum(EnumDecl),
}

impl Decl {
    pub fn name(&self) -> &Ident {
        match self {
            Decl::Function(f) => &f.name,
            Decl::Class(s) | Decl::Protocol(s) | Decl::Module(s) => &s.name,
            Decl::Enum(e) => &e.name,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Decl::Function(f) => f.span,
            Decl::Class(s) | Decl::Protocol(s) | Decl::Module(s) => s.span,
            Decl::Enum(e) => e.span,
        }
    }
}

/// Class, protocol or module body. The enclosing `Decl` variant says which.
#[derive(Debug, Clone, PartialEq)]
pub struct StructureDecl {
    pub name: Ident,
    pub type_params: Vec<Ident>,
    /// Supertypes after `:`; an ancestor class and/or implemented protocols
    pub supertypes: Vec<TypeExpr>,
    /// `open class`: may be inherited from
    pub is_inheritable: bool,
    pub visibility: Visibility,
    pub attributes: Vec<Attribute>,
    pub fields: Vec<FieldDecl>,
    pub functions: Vec<FunctionDecl>,
    pub init: Option<InitDecl>,
    pub span: Span,
}

/// A function or method.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: Ident,
    pub type_params: Vec<Ident>,
    pub params: Vec<Param>,
    pub return_type: Option<TypeExpr>,
    /// `None` for protocol requirements and `@foreign` functions
    pub body: Option<Block>,
    pub is_static: bool,
    pub is_override: bool,
    pub visibility: Visibility,
    pub attributes: Vec<Attribute>,
    pub span: Span,
}

/// A function or constructor parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Ident,
    /// A constructor parameter without a type initializes the field of the same name
    pub ty: Option<TypeExpr>,
    pub span: Span,
}

/// A field (`var`/`let`) with optional accessors.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: Ident,
    pub ty: Option<TypeExpr>,
    pub initializer: Option<Expr>,
    pub is_mutable: bool,
    pub is_static: bool,
    pub visibility: Visibility,
    pub attributes: Vec<Attribute>,
    pub getter: Option<Block>,
    pub setter: Option<Setter>,
    pub span: Span,
}

/// `set(value) { ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct Setter {
    pub param: Ident,
    pub body: Block,
    pub span: Span,
}

/// Constructor: `init(params) { ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct InitDecl {
    pub params: Vec<Param>,
    pub body: Block,
    pub visibility: Visibility,
    pub span: Span,
}

/// `enum Color { Red, Green }`
#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub name: Ident,
    pub variants: Vec<Ident>,
    pub visibility: Visibility,
    pub span: Span,
}

// ============================================================================
// Types
// ============================================================================

/// A type as written in source.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    /// `a.b.Name[Args]`
    Named {
        path: Vec<Ident>,
        type_args: Vec<TypeExpr>,
        span: Span,
    },
    /// `[]Inner`
    Slice { inner: Box<TypeExpr>, span: Span },
}

impl TypeExpr {
    pub fn span(&self) -> Span {
        match self {
            TypeExpr::Named { span, .. } | TypeExpr::Slice { span, .. } => *span,
        }
    }

    /// Convenience constructor for a single-segment named type.
    pub fn named(name: &str, span: Span) -> Self {
        TypeExpr::Named {
            path: vec![Ident::new(name, span)],
            type_args: Vec::new(),
            span,
        }
    }
}

// ============================================================================
// Statements
// ============================================================================

/// A braced block.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub statements: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    Var(VarDecl),
    Return { value: Option<Expr>, span: Span },
    If {
        condition: Expr,
        then_branch: Block,
        else_branch: Option<Block>,
        span: Span,
    },
    While {
        condition: Expr,
        body: Block,
        span: Span,
    },
    Block(Block),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Expr(e) => e.span(),
            Stmt::Var(v) => v.span,
            Stmt::Return { span, .. } | Stmt::If { span, .. } | Stmt::While { span, .. } => *span,
            Stmt::Block(b) => b.span,
        }
    }
}

/// Local variable declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub name: Ident,
    pub ty: Option<TypeExpr>,
    pub initializer: Option<Expr>,
    pub is_mutable: bool,
    pub span: Span,
}

// ============================================================================
// Expressions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Negate,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
    And,
    Or,
}

impl BinaryOp {
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo
        )
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual
        )
    }

    pub fn is_equality(self) -> bool {
        matches!(self, BinaryOp::Equal | BinaryOp::NotEqual)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i128),
    Float(f64),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal { value: Literal, span: Span },
    Identifier(Ident),
    /// `object.member`
    Member {
        object: Box<Expr>,
        member: Ident,
        span: Span,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        span: Span,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
        span: Span,
    },
    /// `callee[TypeArgs](args)`
    Call {
        callee: Box<Expr>,
        type_args: Vec<TypeExpr>,
        args: Vec<Expr>,
        span: Span,
    },
    /// `new T[Args](args)`
    New {
        ty: TypeExpr,
        args: Vec<Expr>,
        span: Span,
    },
    SelfValue(Span),
    Base(Span),
    SizeOf { ty: TypeExpr, span: Span },
    Cast {
        expr: Box<Expr>,
        ty: TypeExpr,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal { span, .. }
            | Expr::Member { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Assign { span, .. }
            | Expr::Call { span, .. }
            | Expr::New { span, .. }
            | Expr::SizeOf { span, .. }
            | Expr::Cast { span, .. } => *span,
            Expr::Identifier(ident) => ident.span,
            Expr::SelfValue(span) | Expr::Base(span) => *span,
        }
    }

    /// Returns the dotted path if the expression is a chain of identifiers (`a.b.c`).
    pub fn as_path(&self) -> Option<Vec<Ident>> {
        match self {
            Expr::Identifier(ident) => Some(vec![ident.clone()]),
            Expr::Member { object, member, .. } => {
                let mut path = object.as_path()?;
                path.push(member.clone());
                Some(path)
            }
            _ => None,
        }
    }

    /// True for `base(...)` calls.
    pub fn is_base_call(&self) -> bool {
        matches!(self, Expr::Call { callee, .. } if matches!(**callee, Expr::Base(_)))
    }
}
