//! Semantic tree
//!
//! The analyser produces one semantic tree per source file. Every expression
//! carries a resolved [`DataType`] and every node a per-file [`NodeId`]. The
//! tree is immutable once built; parent links live in a separate
//! [`ParentIndex`] filled by one traversal after construction.
//!
//! Declarations are shared through `Arc` because the symbol that declares
//! them keeps a reference too: the lowering stage specializes generic
//! declarations owned by other files by going through their symbols.

use rustc_hash::FxHashMap;
use std::sync::Arc;

use super::symbols::{FileId, SymbolId};
use crate::parser::ast::{BinaryOp, Literal, UnaryOp};
use crate::parser::token::Span;
use crate::parser::types::DataType;

/// Identity of a node within one semantic tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// Index of a local variable or parameter within one [`SemBody`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalId(pub u32);

/// One analysed source file.
#[derive(Debug)]
pub struct SemanticTree {
    pub file: FileId,
    pub path: String,
    pub declarations: Vec<SemanticDeclaration>,
    pub parents: ParentIndex,
}

/// A declaration shared between the tree and its symbol.
#[derive(Debug, Clone)]
pub enum SemanticDeclaration {
    Structure(Arc<SemStructure>),
    Function(Arc<SemFunction>),
    Field(Arc<SemField>),
}

impl SemanticDeclaration {
    pub fn symbol(&self) -> SymbolId {
        match self {
            SemanticDeclaration::Structure(s) => s.symbol,
            SemanticDeclaration::Function(f) => f.symbol,
            SemanticDeclaration::Field(f) => f.symbol,
        }
    }

    pub fn as_function(&self) -> Option<&Arc<SemFunction>> {
        match self {
            SemanticDeclaration::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_field(&self) -> Option<&Arc<SemField>> {
        match self {
            SemanticDeclaration::Field(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_structure(&self) -> Option<&Arc<SemStructure>> {
        match self {
            SemanticDeclaration::Structure(s) => Some(s),
            _ => None,
        }
    }
}

/// Class, protocol or module declaration.
#[derive(Debug)]
pub struct SemStructure {
    pub id: NodeId,
    pub symbol: SymbolId,
    pub fields: Vec<Arc<SemField>>,
    pub functions: Vec<Arc<SemFunction>>,
    pub init: Option<Arc<SemFunction>>,
    pub span: Span,
}

/// Function, method or constructor declaration.
#[derive(Debug)]
pub struct SemFunction {
    pub id: NodeId,
    pub symbol: SymbolId,
    pub body: SemBody,
    /// Constructors only: the extracted leading `base(..)` call
    pub base_call: Option<SemBaseCall>,
    pub return_type: DataType,
    pub span: Span,
}

/// Parameters, locals and statements of a function or accessor.
#[derive(Debug)]
pub struct SemBody {
    pub id: NodeId,
    /// Parameter locals, in order (not including `self`)
    pub params: Vec<LocalId>,
    /// Every local of the body, indexed by [`LocalId`]
    pub locals: Vec<LocalInfo>,
    /// `None` for protocol requirements and foreign functions
    pub block: Option<SemBlock>,
}

impl SemBody {
    pub fn local(&self, id: LocalId) -> &LocalInfo {
        &self.locals[id.0 as usize]
    }
}

#[derive(Debug, Clone)]
pub struct LocalInfo {
    pub name: String,
    pub ty: DataType,
    pub is_mutable: bool,
    pub is_param: bool,
    pub span: Span,
}

/// `base(args)` at the top of a constructor.
#[derive(Debug)]
pub struct SemBaseCall {
    pub id: NodeId,
    /// Ancestor class instantiation
    pub ancestor: DataType,
    /// Ancestor constructor, if it declares one
    pub constructor: Option<SymbolId>,
    pub args: Vec<SemExpr>,
    pub span: Span,
}

/// Field declaration.
#[derive(Debug)]
pub struct SemField {
    pub id: NodeId,
    pub symbol: SymbolId,
    pub ty: DataType,
    pub initializer: Option<SemExpr>,
    pub getter: Option<SemBody>,
    /// Setter body; its single parameter is the new value
    pub setter: Option<SemBody>,
    pub span: Span,
}

// ============================================================================
// Statements
// ============================================================================

#[derive(Debug)]
pub struct SemBlock {
    pub id: NodeId,
    pub statements: Vec<SemStmt>,
    pub span: Span,
}

#[derive(Debug)]
pub enum SemStmt {
    Expr(SemExpr),
    Var {
        id: NodeId,
        local: LocalId,
        initializer: Option<SemExpr>,
        span: Span,
    },
    Return {
        id: NodeId,
        value: Option<SemExpr>,
        span: Span,
    },
    If {
        id: NodeId,
        condition: SemExpr,
        then_block: SemBlock,
        else_block: Option<SemBlock>,
        span: Span,
    },
    While {
        id: NodeId,
        condition: SemExpr,
        body: SemBlock,
        span: Span,
    },
    Block(SemBlock),
}

impl SemStmt {
    pub fn id(&self) -> NodeId {
        match self {
            SemStmt::Expr(e) => e.id,
            SemStmt::Var { id, .. }
            | SemStmt::Return { id, .. }
            | SemStmt::If { id, .. }
            | SemStmt::While { id, .. } => *id,
            SemStmt::Block(b) => b.id,
        }
    }
}

// ============================================================================
// Expressions
// ============================================================================

/// A typed expression.
#[derive(Debug, Clone)]
pub struct SemExpr {
    pub id: NodeId,
    pub ty: DataType,
    pub kind: SemExprKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum SemExprKind {
    Literal(Literal),
    Local(LocalId),
    /// Field read; `instance` is `None` for static fields
    Field {
        instance: Option<Box<SemExpr>>,
        /// Structure instantiation that declares the field
        owner: DataType,
        field: SymbolId,
    },
    /// Function reference, bound to `instance` for methods
    Function {
        instance: Option<Box<SemExpr>>,
        /// Declaring structure instantiation; `None` for top-level functions
        owner: Option<DataType>,
        function: SymbolId,
        /// The function's own type arguments
        type_args: Vec<DataType>,
        /// `base.f()` calls bypass virtual dispatch
        non_virtual: bool,
    },
    EnumValue {
        symbol: SymbolId,
        index: usize,
    },
    Unary {
        op: UnaryOp,
        operand: Box<SemExpr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<SemExpr>,
        right: Box<SemExpr>,
    },
    Assign {
        target: Box<SemExpr>,
        value: Box<SemExpr>,
    },
    Call {
        callee: Box<SemExpr>,
        args: Vec<SemExpr>,
    },
    /// `new T(args)`; the expression type is `T`
    New {
        constructor: Option<SymbolId>,
        args: Vec<SemExpr>,
    },
    SelfValue,
    SizeOf(DataType),
    /// Conversion to the expression type
    Cast {
        operand: Box<SemExpr>,
        implicit: bool,
    },
}

// ============================================================================
// Parent index
// ============================================================================

/// What a node in the parent index is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Structure(SymbolId),
    Function(SymbolId),
    Field(SymbolId),
    Body,
    Block,
    Statement,
    Expression,
}

/// Parent links for a semantic tree, built once after construction.
#[derive(Debug, Default)]
pub struct ParentIndex {
    parents: FxHashMap<NodeId, NodeId>,
    kinds: FxHashMap<NodeId, NodeKind>,
}

impl ParentIndex {
    /// Build the index with a single traversal of `declarations`.
    pub fn build(declarations: &[SemanticDeclaration]) -> Self {
        let mut index = ParentIndex::default();
        for decl in declarations {
            match decl {
                SemanticDeclaration::Structure(s) => index.visit_structure(s),
                SemanticDeclaration::Function(f) => index.visit_function(f, None),
                SemanticDeclaration::Field(f) => index.visit_field(f, None),
            }
        }
        index
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.parents.get(&node).copied()
    }

    pub fn kind(&self, node: NodeId) -> Option<NodeKind> {
        self.kinds.get(&node).copied()
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Ancestors of `node`, nearest first.
    pub fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(node), move |n| self.parent(*n))
    }

    /// The function whose body contains `node`.
    pub fn enclosing_function(&self, node: NodeId) -> Option<SymbolId> {
        self.ancestors(node).find_map(|n| match self.kind(n) {
            Some(NodeKind::Function(symbol)) => Some(symbol),
            _ => None,
        })
    }

    /// The structure whose declaration contains `node`.
    pub fn enclosing_structure(&self, node: NodeId) -> Option<SymbolId> {
        self.ancestors(node).find_map(|n| match self.kind(n) {
            Some(NodeKind::Structure(symbol)) => Some(symbol),
            _ => None,
        })
    }

    fn record(&mut self, node: NodeId, kind: NodeKind, parent: Option<NodeId>) {
        self.kinds.insert(node, kind);
        if let Some(parent) = parent {
            self.parents.insert(node, parent);
        }
    }

    fn visit_structure(&mut self, s: &SemStructure) {
        self.record(s.id, NodeKind::Structure(s.symbol), None);
        for field in &s.fields {
            self.visit_field(field, Some(s.id));
        }
        for function in &s.functions {
            self.visit_function(function, Some(s.id));
        }
        if let Some(init) = &s.init {
            self.visit_function(init, Some(s.id));
        }
    }

    fn visit_function(&mut self, f: &SemFunction, parent: Option<NodeId>) {
        self.record(f.id, NodeKind::Function(f.symbol), parent);
        if let Some(base) = &f.base_call {
            self.record(base.id, NodeKind::Statement, Some(f.id));
            for arg in &base.args {
                self.visit_expr(arg, base.id);
            }
        }
        self.visit_body(&f.body, f.id);
    }

    fn visit_field(&mut self, f: &SemField, parent: Option<NodeId>) {
        self.record(f.id, NodeKind::Field(f.symbol), parent);
        if let Some(init) = &f.initializer {
            self.visit_expr(init, f.id);
        }
        for body in f.getter.iter().chain(f.setter.iter()) {
            self.visit_body(body, f.id);
        }
    }

    fn visit_body(&mut self, body: &SemBody, parent: NodeId) {
        self.record(body.id, NodeKind::Body, Some(parent));
        if let Some(block) = &body.block {
            self.visit_block(block, body.id);
        }
    }

    fn visit_block(&mut self, block: &SemBlock, parent: NodeId) {
        self.record(block.id, NodeKind::Block, Some(parent));
        for stmt in &block.statements {
            self.visit_stmt(stmt, block.id);
        }
    }

    fn visit_stmt(&mut self, stmt: &SemStmt, parent: NodeId) {
        match stmt {
            SemStmt::Expr(e) => self.visit_expr(e, parent),
            SemStmt::Var {
                id, initializer, ..
            } => {
                self.record(*id, NodeKind::Statement, Some(parent));
                if let Some(init) = initializer {
                    self.visit_expr(init, *id);
                }
            }
            SemStmt::Return { id, value, .. } => {
                self.record(*id, NodeKind::Statement, Some(parent));
                if let Some(value) = value {
                    self.visit_expr(value, *id);
                }
            }
            SemStmt::If {
                id,
                condition,
                then_block,
                else_block,
                ..
            } => {
                self.record(*id, NodeKind::Statement, Some(parent));
                self.visit_expr(condition, *id);
                self.visit_block(then_block, *id);
                if let Some(else_block) = else_block {
                    self.visit_block(else_block, *id);
                }
            }
            SemStmt::While {
                id,
                condition,
                body,
                ..
            } => {
                self.record(*id, NodeKind::Statement, Some(parent));
                self.visit_expr(condition, *id);
                self.visit_block(body, *id);
            }
            SemStmt::Block(block) => self.visit_block(block, parent),
        }
    }

    fn visit_expr(&mut self, expr: &SemExpr, parent: NodeId) {
        self.record(expr.id, NodeKind::Expression, Some(parent));
        let id = expr.id;
        match &expr.kind {
            SemExprKind::Literal(_)
            | SemExprKind::Local(_)
            | SemExprKind::EnumValue { .. }
            | SemExprKind::SelfValue
            | SemExprKind::SizeOf(_) => {}
            SemExprKind::Field { instance, .. } | SemExprKind::Function { instance, .. } => {
                if let Some(instance) = instance {
                    self.visit_expr(instance, id);
                }
            }
            SemExprKind::Unary { operand, .. } | SemExprKind::Cast { operand, .. } => {
                self.visit_expr(operand, id)
            }
            SemExprKind::Binary { left, right, .. } => {
                self.visit_expr(left, id);
                self.visit_expr(right, id);
            }
            SemExprKind::Assign { target, value } => {
                self.visit_expr(target, id);
                self.visit_expr(value, id);
            }
            SemExprKind::Call { callee, args } => {
                self.visit_expr(callee, id);
                for arg in args {
                    self.visit_expr(arg, id);
                }
            }
            SemExprKind::New { args, .. } => {
                for arg in args {
                    self.visit_expr(arg, id);
                }
            }
        }
    }
}
