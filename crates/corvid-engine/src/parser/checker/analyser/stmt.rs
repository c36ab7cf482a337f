//! Statement analysis.
//!
//! Every statement is a recovery point: a failing statement is dropped from
//! the tree after its diagnostic has been reported and analysis continues
//! with the next one.

use super::{Analyser, Check};
use crate::parser::ast::{Block, Expr, Stmt, VarDecl};
use crate::parser::checker::error::CheckError;
use crate::parser::checker::semantic::*;
use crate::parser::types::DataType;

impl<'a> Analyser<'a> {
    pub(crate) fn analyse_block(&mut self, block: &Block) -> SemBlock {
        let id = self.next_id();
        self.push_scope();
        let statements = self.analyse_statements(&block.statements);
        self.pop_scope();
        SemBlock {
            id,
            statements,
            span: block.span,
        }
    }

    /// Analyse statements in the current scope.
    pub(crate) fn analyse_statements(&mut self, statements: &[Stmt]) -> Vec<SemStmt> {
        statements
            .iter()
            .filter_map(|stmt| self.analyse_statement(stmt).ok())
            .collect()
    }

    fn analyse_statement(&mut self, stmt: &Stmt) -> Check<SemStmt> {
        match stmt {
            Stmt::Expr(expr) => {
                if expr.is_base_call() {
                    let span = expr.span();
                    return if self.in_constructor() {
                        self.fail(CheckError::BaseCallNotFirst { span })
                    } else {
                        self.fail(CheckError::MisplacedBase { span })
                    };
                }
                self.analyse_expr(expr).map(SemStmt::Expr)
            }
            Stmt::Var(decl) => self.analyse_var(decl),
            Stmt::Return { value, span } => {
                let expected = self.return_type();
                let value = match value {
                    Some(expr) => {
                        let value = self.analyse_expr(expr)?;
                        if expected.is_void() {
                            return self.fail(CheckError::IncompatibleType {
                                expected: self.display(&expected),
                                actual: self.display(&value.ty),
                                span: value.span,
                            });
                        }
                        Some(self.coerce(value, &expected)?)
                    }
                    None if !expected.is_void() && !expected.is_unknown() => {
                        return self.fail(CheckError::IncompatibleType {
                            expected: self.display(&expected),
                            actual: self.display(&DataType::VOID),
                            span: *span,
                        });
                    }
                    None => None,
                };
                Ok(SemStmt::Return {
                    id: self.next_id(),
                    value,
                    span: *span,
                })
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
                span,
            } => {
                let condition = self.analyse_condition(condition)?;
                let then_block = self.analyse_block(then_branch);
                let else_block = else_branch.as_ref().map(|b| self.analyse_block(b));
                Ok(SemStmt::If {
                    id: self.next_id(),
                    condition,
                    then_block,
                    else_block,
                    span: *span,
                })
            }
            Stmt::While {
                condition,
                body,
                span,
            } => {
                let condition = self.analyse_condition(condition)?;
                let body = self.analyse_block(body);
                Ok(SemStmt::While {
                    id: self.next_id(),
                    condition,
                    body,
                    span: *span,
                })
            }
            Stmt::Block(block) => Ok(SemStmt::Block(self.analyse_block(block))),
        }
    }

    fn analyse_var(&mut self, decl: &VarDecl) -> Check<SemStmt> {
        let declared = match &decl.ty {
            Some(ty) => Some(self.resolve_type(ty)?),
            None => None,
        };
        let initializer = match &decl.initializer {
            Some(expr) => Some(self.analyse_expr(expr)?),
            None => None,
        };

        let (ty, initializer) = match (declared, initializer) {
            (Some(ty), Some(value)) => {
                let value = self.coerce(value, &ty)?;
                (ty, Some(value))
            }
            (Some(ty), None) => (ty, None),
            (None, Some(value)) => (value.ty.clone(), Some(value)),
            (None, None) => {
                return self.fail(CheckError::MissingTypeAnnotation {
                    name: decl.name.name.clone(),
                    span: decl.name.span,
                })
            }
        };

        if ty.is_void() {
            return self.fail(CheckError::UnexpectedType {
                actual: self.display(&ty),
                reason: "a variable cannot be void".to_string(),
                span: decl.span,
            });
        }

        let local = self.declare_local(LocalInfo {
            name: decl.name.name.clone(),
            ty,
            is_mutable: decl.is_mutable,
            is_param: false,
            span: decl.name.span,
        })?;
        Ok(SemStmt::Var {
            id: self.next_id(),
            local,
            initializer,
            span: decl.span,
        })
    }

    fn analyse_condition(&mut self, expr: &Expr) -> Check<SemExpr> {
        let condition = self.analyse_expr(expr)?;
        if !condition.ty.is_bool() && !condition.ty.is_unknown() {
            return self.fail(CheckError::IncompatibleType {
                expected: self.display(&DataType::BOOL),
                actual: self.display(&condition.ty),
                span: condition.span,
            });
        }
        Ok(condition)
    }
}

/// True if every path through `statements` ends in a `return`.
pub(super) fn always_returns(statements: &[SemStmt]) -> bool {
    statements.iter().any(|stmt| match stmt {
        SemStmt::Return { .. } => true,
        SemStmt::If {
            then_block,
            else_block: Some(else_block),
            ..
        } => always_returns(&then_block.statements) && always_returns(&else_block.statements),
        SemStmt::Block(block) => always_returns(&block.statements),
        _ => false,
    })
}
