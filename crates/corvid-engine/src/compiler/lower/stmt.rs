//! Statement lowering

use super::Lowerer;
use crate::compiler::error::LowerResult;
use crate::compiler::ir::LoweredNode;
use crate::parser::checker::{SemBlock, SemExprKind, SemStmt};

impl<'c, 'a> Lowerer<'c, 'a> {
    pub(super) fn lower_block(&mut self, block: &SemBlock) -> LowerResult<LoweredNode> {
        let stmts = self.lower_statements(&block.statements)?;
        Ok(LoweredNode::block(stmts, None))
    }

    pub(super) fn lower_statements(&mut self, statements: &[SemStmt]) -> LowerResult<Vec<LoweredNode>> {
        statements.iter().map(|stmt| self.lower_statement(stmt)).collect()
    }

    fn lower_statement(&mut self, stmt: &SemStmt) -> LowerResult<LoweredNode> {
        match stmt {
            SemStmt::Expr(expr) => match &expr.kind {
                // the value of a statement-level assignment is unused
                SemExprKind::Assign { target, value } => {
                    let value = self.lower_expr(value)?;
                    self.lower_store(target, value)
                }
                _ => self.lower_expr(expr),
            },
            SemStmt::Var {
                local, initializer, ..
            } => {
                let (name, ty) = self.local(local.0)?;
                let value = match initializer {
                    Some(init) => self.lower_expr(init)?,
                    None => LoweredNode::Zero(ty.clone()),
                };
                Ok(LoweredNode::let_(name, ty, value))
            }
            SemStmt::Return { value, .. } => {
                let value = value.as_ref().map(|v| self.lower_expr(v)).transpose()?;
                Ok(LoweredNode::Return(value.map(Box::new)))
            }
            SemStmt::If {
                condition,
                then_block,
                else_block,
                ..
            } => Ok(LoweredNode::If {
                condition: Box::new(self.lower_expr(condition)?),
                then_branch: Box::new(self.lower_block(then_block)?),
                else_branch: else_block
                    .as_ref()
                    .map(|b| self.lower_block(b))
                    .transpose()?
                    .map(Box::new),
            }),
            SemStmt::While {
                condition, body, ..
            } => Ok(LoweredNode::While {
                condition: Box::new(self.lower_expr(condition)?),
                body: Box::new(self.lower_block(body)?),
            }),
            SemStmt::Block(block) => self.lower_block(block),
        }
    }
}
