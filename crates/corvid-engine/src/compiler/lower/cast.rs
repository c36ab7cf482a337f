//! Value conversions
//!
//! Primitive conversions become `Cast` nodes. Object conversions reshape the
//! value: a class pointer is reinterpreted, wrapped into a protocol fat
//! pointer, or unwrapped from one. Wrapping uses the class's vtable for the
//! protocol directly when the class cannot be subclassed; otherwise the
//! vtable is looked up at runtime in the object's type table, since the
//! dynamic class may be a descendant.

use super::Lowerer;
use crate::compiler::error::{LowerError, LowerResult};
use crate::compiler::ir::{CastKind, LoweredNode, LoweredType};
use crate::parser::checker::SemExpr;
use crate::parser::types::{DataType, PrimitiveKind};

impl<'c, 'a> Lowerer<'c, 'a> {
    pub(super) fn lower_cast(&mut self, operand: &SemExpr, target: &DataType) -> LowerResult<LoweredNode> {
        let from = self.concrete(&operand.ty)?;
        let to = self.concrete(target)?;
        let value = self.lower_expr(operand)?;
        self.convert_value(value, &from, &to)
    }

    /// Convert a lowered value between two concrete types.
    pub(super) fn convert_value(&mut self, value: LoweredNode, from: &DataType, to: &DataType) -> LowerResult<LoweredNode> {
        if from == to {
            return Ok(value);
        }
        let target = self.lower_type(to)?;

        if let (Some(source), Some(dest)) = (scalar_kind(from), scalar_kind(to)) {
            return Ok(match CastKind::between(source, dest) {
                Some(kind) => LoweredNode::cast(kind, value, target),
                None => LoweredNode::bitcast(value, target),
            });
        }

        match (from, to) {
            (DataType::Slice(_), DataType::Slice(_)) => Ok(LoweredNode::bitcast(value, target)),
            _ if self.is_class(from) && self.is_class(to) => Ok(LoweredNode::bitcast(value, target)),
            _ if self.is_class(from) && self.is_protocol(to) => self.class_to_protocol(value, from, to, target),
            // downcasts are not checked at runtime
            _ if self.is_protocol(from) && self.is_class(to) => Ok(LoweredNode::bitcast(
                LoweredNode::extract(value, 0, LoweredType::opaque()),
                target,
            )),
            _ if self.is_protocol(from) && self.is_protocol(to) => {
                let temp = self.temp();
                let fat = value.ty();
                let instance = LoweredNode::extract(LoweredNode::local(&temp, fat.clone()), 0, LoweredType::opaque());
                let lookup = self.protocol_lookup(instance, to, target)?;
                Ok(LoweredNode::block(vec![LoweredNode::let_(temp, fat, value)], Some(lookup)))
            }
            _ => Err(LowerError::UnsupportedType(format!(
                "conversion from {} to {}",
                from.display(self.table),
                to.display(self.table)
            ))),
        }
    }

    fn class_to_protocol(
        &mut self,
        value: LoweredNode,
        class: &DataType,
        protocol: &DataType,
        fat: LoweredType,
    ) -> LowerResult<LoweredNode> {
        let table = self.table;
        let sealed = class
            .as_structure()
            .and_then(|(symbol, _)| table.structure(symbol))
            .is_some_and(|s| !s.is_inheritable);

        if sealed && table.protocols_of(class).contains(protocol) {
            let vtable = self.ensure_vtable(class, protocol)?;
            let vtable_ty = LoweredType::pointer_to(self.mangler().vtable(protocol, protocol)?);
            let vtable = LoweredNode::global(&vtable, LoweredType::Struct(vtable.clone()));
            return Ok(LoweredNode::Aggregate {
                fields: vec![
                    LoweredNode::bitcast(value, LoweredType::opaque()),
                    LoweredNode::bitcast(vtable, vtable_ty),
                ],
                ty: fat,
            });
        }

        let temp = self.temp();
        let instance = LoweredNode::local(&temp, LoweredType::opaque());
        let lookup = self.protocol_lookup(instance, protocol, fat)?;
        Ok(LoweredNode::block(
            vec![LoweredNode::let_(
                temp,
                LoweredType::opaque(),
                LoweredNode::bitcast(value, LoweredType::opaque()),
            )],
            Some(lookup),
        ))
    }

    /// `{instance, lookup(instance, descriptor)}`; `instance` must be side-effect free.
    fn protocol_lookup(&mut self, instance: LoweredNode, protocol: &DataType, fat: LoweredType) -> LowerResult<LoweredNode> {
        let descriptor = self.ensure_descriptor(protocol)?;
        let vtable_ty = LoweredType::pointer_to(self.ensure_protocol_struct(protocol)?);
        let function = self.ctx.options().protocol_lookup.clone();
        let lookup = self.runtime_function(
            &function,
            vec![LoweredType::opaque(), LoweredType::opaque()],
            LoweredType::opaque(),
        );
        let descriptor = LoweredNode::bitcast(LoweredNode::global(descriptor, LoweredType::U8), LoweredType::opaque());
        let vtable = LoweredNode::call(lookup, vec![instance.clone(), descriptor]);
        Ok(LoweredNode::Aggregate {
            fields: vec![instance, LoweredNode::bitcast(vtable, vtable_ty)],
            ty: fat,
        })
    }
}

/// Primitive view of a type; enums are `i32`.
fn scalar_kind(ty: &DataType) -> Option<PrimitiveKind> {
    match ty {
        DataType::Primitive(kind) => Some(*kind),
        DataType::Enum(_) => Some(PrimitiveKind::I32),
        _ => None,
    }
}
