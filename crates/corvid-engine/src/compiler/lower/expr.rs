//! Expression lowering
//!
//! Calls are dispatched three ways:
//!
//! - through the receiver's own vtable, for virtual methods on class values
//! - through the vtable half of a fat pointer, for protocol values
//! - directly, for everything else (including `base.f()` calls)

use super::Lowerer;
use crate::compiler::error::{LowerError, LowerResult};
use crate::compiler::ir::{FieldIndex, LoweredLiteral, LoweredNode, LoweredType, TYPE_TABLE};
use crate::parser::ast::{BinaryOp, Literal, UnaryOp};
use crate::parser::checker::{SemExpr, SemExprKind};
use crate::parser::types::DataType;
use crate::parser::SymbolId;

impl<'c, 'a> Lowerer<'c, 'a> {
    pub(super) fn lower_expr(&mut self, expr: &SemExpr) -> LowerResult<LoweredNode> {
        match &expr.kind {
            SemExprKind::Literal(literal) => {
                let ty = self.lower_type(&expr.ty)?;
                let value = match literal {
                    Literal::Int(v) if ty.as_primitive().is_some_and(|k| k.is_float()) => {
                        LoweredLiteral::Float(*v as f64)
                    }
                    Literal::Int(v) => LoweredLiteral::Int(*v),
                    Literal::Float(v) => LoweredLiteral::Float(*v),
                    Literal::Bool(v) => LoweredLiteral::Bool(*v),
                };
                Ok(LoweredNode::literal(value, ty))
            }
            SemExprKind::Local(local) => {
                let (name, ty) = self.local(local.0)?;
                Ok(LoweredNode::local(name, ty))
            }
            SemExprKind::SelfValue => {
                let ty = self
                    .body
                    .self_ty
                    .clone()
                    .ok_or_else(|| LowerError::Unexpected("'self' outside a method".to_string()))?;
                Ok(LoweredNode::local("self", ty))
            }
            SemExprKind::EnumValue { index, .. } => Ok(LoweredNode::literal(
                LoweredLiteral::Int(*index as i128),
                LoweredType::I32,
            )),
            SemExprKind::Field {
                instance,
                owner,
                field,
            } => self.lower_field_read(instance.as_deref(), owner, *field),
            SemExprKind::Function {
                instance: None,
                owner,
                function,
                type_args,
                ..
            } => {
                let owner = owner.as_ref().map(|o| self.concrete(o)).transpose()?;
                let type_args = self.resolver.substitute_all(self.table, type_args)?;
                self.function_ref(owner.as_ref(), *function, &type_args, None)
            }
            SemExprKind::Function { function, .. } => Err(LowerError::Unexpected(format!(
                "bound method '{}' used as a value",
                self.table.symbol(*function).name
            ))),
            SemExprKind::Unary { op, operand } => Ok(LoweredNode::Unary {
                op: *op,
                operand: Box::new(self.lower_expr(operand)?),
                ty: self.lower_type(&expr.ty)?,
            }),
            SemExprKind::Binary { op, left, right } => {
                let left_ty = self.concrete(&left.ty)?;
                if op.is_equality() && (self.is_class(&left_ty) || self.is_protocol(&left_ty)) {
                    return self.lower_equality(*op, left, &left_ty, right);
                }
                Ok(LoweredNode::Binary {
                    op: *op,
                    left: Box::new(self.lower_expr(left)?),
                    right: Box::new(self.lower_expr(right)?),
                    ty: self.lower_type(&expr.ty)?,
                })
            }
            SemExprKind::Assign { target, value } => {
                let value = self.lower_expr(value)?;
                let ty = value.ty();
                let temp = self.temp();
                let store = self.lower_store(target, LoweredNode::local(&temp, ty.clone()))?;
                Ok(LoweredNode::block(
                    vec![LoweredNode::let_(&temp, ty.clone(), value), store],
                    Some(LoweredNode::local(temp, ty)),
                ))
            }
            SemExprKind::Call { callee, args } => self.lower_call(callee, args),
            SemExprKind::New { constructor, args } => self.lower_new(&expr.ty, *constructor, args),
            SemExprKind::SizeOf(ty) => Ok(LoweredNode::SizeOf {
                of: self.lower_type(ty)?,
            }),
            SemExprKind::Cast { operand, .. } => self.lower_cast(operand, &expr.ty),
        }
    }

    pub(super) fn local(&self, index: u32) -> LowerResult<(String, LoweredType)> {
        self.body
            .locals
            .get(index as usize)
            .cloned()
            .ok_or_else(|| LowerError::Unexpected(format!("unknown local {}", index)))
    }

    /// Lowered type of a field as seen through a concrete owner.
    pub(super) fn member_type(&mut self, owner: &DataType, field: SymbolId) -> LowerResult<LoweredType> {
        let ty = self
            .table
            .field_type(field)
            .map(|f| f.ty.substitute(&self.table.bindings_for(owner)))
            .ok_or_else(|| LowerError::MissingDeclaration(self.table.qualified_name(field)))?;
        self.lower_type(&ty)
    }

    /// The receiver of a member access, converted to the owner's type.
    fn receiver(&mut self, instance: &SemExpr, owner: &DataType) -> LowerResult<LoweredNode> {
        let from = self.concrete(&instance.ty)?;
        let node = self.lower_expr(instance)?;
        self.convert_value(node, &from, owner)
    }

    // ------------------------------------------------------------------------
    // Fields
    // ------------------------------------------------------------------------

    fn lower_field_read(&mut self, instance: Option<&SemExpr>, owner: &DataType, field: SymbolId) -> LowerResult<LoweredNode> {
        let table = self.table;
        let owner = self.concrete(owner)?;
        let symbol = table
            .field(field)
            .ok_or_else(|| LowerError::MissingDeclaration(table.qualified_name(field)))?;
        let ty = self.member_type(&owner, field)?;

        if symbol.is_computed() || symbol.is_lazy() {
            if !symbol.has_getter && !symbol.is_lazy() {
                return Err(LowerError::Unexpected(format!(
                    "field '{}' has no getter",
                    table.symbol(field).name
                )));
            }
            let getter = self.mangler().getter(&owner, field)?;
            let getter = self.field_member(&owner, field, getter)?;
            let (receiver, receiver_ty) = match instance {
                Some(instance) if !symbol.is_static => {
                    let receiver = self.receiver(instance, &owner)?;
                    let receiver_ty = receiver.ty();
                    (Some(receiver), Some(receiver_ty))
                }
                _ => (None, None),
            };
            let getter_ty = self.ctx.builder().getter_type(ty, receiver_ty);
            return Ok(LoweredNode::call(
                LoweredNode::function_ref(getter, getter_ty),
                receiver.into_iter().collect(),
            ));
        }

        let address = self.field_address(instance, &owner, field, ty.clone())?;
        Ok(LoweredNode::load(address, ty))
    }

    /// Address of a stored field: a global for statics, a struct field otherwise.
    fn field_address(
        &mut self,
        instance: Option<&SemExpr>,
        owner: &DataType,
        field: SymbolId,
        ty: LoweredType,
    ) -> LowerResult<LoweredNode> {
        let is_static = self.table.field(field).is_some_and(|f| f.is_static);
        if is_static {
            let name = self.mangler().static_field(owner, field)?;
            let name = self.field_member(owner, field, name)?;
            return Ok(LoweredNode::global(name, ty));
        }
        let instance = instance.ok_or_else(|| {
            LowerError::Unexpected(format!(
                "instance field '{}' without a receiver",
                self.table.symbol(field).name
            ))
        })?;
        let base = self.receiver(instance, owner)?;
        let structure = self.mangler().structure(owner)?;
        let index = self.ctx.builder().field_index(owner, field)?;
        Ok(LoweredNode::field_ptr(base, structure, FieldIndex::Index(index), ty))
    }

    /// Store `value` into an assignable expression.
    pub(super) fn lower_store(&mut self, target: &SemExpr, value: LoweredNode) -> LowerResult<LoweredNode> {
        match &target.kind {
            SemExprKind::Local(local) => {
                let (name, ty) = self.local(local.0)?;
                Ok(LoweredNode::store(LoweredNode::local(name, ty), value))
            }
            SemExprKind::Field {
                instance,
                owner,
                field,
            } => {
                let table = self.table;
                let owner = self.concrete(owner)?;
                let symbol = table
                    .field(*field)
                    .ok_or_else(|| LowerError::MissingDeclaration(table.qualified_name(*field)))?;
                let ty = self.member_type(&owner, *field)?;

                if symbol.has_setter {
                    let setter = self.mangler().setter(&owner, *field)?;
                    let setter = self.field_member(&owner, *field, setter)?;
                    let mut args = Vec::new();
                    if let (Some(instance), false) = (instance, symbol.is_static) {
                        args.push(self.receiver(instance, &owner)?);
                    }
                    let receiver_ty = args.first().map(LoweredNode::ty);
                    args.push(value);
                    let setter_ty = self.ctx.builder().setter_type(ty, receiver_ty);
                    return Ok(LoweredNode::call(LoweredNode::function_ref(setter, setter_ty), args));
                }
                if symbol.is_computed() {
                    return Err(LowerError::Unexpected(format!(
                        "field '{}' has no setter",
                        table.symbol(*field).name
                    )));
                }

                let address = self.field_address(instance.as_deref(), &owner, *field, ty)?;
                let store = LoweredNode::store(address, value);
                if symbol.is_lazy() {
                    // an assignment counts as initialization
                    let guard = self.mangler().lazy_guard(&owner, *field)?;
                    let guard = LoweredNode::global(guard, LoweredType::BOOL);
                    return Ok(LoweredNode::block(
                        vec![store, LoweredNode::store(guard, LoweredNode::bool(true))],
                        None,
                    ));
                }
                Ok(store)
            }
            _ => Err(LowerError::Unexpected("assignment to a non-assignable expression".to_string())),
        }
    }

    // ------------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------------

    fn function_ref(
        &mut self,
        owner: Option<&DataType>,
        function: SymbolId,
        type_args: &[DataType],
        receiver: Option<LoweredType>,
    ) -> LowerResult<LoweredNode> {
        let name = self.callee_name(owner, function, type_args)?;
        let bindings = self.bindings(owner, function, type_args);
        let ty = self.ctx.builder().function_type(function, receiver, &bindings)?;
        Ok(LoweredNode::function_ref(name, ty))
    }

    fn lower_call(&mut self, callee: &SemExpr, args: &[SemExpr]) -> LowerResult<LoweredNode> {
        let SemExprKind::Function {
            instance,
            owner,
            function,
            type_args,
            non_virtual,
        } = &callee.kind
        else {
            return Err(LowerError::Unexpected("call of a non-function value".to_string()));
        };
        let owner = owner.as_ref().map(|o| self.concrete(o)).transpose()?;
        let type_args = self.resolver.substitute_all(self.table, type_args)?;
        let args = args
            .iter()
            .map(|arg| self.lower_expr(arg))
            .collect::<LowerResult<Vec<_>>>()?;

        match (instance, &owner) {
            (Some(instance), Some(owner)) => {
                self.lower_method_call(instance, owner, *function, &type_args, args, *non_virtual)
            }
            _ => {
                let callee = self.function_ref(owner.as_ref(), *function, &type_args, None)?;
                Ok(LoweredNode::call(callee, args))
            }
        }
    }

    fn lower_method_call(
        &mut self,
        instance: &SemExpr,
        owner: &DataType,
        function: SymbolId,
        type_args: &[DataType],
        args: Vec<LoweredNode>,
        non_virtual: bool,
    ) -> LowerResult<LoweredNode> {
        let table = self.table;
        let symbol = table
            .function(function)
            .ok_or_else(|| LowerError::MissingDeclaration(table.qualified_name(function)))?;

        if symbol.is_static {
            let callee = self.function_ref(Some(owner), function, type_args, None)?;
            return Ok(LoweredNode::call(callee, args));
        }

        if symbol.is_virtual() && !non_virtual {
            let receiver_ty = self.concrete(&instance.ty)?;
            if self.is_protocol(&receiver_ty) {
                return self.protocol_dispatch(instance, &receiver_ty, function, args);
            }
            if self.is_class(&receiver_ty) {
                return self.class_dispatch(instance, &receiver_ty, function, args);
            }
        }

        let receiver = self.receiver(instance, owner)?;
        let callee = self.function_ref(Some(owner), function, type_args, Some(receiver.ty()))?;
        Ok(LoweredNode::call(callee, std::iter::once(receiver).chain(args).collect()))
    }

    /// Slot index and slot type of `function` for calls on `receiver`.
    fn slot(&self, receiver: &DataType, function: SymbolId) -> LowerResult<(u32, LoweredType)> {
        let builder = self.ctx.builder();
        let index = builder.slot_index(receiver, function)?;
        let layout = builder.vtable_layout(receiver, receiver)?;
        let slot = layout.get(index as usize).ok_or_else(|| LowerError::MissingSlot {
            class: receiver.display(self.table).to_string(),
            function: self.table.symbol(function).name.clone(),
        })?;
        Ok((index, slot.ty.clone()))
    }

    fn load_slot(&self, vtable: LoweredNode, vtable_struct: String, index: u32, ty: LoweredType) -> LoweredNode {
        LoweredNode::load(
            LoweredNode::field_ptr(vtable, vtable_struct, FieldIndex::Index(index), ty.clone()),
            ty,
        )
    }

    /// `self.$typetable.vtable[slot](self, args)`
    fn class_dispatch(
        &mut self,
        instance: &SemExpr,
        class: &DataType,
        function: SymbolId,
        args: Vec<LoweredNode>,
    ) -> LowerResult<LoweredNode> {
        self.ensure_class_runtime(class)?;
        let receiver = self.lower_expr(instance)?;
        let receiver_ty = receiver.ty();
        let temp = self.temp();
        let this = LoweredNode::local(&temp, receiver_ty.clone());

        let structure = self.mangler().structure(class)?;
        let header_ty = LoweredType::pointer_to(TYPE_TABLE);
        let header = LoweredNode::load(
            LoweredNode::field_ptr(this.clone(), structure, FieldIndex::Index(0), header_ty.clone()),
            header_ty,
        );
        let vtable = LoweredNode::load(
            LoweredNode::field_ptr(
                header,
                TYPE_TABLE,
                FieldIndex::Name("vtable".to_string()),
                LoweredType::opaque(),
            ),
            LoweredType::opaque(),
        );
        let vtable_struct = self.mangler().vtable(class, class)?;
        let vtable = LoweredNode::bitcast(vtable, LoweredType::pointer_to(&vtable_struct));

        let (index, slot_ty) = self.slot(class, function)?;
        let callee = self.load_slot(vtable, vtable_struct, index, slot_ty);
        let call_args = std::iter::once(LoweredNode::bitcast(this, LoweredType::opaque()))
            .chain(args)
            .collect();
        Ok(LoweredNode::block(
            vec![LoweredNode::let_(temp, receiver_ty, receiver)],
            Some(LoweredNode::call(callee, call_args)),
        ))
    }

    /// `fat.vtable[slot](fat.instance, args)`
    fn protocol_dispatch(
        &mut self,
        instance: &SemExpr,
        protocol: &DataType,
        function: SymbolId,
        args: Vec<LoweredNode>,
    ) -> LowerResult<LoweredNode> {
        let vtable_struct = self.ensure_protocol_struct(protocol)?;
        let receiver = self.lower_expr(instance)?;
        let receiver_ty = receiver.ty();
        let temp = self.temp();
        let fat = LoweredNode::local(&temp, receiver_ty.clone());

        let vtable = LoweredNode::extract(fat.clone(), 1, LoweredType::pointer_to(&vtable_struct));
        let this = LoweredNode::extract(fat, 0, LoweredType::opaque());
        let (index, slot_ty) = self.slot(protocol, function)?;
        let callee = self.load_slot(vtable, vtable_struct, index, slot_ty);
        Ok(LoweredNode::block(
            vec![LoweredNode::let_(temp, receiver_ty, receiver)],
            Some(LoweredNode::call(callee, std::iter::once(this).chain(args).collect())),
        ))
    }

    /// `a == b` on objects calls `a.IsEqual(b)`; `!=` negates it.
    fn lower_equality(
        &mut self,
        op: BinaryOp,
        left: &SemExpr,
        left_ty: &DataType,
        right: &SemExpr,
    ) -> LowerResult<LoweredNode> {
        let table = self.table;
        let member = table
            .find_member(left_ty, "IsEqual")
            .ok_or_else(|| LowerError::MissingDeclaration(format!("{}::IsEqual", left_ty.display(table))))?;
        let param = table
            .signature(member.symbol)
            .and_then(|s| s.params.first().cloned())
            .ok_or_else(|| LowerError::MissingDeclaration(table.qualified_name(member.symbol)))?
            .substitute(&table.bindings_for(&member.owner));

        let right_ty = self.concrete(&right.ty)?;
        let argument = self.lower_expr(right)?;
        let argument = self.convert_value(argument, &right_ty, &param)?;
        let call = self.lower_method_call(left, &member.owner, member.symbol, &[], vec![argument], false)?;
        Ok(match op {
            BinaryOp::NotEqual => LoweredNode::Unary {
                op: UnaryOp::Not,
                operand: Box::new(call),
                ty: LoweredType::BOOL,
            },
            _ => call,
        })
    }

    // ------------------------------------------------------------------------
    // Allocation
    // ------------------------------------------------------------------------

    /// `new T(args)`: allocate, then run `T::$init` on the new object.
    fn lower_new(&mut self, class: &DataType, constructor: Option<SymbolId>, args: &[SemExpr]) -> LowerResult<LoweredNode> {
        let class = self.concrete(class)?;
        self.ensure_class_runtime(&class)?;
        let class_ty = self.lower_type(&class)?;
        let structure = self.mangler().structure(&class)?;
        let init = self.constructor_name(&class)?;

        let mut params = vec![class_ty.clone()];
        if let Some(constructor) = constructor {
            let bindings = self.table.bindings_for(&class);
            params.extend(self.ctx.builder().signature(constructor, &bindings)?.0);
        }
        let init = LoweredNode::function_ref(init, LoweredType::function(params, LoweredType::Void));

        let allocator = self.ctx.options().allocator.clone();
        let allocate = self.runtime_function(&allocator, vec![LoweredType::U64], LoweredType::opaque());
        let object = LoweredNode::bitcast(
            LoweredNode::call(
                allocate,
                vec![LoweredNode::SizeOf {
                    of: LoweredType::Struct(structure),
                }],
            ),
            class_ty.clone(),
        );

        let temp = self.temp();
        let this = LoweredNode::local(&temp, class_ty.clone());
        let mut call_args = vec![this.clone()];
        for arg in args {
            call_args.push(self.lower_expr(arg)?);
        }
        Ok(LoweredNode::block(
            vec![
                LoweredNode::let_(&temp, class_ty, object),
                LoweredNode::call(init, call_args),
            ],
            Some(this),
        ))
    }
}
