//! Constructors, field members and runtime type metadata
//!
//! A class gets two constructor functions:
//!
//! - `$init(self, args)` stores the type table pointer, initializes every
//!   storage field, runs the ancestor's `$body` and then its own statements
//! - `$body(self, args)` runs only the ancestor's `$body` and its own
//!   statements; derived constructors call it. Only open classes have one.
//!
//! Vtables are globals holding one function pointer per slot. A type table
//! points to the class's own vtable and lists one `(descriptor, vtable)`
//! entry per implemented protocol.

use super::{BodyState, Lowerer};
use crate::compiler::error::{LowerError, LowerResult};
use crate::compiler::ir::{
    FieldIndex, Linkage, LoweredFunction, LoweredGlobal, LoweredLiteral, LoweredNode, LoweredType,
    TYPE_TABLE,
};
use crate::compiler::monomorphize::Concern;
use crate::parser::ast::UnaryOp;
use crate::parser::checker::{SemBody, SemExpr, SemField, SemFunction, SemStructure};
use crate::parser::types::DataType;
use crate::parser::SymbolId;

impl<'c, 'a> Lowerer<'c, 'a> {
    // ------------------------------------------------------------------------
    // Constructors
    // ------------------------------------------------------------------------

    /// Name of `$init` for a concrete class, generating a specialization if needed.
    pub(super) fn constructor_name(&mut self, class: &DataType) -> LowerResult<String> {
        let name = self.mangler().init(class)?;
        self.ensure_constructors(class, &name)?;
        Ok(name)
    }

    /// Name of `$body` for a concrete class, generating a specialization if needed.
    fn constructor_body_name(&mut self, class: &DataType) -> LowerResult<String> {
        let init = self.mangler().init(class)?;
        self.ensure_constructors(class, &init)?;
        self.mangler().init_body(class)
    }

    fn ensure_constructors(&mut self, class: &DataType, init: &str) -> LowerResult<()> {
        if !Self::is_specialization(class) {
            return Ok(());
        }
        let ctx = self.ctx;
        let file = self.owner_file(class)?;
        ctx.ensure(Concern::Function, init, file, || {
            let mut generator = Lowerer::new(ctx, file);
            generator.lower_constructors(class)?;
            Ok(generator.into_tree())
        })?;
        Ok(())
    }

    /// Lower `$init` and, for open classes, `$body` of a concrete class.
    pub(super) fn lower_constructors(&mut self, class: &DataType) -> LowerResult<()> {
        let table = self.table;
        let (symbol, _) = class
            .as_structure()
            .ok_or_else(|| LowerError::UnsupportedType(class.display(table).to_string()))?;
        let declaration = table
            .symbol(symbol)
            .declaration
            .get()
            .and_then(|d| d.as_structure().cloned())
            .ok_or_else(|| LowerError::MissingDeclaration(table.qualified_name(symbol)))?;

        self.resolver.push(table.bindings_for(class));
        let result = self.lower_constructors_of(class, symbol, &declaration);
        self.resolver.pop();
        result
    }

    fn lower_constructors_of(&mut self, class: &DataType, symbol: SymbolId, sem: &SemStructure) -> LowerResult<()> {
        let table = self.table;
        let class_ty = self.lower_type(class)?;
        let structure = self.ensure_class_struct(class)?;
        let type_table = self.ensure_type_table(class)?;
        let init = sem.init.as_deref();

        let self_state = BodyState {
            locals: Vec::new(),
            self_ty: Some(class_ty.clone()),
        };
        let previous = match init {
            Some(init) => self.enter_body(&init.body, Some(class_ty.clone()))?,
            None => std::mem::replace(&mut self.body, self_state),
        };
        let params = match init {
            Some(init) => self.params(&init.body),
            None => vec![("self".to_string(), class_ty.clone())],
        };
        let this = LoweredNode::local("self", class_ty);

        let result = self.constructor_bodies(class, init, &structure, type_table, &this);
        self.leave_body(previous);
        let (init_body, body) = result?;

        let linkage = self.linkage(symbol);
        self.tree.add_function(LoweredFunction {
            name: self.mangler().init(class)?,
            params: params.clone(),
            ret: LoweredType::Void,
            body: Some(LoweredNode::block(init_body, None)),
            linkage,
        });
        if table.structure(symbol).is_some_and(|s| s.is_inheritable) {
            self.tree.add_function(LoweredFunction {
                name: self.mangler().init_body(class)?,
                params,
                ret: LoweredType::Void,
                body: Some(LoweredNode::block(body, None)),
                linkage,
            });
        }
        Ok(())
    }

    /// Statements of `$init` and of `$body`.
    fn constructor_bodies(
        &mut self,
        class: &DataType,
        init: Option<&SemFunction>,
        structure: &str,
        type_table: String,
        this: &LoweredNode,
    ) -> LowerResult<(Vec<LoweredNode>, Vec<LoweredNode>)> {
        let mut init_body = vec![LoweredNode::store(
            LoweredNode::field_ptr(
                this.clone(),
                structure,
                FieldIndex::Index(0),
                LoweredType::pointer_to(TYPE_TABLE),
            ),
            LoweredNode::global(type_table, self.type_table_struct()?),
        )];
        init_body.extend(self.field_initializers(class, structure, this)?);
        let body = self.constructor_statements(class, init, this)?;
        init_body.extend(body.iter().cloned());
        Ok((init_body, body))
    }

    /// Stores of every storage field, ancestors first, from its initializer or zero.
    fn field_initializers(&mut self, class: &DataType, structure: &str, this: &LoweredNode) -> LowerResult<Vec<LoweredNode>> {
        let table = self.table;
        let mut stores = Vec::new();
        for ancestor in table.ancestry(class).iter().rev() {
            let Some((symbol, _)) = ancestor.as_structure() else {
                continue;
            };
            for field in self.ctx.builder().storage_fields(symbol) {
                if table.symbol(field).is_foreign() {
                    continue;
                }
                let ty = self.member_type(ancestor, field)?;
                let initializer = table
                    .symbol(field)
                    .declaration
                    .get()
                    .and_then(|d| d.as_field().cloned())
                    .and_then(|f| f.initializer.clone());
                let value = match initializer {
                    Some(expr) => {
                        self.resolver.push(table.bindings_for(ancestor));
                        let value = self.lower_expr(&expr);
                        self.resolver.pop();
                        value?
                    }
                    None => LoweredNode::Zero(ty.clone()),
                };
                let index = self.ctx.builder().field_index(ancestor, field)?;
                stores.push(LoweredNode::store(
                    LoweredNode::field_ptr(this.clone(), structure, FieldIndex::Index(index), ty),
                    value,
                ));
            }
        }
        Ok(stores)
    }

    /// The ancestor's `$body` call followed by the constructor's own statements.
    fn constructor_statements(
        &mut self,
        class: &DataType,
        init: Option<&SemFunction>,
        this: &LoweredNode,
    ) -> LowerResult<Vec<LoweredNode>> {
        let mut stmts = Vec::new();
        let base_call = init.and_then(|i| i.base_call.as_ref());
        let ancestor = match base_call {
            Some(base) => Some(self.concrete(&base.ancestor)?),
            None => self.table.ancestor_of(class),
        };

        if let Some(ancestor) = ancestor {
            let name = self.constructor_body_name(&ancestor)?;
            let ancestor_ty = self.lower_type(&ancestor)?;
            let mut params = vec![ancestor_ty.clone()];
            let mut args = vec![LoweredNode::bitcast(this.clone(), ancestor_ty)];
            if let Some(base) = base_call {
                if let Some(constructor) = base.constructor {
                    let bindings = self.table.bindings_for(&ancestor);
                    params.extend(self.ctx.builder().signature(constructor, &bindings)?.0);
                }
                for arg in &base.args {
                    args.push(self.lower_expr(arg)?);
                }
            }
            let callee = LoweredNode::function_ref(name, LoweredType::function(params, LoweredType::Void));
            stmts.push(LoweredNode::call(callee, args));
        }

        if let Some(block) = init.and_then(|i| i.body.block.as_ref()) {
            stmts.extend(self.lower_statements(&block.statements)?);
        }
        Ok(stmts)
    }

    // ------------------------------------------------------------------------
    // Field members
    // ------------------------------------------------------------------------

    /// Name of a field member, generating the owner specialization's members if needed.
    pub(super) fn field_member(&mut self, owner: &DataType, field: SymbolId, name: String) -> LowerResult<String> {
        if !Self::is_specialization(owner) {
            return Ok(name);
        }
        let key = self.mangler().static_field(owner, field)?;
        let ctx = self.ctx;
        let file = self.table.symbol(field).file;
        ctx.ensure(Concern::Function, &key, file, || {
            let declaration = ctx
                .table()
                .symbol(field)
                .declaration
                .get()
                .and_then(|d| d.as_field().cloned())
                .ok_or_else(|| LowerError::MissingDeclaration(key.clone()))?;
            let mut generator = Lowerer::new(ctx, file);
            generator.lower_field_members(owner, &declaration)?;
            Ok(generator.into_tree())
        })?;
        Ok(name)
    }

    /// Globals and accessor functions of a field of a concrete owner.
    pub(super) fn lower_field_members(&mut self, owner: &DataType, field: &SemField) -> LowerResult<()> {
        self.resolver.push(self.table.bindings_for(owner));
        let result = self.lower_field_members_of(owner, field);
        self.resolver.pop();
        result
    }

    fn lower_field_members_of(&mut self, owner: &DataType, field: &SemField) -> LowerResult<()> {
        let table = self.table;
        let id = field.symbol;
        let symbol = table
            .field(id)
            .ok_or_else(|| LowerError::MissingDeclaration(table.qualified_name(id)))?;
        let ty = self.member_type(owner, id)?;
        let linkage = self.linkage(id);

        if symbol.is_computed() {
            let receiver = if symbol.is_static {
                None
            } else {
                Some(self.lower_type(owner)?)
            };
            if let Some(getter) = &field.getter {
                let name = self.mangler().getter(owner, id)?;
                self.lower_accessor(name, getter, receiver.clone(), ty.clone(), linkage)?;
            }
            if let Some(setter) = &field.setter {
                let name = self.mangler().setter(owner, id)?;
                self.lower_accessor(name, setter, receiver, LoweredType::Void, linkage)?;
            }
            return Ok(());
        }
        if !symbol.is_static {
            return Ok(());
        }

        let name = self.mangler().static_field(owner, id)?;
        if table.symbol(id).is_foreign() {
            self.tree.add_global(LoweredGlobal {
                name,
                ty,
                initializer: None,
                is_constant: !symbol.is_mutable,
                linkage: Linkage::Foreign,
            });
            return Ok(());
        }

        if symbol.is_lazy() {
            return self.lower_lazy_field(owner, field, name, ty, linkage);
        }

        let initializer = match &field.initializer {
            Some(expr) => self.lower_detached(expr)?,
            None => LoweredNode::Zero(ty.clone()),
        };
        self.tree.add_global(LoweredGlobal {
            name,
            ty,
            initializer: Some(initializer),
            is_constant: !symbol.is_mutable,
            linkage,
        });
        Ok(())
    }

    fn lower_accessor(
        &mut self,
        name: String,
        body: &SemBody,
        receiver: Option<LoweredType>,
        ret: LoweredType,
        linkage: Linkage,
    ) -> LowerResult<()> {
        let previous = self.enter_body(body, receiver)?;
        let params = self.params(body);
        let block = body.block.as_ref().map(|b| self.lower_block(b)).transpose();
        self.leave_body(previous);
        self.tree.add_function(LoweredFunction {
            name,
            params,
            ret,
            body: block?,
            linkage,
        });
        Ok(())
    }

    /// Lower an expression outside any function body.
    fn lower_detached(&mut self, expr: &SemExpr) -> LowerResult<LoweredNode> {
        let previous = std::mem::take(&mut self.body);
        let value = self.lower_expr(expr);
        self.leave_body(previous);
        value
    }

    /// A lazy static: a value global, a guard and a getter that runs the
    /// initializer on first read.
    fn lower_lazy_field(
        &mut self,
        owner: &DataType,
        field: &SemField,
        name: String,
        ty: LoweredType,
        linkage: Linkage,
    ) -> LowerResult<()> {
        let guard = self.mangler().lazy_guard(owner, field.symbol)?;
        let getter = self.mangler().getter(owner, field.symbol)?;
        let initializer = field
            .initializer
            .as_ref()
            .ok_or_else(|| LowerError::MissingDeclaration(name.clone()))?;
        let value = self.lower_detached(initializer)?;

        let guard_ptr = LoweredNode::global(&guard, LoweredType::BOOL);
        let value_ptr = LoweredNode::global(&name, ty.clone());
        let body = LoweredNode::block(
            vec![
                LoweredNode::If {
                    condition: Box::new(LoweredNode::Unary {
                        op: UnaryOp::Not,
                        operand: Box::new(LoweredNode::load(guard_ptr.clone(), LoweredType::BOOL)),
                        ty: LoweredType::BOOL,
                    }),
                    then_branch: Box::new(LoweredNode::block(
                        vec![
                            LoweredNode::store(value_ptr.clone(), value),
                            LoweredNode::store(guard_ptr, LoweredNode::bool(true)),
                        ],
                        None,
                    )),
                    else_branch: None,
                },
                LoweredNode::Return(Some(Box::new(LoweredNode::load(value_ptr, ty.clone())))),
            ],
            None,
        );

        self.tree.add_global(LoweredGlobal {
            name: guard,
            ty: LoweredType::BOOL,
            initializer: Some(LoweredNode::literal(LoweredLiteral::Bool(false), LoweredType::BOOL)),
            is_constant: false,
            linkage: Linkage::Internal,
        });
        self.tree.add_global(LoweredGlobal {
            name,
            ty: ty.clone(),
            initializer: Some(LoweredNode::Zero(ty.clone())),
            is_constant: false,
            linkage,
        });
        self.tree.add_function(LoweredFunction {
            name: getter,
            params: Vec::new(),
            ret: ty,
            body: Some(body),
            linkage,
        });
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Runtime metadata
    // ------------------------------------------------------------------------

    /// Vtable struct and global of `implementor` for `implemented`.
    ///
    /// Slots implemented by a generic specialization hold a placeholder; the
    /// specialization is generated after all files are lowered.
    pub(super) fn generate_vtable(&mut self, implementor: &DataType, implemented: &DataType, name: &str) -> LowerResult<()> {
        let table = self.table;
        let ctx = self.ctx;
        let builder = ctx.builder();
        let layout = builder.vtable_struct(implementor, implemented)?;

        let mut slots = Vec::new();
        for slot in builder.vtable_layout(implementor, implemented)? {
            let function_name = &table.symbol(slot.function).name;
            let implementation = table.find_implementation(implementor, function_name).ok_or_else(|| {
                LowerError::MissingImplementation {
                    class: implementor.display(table).to_string(),
                    function: function_name.clone(),
                }
            })?;
            let owner = implementation.owner;

            if let Some((owner_symbol, _)) = owner.as_structure().filter(|(_, args)| !args.is_empty()) {
                let mut bindings = self.resolver.snapshot();
                bindings.push(table.bindings_for(&owner));
                let id = ctx.defer_slot(implementation.symbol, table.self_type(owner_symbol), bindings, name);
                slots.push(LoweredNode::PendingSlot(id));
                continue;
            }

            let target = self.function_name(Some(&owner), implementation.symbol, &[])?;
            let receiver = self.lower_type(&owner)?;
            let ty = builder.function_type(implementation.symbol, Some(receiver), &table.bindings_for(&owner))?;
            slots.push(LoweredNode::bitcast(LoweredNode::function_ref(target, ty), slot.ty));
        }
        self.require_signatures(implemented)?;

        let ty = LoweredType::Struct(layout.name.clone());
        self.tree.add_struct(layout);
        self.tree.add_global(LoweredGlobal {
            name: name.to_string(),
            ty: ty.clone(),
            initializer: Some(LoweredNode::Aggregate { fields: slots, ty }),
            is_constant: true,
            linkage: Linkage::Internal,
        });
        Ok(())
    }

    /// Type table of a concrete class: its own vtable and one entry per protocol.
    pub(super) fn generate_type_table(&mut self, class: &DataType, name: &str) -> LowerResult<()> {
        let table_ty = self.type_table_struct()?;
        let entry_ty = self.protocol_entry_struct()?;
        let own = self.ensure_vtable(class, class)?;

        let mut entries = Vec::new();
        for protocol in self.table.protocols_of(class) {
            let descriptor = self.ensure_descriptor(&protocol)?;
            self.ensure_protocol_struct(&protocol)?;
            let vtable = self.ensure_vtable(class, &protocol)?;
            entries.push(LoweredNode::Aggregate {
                fields: vec![
                    LoweredNode::bitcast(LoweredNode::global(descriptor, LoweredType::U8), LoweredType::opaque()),
                    LoweredNode::bitcast(
                        LoweredNode::global(&vtable, LoweredType::Struct(vtable.clone())),
                        LoweredType::opaque(),
                    ),
                ],
                ty: entry_ty.clone(),
            });
        }

        let initializer = LoweredNode::Aggregate {
            fields: vec![
                LoweredNode::bitcast(
                    LoweredNode::global(&own, LoweredType::Struct(own.clone())),
                    LoweredType::opaque(),
                ),
                LoweredNode::Aggregate {
                    fields: entries,
                    ty: LoweredType::Slice(Box::new(entry_ty)),
                },
            ],
            ty: table_ty.clone(),
        };
        self.tree.add_global(LoweredGlobal {
            name: name.to_string(),
            ty: table_ty,
            initializer: Some(initializer),
            is_constant: true,
            linkage: Linkage::Internal,
        });
        Ok(())
    }

    /// A protocol descriptor: a byte whose address identifies the protocol.
    pub(super) fn generate_descriptor(&mut self, name: &str) {
        self.tree.add_global(LoweredGlobal {
            name: name.to_string(),
            ty: LoweredType::U8,
            initializer: Some(LoweredNode::literal(LoweredLiteral::Int(0), LoweredType::U8)),
            is_constant: true,
            linkage: Linkage::Internal,
        });
    }
}
