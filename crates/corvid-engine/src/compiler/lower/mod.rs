//! Semantic tree to lowered IR
//!
//! One [`Lowerer`] runs per source file. Non-generic declarations are
//! lowered straight into the file's [`LoweredTree`]. Everything that can be
//! requested from several places goes through the shared
//! [`GlobalLoweringContext`] and is generated exactly once into the tree of
//! the file that declares it:
//!
//! - generic functions and methods, specialized per type arguments
//! - constructors and field accessors of generic classes
//! - class struct layouts and protocol vtable structs
//! - vtables, type tables and protocol descriptors
//!
//! Each on-demand generation runs in a fresh `Lowerer` for the owning file.

mod cast;
mod class;
mod expr;
mod stmt;

use tracing::trace;

use crate::compiler::error::{LowerError, LowerResult};
use crate::compiler::ir::{
    Linkage, LoweredFunction, LoweredNode, LoweredTree, LoweredType,
    PROTOCOL_ENTRY, TYPE_TABLE,
};
use crate::compiler::monomorphize::{
    Concern, GlobalLoweringContext, NameMangler, PendingSlot, SlotResolver, TypeArgumentResolver,
};
use crate::parser::ast::Visibility;
use crate::parser::checker::{
    FileId, SemBody, SemFunction, SemanticDeclaration, SemanticTree, StructureKind,
};
use crate::parser::types::{Bindings, DataType};
use crate::parser::{SymbolId, SymbolTable};

/// Locals of the body being lowered.
#[derive(Debug, Default)]
struct BodyState {
    /// Name and type of every local, indexed by `LocalId`
    locals: Vec<(String, LoweredType)>,
    self_ty: Option<LoweredType>,
}

pub struct Lowerer<'c, 'a> {
    ctx: &'c GlobalLoweringContext<'a>,
    table: &'a SymbolTable,
    file: FileId,
    tree: LoweredTree,
    resolver: TypeArgumentResolver,
    body: BodyState,
    next_temp: u32,
}

impl<'c, 'a> Lowerer<'c, 'a> {
    pub fn new(ctx: &'c GlobalLoweringContext<'a>, file: FileId) -> Self {
        let table = ctx.table();
        Self {
            ctx,
            table,
            file,
            tree: LoweredTree::new(table.file_scope(file).path.clone()),
            resolver: TypeArgumentResolver::new(),
            body: BodyState::default(),
            next_temp: 0,
        }
    }

    pub fn into_tree(self) -> LoweredTree {
        self.tree
    }

    fn mangler(&self) -> &NameMangler<'a> {
        self.ctx.mangler()
    }

    /// Lower every non-generic declaration of a file.
    pub fn lower_file(mut self, tree: &SemanticTree) -> LowerResult<LoweredTree> {
        trace!(file = %tree.path, id = self.file.0, "lowering file");
        for decl in &tree.declarations {
            match decl {
                SemanticDeclaration::Function(f) => {
                    let generic = self.table.function(f.symbol).is_some_and(|s| s.is_generic());
                    if !generic {
                        self.lower_function(None, f, &[])?;
                    }
                }
                SemanticDeclaration::Structure(s) => {
                    let Some(structure) = self.table.structure(s.symbol) else {
                        continue;
                    };
                    if !structure.type_params.is_empty() {
                        continue;
                    }
                    let ty = self.table.self_type(s.symbol);
                    match structure.kind {
                        StructureKind::Class => {
                            self.ensure_class_runtime(&ty)?;
                            self.lower_constructors(&ty)?;
                        }
                        StructureKind::Protocol => {
                            self.ensure_protocol_struct(&ty)?;
                            self.ensure_descriptor(&ty)?;
                        }
                        StructureKind::Module => {}
                    }
                    for function in &s.functions {
                        let generic = self
                            .table
                            .function(function.symbol)
                            .is_some_and(|f| f.is_generic());
                        if !generic && structure.kind != StructureKind::Protocol {
                            self.lower_function(Some(&ty), function, &[])?;
                        }
                    }
                    for field in &s.fields {
                        self.lower_field_members(&ty, field)?;
                    }
                }
                SemanticDeclaration::Field(_) => {}
            }
        }
        trace!(file = %self.tree.file, declarations = self.tree.len(), "lowered file");
        Ok(self.tree)
    }

    // ------------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------------

    /// Replace type parameters with their current bindings.
    fn concrete(&self, ty: &DataType) -> LowerResult<DataType> {
        self.resolver.substitute(self.table, ty)
    }

    /// Lower a type, making sure the structs it names exist.
    fn lower_type(&mut self, ty: &DataType) -> LowerResult<LoweredType> {
        let ty = self.concrete(ty)?;
        self.require(&ty)?;
        self.ctx.builder().lower(&ty)
    }

    fn require(&mut self, ty: &DataType) -> LowerResult<()> {
        match ty {
            DataType::Structure { symbol, .. } => match self.table.structure(*symbol).map(|s| s.kind) {
                Some(StructureKind::Class) => self.ensure_class_struct(ty).map(|_| ()),
                Some(StructureKind::Protocol) => self.ensure_protocol_struct(ty).map(|_| ()),
                _ => Ok(()),
            },
            DataType::Slice(inner) => self.require(inner),
            _ => Ok(()),
        }
    }

    fn is_class(&self, ty: &DataType) -> bool {
        ty.as_structure()
            .and_then(|(symbol, _)| self.table.structure(symbol))
            .is_some_and(|s| s.is_class())
    }

    fn is_protocol(&self, ty: &DataType) -> bool {
        ty.as_structure()
            .and_then(|(symbol, _)| self.table.structure(symbol))
            .is_some_and(|s| s.is_protocol())
    }

    /// True if `ty` is an instantiation that must be specialized on demand.
    fn is_specialization(ty: &DataType) -> bool {
        ty.as_structure().is_some_and(|(_, args)| !args.is_empty())
    }

    /// Bindings of an owner instantiation plus a function's own type arguments.
    fn bindings(&self, owner: Option<&DataType>, function: SymbolId, type_args: &[DataType]) -> Bindings {
        let mut bindings = owner.map(|o| self.table.bindings_for(o)).unwrap_or_default();
        bindings.extend(self.table.function_bindings(function, type_args));
        bindings
    }

    fn temp(&mut self) -> String {
        let name = format!("$t{}", self.next_temp);
        self.next_temp += 1;
        name
    }

    fn linkage(&self, symbol: SymbolId) -> Linkage {
        let symbol = self.table.symbol(symbol);
        if symbol.is_foreign() {
            Linkage::Foreign
        } else if symbol.visibility == Visibility::Public {
            Linkage::External
        } else {
            Linkage::Internal
        }
    }

    /// Declare a runtime function in this file's tree.
    fn runtime_function(&mut self, name: &str, params: Vec<LoweredType>, ret: LoweredType) -> LoweredNode {
        let declaration = LoweredFunction::foreign(name, params, ret);
        let node = LoweredNode::function_ref(name, declaration.ty());
        self.tree.add_function(declaration);
        node
    }

    // ------------------------------------------------------------------------
    // Bodies
    // ------------------------------------------------------------------------

    /// Enter a body: name and lower its locals. Returns the previous state.
    fn enter_body(&mut self, body: &SemBody, self_ty: Option<LoweredType>) -> LowerResult<BodyState> {
        let locals = body
            .locals
            .iter()
            .enumerate()
            .map(|(i, local)| Ok((format!("{}.{}", local.name, i), self.lower_type(&local.ty)?)))
            .collect::<LowerResult<Vec<_>>>()?;
        Ok(std::mem::replace(&mut self.body, BodyState { locals, self_ty }))
    }

    fn leave_body(&mut self, previous: BodyState) {
        self.body = previous;
    }

    /// Parameter list: `self` first when there is a receiver.
    fn params(&self, body: &SemBody) -> Vec<(String, LoweredType)> {
        self.body
            .self_ty
            .iter()
            .map(|ty| ("self".to_string(), ty.clone()))
            .chain(body.params.iter().map(|id| self.body.locals[id.0 as usize].clone()))
            .collect()
    }

    // ------------------------------------------------------------------------
    // Functions
    // ------------------------------------------------------------------------

    /// Mangled name of a function, or `main` for the program entry point.
    fn function_name(&self, owner: Option<&DataType>, function: SymbolId, type_args: &[DataType]) -> LowerResult<String> {
        let symbol = self.table.symbol(function);
        if owner.is_none()
            && type_args.is_empty()
            && symbol.name == "main"
            && symbol.namespace == self.ctx.options().entry_namespace
        {
            return Ok("main".to_string());
        }
        self.mangler().function(owner, function, type_args)
    }

    /// Name of a function to call, generating the specialization if needed.
    fn callee_name(&mut self, owner: Option<&DataType>, function: SymbolId, type_args: &[DataType]) -> LowerResult<String> {
        let name = self.function_name(owner, function, type_args)?;
        if !type_args.is_empty() || owner.is_some_and(Self::is_specialization) {
            self.ensure_function(owner, function, type_args, &name)?;
        }
        Ok(name)
    }

    fn ensure_function(
        &mut self,
        owner: Option<&DataType>,
        function: SymbolId,
        type_args: &[DataType],
        name: &str,
    ) -> LowerResult<bool> {
        let ctx = self.ctx;
        let file = self.table.symbol(function).file;
        ctx.ensure(Concern::Function, name, file, || {
            let declaration = ctx
                .table()
                .symbol(function)
                .declaration
                .get()
                .and_then(|d| d.as_function().cloned())
                .ok_or_else(|| LowerError::MissingDeclaration(name.to_string()))?;
            let mut generator = Lowerer::new(ctx, file);
            generator.lower_function(owner, &declaration, type_args)?;
            Ok(generator.into_tree())
        })
    }

    /// Lower a function, method or static method with concrete type arguments.
    fn lower_function(&mut self, owner: Option<&DataType>, sem: &SemFunction, type_args: &[DataType]) -> LowerResult<()> {
        self.resolver.push(self.bindings(owner, sem.symbol, type_args));
        let result = self.lower_function_body(owner, sem, type_args);
        self.resolver.pop();
        result
    }

    fn lower_function_body(&mut self, owner: Option<&DataType>, sem: &SemFunction, type_args: &[DataType]) -> LowerResult<()> {
        let table = self.table;
        let symbol = table.symbol(sem.symbol);
        let function = table
            .function(sem.symbol)
            .ok_or_else(|| LowerError::Unexpected(format!("'{}' is not a function", symbol.name)))?;

        let name = self.function_name(owner, sem.symbol, type_args)?;
        let self_ty = match owner {
            Some(owner) if !function.is_static => Some(self.lower_type(owner)?),
            _ => None,
        };
        let ret = self.lower_type(&sem.return_type)?;
        let previous = self.enter_body(&sem.body, self_ty)?;
        let params = self.params(&sem.body);
        let body = match (&sem.body.block, symbol.is_foreign()) {
            (Some(block), false) => Some(self.lower_block(block)),
            _ => None,
        };
        self.leave_body(previous);

        let mut linkage = self.linkage(sem.symbol);
        if name == "main" && linkage == Linkage::Internal {
            linkage = Linkage::External;
        }
        self.tree.add_function(LoweredFunction {
            name,
            params,
            ret,
            body: body.transpose()?,
            linkage,
        });
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Structs and runtime metadata
    // ------------------------------------------------------------------------

    fn ensure_runtime_structs(&mut self) -> LowerResult<()> {
        let ctx = self.ctx;
        ctx.ensure(Concern::Struct, TYPE_TABLE, FileId(0), || {
            let mut tree = LoweredTree::default();
            for s in ctx.builder().type_table_layout() {
                tree.add_struct(s);
            }
            Ok(tree)
        })?;
        Ok(())
    }

    /// Struct layout of a concrete class.
    fn ensure_class_struct(&mut self, class: &DataType) -> LowerResult<String> {
        let name = self.mangler().structure(class)?;
        let ctx = self.ctx;
        let file = self.owner_file(class)?;
        ctx.ensure(Concern::Struct, &name, file, || {
            let mut generator = Lowerer::new(ctx, file);
            for ancestor in ctx.table().ancestry(class) {
                let Some((symbol, _)) = ancestor.as_structure() else {
                    continue;
                };
                let bindings = ctx.table().bindings_for(&ancestor);
                for field in ctx.builder().storage_fields(symbol) {
                    if let Some(ty) = ctx.table().field_type(field) {
                        generator.require(&ty.ty.substitute(&bindings))?;
                    }
                }
            }
            generator.ensure_runtime_structs()?;
            generator.tree.add_struct(ctx.builder().class_layout(class)?);
            Ok(generator.into_tree())
        })?;
        Ok(name)
    }

    /// Vtable struct of a protocol, the type behind its fat pointers.
    fn ensure_protocol_struct(&mut self, protocol: &DataType) -> LowerResult<String> {
        let name = self.mangler().vtable(protocol, protocol)?;
        let ctx = self.ctx;
        let file = self.owner_file(protocol)?;
        ctx.ensure(Concern::Struct, &name, file, || {
            let mut generator = Lowerer::new(ctx, file);
            let layout = ctx.builder().vtable_struct(protocol, protocol)?;
            generator.require_signatures(protocol)?;
            generator.tree.add_struct(layout);
            Ok(generator.into_tree())
        })?;
        Ok(name)
    }

    /// Make sure the types named by a protocol's signatures exist.
    fn require_signatures(&mut self, protocol: &DataType) -> LowerResult<()> {
        let Some((symbol, _)) = protocol.as_structure() else {
            return Ok(());
        };
        let bindings = self.table.bindings_for(protocol);
        let functions = self
            .table
            .structure(symbol)
            .map(|s| s.functions.clone())
            .unwrap_or_default();
        for function in functions {
            let Some(signature) = self.table.signature(function) else {
                continue;
            };
            for ty in signature.params.iter().chain([&signature.return_type]) {
                let ty = ty.substitute(&bindings);
                // a protocol mentioning itself is already being generated
                if ty != *protocol {
                    self.require(&ty)?;
                }
            }
        }
        Ok(())
    }

    fn owner_file(&self, ty: &DataType) -> LowerResult<FileId> {
        ty.as_structure()
            .map(|(symbol, _)| self.table.symbol(symbol).file)
            .ok_or_else(|| LowerError::UnsupportedType(ty.display(self.table).to_string()))
    }

    /// Struct, vtables and type table of a class that gets instantiated.
    fn ensure_class_runtime(&mut self, class: &DataType) -> LowerResult<String> {
        self.ensure_class_struct(class)?;
        self.ensure_type_table(class)
    }

    fn ensure_type_table(&mut self, class: &DataType) -> LowerResult<String> {
        let name = self.mangler().type_table(class)?;
        let ctx = self.ctx;
        let file = self.owner_file(class)?;
        ctx.ensure(Concern::Vtable, &name, file, || {
            let mut generator = Lowerer::new(ctx, file);
            generator.generate_type_table(class, &name)?;
            Ok(generator.into_tree())
        })?;
        Ok(name)
    }

    fn ensure_vtable(&mut self, implementor: &DataType, implemented: &DataType) -> LowerResult<String> {
        let name = self.mangler().vtable(implementor, implemented)?;
        let ctx = self.ctx;
        let file = self.owner_file(implementor)?;
        let snapshot = self.resolver.snapshot();
        ctx.ensure(Concern::Vtable, &name, file, || {
            let mut generator = Lowerer::new(ctx, file);
            generator.resolver = snapshot;
            generator.generate_vtable(implementor, implemented, &name)?;
            Ok(generator.into_tree())
        })?;
        Ok(name)
    }

    fn ensure_descriptor(&mut self, protocol: &DataType) -> LowerResult<String> {
        let name = self.mangler().descriptor(protocol)?;
        let ctx = self.ctx;
        let file = self.owner_file(protocol)?;
        ctx.ensure(Concern::Vtable, &name, file, || {
            let mut generator = Lowerer::new(ctx, file);
            generator.generate_descriptor(&name);
            Ok(generator.into_tree())
        })?;
        Ok(name)
    }

    /// Name of the runtime type-table struct, declared on first use.
    fn type_table_struct(&mut self) -> LowerResult<LoweredType> {
        self.ensure_runtime_structs()?;
        Ok(LoweredType::Struct(TYPE_TABLE.to_string()))
    }

    fn protocol_entry_struct(&mut self) -> LowerResult<LoweredType> {
        self.ensure_runtime_structs()?;
        Ok(LoweredType::Struct(PROTOCOL_ENTRY.to_string()))
    }
}

/// Fills pending vtable slots by specializing their generic implementations.
#[derive(Debug, Default, Clone, Copy)]
pub struct SlotGenerator;

impl SlotResolver for SlotGenerator {
    fn resolve_slot(
        &self,
        ctx: &GlobalLoweringContext<'_>,
        slot: &PendingSlot,
    ) -> LowerResult<(LoweredNode, LoweredType)> {
        let table = ctx.table();
        let owner = slot.bindings.substitute(table, &slot.owner)?;
        let mut lowerer = Lowerer::new(ctx, table.symbol(slot.function).file);
        let name = lowerer.callee_name(Some(&owner), slot.function, &[])?;

        let builder = ctx.builder();
        let bindings = table.bindings_for(&owner);
        let receiver = builder.lower(&owner)?;
        let implementation = builder.function_type(slot.function, Some(receiver), &bindings)?;
        let slot_ty = builder.function_type(slot.function, Some(LoweredType::opaque()), &bindings)?;
        let node = LoweredNode::bitcast(LoweredNode::function_ref(name, implementation), slot_ty.clone());
        Ok((node, slot_ty))
    }
}

#[cfg(test)]
mod tests;
