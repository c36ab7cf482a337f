//! Lazy symbol resolution and hierarchy queries
//!
//! Structure headers, function signatures and field types are resolved on
//! first use and memoized in the symbol's `OnceCell`. Resolution never
//! reports directly: problems are stored next to the result and the
//! analyser of the declaring file reports them exactly once.

use rustc_hash::FxHashSet;

use super::error::CheckError;
use super::symbols::*;
use crate::parser::ast::TypeExpr;
use crate::parser::types::{Bindings, DataType, PrimitiveKind};

/// Names visible while resolving a type expression.
#[derive(Debug, Clone)]
pub struct TypeContext {
    pub file: FileId,
    /// Type parameters in scope, innermost first
    pub generics: Vec<SymbolId>,
}

impl TypeContext {
    pub fn new(file: FileId) -> Self {
        Self {
            file,
            generics: Vec::new(),
        }
    }

    /// Context for the members of `structure`.
    pub fn for_structure(table: &SymbolTable, structure: SymbolId) -> Self {
        let generics = table
            .structure(structure)
            .map(|s| s.type_params.clone())
            .unwrap_or_default();
        Self {
            file: table.symbol(structure).file,
            generics,
        }
    }

    /// Context for the body of `function`: its own parameters, then its owner's.
    pub fn for_function(table: &SymbolTable, function: SymbolId) -> Self {
        let symbol = table.symbol(function);
        let mut generics = symbol
            .as_function()
            .map(|f| f.type_params.clone())
            .unwrap_or_default();
        if let Some(owner) = symbol.parent.and_then(|p| table.structure(p)) {
            generics.extend(owner.type_params.iter().copied());
        }
        Self {
            file: symbol.file,
            generics,
        }
    }
}

/// A member found through [`SymbolTable::find_member`].
#[derive(Debug, Clone, PartialEq)]
pub struct MemberLookup {
    pub symbol: SymbolId,
    /// Instantiation of the structure that declares the member
    pub owner: DataType,
}

impl SymbolTable {
    // ------------------------------------------------------------------------
    // Type expressions
    // ------------------------------------------------------------------------

    /// Resolve a written type.
    pub fn resolve_type(&self, ctx: &TypeContext, expr: &TypeExpr) -> Result<DataType, CheckError> {
        match expr {
            TypeExpr::Slice { inner, .. } => {
                Ok(DataType::Slice(Box::new(self.resolve_type(ctx, inner)?)))
            }
            TypeExpr::Named {
                path,
                type_args,
                span,
            } => {
                let names: Vec<&str> = path.iter().map(|p| p.name.as_str()).collect();
                let display = names.join(".");

                let symbol = if let [name] = names.as_slice() {
                    if let Some(kind) = PrimitiveKind::from_name(name) {
                        return if type_args.is_empty() {
                            Ok(DataType::Primitive(kind))
                        } else {
                            Err(CheckError::WrongTypeArgumentCount {
                                name: display,
                                expected: 0,
                                actual: type_args.len(),
                                span: *span,
                            })
                        };
                    }
                    if let Some(param) = ctx
                        .generics
                        .iter()
                        .copied()
                        .find(|p| self.symbol(*p).name == *name)
                    {
                        return Ok(DataType::TypeParameter(param));
                    }
                    self.find_in_file(ctx.file, name)
                } else {
                    self.find_path(&names)
                };

                let Some(symbol) = symbol else {
                    return Err(CheckError::NotFound {
                        name: display,
                        span: *span,
                    });
                };

                let args = type_args
                    .iter()
                    .map(|arg| self.resolve_type(ctx, arg))
                    .collect::<Result<Vec<_>, _>>()?;

                match &self.symbol(symbol).kind {
                    SymbolKind::Structure(s) if !s.is_module() => {
                        if s.type_params.len() != args.len() {
                            return Err(CheckError::WrongTypeArgumentCount {
                                name: display,
                                expected: s.type_params.len(),
                                actual: args.len(),
                                span: *span,
                            });
                        }
                        Ok(DataType::Structure {
                            symbol,
                            type_args: args,
                        })
                    }
                    SymbolKind::Enum(_) if args.is_empty() => Ok(DataType::Enum(symbol)),
                    _ => Err(CheckError::UnexpectedType {
                        actual: display,
                        reason: "not a type".to_string(),
                        span: *span,
                    }),
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Lazy memo slots
    // ------------------------------------------------------------------------

    /// Resolved supertypes of a structure.
    pub fn structure_header(&self, id: SymbolId) -> Option<&StructureHeader> {
        let structure = self.structure(id)?;
        Some(structure.header.get_or_init(|| self.compute_header(id, structure)))
    }

    fn compute_header(&self, id: SymbolId, structure: &StructureSymbol) -> StructureHeader {
        let ctx = TypeContext::for_structure(self, id);
        let mut header = StructureHeader::default();

        for expr in &structure.supertypes {
            let ty = match self.resolve_type(&ctx, expr) {
                Ok(ty) => ty,
                Err(err) => {
                    header.errors.push(err);
                    continue;
                }
            };
            let Some((symbol, _)) = ty.as_structure() else {
                header.errors.push(CheckError::UnexpectedType {
                    actual: ty.display(self).to_string(),
                    reason: "only classes and protocols can be inherited".to_string(),
                    span: expr.span(),
                });
                continue;
            };
            let Some(parent) = self.structure(symbol) else {
                continue;
            };

            match (structure.kind, parent.kind) {
                (StructureKind::Class, StructureKind::Class) => {
                    if header.ancestor.is_some() {
                        header
                            .errors
                            .push(CheckError::MultipleInheritance { span: expr.span() });
                    } else if !parent.is_inheritable {
                        header.errors.push(CheckError::NotInheritable {
                            name: self.symbol(symbol).name.clone(),
                            span: expr.span(),
                        });
                    } else {
                        header.ancestor = Some(ty);
                    }
                }
                (StructureKind::Class, StructureKind::Protocol) => header.protocols.push(ty),
                _ => header.errors.push(CheckError::UnexpectedType {
                    actual: ty.display(self).to_string(),
                    reason: "only classes can have supertypes".to_string(),
                    span: expr.span(),
                }),
            }
        }
        header
    }

    /// Resolved parameter and return types of a function.
    pub fn signature(&self, id: SymbolId) -> Option<&FunctionSignature> {
        let function = self.function(id)?;
        Some(function.signature.get_or_init(|| self.compute_signature(id, function)))
    }

    fn compute_signature(&self, id: SymbolId, function: &FunctionSymbol) -> FunctionSignature {
        let ctx = TypeContext::for_function(self, id);
        let owner = self.symbol(id).parent;
        let mut errors = Vec::new();

        let params = function
            .params
            .iter()
            .map(|param| match &param.ty {
                Some(expr) => self.resolve_type(&ctx, expr).unwrap_or_else(|err| {
                    errors.push(err);
                    DataType::Unknown
                }),
                None if function.is_constructor => {
                    // typeless constructor parameters initialize the field of the same name
                    let owner_ty = owner.map(|o| self.self_type(o));
                    let field = owner_ty
                        .as_ref()
                        .and_then(|ty| self.find_member(ty, &param.name.name))
                        .filter(|m| self.field(m.symbol).is_some());
                    match field {
                        Some(member) => self.member_field_type(&member),
                        None => {
                            errors.push(CheckError::NotFound {
                                name: param.name.name.clone(),
                                span: param.span,
                            });
                            DataType::Unknown
                        }
                    }
                }
                None => {
                    errors.push(CheckError::MissingTypeAnnotation {
                        name: param.name.name.clone(),
                        span: param.span,
                    });
                    DataType::Unknown
                }
            })
            .collect();

        let return_type = match &function.return_type {
            Some(expr) => self.resolve_type(&ctx, expr).unwrap_or_else(|err| {
                errors.push(err);
                DataType::Unknown
            }),
            None => DataType::VOID,
        };

        FunctionSignature {
            params,
            return_type,
            errors,
        }
    }

    /// Resolved type of a field, in terms of its owner's type parameters.
    pub fn field_type(&self, id: SymbolId) -> Option<&FieldType> {
        let field = self.field(id)?;
        Some(field.ty.get_or_init(|| {
            let symbol = self.symbol(id);
            let ctx = match symbol.parent {
                Some(owner) => TypeContext::for_structure(self, owner),
                None => TypeContext::new(symbol.file),
            };
            match (&field.ty_syntax, field.literal_hint) {
                (Some(expr), _) => match self.resolve_type(&ctx, expr) {
                    Ok(ty) => FieldType {
                        ty,
                        errors: Vec::new(),
                    },
                    Err(err) => FieldType {
                        ty: DataType::Unknown,
                        errors: vec![err],
                    },
                },
                (None, Some(kind)) => FieldType {
                    ty: DataType::Primitive(kind),
                    errors: Vec::new(),
                },
                (None, None) => FieldType {
                    ty: DataType::Unknown,
                    errors: vec![CheckError::MissingTypeAnnotation {
                        name: symbol.name.clone(),
                        span: symbol.span,
                    }],
                },
            }
        }))
    }

    // ------------------------------------------------------------------------
    // Hierarchy
    // ------------------------------------------------------------------------

    /// The structure type as seen from inside its own body (`Box[T]`).
    pub fn self_type(&self, structure: SymbolId) -> DataType {
        DataType::Structure {
            symbol: structure,
            type_args: self
                .structure(structure)
                .map(|s| s.type_params.iter().map(|p| DataType::TypeParameter(*p)).collect())
                .unwrap_or_default(),
        }
    }

    /// Bindings of a structure instantiation's type parameters.
    pub fn bindings_for(&self, ty: &DataType) -> Bindings {
        let mut bindings = Bindings::default();
        if let Some((symbol, args)) = ty.as_structure() {
            if let Some(s) = self.structure(symbol) {
                for (param, arg) in s.type_params.iter().zip(args) {
                    bindings.insert(*param, arg.clone());
                }
            }
        }
        bindings
    }

    /// Bindings of a function's own type parameters.
    pub fn function_bindings(&self, function: SymbolId, type_args: &[DataType]) -> Bindings {
        let mut bindings = Bindings::default();
        if let Some(f) = self.function(function) {
            for (param, arg) in f.type_params.iter().zip(type_args) {
                bindings.insert(*param, arg.clone());
            }
        }
        bindings
    }

    /// Ancestor class of an instantiation, with type arguments applied.
    pub fn ancestor_of(&self, ty: &DataType) -> Option<DataType> {
        let (symbol, _) = ty.as_structure()?;
        let ancestor = self.structure_header(symbol)?.ancestor.as_ref()?;
        Some(ancestor.substitute(&self.bindings_for(ty)))
    }

    /// `ty` followed by its ancestors, nearest first. Stops at a cycle.
    pub fn ancestry(&self, ty: &DataType) -> Vec<DataType> {
        let mut chain = vec![ty.clone()];
        let mut seen = FxHashSet::default();
        if let Some((symbol, _)) = ty.as_structure() {
            seen.insert(symbol);
        }
        let mut current = ty.clone();
        while let Some(next) = self.ancestor_of(&current) {
            let Some((symbol, _)) = next.as_structure() else {
                break;
            };
            if !seen.insert(symbol) {
                break;
            }
            chain.push(next.clone());
            current = next;
        }
        chain
    }

    /// True if the ancestor chain of `structure` leads back to itself.
    pub fn has_inheritance_cycle(&self, structure: SymbolId) -> bool {
        let mut current = self.self_type(structure);
        let mut seen = FxHashSet::default();
        while let Some(next) = self.ancestor_of(&current) {
            let Some((symbol, _)) = next.as_structure() else {
                return false;
            };
            if symbol == structure {
                return true;
            }
            if !seen.insert(symbol) {
                return false;
            }
            current = next;
        }
        false
    }

    /// Every protocol implemented by `ty` or one of its ancestors, in
    /// ancestor-first order without duplicates.
    pub fn protocols_of(&self, ty: &DataType) -> Vec<DataType> {
        let mut protocols: Vec<DataType> = Vec::new();
        for class in self.ancestry(ty).iter().rev() {
            let Some((symbol, _)) = class.as_structure() else {
                continue;
            };
            let Some(header) = self.structure_header(symbol) else {
                continue;
            };
            let bindings = self.bindings_for(class);
            for protocol in &header.protocols {
                let protocol = protocol.substitute(&bindings);
                if !protocols.contains(&protocol) {
                    protocols.push(protocol);
                }
            }
        }
        protocols
    }

    /// True if `class` is `ancestor` or derives from it.
    pub fn is_subclass_of(&self, class: &DataType, ancestor: &DataType) -> bool {
        self.ancestry(class).iter().any(|c| c == ancestor)
    }

    /// Find a member by name: own scope, then the ancestor chain, then
    /// implemented protocols.
    pub fn find_member(&self, owner: &DataType, name: &str) -> Option<MemberLookup> {
        let chain = self.ancestry(owner);
        let in_scope = |ty: &DataType| {
            let (symbol, _) = ty.as_structure()?;
            let found = self.structure(symbol)?.scope.find_symbol(name)?;
            Some(MemberLookup {
                symbol: found,
                owner: ty.clone(),
            })
        };
        chain
            .iter()
            .find_map(in_scope)
            .or_else(|| self.protocols_of(owner).iter().find_map(in_scope))
    }

    /// Type of a looked-up field with the owner's type arguments applied.
    pub fn member_field_type(&self, member: &MemberLookup) -> DataType {
        self.field_type(member.symbol)
            .map(|f| f.ty.substitute(&self.bindings_for(&member.owner)))
            .unwrap_or(DataType::Unknown)
    }

    /// Most-derived implementation of the function named `name` for `class`.
    pub fn find_implementation(&self, class: &DataType, name: &str) -> Option<MemberLookup> {
        self.ancestry(class).iter().find_map(|ty| {
            let (symbol, _) = ty.as_structure()?;
            let found = self.structure(symbol)?.scope.find_symbol(name)?;
            let f = self.function(found)?;
            (!f.is_static && f.has_body).then(|| MemberLookup {
                symbol: found,
                owner: ty.clone(),
            })
        })
    }

    /// Follow `overrides` links to the function that introduced the slot.
    pub fn root_function(&self, function: SymbolId) -> SymbolId {
        let mut current = function;
        let mut steps = 0;
        while let Some(next) = self.function(current).and_then(|f| f.overrides.get()) {
            current = *next;
            steps += 1;
            if steps > self.len() {
                break;
            }
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::checker::binder::Binder;
    use crate::parser::Parser;

    fn bind(source: &str) -> SymbolTable {
        let file = Parser::new(source).unwrap().parse("test.cv").unwrap();
        Binder::new().bind(&[file])
    }

    fn id(table: &SymbolTable, name: &str) -> SymbolId {
        table.find_in_file(FileId(0), name).unwrap()
    }

    #[test]
    fn test_header_and_ancestry() {
        let table = bind(
            "open class A { var a i32; } open class B : A { var b i32; } class C : B, P {} protocol P {}",
        );
        let c = table.self_type(id(&table, "C"));
        let chain = table.ancestry(&c);
        assert_eq!(chain.len(), 3);
        assert_eq!(table.protocols_of(&c).len(), 1);
        assert!(table.is_subclass_of(&c, &table.self_type(id(&table, "A"))));
    }

    #[test]
    fn test_not_inheritable_and_multiple_inheritance() {
        let table = bind("class A {} open class B {} class C : A {} class D : B, B {}");
        let header = table.structure_header(id(&table, "C")).unwrap();
        assert!(matches!(header.errors[0], CheckError::NotInheritable { .. }));
        let header = table.structure_header(id(&table, "D")).unwrap();
        assert!(matches!(header.errors[0], CheckError::MultipleInheritance { .. }));
    }

    #[test]
    fn test_generic_member_lookup_substitutes() {
        let table = bind("open class Base[T] { var item T; } class Child : Base[i64] {}");
        let child = table.self_type(id(&table, "Child"));
        let member = table.find_member(&child, "item").unwrap();
        assert_eq!(
            table.member_field_type(&member),
            DataType::Primitive(PrimitiveKind::I64)
        );
    }

    #[test]
    fn test_constructor_signature_uses_field_types() {
        let table = bind("class A { var legs i64; init(legs, extra bool) {} }");
        let init = table.structure(id(&table, "A")).unwrap().init.unwrap();
        let sig = table.signature(init).unwrap();
        assert!(sig.errors.is_empty());
        assert_eq!(sig.params[0], DataType::Primitive(PrimitiveKind::I64));
        assert_eq!(sig.params[1], DataType::BOOL);
        assert!(sig.return_type.is_void());
    }

    #[test]
    fn test_cycle_detection() {
        let table = bind("open class A : B {} open class B : A {}");
        assert!(table.has_inheritance_cycle(id(&table, "A")));
        assert!(table.ancestry(&table.self_type(id(&table, "A"))).len() <= 2);
    }
}
