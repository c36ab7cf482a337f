//! Name binding
//!
//! Builds the symbol table and scope graph for every file of a compilation
//! before any analysis runs: namespace scopes, file scopes, structure scopes
//! and type parameters. Types are not resolved here; symbols keep the syntax
//! they need and resolve it lazily (see `resolve`).

use once_cell::sync::OnceCell;
use std::sync::atomic::AtomicBool;

use super::symbols::*;
use crate::parser::ast::{
    self, Decl, EnumDecl, Expr, FieldDecl, FunctionDecl, Ident, InitDecl, Literal, SourceFile,
    StructureDecl, UnaryOp, Visibility,
};
use crate::parser::types::{PrimitiveKind, FLOAT_LITERAL, INT_LITERAL};

/// Binder for a whole compilation.
pub struct Binder {
    table: SymbolTable,
}

impl Binder {
    pub fn new() -> Self {
        Self {
            table: SymbolTable::new(),
        }
    }

    /// Bind all files. File `i` becomes `FileId(i)`.
    pub fn bind(mut self, files: &[SourceFile]) -> SymbolTable {
        for (index, file) in files.iter().enumerate() {
            let file_id = FileId(index as u32);
            self.table.add_file(FileScope {
                file: file_id,
                path: file.path.clone(),
                namespace: file.namespace_path(),
                imports: file
                    .imports
                    .iter()
                    .map(|path| {
                        let span = path
                            .first()
                            .zip(path.last())
                            .map(|(a, b)| a.span.merge(&b.span))
                            .unwrap_or_default();
                        (ast::join_path(path), span)
                    })
                    .collect(),
            });
        }

        for (index, file) in files.iter().enumerate() {
            let file_id = FileId(index as u32);
            let namespace = file.namespace_path();
            for decl in &file.declarations {
                self.bind_declaration(file_id, &namespace, decl);
            }
        }

        tracing::trace!(symbols = self.table.len(), files = files.len(), "bound compilation");
        self.table
    }

    fn bind_declaration(&mut self, file: FileId, namespace: &str, decl: &Decl) {
        let id = match decl {
            Decl::Function(f) => self.bind_function(file, namespace, None, f, true),
            Decl::Class(s) => self.bind_structure(file, namespace, StructureKind::Class, s),
            Decl::Protocol(s) => self.bind_structure(file, namespace, StructureKind::Protocol, s),
            Decl::Module(s) => self.bind_structure(file, namespace, StructureKind::Module, s),
            Decl::Enum(e) => self.bind_enum(file, namespace, e),
        };

        let name = decl.name();
        if let Err(original) = self.table.namespace_mut(namespace).declare(&name.name, id) {
            self.duplicate(file, name, original);
        }
    }

    fn duplicate(&mut self, file: FileId, name: &Ident, original: SymbolId) {
        self.table.record_duplicate(Duplicate {
            name: name.name.clone(),
            file,
            span: name.span,
            original,
        });
    }

    fn new_symbol(
        &mut self,
        file: FileId,
        namespace: &str,
        parent: Option<SymbolId>,
        name: &Ident,
        visibility: Visibility,
        attributes: &[ast::Attribute],
        kind: SymbolKind,
    ) -> SymbolId {
        self.table.add_symbol(Symbol {
            name: name.name.clone(),
            kind,
            file,
            namespace: namespace.to_string(),
            parent,
            visibility,
            attributes: attributes.iter().map(|a| a.name.name.clone()).collect(),
            span: name.span,
            declaration: OnceCell::new(),
        })
    }

    fn bind_type_params(
        &mut self,
        file: FileId,
        namespace: &str,
        owner: SymbolId,
        params: &[Ident],
    ) -> Vec<SymbolId> {
        params
            .iter()
            .enumerate()
            .map(|(index, param)| {
                self.new_symbol(
                    file,
                    namespace,
                    Some(owner),
                    param,
                    Visibility::Private,
                    &[],
                    SymbolKind::TypeParameter(TypeParameterSymbol { owner, index }),
                )
            })
            .collect()
    }

    fn bind_structure(
        &mut self,
        file: FileId,
        namespace: &str,
        kind: StructureKind,
        decl: &StructureDecl,
    ) -> SymbolId {
        let id = self.new_symbol(
            file,
            namespace,
            None,
            &decl.name,
            decl.visibility,
            &decl.attributes,
            SymbolKind::Structure(StructureSymbol {
                kind,
                type_params: Vec::new(),
                scope: StructureScope::default(),
                fields: Vec::new(),
                functions: Vec::new(),
                init: None,
                is_inheritable: decl.is_inheritable,
                supertypes: decl.supertypes.clone(),
                header: OnceCell::new(),
            }),
        );

        let type_params = self.bind_type_params(file, namespace, id, &decl.type_params);

        let mut scope = StructureScope::default();
        let mut fields = Vec::new();
        let mut functions = Vec::new();

        for field in &decl.fields {
            let field_id = self.bind_field(file, namespace, id, field);
            match scope.declare(&field.name.name, field_id) {
                Ok(()) => fields.push(field_id),
                Err(original) => self.duplicate(file, &field.name, original),
            }
        }
        for function in &decl.functions {
            let function_id = self.bind_function(file, namespace, Some(id), function, false);
            match scope.declare(&function.name.name, function_id) {
                Ok(()) => functions.push(function_id),
                Err(original) => self.duplicate(file, &function.name, original),
            }
        }
        let init = decl
            .init
            .as_ref()
            .map(|init| self.bind_init(file, namespace, id, init));

        if let SymbolKind::Structure(s) = &mut self.table.symbol_mut(id).kind {
            s.type_params = type_params;
            s.scope = scope;
            s.fields = fields;
            s.functions = functions;
            s.init = init;
        }
        id
    }

    fn bind_function(
        &mut self,
        file: FileId,
        namespace: &str,
        owner: Option<SymbolId>,
        decl: &FunctionDecl,
        top_level: bool,
    ) -> SymbolId {
        let id = self.new_symbol(
            file,
            namespace,
            owner,
            &decl.name,
            decl.visibility,
            &decl.attributes,
            SymbolKind::Function(FunctionSymbol {
                type_params: Vec::new(),
                params: decl.params.clone(),
                return_type: decl.return_type.clone(),
                is_static: decl.is_static || top_level,
                is_override: decl.is_override,
                is_constructor: false,
                has_body: decl.body.is_some(),
                is_virtual: AtomicBool::new(false),
                overrides: OnceCell::new(),
                signature: OnceCell::new(),
            }),
        );
        let type_params = self.bind_type_params(file, namespace, id, &decl.type_params);
        if let SymbolKind::Function(f) = &mut self.table.symbol_mut(id).kind {
            f.type_params = type_params;
        }
        id
    }

    fn bind_init(
        &mut self,
        file: FileId,
        namespace: &str,
        owner: SymbolId,
        decl: &InitDecl,
    ) -> SymbolId {
        self.new_symbol(
            file,
            namespace,
            Some(owner),
            &Ident::new("init", decl.span),
            decl.visibility,
            &[],
            SymbolKind::Function(FunctionSymbol {
                type_params: Vec::new(),
                params: decl.params.clone(),
                return_type: None,
                is_static: false,
                is_override: false,
                is_constructor: true,
                has_body: true,
                is_virtual: AtomicBool::new(false),
                overrides: OnceCell::new(),
                signature: OnceCell::new(),
            }),
        )
    }

    fn bind_field(
        &mut self,
        file: FileId,
        namespace: &str,
        owner: SymbolId,
        decl: &FieldDecl,
    ) -> SymbolId {
        let is_module_member = self
            .table
            .structure(owner)
            .is_some_and(StructureSymbol::is_module);
        self.new_symbol(
            file,
            namespace,
            Some(owner),
            &decl.name,
            decl.visibility,
            &decl.attributes,
            SymbolKind::Field(FieldSymbol {
                ty_syntax: decl.ty.clone(),
                literal_hint: decl.initializer.as_ref().and_then(literal_kind),
                is_static: decl.is_static || is_module_member,
                is_mutable: decl.is_mutable,
                has_getter: decl.getter.is_some(),
                has_setter: decl.setter.is_some(),
                has_initializer: decl.initializer.is_some(),
                ty: OnceCell::new(),
            }),
        )
    }

    fn bind_enum(&mut self, file: FileId, namespace: &str, decl: &EnumDecl) -> SymbolId {
        self.new_symbol(
            file,
            namespace,
            None,
            &decl.name,
            decl.visibility,
            &[],
            SymbolKind::Enum(EnumSymbol {
                variants: decl.variants.iter().map(|v| v.name.clone()).collect(),
            }),
        )
    }
}

/// Primitive type of a literal (or negated literal) initializer.
fn literal_kind(expr: &Expr) -> Option<PrimitiveKind> {
    match expr {
        Expr::Literal { value, .. } => Some(match value {
            Literal::Int(_) => INT_LITERAL,
            Literal::Float(_) => FLOAT_LITERAL,
            Literal::Bool(_) => PrimitiveKind::Bool,
        }),
        Expr::Unary {
            op: UnaryOp::Negate,
            operand,
            ..
        } => literal_kind(operand).filter(|k| k.is_numeric()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn bind(sources: &[(&str, &str)]) -> SymbolTable {
        let files: Vec<_> = sources
            .iter()
            .map(|(path, src)| Parser::new(src).unwrap().parse(*path).unwrap())
            .collect();
        Binder::new().bind(&files)
    }

    #[test]
    fn test_namespaces_and_imports() {
        let table = bind(&[
            ("a.cv", "namespace app.models; class Box[T] { var x T; }"),
            ("b.cv", "namespace app; use app.models; fn main() {}"),
        ]);
        let boxed = table.find_in_file(FileId(1), "Box").unwrap();
        assert_eq!(table.symbol(boxed).name, "Box");
        assert_eq!(table.find_path(&["app", "models", "Box"]), Some(boxed));
        assert!(table.find_in_file(FileId(0), "main").is_none());
        assert_eq!(table.qualified_name(boxed), "app.models.Box");

        let s = table.structure(boxed).unwrap();
        assert_eq!(s.type_params.len(), 1);
        assert_eq!(s.fields.len(), 1);
    }

    #[test]
    fn test_duplicates_are_recorded() {
        let table = bind(&[
            ("a.cv", "class A { var x i32; fn x() {} }"),
            ("b.cv", "class A {}"),
        ]);
        let names: Vec<_> = table.duplicates().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["x", "A"]);
        assert_eq!(table.duplicates()[1].file, FileId(1));
    }

    #[test]
    fn test_module_members_are_static() {
        let table = bind(&[("a.cv", "module M { var x = 1; fn f() {} }")]);
        let m = table.find_in_file(FileId(0), "M").unwrap();
        let s = table.structure(m).unwrap();
        let field = table.field(s.fields[0]).unwrap();
        assert!(field.is_static);
        assert_eq!(field.literal_hint, Some(PrimitiveKind::I32));
        assert!(table.function(s.functions[0]).unwrap().is_static);
    }
}
