//! Symbol table for name resolution
//!
//! The table is an arena of [`Symbol`]s built once by the binder and shared
//! read-only by every analyser and lowerer afterwards. The only mutation after
//! binding goes through once-set memo slots (`OnceCell`) and the atomic
//! `is_virtual` flag, so concurrent first resolution of a symbol is idempotent.

use once_cell::sync::OnceCell;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

use super::error::CheckError;
use super::semantic::SemanticDeclaration;
use crate::parser::ast::{Param, TypeExpr, Visibility, FOREIGN_ATTRIBUTE};
use crate::parser::token::Span;
use crate::parser::types::{DataType, PrimitiveKind};

/// Index of a symbol in the [`SymbolTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolId(pub u32);

/// Index of a source file in the compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(pub u32);

impl FileId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Symbol information
#[derive(Debug)]
pub struct Symbol {
    /// Symbol name
    pub name: String,
    /// Symbol kind and kind-specific data
    pub kind: SymbolKind,
    /// File that declares the symbol
    pub file: FileId,
    /// Dotted namespace of the declaring file
    pub namespace: String,
    /// Owning structure for members, owning declaration for type parameters
    pub parent: Option<SymbolId>,
    pub visibility: Visibility,
    /// Attribute names without the `@`
    pub attributes: Vec<String>,
    /// Location of the declared name
    pub span: Span,
    /// Set at most once, the first time the analyser visits the declaration
    pub declaration: OnceCell<SemanticDeclaration>,
}

impl Symbol {
    pub fn is_foreign(&self) -> bool {
        self.attributes.iter().any(|a| a == FOREIGN_ATTRIBUTE)
    }

    pub fn as_structure(&self) -> Option<&StructureSymbol> {
        match &self.kind {
            SymbolKind::Structure(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionSymbol> {
        match &self.kind {
            SymbolKind::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_field(&self) -> Option<&FieldSymbol> {
        match &self.kind {
            SymbolKind::Field(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumSymbol> {
        match &self.kind {
            SymbolKind::Enum(e) => Some(e),
            _ => None,
        }
    }
}

/// Symbol kind
#[derive(Debug)]
pub enum SymbolKind {
    Structure(StructureSymbol),
    Function(FunctionSymbol),
    Field(FieldSymbol),
    TypeParameter(TypeParameterSymbol),
    Enum(EnumSymbol),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructureKind {
    Class,
    Protocol,
    Module,
}

/// A class, protocol or module.
#[derive(Debug)]
pub struct StructureSymbol {
    pub kind: StructureKind,
    pub type_params: Vec<SymbolId>,
    /// Member lookup by name
    pub scope: StructureScope,
    /// Own fields in declaration order
    pub fields: Vec<SymbolId>,
    /// Own functions in declaration order
    pub functions: Vec<SymbolId>,
    /// Constructor, if declared
    pub init: Option<SymbolId>,
    /// Declared `open`
    pub is_inheritable: bool,
    /// Supertype syntax, resolved lazily into `header`
    pub supertypes: Vec<TypeExpr>,
    pub header: OnceCell<StructureHeader>,
}

impl StructureSymbol {
    pub fn is_class(&self) -> bool {
        self.kind == StructureKind::Class
    }

    pub fn is_protocol(&self) -> bool {
        self.kind == StructureKind::Protocol
    }

    pub fn is_module(&self) -> bool {
        self.kind == StructureKind::Module
    }
}

/// Resolved supertypes of a structure, in terms of its own type parameters.
#[derive(Debug, Clone, Default)]
pub struct StructureHeader {
    /// The single ancestor class
    pub ancestor: Option<DataType>,
    /// Directly implemented protocols
    pub protocols: Vec<DataType>,
    /// Problems found while resolving; reported by the declaring file
    pub errors: Vec<CheckError>,
}

/// A function, method or constructor.
#[derive(Debug)]
pub struct FunctionSymbol {
    pub type_params: Vec<SymbolId>,
    pub params: Vec<Param>,
    pub return_type: Option<TypeExpr>,
    pub is_static: bool,
    pub is_override: bool,
    pub is_constructor: bool,
    pub has_body: bool,
    /// Set when the function is overridden or declared in a protocol
    pub is_virtual: AtomicBool,
    /// The ancestor function this one overrides
    pub overrides: OnceCell<SymbolId>,
    pub signature: OnceCell<FunctionSignature>,
}

impl FunctionSymbol {
    pub fn is_virtual(&self) -> bool {
        self.is_virtual.load(Ordering::Acquire)
    }

    pub fn mark_virtual(&self) {
        self.is_virtual.store(true, Ordering::Release);
    }

    pub fn is_generic(&self) -> bool {
        !self.type_params.is_empty()
    }
}

/// Resolved parameter and return types.
#[derive(Debug, Clone)]
pub struct FunctionSignature {
    pub params: Vec<DataType>,
    pub return_type: DataType,
    pub errors: Vec<CheckError>,
}

/// A field of a class or module.
#[derive(Debug)]
pub struct FieldSymbol {
    pub ty_syntax: Option<TypeExpr>,
    /// Type of a literal initializer, used when no type is written
    pub literal_hint: Option<PrimitiveKind>,
    pub is_static: bool,
    pub is_mutable: bool,
    pub has_getter: bool,
    pub has_setter: bool,
    pub has_initializer: bool,
    pub ty: OnceCell<FieldType>,
}

impl FieldSymbol {
    /// Fields with accessors have no storage.
    pub fn is_computed(&self) -> bool {
        self.has_getter || self.has_setter
    }

    /// Static storage initialized by a non-literal expression on first read.
    pub fn is_lazy(&self) -> bool {
        self.is_static && !self.is_computed() && self.has_initializer && self.literal_hint.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct FieldType {
    pub ty: DataType,
    pub errors: Vec<CheckError>,
}

/// A generic type parameter.
#[derive(Debug)]
pub struct TypeParameterSymbol {
    /// Declaring structure or function
    pub owner: SymbolId,
    /// Position in the owner's parameter list
    pub index: usize,
}

#[derive(Debug)]
pub struct EnumSymbol {
    pub variants: Vec<String>,
}

impl EnumSymbol {
    pub fn variant_index(&self, name: &str) -> Option<usize> {
        self.variants.iter().position(|v| v == name)
    }
}

// ============================================================================
// Scopes
// ============================================================================

/// Top-level symbols of one namespace, across all files that declare it.
#[derive(Debug, Default)]
pub struct NamespaceScope {
    pub name: String,
    symbols: FxHashMap<String, SymbolId>,
}

impl NamespaceScope {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbols: FxHashMap::default(),
        }
    }

    pub fn find_symbol(&self, name: &str) -> Option<SymbolId> {
        self.symbols.get(name).copied()
    }

    /// Insert unless present; returns the existing symbol on conflict.
    pub(crate) fn declare(&mut self, name: &str, id: SymbolId) -> Result<(), SymbolId> {
        match self.symbols.get(name) {
            Some(existing) => Err(*existing),
            None => {
                self.symbols.insert(name.to_string(), id);
                Ok(())
            }
        }
    }

    pub fn symbols(&self) -> impl Iterator<Item = (&str, SymbolId)> {
        self.symbols.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Per-file scope: the file's own namespace plus its imports.
#[derive(Debug, Clone)]
pub struct FileScope {
    pub file: FileId,
    pub path: String,
    pub namespace: String,
    /// Imported namespaces with the span of their `use` directive
    pub imports: Vec<(String, Span)>,
}

/// Members of a structure.
#[derive(Debug, Default)]
pub struct StructureScope {
    members: FxHashMap<String, SymbolId>,
}

impl StructureScope {
    pub fn find_symbol(&self, name: &str) -> Option<SymbolId> {
        self.members.get(name).copied()
    }

    pub(crate) fn declare(&mut self, name: &str, id: SymbolId) -> Result<(), SymbolId> {
        match self.members.get(name) {
            Some(existing) => Err(*existing),
            None => {
                self.members.insert(name.to_string(), id);
                Ok(())
            }
        }
    }
}

/// A second declaration of a name already declared in the same scope.
#[derive(Debug, Clone)]
pub struct Duplicate {
    pub name: String,
    pub file: FileId,
    pub span: Span,
    pub original: SymbolId,
}

// ============================================================================
// Symbol table
// ============================================================================

/// Arena of all symbols in a compilation plus the scope graph.
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    namespaces: FxHashMap<String, NamespaceScope>,
    files: Vec<FileScope>,
    duplicates: Vec<Duplicate>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = SymbolId> {
        (0..self.symbols.len() as u32).map(SymbolId)
    }

    pub fn structure(&self, id: SymbolId) -> Option<&StructureSymbol> {
        self.symbol(id).as_structure()
    }

    pub fn function(&self, id: SymbolId) -> Option<&FunctionSymbol> {
        self.symbol(id).as_function()
    }

    pub fn field(&self, id: SymbolId) -> Option<&FieldSymbol> {
        self.symbol(id).as_field()
    }

    pub fn namespace(&self, name: &str) -> Option<&NamespaceScope> {
        self.namespaces.get(name)
    }

    pub fn file_scope(&self, file: FileId) -> &FileScope {
        &self.files[file.index()]
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Duplicate declarations found while binding.
    pub fn duplicates(&self) -> &[Duplicate] {
        &self.duplicates
    }

    /// Look up a bare name from a file: own namespace first, then imports
    /// in order, then the root namespace.
    pub fn find_in_file(&self, file: FileId, name: &str) -> Option<SymbolId> {
        let scope = self.file_scope(file);
        std::iter::once(scope.namespace.as_str())
            .chain(scope.imports.iter().map(|(ns, _)| ns.as_str()))
            .chain(std::iter::once(""))
            .filter_map(|ns| self.namespaces.get(ns))
            .find_map(|ns| ns.find_symbol(name))
    }

    /// Resolve a namespace-qualified path such as `app.models.Box`.
    pub fn find_path(&self, path: &[&str]) -> Option<SymbolId> {
        let (name, prefix) = path.split_last()?;
        self.namespaces.get(&prefix.join("."))?.find_symbol(name)
    }

    /// True if `name` is a declared namespace.
    pub fn has_namespace(&self, name: &str) -> bool {
        self.namespaces.contains_key(name)
    }

    /// True if `name` is a namespace or a leading part of one (`app` for `app.models`).
    pub fn is_namespace_prefix(&self, name: &str) -> bool {
        !name.is_empty()
            && self.namespaces.keys().any(|ns| {
                ns == name || (ns.starts_with(name) && ns[name.len()..].starts_with('.'))
            })
    }

    /// Name of a symbol qualified by its namespace and owners, e.g. `app.Box.Get`.
    pub fn qualified_name(&self, id: SymbolId) -> String {
        let symbol = self.symbol(id);
        let mut parts = vec![symbol.name.as_str()];
        let mut parent = symbol.parent;
        while let Some(p) = parent {
            let owner = self.symbol(p);
            parts.push(owner.name.as_str());
            parent = owner.parent;
        }
        if !symbol.namespace.is_empty() {
            parts.push(symbol.namespace.as_str());
        }
        parts.reverse();
        parts.join(".")
    }

    // ------------------------------------------------------------------------
    // Construction (binder only)
    // ------------------------------------------------------------------------

    pub(crate) fn add_symbol(&mut self, symbol: Symbol) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(symbol);
        id
    }

    pub(crate) fn symbol_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.0 as usize]
    }

    pub(crate) fn add_file(&mut self, scope: FileScope) {
        self.namespaces
            .entry(scope.namespace.clone())
            .or_insert_with(|| NamespaceScope::new(scope.namespace.clone()));
        self.files.push(scope);
    }

    pub(crate) fn namespace_mut(&mut self, name: &str) -> &mut NamespaceScope {
        self.namespaces
            .entry(name.to_string())
            .or_insert_with(|| NamespaceScope::new(name))
    }

    pub(crate) fn record_duplicate(&mut self, duplicate: Duplicate) {
        self.duplicates.push(duplicate);
    }
}
