//! Semantic analyser
//!
//! Walks one syntax tree, resolves every name to a symbol or local, checks
//! and derives types, and produces the file's [`SemanticTree`]. Errors are
//! reported to a [`Diagnostics`] sink; a malformed subtree aborts only the
//! enclosing statement or declaration through the [`Recovery`] marker.

mod decl;
mod expr;
mod stmt;

use rustc_hash::FxHashMap;

use super::diagnostic::Diagnostics;
use super::error::CheckError;
use super::resolve::TypeContext;
use super::semantic::*;
use super::symbols::{FileId, SymbolId, SymbolTable};
use crate::parser::ast::{Decl, SourceFile, TypeExpr};
use crate::parser::token::Span;
use crate::parser::types::DataType;

/// Raised after a diagnostic has been reported; caught at statement and
/// declaration granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recovery;

pub(crate) type Check<T> = Result<T, Recovery>;

/// State of the body (function, accessor or initializer) being analysed.
struct BodyContext {
    /// No `self` available
    is_static: bool,
    is_constructor: bool,
    return_type: DataType,
    locals: Vec<LocalInfo>,
    scopes: Vec<FxHashMap<String, LocalId>>,
    types: TypeContext,
}

impl BodyContext {
    fn new(types: TypeContext, is_static: bool, return_type: DataType) -> Self {
        Self {
            is_static,
            is_constructor: false,
            return_type,
            locals: Vec::new(),
            scopes: vec![FxHashMap::default()],
            types,
        }
    }
}

/// Semantic analyser for one file.
pub struct Analyser<'a> {
    table: &'a SymbolTable,
    file: FileId,
    diagnostics: &'a mut Diagnostics,
    next_node: u32,
    /// Enclosing structure declaration
    structure: Option<SymbolId>,
    body: Option<BodyContext>,
}

impl<'a> Analyser<'a> {
    pub fn new(table: &'a SymbolTable, file: FileId, diagnostics: &'a mut Diagnostics) -> Self {
        Self {
            table,
            file,
            diagnostics,
            next_node: 0,
            structure: None,
            body: None,
        }
    }

    /// Analyse `source` and return its semantic tree.
    ///
    /// Each analysed declaration is also recorded on its symbol.
    pub fn analyse(mut self, source: &SourceFile) -> SemanticTree {
        tracing::trace!(file = %source.path, "analysing");
        self.report_binding_problems();

        let namespace = source.namespace_path();
        let mut declarations = Vec::new();
        for decl in &source.declarations {
            let Some(symbol) = self.declared_symbol(&namespace, decl) else {
                continue;
            };
            let analysed = match decl {
                Decl::Function(f) => self
                    .analyse_function(symbol, f)
                    .map(SemanticDeclaration::Function),
                Decl::Class(s) | Decl::Protocol(s) | Decl::Module(s) => self
                    .analyse_structure(symbol, s)
                    .map(SemanticDeclaration::Structure),
                Decl::Enum(_) => None,
            };
            if let Some(decl) = analysed {
                declarations.push(decl);
            }
        }

        for decl in &declarations {
            self.record_declaration(decl);
        }

        let parents = ParentIndex::build(&declarations);
        SemanticTree {
            file: self.file,
            path: source.path.clone(),
            declarations,
            parents,
        }
    }

    /// The symbol bound to a top-level declaration, unless it was a duplicate.
    fn declared_symbol(&self, namespace: &str, decl: &Decl) -> Option<SymbolId> {
        let name = decl.name();
        let id = self.table.namespace(namespace)?.find_symbol(&name.name)?;
        let symbol = self.table.symbol(id);
        (symbol.file == self.file && symbol.span == name.span).then_some(id)
    }

    /// The member symbol bound to a member name, unless it was a duplicate.
    fn member_symbol(&self, owner: SymbolId, name: &str, span: Span) -> Option<SymbolId> {
        let id = self.table.structure(owner)?.scope.find_symbol(name)?;
        (self.table.symbol(id).span == span).then_some(id)
    }

    fn record_declaration(&self, decl: &SemanticDeclaration) {
        // first visit wins; a second set can only come from a duplicate
        let _ = self.table.symbol(decl.symbol()).declaration.set(decl.clone());
        if let SemanticDeclaration::Structure(s) = decl {
            for field in &s.fields {
                let _ = self
                    .table
                    .symbol(field.symbol)
                    .declaration
                    .set(SemanticDeclaration::Field(field.clone()));
            }
            for function in s.functions.iter().chain(s.init.iter()) {
                let _ = self
                    .table
                    .symbol(function.symbol)
                    .declaration
                    .set(SemanticDeclaration::Function(function.clone()));
            }
        }
    }

    fn report_binding_problems(&mut self) {
        let table = self.table;
        let file = self.file;
        for dup in table.duplicates().iter().filter(|d| d.file == file) {
            self.report(CheckError::DuplicateSymbol {
                name: dup.name.clone(),
                span: dup.span,
                original: table.symbol(dup.original).span,
            });
        }
        for (import, span) in &table.file_scope(file).imports {
            if !table.has_namespace(import) {
                self.report(CheckError::NotFound {
                    name: import.clone(),
                    span: *span,
                });
            }
        }
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    pub(crate) fn report(&mut self, error: CheckError) {
        self.diagnostics.report(self.file, error);
    }

    /// Report and return the recovery marker.
    pub(crate) fn fail<T>(&mut self, error: CheckError) -> Check<T> {
        self.report(error);
        Err(Recovery)
    }

    fn report_all(&mut self, errors: &[CheckError]) {
        for error in errors {
            self.report(error.clone());
        }
    }

    pub(crate) fn next_id(&mut self) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        id
    }

    pub(crate) fn display(&self, ty: &DataType) -> String {
        ty.display(self.table).to_string()
    }

    /// Resolve a written type in the current context.
    pub(crate) fn resolve_type(&mut self, expr: &TypeExpr) -> Check<DataType> {
        let ctx = match &self.body {
            Some(body) => body.types.clone(),
            None => match self.structure {
                Some(s) => TypeContext::for_structure(self.table, s),
                None => TypeContext::new(self.file),
            },
        };
        match self.table.resolve_type(&ctx, expr) {
            Ok(ty) => Ok(ty),
            Err(err) => self.fail(err),
        }
    }

    /// Run `f` inside a fresh body context; returns its result and the
    /// locals the body declared.
    fn with_body<T>(
        &mut self,
        body: BodyContext,
        f: impl FnOnce(&mut Self) -> T,
    ) -> (T, Vec<LocalInfo>) {
        let previous = self.body.replace(body);
        let result = f(self);
        let finished = std::mem::replace(&mut self.body, previous);
        (result, finished.map(|b| b.locals).unwrap_or_default())
    }

    pub(crate) fn push_scope(&mut self) {
        if let Some(body) = self.body.as_mut() {
            body.scopes.push(FxHashMap::default());
        }
    }

    pub(crate) fn pop_scope(&mut self) {
        if let Some(body) = self.body.as_mut() {
            body.scopes.pop();
        }
    }

    pub(crate) fn return_type(&self) -> DataType {
        self.body
            .as_ref()
            .map(|b| b.return_type.clone())
            .unwrap_or(DataType::VOID)
    }

    /// Declare a local in the innermost scope.
    pub(crate) fn declare_local(&mut self, info: LocalInfo) -> Check<LocalId> {
        let Some(body) = self.body.as_mut() else {
            return Err(Recovery);
        };
        let id = LocalId(body.locals.len() as u32);
        let name = info.name.clone();
        let span = info.span;

        if let Some(existing) = body.scopes.last().and_then(|s| s.get(&name)).copied() {
            let original = body.locals[existing.0 as usize].span;
            return self.fail(CheckError::DuplicateSymbol {
                name,
                span,
                original,
            });
        }

        body.locals.push(info);
        if let Some(scope) = body.scopes.last_mut() {
            scope.insert(name, id);
        }
        Ok(id)
    }

    pub(crate) fn find_local(&self, name: &str) -> Option<(LocalId, &LocalInfo)> {
        let body = self.body.as_ref()?;
        body.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
            .map(|id| (id, &body.locals[id.0 as usize]))
    }

    /// Type of `self` in the current context, if any.
    pub(crate) fn self_type(&self) -> Option<DataType> {
        let structure = self.structure?;
        let body = self.body.as_ref()?;
        if body.is_static || self.table.structure(structure)?.is_module() {
            return None;
        }
        Some(self.table.self_type(structure))
    }

    pub(crate) fn in_constructor(&self) -> bool {
        self.body.as_ref().is_some_and(|b| b.is_constructor)
    }
}

#[cfg(test)]
mod tests;
