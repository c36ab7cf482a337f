//! Binding and semantic analysis
//!
//! The binder builds one [`SymbolTable`] for a whole compilation. Each file
//! is then analysed independently into a [`SemanticTree`]; analysers share
//! the table read-only and may run on parallel threads.

pub mod symbols;
pub mod binder;
pub mod resolve;
pub mod error;
pub mod diagnostic;
pub mod semantic;
pub mod analyser;

pub use analyser::{Analyser, Recovery};
pub use binder::Binder;
pub use diagnostic::{emit_to_string, error_code, Diagnostic, Diagnostics};
pub use error::{CheckError, Severity};
pub use resolve::{MemberLookup, TypeContext};
pub use semantic::{
    LocalId, LocalInfo, NodeId, NodeKind, ParentIndex, SemBaseCall, SemBlock, SemBody, SemExpr,
    SemExprKind, SemField, SemFunction, SemStmt, SemStructure, SemanticDeclaration, SemanticTree,
};
pub use symbols::{FileId, StructureKind, Symbol, SymbolId, SymbolKind, SymbolTable};
