//! Compiler errors
//!
//! [`LowerError`] is an internal invariant violation of the lowering stage:
//! lowering only runs on diagnostic-free semantic trees, so every variant
//! points at a bug or at lowering being invoked on a broken program.
//! [`CompileError`] is what the driver returns.

use thiserror::Error;

use crate::compiler::ir::PlaceholderId;
use crate::parser::ParseError;

/// Errors raised while lowering
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LowerError {
    /// A type parameter reached lowering without a binding
    #[error("type parameter '{0}' is not bound")]
    UnboundTypeParameter(String),

    /// A type with no lowered representation
    #[error("type '{0}' cannot be lowered")]
    UnsupportedType(String),

    /// A symbol whose declaration was never analysed
    #[error("no analysed declaration for '{0}'")]
    MissingDeclaration(String),

    /// No implementation for a virtual slot
    #[error("'{class}' has no implementation of '{function}'")]
    MissingImplementation { class: String, function: String },

    /// A virtual function with no slot in the receiver's vtable
    #[error("'{function}' has no vtable slot in '{class}'")]
    MissingSlot { class: String, function: String },

    /// A vtable placeholder survived the fix-up pass
    #[error("vtable placeholder {0} was never resolved")]
    UnresolvedPlaceholder(PlaceholderId),

    /// A semantic node that cannot appear in a checked tree
    #[error("unexpected {0} in a checked tree")]
    Unexpected(String),
}

/// Result type for lowering
pub type LowerResult<T> = Result<T, LowerError>;

/// Errors returned by [`Compilation`](crate::compiler::Compilation)
#[derive(Debug, Error)]
pub enum CompileError {
    /// A source file failed to parse
    #[error("{} parse error(s) in {path}", errors.len())]
    Parse {
        path: String,
        errors: Vec<ParseError>,
    },

    /// Lowering was requested for a program with errors
    #[error("compilation has {0} error(s)")]
    HasErrors(usize),

    /// Lowering was requested before checking
    #[error("sources have not been checked")]
    NotChecked,

    /// A worker thread panicked
    #[error("worker thread panicked")]
    WorkerPanicked,

    /// Lowering failed
    #[error(transparent)]
    Lower(#[from] LowerError),
}

/// Result type for the driver
pub type CompileResult<T> = Result<T, CompileError>;
