//! Corvid front end and semantic analysis.
//!
//! Lexing and parsing produce an immutable [`ast::SourceFile`] per file. The
//! binder builds the shared symbol/scope graph for a whole compilation and
//! the analyser turns each file into a typed semantic tree.

pub mod token;
pub mod lexer;
pub mod ast;
pub mod parser;

// Data types shared by the checker and the lowering stage
pub mod types;

// Binder, symbol table and analyser
pub mod checker;

// Re-exports for convenience
pub use token::{Span, Token};
pub use lexer::{LexError, Lexer};
pub use parser::{ParseError, Parser};
pub use types::{DataType, Equivalence, PrimitiveKind};
pub use checker::{Analyser, CheckError, Diagnostics, SemanticTree, Severity, SymbolId, SymbolTable};
