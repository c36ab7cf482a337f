//! Corvid Language Engine
//!
//! The middle of the Corvid ahead-of-time compiler:
//! - **Parser**: lexer, parser, binder and semantic analyser (`parser` module)
//! - **Compiler**: lowered IR, monomorphization and the lowering pass (`compiler` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use corvid_engine::{Compilation, CompileOptions};
//!
//! let mut compilation = Compilation::new(CompileOptions::default());
//! compilation.add_source("main.cv", "fn main() i32 { return 42; }");
//! compilation.check()?;
//! let program = compilation.lower()?;
//! for file in &program.files {
//!     println!("{}", file.pretty_print());
//! }
//! ```

#![warn(rust_2018_idioms)]
#![allow(clippy::new_without_default)]
#![allow(clippy::result_large_err)]

// ============================================================================
// Core Modules
// ============================================================================

/// Parser module: lexer, parser, types, binder and analyser
pub mod parser;

/// Compiler module: lowered IR, monomorphization and lowering
pub mod compiler;

// ============================================================================
// Re-exports
// ============================================================================

pub use parser::{
    ast, CheckError, DataType, Diagnostics, LexError, Lexer, ParseError, Parser, SemanticTree,
    Severity, Span, SymbolTable, Token,
};

pub use compiler::{
    Compilation, CompileError, CompileOptions, GlobalLoweringContext, LowerError, LoweredProgram,
    LoweredTree, PrettyPrint,
};
