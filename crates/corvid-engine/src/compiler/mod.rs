//! Corvid Compiler - Semantic Tree to Lowered IR
//!
//! Lowers analysed source files into a target-agnostic IR that a code
//! generator consumes by mangled name. Generic declarations are specialized
//! on demand, exactly once per program, and virtual dispatch is made
//! explicit through vtables and per-class type tables.
//!
//! # Modules
//!
//! - [`ir`] - Lowered types, nodes and per-file trees
//! - [`layout`] - Lowered types and struct/vtable layouts of source types
//! - [`monomorphize`] - Type argument resolution, name mangling, shared lowering state
//! - [`lower`] - Per-file lowering
//! - [`pipeline`] - Parse, check and lower a set of files

pub mod error;
pub mod ir;
pub mod layout;
pub mod lower;
pub mod monomorphize;
pub mod options;
pub mod pipeline;

pub use error::{CompileError, CompileResult, LowerError, LowerResult};
pub use ir::{
    Linkage, LoweredFunction, LoweredGlobal, LoweredNode, LoweredProgram, LoweredStruct, LoweredTree,
    LoweredType, PrettyPrint,
};
pub use layout::LoweredTypeBuilder;
pub use lower::{Lowerer, SlotGenerator};
pub use monomorphize::{GlobalLoweringContext, NameMangler, TypeArgumentResolver};
pub use options::CompileOptions;
pub use pipeline::Compilation;
