//! Lowered intermediate representation
//!
//! The lowered IR is the output of the middle end: a flat set of named
//! declarations per source file with every generic specialized, every
//! virtual call made explicit and every global name mangled. A code
//! generator addresses declarations solely by their mangled names.
//!
//! # Structure
//!
//! - `LoweredTree` - Declarations of one source file, keyed by mangled name
//! - `LoweredStruct` / `LoweredFunction` / `LoweredGlobal` - Declarations
//! - `LoweredNode` - Expression and statement tree of function bodies
//! - `LoweredType` - Fully resolved types

pub mod module;
pub mod node;
pub mod pretty;
pub mod types;

pub use module::{
    Linkage, LoweredField, LoweredFunction, LoweredGlobal, LoweredProgram, LoweredStruct,
    LoweredTree,
};
pub use node::{CastKind, FieldIndex, LoweredLiteral, LoweredNode, PlaceholderMap};
pub use pretty::PrettyPrint;
pub use types::{LoweredType, PlaceholderId, PROTOCOL_ENTRY, TYPE_TABLE};
