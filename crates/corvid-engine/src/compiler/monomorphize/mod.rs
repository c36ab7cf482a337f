//! Monomorphization - Generic Specialization
//!
//! Generic classes and functions are never lowered where they are declared.
//! A specialization is generated the first time a call site, `new`
//! expression or vtable supplies concrete type arguments, and it is named
//! by mangling those arguments into the declaration's name.
//!
//! # Example
//!
//! ```text
//! // Source (two files)
//! class Box[T] { pub var x T; }
//! let a = new Box[i32]();     // a.cv
//! let b = new Box[i32]();     // b.cv
//!
//! // Lowered: one struct, attached to the file declaring Box
//! struct %Box[i32] { $typetable: *%$corvid.TypeTable, x: i32 }
//! ```
//!
//! # Components
//!
//! - [`TypeArgumentResolver`] - Stack of type-parameter bindings
//! - [`NameMangler`] - Deterministic names, the deduplication key
//! - [`GlobalLoweringContext`] - Exactly-once generation shared by all files

pub mod global;
pub mod mangle;
pub mod resolver;

pub use global::{Concern, GlobalLoweringContext, PendingSlot, SlotResolver};
pub use mangle::NameMangler;
pub use resolver::TypeArgumentResolver;
