//! Semantic data types.

pub mod equivalence;
pub mod ty;

pub use equivalence::{Equivalence, FLOAT_LITERAL, INT_LITERAL};
pub use ty::{Bindings, DataType, DisplayDataType, PrimitiveKind};
