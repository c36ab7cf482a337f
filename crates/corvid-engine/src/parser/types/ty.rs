//! Core data type definitions for Corvid

use crate::parser::checker::symbols::{SymbolId, SymbolTable};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Primitive types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    Void,
    Bool,
    I8,
    I16,
    I32,
    I64,
    I128,
    U8,
    U16,
    U32,
    U64,
    U128,
    F32,
    F64,
}

impl PrimitiveKind {
    /// Every primitive, in the order used by the prelude.
    pub const ALL: [PrimitiveKind; 14] = [
        PrimitiveKind::Void,
        PrimitiveKind::Bool,
        PrimitiveKind::I8,
        PrimitiveKind::I16,
        PrimitiveKind::I32,
        PrimitiveKind::I64,
        PrimitiveKind::I128,
        PrimitiveKind::U8,
        PrimitiveKind::U16,
        PrimitiveKind::U32,
        PrimitiveKind::U64,
        PrimitiveKind::U128,
        PrimitiveKind::F32,
        PrimitiveKind::F64,
    ];

    /// Source-level name (`i32`, `bool`, ...)
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Void => "void",
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::I8 => "i8",
            PrimitiveKind::I16 => "i16",
            PrimitiveKind::I32 => "i32",
            PrimitiveKind::I64 => "i64",
            PrimitiveKind::I128 => "i128",
            PrimitiveKind::U8 => "u8",
            PrimitiveKind::U16 => "u16",
            PrimitiveKind::U32 => "u32",
            PrimitiveKind::U64 => "u64",
            PrimitiveKind::U128 => "u128",
            PrimitiveKind::F32 => "f32",
            PrimitiveKind::F64 => "f64",
        }
    }

    /// Look up a primitive by its source-level name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.name() == name)
    }

    pub fn is_signed_integer(self) -> bool {
        matches!(
            self,
            PrimitiveKind::I8
                | PrimitiveKind::I16
                | PrimitiveKind::I32
                | PrimitiveKind::I64
                | PrimitiveKind::I128
        )
    }

    pub fn is_unsigned_integer(self) -> bool {
        matches!(
            self,
            PrimitiveKind::U8
                | PrimitiveKind::U16
                | PrimitiveKind::U32
                | PrimitiveKind::U64
                | PrimitiveKind::U128
        )
    }

    pub fn is_integer(self) -> bool {
        self.is_signed_integer() || self.is_unsigned_integer()
    }

    pub fn is_float(self) -> bool {
        matches!(self, PrimitiveKind::F32 | PrimitiveKind::F64)
    }

    pub fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// Width in bits; `bool` is 1 and `void` is 0.
    pub fn bit_width(self) -> u32 {
        match self {
            PrimitiveKind::Void => 0,
            PrimitiveKind::Bool => 1,
            PrimitiveKind::I8 | PrimitiveKind::U8 => 8,
            PrimitiveKind::I16 | PrimitiveKind::U16 => 16,
            PrimitiveKind::I32 | PrimitiveKind::U32 | PrimitiveKind::F32 => 32,
            PrimitiveKind::I64 | PrimitiveKind::U64 | PrimitiveKind::F64 => 64,
            PrimitiveKind::I128 | PrimitiveKind::U128 => 128,
        }
    }

    /// True if a value of `self` converts to `target` without loss.
    pub fn widens_to(self, target: PrimitiveKind) -> bool {
        if self == target {
            return true;
        }
        match (self.is_float(), target.is_float()) {
            (false, true) => self.is_integer(),
            (true, true) => self.bit_width() < target.bit_width(),
            (true, false) => false,
            (false, false) => {
                if !self.is_integer() || !target.is_integer() {
                    return false;
                }
                if self.is_signed_integer() == target.is_signed_integer() {
                    self.bit_width() < target.bit_width()
                } else {
                    // unsigned fits in a strictly wider signed integer
                    self.is_unsigned_integer() && self.bit_width() < target.bit_width()
                }
            }
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A semantic data type. Value-like and compared structurally.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
    Primitive(PrimitiveKind),
    /// A class, protocol or module instantiation
    Structure {
        symbol: SymbolId,
        type_args: Vec<DataType>,
    },
    /// A bound or unbound function reference
    Function {
        symbol: SymbolId,
        instance: Option<Box<DataType>>,
        type_args: Vec<DataType>,
    },
    Slice(Box<DataType>),
    Enum(SymbolId),
    /// An unresolved generic parameter
    TypeParameter(SymbolId),
    /// Placeholder produced after an error; compatible with everything
    Unknown,
}

/// Type parameter bindings used by [`DataType::substitute`].
pub type Bindings = FxHashMap<SymbolId, DataType>;

impl DataType {
    pub const VOID: DataType = DataType::Primitive(PrimitiveKind::Void);
    pub const BOOL: DataType = DataType::Primitive(PrimitiveKind::Bool);

    /// Structure type without type arguments.
    pub fn structure(symbol: SymbolId) -> Self {
        DataType::Structure {
            symbol,
            type_args: Vec::new(),
        }
    }

    pub fn as_primitive(&self) -> Option<PrimitiveKind> {
        match self {
            DataType::Primitive(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, DataType::Primitive(PrimitiveKind::Void))
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, DataType::Primitive(PrimitiveKind::Bool))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Primitive(kind) if kind.is_numeric())
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, DataType::Unknown)
    }

    /// The structure symbol and type arguments, if this is a structure type.
    pub fn as_structure(&self) -> Option<(SymbolId, &[DataType])> {
        match self {
            DataType::Structure { symbol, type_args } => Some((*symbol, type_args)),
            _ => None,
        }
    }

    /// True if any type parameter appears anywhere inside this type.
    pub fn has_type_parameters(&self) -> bool {
        match self {
            DataType::TypeParameter(_) => true,
            DataType::Structure { type_args, .. } => {
                type_args.iter().any(DataType::has_type_parameters)
            }
            DataType::Function {
                instance,
                type_args,
                ..
            } => {
                instance.as_deref().is_some_and(DataType::has_type_parameters)
                    || type_args.iter().any(DataType::has_type_parameters)
            }
            DataType::Slice(inner) => inner.has_type_parameters(),
            DataType::Primitive(_) | DataType::Enum(_) | DataType::Unknown => false,
        }
    }

    /// Replace type parameters with their bindings, recursively.
    /// Unbound parameters are left in place.
    pub fn substitute(&self, bindings: &Bindings) -> DataType {
        if bindings.is_empty() {
            return self.clone();
        }
        match self {
            DataType::TypeParameter(symbol) => bindings
                .get(symbol)
                .cloned()
                .unwrap_or_else(|| self.clone()),
            DataType::Structure { symbol, type_args } => DataType::Structure {
                symbol: *symbol,
                type_args: type_args.iter().map(|t| t.substitute(bindings)).collect(),
            },
            DataType::Function {
                symbol,
                instance,
                type_args,
            } => DataType::Function {
                symbol: *symbol,
                instance: instance
                    .as_ref()
                    .map(|inst| Box::new(inst.substitute(bindings))),
                type_args: type_args.iter().map(|t| t.substitute(bindings)).collect(),
            },
            DataType::Slice(inner) => DataType::Slice(Box::new(inner.substitute(bindings))),
            DataType::Primitive(_) | DataType::Enum(_) | DataType::Unknown => self.clone(),
        }
    }

    /// Display adapter that resolves symbol names through `table`.
    pub fn display<'a>(&'a self, table: &'a SymbolTable) -> DisplayDataType<'a> {
        DisplayDataType { ty: self, table }
    }
}

/// Formats a [`DataType`] with symbol names.
pub struct DisplayDataType<'a> {
    ty: &'a DataType,
    table: &'a SymbolTable,
}

impl fmt::Display for DisplayDataType<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.table;
        let write_args = |f: &mut fmt::Formatter<'_>, args: &[DataType]| -> fmt::Result {
            if args.is_empty() {
                return Ok(());
            }
            f.write_str("[")?;
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", arg.display(table))?;
            }
            f.write_str("]")
        };

        match self.ty {
            DataType::Primitive(kind) => write!(f, "{}", kind),
            DataType::Structure { symbol, type_args } => {
                f.write_str(&table.symbol(*symbol).name)?;
                write_args(f, type_args)
            }
            DataType::Function {
                symbol, type_args, ..
            } => {
                write!(f, "fn {}", table.symbol(*symbol).name)?;
                write_args(f, type_args)
            }
            DataType::Slice(inner) => write!(f, "[]{}", inner.display(table)),
            DataType::Enum(symbol) | DataType::TypeParameter(symbol) => {
                f.write_str(&table.symbol(*symbol).name)
            }
            DataType::Unknown => f.write_str("{unknown}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_names_round_trip() {
        for kind in PrimitiveKind::ALL {
            assert_eq!(PrimitiveKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(PrimitiveKind::from_name("string"), None);
    }

    #[test]
    fn test_widening() {
        use PrimitiveKind::*;
        assert!(I8.widens_to(I64));
        assert!(U8.widens_to(I16));
        assert!(!U16.widens_to(I16));
        assert!(!I64.widens_to(I32));
        assert!(I64.widens_to(F64));
        assert!(F32.widens_to(F64));
        assert!(!F64.widens_to(F32));
        assert!(!Bool.widens_to(I32));
    }

    #[test]
    fn test_substitute_nested() {
        let t = SymbolId(3);
        let ty = DataType::Slice(Box::new(DataType::Structure {
            symbol: SymbolId(1),
            type_args: vec![DataType::TypeParameter(t)],
        }));
        let mut bindings = Bindings::default();
        bindings.insert(t, DataType::Primitive(PrimitiveKind::I32));
        let result = ty.substitute(&bindings);
        assert!(!result.has_type_parameters());
        assert!(ty.has_type_parameters());
    }
}
