//! Lowered data types

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::parser::types::PrimitiveKind;

// `$` cannot appear in a source identifier, so no user declaration mangles to these.

/// Name of the runtime type-table struct stored in field 0 of every instance.
pub const TYPE_TABLE: &str = "$corvid.TypeTable";

/// Name of the struct describing one implemented protocol in a type table.
pub const PROTOCOL_ENTRY: &str = "$corvid.ProtocolEntry";

/// Identity of a vtable slot whose function is not generated yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlaceholderId(pub u32);

impl fmt::Display for PlaceholderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A fully resolved, target-agnostic type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoweredType {
    Void,
    Primitive(PrimitiveKind),
    /// `Pointer(Void)` is the opaque pointer
    Pointer(Box<LoweredType>),
    /// Pointer and length
    Slice(Box<LoweredType>),
    /// Reference to a named struct
    Struct(String),
    /// Unnamed struct, used for protocol fat pointers
    Anonymous(Vec<LoweredType>),
    Function {
        params: Vec<LoweredType>,
        ret: Box<LoweredType>,
    },
    /// Type of a vtable slot that is still a placeholder
    Pending(PlaceholderId),
}

impl LoweredType {
    pub const BOOL: LoweredType = LoweredType::Primitive(PrimitiveKind::Bool);
    pub const I32: LoweredType = LoweredType::Primitive(PrimitiveKind::I32);
    pub const U8: LoweredType = LoweredType::Primitive(PrimitiveKind::U8);
    pub const U64: LoweredType = LoweredType::Primitive(PrimitiveKind::U64);

    pub fn opaque() -> Self {
        LoweredType::Pointer(Box::new(LoweredType::Void))
    }

    pub fn pointer_to(name: impl Into<String>) -> Self {
        LoweredType::Pointer(Box::new(LoweredType::Struct(name.into())))
    }

    pub fn function(params: Vec<LoweredType>, ret: LoweredType) -> Self {
        LoweredType::Function {
            params,
            ret: Box::new(ret),
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, LoweredType::Void)
    }

    pub fn as_primitive(&self) -> Option<PrimitiveKind> {
        match self {
            LoweredType::Primitive(kind) => Some(*kind),
            _ => None,
        }
    }

    /// Name of the struct a pointer type points to.
    pub fn pointee_struct(&self) -> Option<&str> {
        match self {
            LoweredType::Pointer(inner) => match inner.as_ref() {
                LoweredType::Struct(name) => Some(name),
                _ => None,
            },
            _ => None,
        }
    }

    /// Return type of a function type.
    pub fn return_type(&self) -> Option<&LoweredType> {
        match self {
            LoweredType::Function { ret, .. } => Some(ret),
            _ => None,
        }
    }

    /// First placeholder found anywhere in the type.
    pub fn placeholder(&self) -> Option<PlaceholderId> {
        match self {
            LoweredType::Pending(id) => Some(*id),
            LoweredType::Pointer(inner) | LoweredType::Slice(inner) => inner.placeholder(),
            LoweredType::Anonymous(fields) => fields.iter().find_map(LoweredType::placeholder),
            LoweredType::Function { params, ret } => params
                .iter()
                .find_map(LoweredType::placeholder)
                .or_else(|| ret.placeholder()),
            LoweredType::Void | LoweredType::Primitive(_) | LoweredType::Struct(_) => None,
        }
    }

    /// Replace resolved placeholders, recursively.
    pub fn replace_placeholders(&mut self, resolved: &FxHashMap<PlaceholderId, LoweredType>) {
        match self {
            LoweredType::Pending(id) => {
                if let Some(ty) = resolved.get(id) {
                    *self = ty.clone();
                }
            }
            LoweredType::Pointer(inner) | LoweredType::Slice(inner) => {
                inner.replace_placeholders(resolved)
            }
            LoweredType::Anonymous(fields) => {
                for field in fields {
                    field.replace_placeholders(resolved);
                }
            }
            LoweredType::Function { params, ret } => {
                for param in params {
                    param.replace_placeholders(resolved);
                }
                ret.replace_placeholders(resolved);
            }
            LoweredType::Void | LoweredType::Primitive(_) | LoweredType::Struct(_) => {}
        }
    }
}

impl fmt::Display for LoweredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoweredType::Void => f.write_str("void"),
            LoweredType::Primitive(kind) => write!(f, "{}", kind),
            LoweredType::Pointer(inner) if inner.is_void() => f.write_str("ptr"),
            LoweredType::Pointer(inner) => write!(f, "*{}", inner),
            LoweredType::Slice(inner) => write!(f, "[]{}", inner),
            LoweredType::Struct(name) => write!(f, "%{}", name),
            LoweredType::Anonymous(fields) => {
                f.write_str("{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", field)?;
                }
                f.write_str("}")
            }
            LoweredType::Function { params, ret } => {
                f.write_str("fn(")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", param)?;
                }
                write!(f, ") {}", ret)
            }
            LoweredType::Pending(id) => write!(f, "pending{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let ty = LoweredType::function(
            vec![LoweredType::opaque(), LoweredType::I32],
            LoweredType::pointer_to("app.Box[i32]"),
        );
        assert_eq!(ty.to_string(), "fn(ptr, i32) *%app.Box[i32]");
    }

    #[test]
    fn test_replace_nested_placeholder() {
        let mut ty = LoweredType::Anonymous(vec![
            LoweredType::opaque(),
            LoweredType::Pointer(Box::new(LoweredType::Pending(PlaceholderId(4)))),
        ]);
        assert_eq!(ty.placeholder(), Some(PlaceholderId(4)));

        let mut resolved = FxHashMap::default();
        resolved.insert(PlaceholderId(4), LoweredType::I32);
        ty.replace_placeholders(&resolved);
        assert_eq!(ty.placeholder(), None);
    }
}
