//! Structural type equivalence

use super::ty::{DataType, PrimitiveKind};

/// Result of comparing an actual type against an expected one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Equivalence {
    /// Same type
    Equal,
    /// Convertible by an implicitly inserted cast
    ImplicitCast,
    /// Not convertible without an explicit cast, or not at all
    Incompatible,
}

impl Equivalence {
    pub fn is_compatible(self) -> bool {
        !matches!(self, Equivalence::Incompatible)
    }
}

impl DataType {
    /// Compare `self` (the actual type) against `expected`.
    ///
    /// Same kind and same symbol/type arguments is `Equal`; a lossless
    /// primitive widening is `ImplicitCast`; anything else is `Incompatible`.
    /// `Unknown` on either side is `Equal` so errors do not cascade.
    pub fn is_equivalent(&self, expected: &DataType) -> Equivalence {
        match (self, expected) {
            (DataType::Unknown, _) | (_, DataType::Unknown) => Equivalence::Equal,
            (DataType::Primitive(from), DataType::Primitive(to)) => {
                if from == to {
                    Equivalence::Equal
                } else if from.widens_to(*to) {
                    Equivalence::ImplicitCast
                } else {
                    Equivalence::Incompatible
                }
            }
            (
                DataType::Structure {
                    symbol: a,
                    type_args: a_args,
                },
                DataType::Structure {
                    symbol: b,
                    type_args: b_args,
                },
            ) => {
                if a == b && args_equal(a_args, b_args) {
                    Equivalence::Equal
                } else {
                    Equivalence::Incompatible
                }
            }
            (DataType::Slice(a), DataType::Slice(b)) => match a.is_equivalent(b) {
                Equivalence::Equal => Equivalence::Equal,
                _ => Equivalence::Incompatible,
            },
            (DataType::Enum(a), DataType::Enum(b))
            | (DataType::TypeParameter(a), DataType::TypeParameter(b)) => {
                if a == b {
                    Equivalence::Equal
                } else {
                    Equivalence::Incompatible
                }
            }
            (
                DataType::Function {
                    symbol: a,
                    type_args: a_args,
                    ..
                },
                DataType::Function {
                    symbol: b,
                    type_args: b_args,
                    ..
                },
            ) => {
                if a == b && args_equal(a_args, b_args) {
                    Equivalence::Equal
                } else {
                    Equivalence::Incompatible
                }
            }
            _ => Equivalence::Incompatible,
        }
    }

    /// Like [`DataType::is_equivalent`], for a literal of type `self`.
    ///
    /// An integer literal converts to any numeric type and a float literal
    /// to any float type; range checking is left to code generation.
    pub fn is_equivalent_literal(&self, expected: &DataType) -> Equivalence {
        match (self, expected) {
            (DataType::Primitive(from), DataType::Primitive(to)) if from != to => {
                if from.is_integer() && to.is_numeric() {
                    Equivalence::ImplicitCast
                } else if from.is_float() && to.is_float() {
                    Equivalence::ImplicitCast
                } else {
                    Equivalence::Incompatible
                }
            }
            _ => self.is_equivalent(expected),
        }
    }
}

fn args_equal(a: &[DataType], b: &[DataType]) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b)
            .all(|(x, y)| x.is_equivalent(y) == Equivalence::Equal)
}

/// Default type of an integer literal.
pub const INT_LITERAL: PrimitiveKind = PrimitiveKind::I32;
/// Default type of a float literal.
pub const FLOAT_LITERAL: PrimitiveKind = PrimitiveKind::F64;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::checker::symbols::SymbolId;

    fn prim(kind: PrimitiveKind) -> DataType {
        DataType::Primitive(kind)
    }

    #[test]
    fn test_reflexive() {
        let boxed = DataType::Structure {
            symbol: SymbolId(4),
            type_args: vec![prim(PrimitiveKind::I32)],
        };
        assert_eq!(boxed.is_equivalent(&boxed), Equivalence::Equal);
        assert_eq!(
            prim(PrimitiveKind::F32).is_equivalent(&prim(PrimitiveKind::F32)),
            Equivalence::Equal
        );
    }

    #[test]
    fn test_literal_to_any_numeric() {
        let literal = prim(INT_LITERAL);
        assert_eq!(
            literal.is_equivalent_literal(&prim(PrimitiveKind::U8)),
            Equivalence::ImplicitCast
        );
        assert_eq!(
            literal.is_equivalent_literal(&prim(PrimitiveKind::I128)),
            Equivalence::ImplicitCast
        );
        assert_eq!(
            literal.is_equivalent_literal(&DataType::structure(SymbolId(0))),
            Equivalence::Incompatible
        );
        // narrowing is only allowed for literals
        assert_eq!(
            literal.is_equivalent(&prim(PrimitiveKind::U8)),
            Equivalence::Incompatible
        );
    }

    #[test]
    fn test_unknown_suppresses_errors() {
        assert_eq!(
            DataType::Unknown.is_equivalent(&prim(PrimitiveKind::Bool)),
            Equivalence::Equal
        );
    }

    #[test]
    fn test_different_type_arguments() {
        let a = DataType::Structure {
            symbol: SymbolId(4),
            type_args: vec![prim(PrimitiveKind::I32)],
        };
        let b = DataType::Structure {
            symbol: SymbolId(4),
            type_args: vec![prim(PrimitiveKind::I64)],
        };
        assert_eq!(a.is_equivalent(&b), Equivalence::Incompatible);
    }

    #[test]
    fn test_class_is_never_equal_to_its_protocol() {
        use crate::parser::checker::{Binder, FileId};
        use crate::parser::Parser;

        let file = Parser::new("protocol P { fn Run() i32; } class A : P { fn Run() i32 { return 1; } }")
            .unwrap()
            .parse("a.cv")
            .unwrap();
        let table = Binder::new().bind(&[file]);
        let class = table.self_type(table.find_in_file(FileId(0), "A").unwrap());
        let protocol = table.self_type(table.find_in_file(FileId(0), "P").unwrap());
        assert_eq!(class.is_equivalent(&protocol), Equivalence::Incompatible);
        assert_eq!(protocol.is_equivalent(&class), Equivalence::Incompatible);
    }
}
