//! Type argument resolution
//!
//! A stack of type-parameter bindings. Lowering the body of a generic
//! structure pushes its bindings; a generic function inside it pushes its
//! own on top, so the body sees both.

use crate::compiler::error::{LowerError, LowerResult};
use crate::parser::types::{Bindings, DataType};
use crate::parser::{SymbolId, SymbolTable};

#[derive(Debug, Clone, Default)]
pub struct TypeArgumentResolver {
    stack: Vec<Bindings>,
}

impl TypeArgumentResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bindings: Bindings) {
        self.stack.push(bindings);
    }

    pub fn pop(&mut self) -> Option<Bindings> {
        self.stack.pop()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Clone of the current state, for work deferred past this scope.
    pub fn snapshot(&self) -> TypeArgumentResolver {
        self.clone()
    }

    /// Push every layer of a snapshot, bottom first.
    pub fn push_all(&mut self, snapshot: &TypeArgumentResolver) {
        self.stack.extend(snapshot.stack.iter().cloned());
    }

    /// Binding of a type parameter, innermost layer first.
    pub fn resolve(&self, table: &SymbolTable, parameter: SymbolId) -> LowerResult<DataType> {
        self.stack
            .iter()
            .rev()
            .find_map(|layer| layer.get(&parameter))
            .cloned()
            .ok_or_else(|| LowerError::UnboundTypeParameter(table.symbol(parameter).name.clone()))
    }

    /// Replace every type parameter in `ty`; fails if one stays unbound.
    pub fn substitute(&self, table: &SymbolTable, ty: &DataType) -> LowerResult<DataType> {
        if !ty.has_type_parameters() {
            return Ok(ty.clone());
        }
        let mut current = ty.clone();
        // bindings may refer to parameters bound further down the stack
        for layer in self.stack.iter().rev() {
            current = current.substitute(layer);
            if !current.has_type_parameters() {
                return Ok(current);
            }
        }
        match first_parameter(&current) {
            Some(parameter) => Err(LowerError::UnboundTypeParameter(
                table.symbol(parameter).name.clone(),
            )),
            None => Ok(current),
        }
    }

    pub fn substitute_all(&self, table: &SymbolTable, types: &[DataType]) -> LowerResult<Vec<DataType>> {
        types.iter().map(|ty| self.substitute(table, ty)).collect()
    }
}

fn first_parameter(ty: &DataType) -> Option<SymbolId> {
    match ty {
        DataType::TypeParameter(symbol) => Some(*symbol),
        DataType::Structure { type_args, .. } => type_args.iter().find_map(first_parameter),
        DataType::Function {
            instance,
            type_args,
            ..
        } => instance
            .as_deref()
            .and_then(first_parameter)
            .or_else(|| type_args.iter().find_map(first_parameter)),
        DataType::Slice(inner) => first_parameter(inner),
        DataType::Primitive(_) | DataType::Enum(_) | DataType::Unknown => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::checker::Binder;
    use crate::parser::types::PrimitiveKind;
    use crate::parser::Parser;

    fn table() -> (SymbolTable, SymbolId, SymbolId) {
        let file = Parser::new("class Box[T] { fn Map[U](u U) U { return u; } }")
            .unwrap()
            .parse("test.cv")
            .unwrap();
        let table = Binder::new().bind(&[file]);
        let class = table.find_in_file(crate::parser::checker::FileId(0), "Box").unwrap();
        let s = table.structure(class).unwrap();
        let t = s.type_params[0];
        let u = table.function(s.functions[0]).unwrap().type_params[0];
        (table, t, u)
    }

    #[test]
    fn test_nested_layers() {
        let (table, t, u) = table();
        let mut resolver = TypeArgumentResolver::new();
        let mut outer = Bindings::default();
        outer.insert(t, DataType::Primitive(PrimitiveKind::I32));
        resolver.push(outer);
        let mut inner = Bindings::default();
        // U bound to a type written in terms of the outer T
        inner.insert(u, DataType::Slice(Box::new(DataType::TypeParameter(t))));
        resolver.push(inner);

        let ty = resolver.substitute(&table, &DataType::TypeParameter(u)).unwrap();
        assert_eq!(
            ty,
            DataType::Slice(Box::new(DataType::Primitive(PrimitiveKind::I32)))
        );
        assert_eq!(
            resolver.resolve(&table, t).unwrap(),
            DataType::Primitive(PrimitiveKind::I32)
        );

        resolver.pop();
        assert!(matches!(
            resolver.resolve(&table, u),
            Err(LowerError::UnboundTypeParameter(name)) if name == "U"
        ));
    }

    #[test]
    fn test_snapshot_is_independent() {
        let (table, t, _) = table();
        let mut resolver = TypeArgumentResolver::new();
        let mut layer = Bindings::default();
        layer.insert(t, DataType::BOOL);
        resolver.push(layer);

        let snapshot = resolver.snapshot();
        resolver.pop();
        assert!(resolver.substitute(&table, &DataType::TypeParameter(t)).is_err());

        let mut restored = TypeArgumentResolver::new();
        restored.push_all(&snapshot);
        assert_eq!(
            restored.substitute(&table, &DataType::TypeParameter(t)).unwrap(),
            DataType::BOOL
        );
    }
}
