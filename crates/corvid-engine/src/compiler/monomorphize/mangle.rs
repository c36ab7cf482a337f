//! Name mangling
//!
//! Every lowered declaration is addressed by a string built only from its
//! declaring namespace and structure, its identifier and its concrete type
//! arguments. Two instantiations with the same type arguments produce the
//! same name, which makes the name the deduplication key for on-demand
//! generation.
//!
//! Namespace segments are joined with `.` and structure members with `::`.
//! Identifiers contain neither, so a namespace path can never spell the same
//! name as a structure member: `namespace a; fn b` is `a.b` while a root
//! `module a { static fn b }` is `a::b`.
//!
//! | Declaration            | Name                         |
//! |------------------------|------------------------------|
//! | structure              | `app.util.Box[i32]`          |
//! | function / method      | `app.max[i64]`, `app.Box[i32]::Get` |
//! | constructor            | `app.Dog::$init`, `app.Animal::$body` |
//! | accessors              | `app.Config::answer$get` / `$set` |
//! | static field / guard   | `app.Config::answer`, `app.Config::answer$guard` |
//! | vtable                 | `app.Dog$vtable[app.Named]`  |
//! | type table             | `app.Dog$typetable`          |
//! | protocol descriptor    | `app.Named$descriptor`       |
//!
//! `@foreign` functions and fields keep their plain identifier.

use crate::compiler::error::{LowerError, LowerResult};
use crate::parser::types::DataType;
use crate::parser::{SymbolId, SymbolTable};

#[derive(Debug, Clone, Copy)]
pub struct NameMangler<'a> {
    table: &'a SymbolTable,
}

impl<'a> NameMangler<'a> {
    pub fn new(table: &'a SymbolTable) -> Self {
        Self { table }
    }

    /// `app.util` becomes `app.util.`; the root namespace is empty.
    fn namespace_prefix(namespace: &str) -> String {
        if namespace.is_empty() {
            String::new()
        } else {
            format!("{}.", namespace)
        }
    }

    fn type_args(&self, args: &[DataType]) -> LowerResult<String> {
        if args.is_empty() {
            return Ok(String::new());
        }
        let names = args
            .iter()
            .map(|arg| self.type_name(arg))
            .collect::<LowerResult<Vec<_>>>()?;
        Ok(format!("[{}]", names.join(",")))
    }

    /// Mangled spelling of a concrete type.
    pub fn type_name(&self, ty: &DataType) -> LowerResult<String> {
        match ty {
            DataType::Primitive(kind) => Ok(kind.name().to_string()),
            DataType::Structure { .. } => self.structure(ty),
            DataType::Slice(inner) => Ok(format!("[]{}", self.type_name(inner)?)),
            DataType::Enum(symbol) => Ok(self.declared_name(*symbol)),
            DataType::TypeParameter(symbol) => Err(LowerError::UnboundTypeParameter(
                self.table.symbol(*symbol).name.clone(),
            )),
            DataType::Function { .. } | DataType::Unknown => Err(LowerError::UnsupportedType(
                ty.display(self.table).to_string(),
            )),
        }
    }

    fn declared_name(&self, symbol: SymbolId) -> String {
        let symbol = self.table.symbol(symbol);
        format!("{}{}", Self::namespace_prefix(&symbol.namespace), symbol.name)
    }

    /// Name of a class, protocol or module instantiation.
    pub fn structure(&self, ty: &DataType) -> LowerResult<String> {
        let Some((symbol, args)) = ty.as_structure() else {
            return Err(LowerError::UnsupportedType(ty.display(self.table).to_string()));
        };
        Ok(format!("{}{}", self.declared_name(symbol), self.type_args(args)?))
    }

    /// Name of a function; `owner` is `None` for top-level functions.
    pub fn function(
        &self,
        owner: Option<&DataType>,
        function: SymbolId,
        type_args: &[DataType],
    ) -> LowerResult<String> {
        let symbol = self.table.symbol(function);
        if symbol.is_foreign() {
            return Ok(symbol.name.clone());
        }
        let prefix = match owner {
            Some(owner) => format!("{}::", self.structure(owner)?),
            None => Self::namespace_prefix(&symbol.namespace),
        };
        Ok(format!("{}{}{}", prefix, symbol.name, self.type_args(type_args)?))
    }

    /// Constructor that allocates nothing and runs the whole initialization.
    pub fn init(&self, class: &DataType) -> LowerResult<String> {
        Ok(format!("{}::$init", self.structure(class)?))
    }

    /// Constructor body without header and field initialization, called by derived classes.
    pub fn init_body(&self, class: &DataType) -> LowerResult<String> {
        Ok(format!("{}::$body", self.structure(class)?))
    }

    pub fn getter(&self, owner: &DataType, field: SymbolId) -> LowerResult<String> {
        Ok(format!("{}$get", self.member(owner, field)?))
    }

    pub fn setter(&self, owner: &DataType, field: SymbolId) -> LowerResult<String> {
        Ok(format!("{}$set", self.member(owner, field)?))
    }

    /// Global holding a static field.
    pub fn static_field(&self, owner: &DataType, field: SymbolId) -> LowerResult<String> {
        let symbol = self.table.symbol(field);
        if symbol.is_foreign() {
            return Ok(symbol.name.clone());
        }
        self.member(owner, field)
    }

    /// Boolean global set once a lazy static field is initialized.
    pub fn lazy_guard(&self, owner: &DataType, field: SymbolId) -> LowerResult<String> {
        Ok(format!("{}$guard", self.member(owner, field)?))
    }

    fn member(&self, owner: &DataType, member: SymbolId) -> LowerResult<String> {
        Ok(format!(
            "{}::{}",
            self.structure(owner)?,
            self.table.symbol(member).name
        ))
    }

    /// Vtable of `implementor` for `implemented`; a class's own vtable is `(X, X)`.
    pub fn vtable(&self, implementor: &DataType, implemented: &DataType) -> LowerResult<String> {
        Ok(format!(
            "{}$vtable[{}]",
            self.structure(implementor)?,
            self.structure(implemented)?
        ))
    }

    pub fn type_table(&self, class: &DataType) -> LowerResult<String> {
        Ok(format!("{}$typetable", self.structure(class)?))
    }

    /// Global whose address identifies a protocol at runtime.
    pub fn descriptor(&self, protocol: &DataType) -> LowerResult<String> {
        Ok(format!("{}$descriptor", self.structure(protocol)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::checker::{Binder, FileId};
    use crate::parser::types::PrimitiveKind;
    use crate::parser::Parser;

    fn bind(sources: &[(&str, &str)]) -> SymbolTable {
        let files: Vec<_> = sources
            .iter()
            .map(|(path, src)| Parser::new(src).unwrap().parse(*path).unwrap())
            .collect();
        Binder::new().bind(&files)
    }

    fn i32() -> DataType {
        DataType::Primitive(PrimitiveKind::I32)
    }

    #[test]
    fn test_structure_and_function_names() {
        let table = bind(&[(
            "a.cv",
            "namespace app.util; class Box[T] { fn Get() T { return self.x; } var x T; } fn max[T](a T, b T) T { return a; }",
        )]);
        let mangler = NameMangler::new(&table);
        let class = table.find_in_file(FileId(0), "Box").unwrap();
        let ty = DataType::Structure {
            symbol: class,
            type_args: vec![i32()],
        };
        assert_eq!(mangler.structure(&ty).unwrap(), "app.util.Box[i32]");

        let get = table.structure(class).unwrap().functions[0];
        assert_eq!(
            mangler.function(Some(&ty), get, &[]).unwrap(),
            "app.util.Box[i32]::Get"
        );

        let max = table.find_in_file(FileId(0), "max").unwrap();
        let nested = DataType::Structure {
            symbol: class,
            type_args: vec![ty.clone()],
        };
        assert_eq!(
            mangler.function(None, max, &[nested]).unwrap(),
            "app.util.max[app.util.Box[app.util.Box[i32]]]"
        );
        assert_eq!(mangler.init(&ty).unwrap(), "app.util.Box[i32]::$init");
        assert_eq!(
            mangler.vtable(&ty, &ty).unwrap(),
            "app.util.Box[i32]$vtable[app.util.Box[i32]]"
        );
    }

    #[test]
    fn test_identical_arguments_mangle_identically() {
        let table = bind(&[("a.cv", "class Pair[A, B] {}")]);
        let mangler = NameMangler::new(&table);
        let pair = table.find_in_file(FileId(0), "Pair").unwrap();
        let make = || DataType::Structure {
            symbol: pair,
            type_args: vec![i32(), DataType::Slice(Box::new(DataType::BOOL))],
        };
        assert_eq!(mangler.structure(&make()).unwrap(), "Pair[i32,[]bool]");
        assert_eq!(
            mangler.structure(&make()).unwrap(),
            mangler.structure(&make()).unwrap()
        );
    }

    #[test]
    fn test_unbound_parameter_is_an_error() {
        let table = bind(&[("a.cv", "class Box[T] {}")]);
        let mangler = NameMangler::new(&table);
        let class = table.find_in_file(FileId(0), "Box").unwrap();
        let generic = table.self_type(class);
        assert!(matches!(
            mangler.structure(&generic),
            Err(LowerError::UnboundTypeParameter(name)) if name == "T"
        ));
    }

    #[test]
    fn test_foreign_keeps_plain_name() {
        let table = bind(&[("a.cv", "namespace app; @foreign fn puts(v i32) i32;")]);
        let mangler = NameMangler::new(&table);
        let puts = table.find_in_file(FileId(0), "puts").unwrap();
        assert_eq!(mangler.function(None, puts, &[]).unwrap(), "puts");
    }

    #[test]
    fn test_field_names() {
        let table = bind(&[(
            "a.cv",
            "namespace app; module Config { pub static let answer i32 = compute(); } fn compute() i32 { return 42; }",
        )]);
        let mangler = NameMangler::new(&table);
        let config = table.find_in_file(FileId(0), "Config").unwrap();
        let owner = table.self_type(config);
        let field = table.structure(config).unwrap().fields[0];
        assert_eq!(mangler.static_field(&owner, field).unwrap(), "app.Config::answer");
        assert_eq!(mangler.lazy_guard(&owner, field).unwrap(), "app.Config::answer$guard");
        assert_eq!(mangler.getter(&owner, field).unwrap(), "app.Config::answer$get");
    }

    #[test]
    fn test_namespace_function_and_module_member_differ() {
        let table = bind(&[
            ("a.cv", "namespace a; pub fn b() i32 { return 1; }"),
            ("m.cv", "module a { pub static fn b() i32 { return 2; } }"),
        ]);
        let mangler = NameMangler::new(&table);
        let free = table.find_in_file(FileId(0), "b").unwrap();
        let module = table.find_in_file(FileId(1), "a").unwrap();
        let member = table.structure(module).unwrap().functions[0];

        let free_name = mangler.function(None, free, &[]).unwrap();
        let member_name = mangler
            .function(Some(&table.self_type(module)), member, &[])
            .unwrap();
        assert_eq!(free_name, "a.b");
        assert_eq!(member_name, "a::b");
        assert_eq!(
            mangler.function(None, free, &[i32()]).unwrap(),
            "a.b[i32]"
        );
        assert_eq!(
            mangler
                .function(Some(&table.self_type(module)), member, &[i32()])
                .unwrap(),
            "a::b[i32]"
        );
    }
}
