//! Lowered type layout
//!
//! [`LoweredTypeBuilder`] maps concrete [`DataType`]s to [`LoweredType`]s and
//! computes struct layouts:
//!
//! - a class value is a pointer to its struct; field 0 is the type table
//!   pointer, followed by the storage fields of every ancestor (root first)
//!   and then its own
//! - a protocol value is a fat pointer `{ptr instance, ptr vtable}`
//! - an enum value is an `i32`
//!
//! A vtable has one function pointer per slot. A class's own vtable lists
//! the slots of its ancestors first, then every virtual function it
//! introduces; overrides reuse the slot of the function they override. A
//! protocol vtable lists the protocol's functions in declaration order.

use dashmap::DashMap;

use crate::compiler::error::{LowerError, LowerResult};
use crate::compiler::ir::{LoweredStruct, LoweredType, PROTOCOL_ENTRY, TYPE_TABLE};
use crate::compiler::monomorphize::NameMangler;
use crate::parser::checker::StructureKind;
use crate::parser::types::{Bindings, DataType, PrimitiveKind};
use crate::parser::{SymbolId, SymbolTable};

/// One entry of a vtable layout.
#[derive(Debug, Clone, PartialEq)]
pub struct VtableSlot {
    /// Function that introduced the slot
    pub function: SymbolId,
    /// Slot function type; the receiver is an opaque pointer
    pub ty: LoweredType,
}

#[derive(Debug)]
pub struct LoweredTypeBuilder<'a> {
    table: &'a SymbolTable,
    mangler: NameMangler<'a>,
    memo: DashMap<(SymbolId, Vec<DataType>), LoweredType>,
}

impl<'a> LoweredTypeBuilder<'a> {
    pub fn new(table: &'a SymbolTable) -> Self {
        Self {
            table,
            mangler: NameMangler::new(table),
            memo: DashMap::new(),
        }
    }

    pub fn mangler(&self) -> &NameMangler<'a> {
        &self.mangler
    }

    /// Lower a concrete type.
    pub fn lower(&self, ty: &DataType) -> LowerResult<LoweredType> {
        match ty {
            DataType::Primitive(PrimitiveKind::Void) => Ok(LoweredType::Void),
            DataType::Primitive(kind) => Ok(LoweredType::Primitive(*kind)),
            DataType::Structure { symbol, type_args } => {
                let key = (*symbol, type_args.clone());
                if let Some(lowered) = self.memo.get(&key) {
                    return Ok(lowered.clone());
                }
                let lowered = self.lower_structure(ty, *symbol)?;
                self.memo.insert(key, lowered.clone());
                Ok(lowered)
            }
            DataType::Slice(inner) => Ok(LoweredType::Slice(Box::new(self.lower(inner)?))),
            DataType::Enum(_) => Ok(LoweredType::I32),
            DataType::TypeParameter(symbol) => Err(LowerError::UnboundTypeParameter(
                self.table.symbol(*symbol).name.clone(),
            )),
            DataType::Function { .. } | DataType::Unknown => Err(LowerError::UnsupportedType(
                ty.display(self.table).to_string(),
            )),
        }
    }

    fn lower_structure(&self, ty: &DataType, symbol: SymbolId) -> LowerResult<LoweredType> {
        let kind = self
            .table
            .structure(symbol)
            .map(|s| s.kind)
            .ok_or_else(|| LowerError::UnsupportedType(ty.display(self.table).to_string()))?;
        match kind {
            StructureKind::Class => Ok(LoweredType::pointer_to(self.mangler.structure(ty)?)),
            StructureKind::Protocol => Ok(LoweredType::Anonymous(vec![
                LoweredType::opaque(),
                LoweredType::pointer_to(self.mangler.vtable(ty, ty)?),
            ])),
            StructureKind::Module => Err(LowerError::UnsupportedType(
                ty.display(self.table).to_string(),
            )),
        }
    }

    /// Instance fields with storage: not static, no accessors.
    pub fn storage_fields(&self, structure: SymbolId) -> Vec<SymbolId> {
        self.table
            .structure(structure)
            .map(|s| {
                s.fields
                    .iter()
                    .copied()
                    .filter(|f| {
                        self.table
                            .field(*f)
                            .is_some_and(|field| !field.is_static && !field.is_computed())
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Struct of a concrete class instantiation.
    pub fn class_layout(&self, class: &DataType) -> LowerResult<LoweredStruct> {
        let mut layout = LoweredStruct::new(self.mangler.structure(class)?)
            .with_field("$typetable", LoweredType::pointer_to(TYPE_TABLE));
        for ancestor in self.table.ancestry(class).iter().rev() {
            let Some((symbol, _)) = ancestor.as_structure() else {
                continue;
            };
            let bindings = self.table.bindings_for(ancestor);
            for field in self.storage_fields(symbol) {
                let ty = self.field_type(field, &bindings)?;
                layout = layout.with_field(self.table.symbol(field).name.clone(), ty);
            }
        }
        Ok(layout)
    }

    /// Index of the first own field of `class` in its struct.
    pub fn calculate_field_start_index(&self, class: &DataType) -> u32 {
        let inherited: usize = self
            .table
            .ancestry(class)
            .iter()
            .skip(1)
            .filter_map(|ancestor| ancestor.as_structure())
            .map(|(symbol, _)| self.storage_fields(symbol).len())
            .sum();
        1 + inherited as u32
    }

    /// Struct index of `field` declared by `owner`.
    pub fn field_index(&self, owner: &DataType, field: SymbolId) -> LowerResult<u32> {
        let (symbol, _) = owner
            .as_structure()
            .ok_or_else(|| LowerError::UnsupportedType(owner.display(self.table).to_string()))?;
        let position = self
            .storage_fields(symbol)
            .iter()
            .position(|f| *f == field)
            .ok_or_else(|| LowerError::Unexpected(format!(
                "field '{}' without storage",
                self.table.symbol(field).name
            )))?;
        Ok(self.calculate_field_start_index(owner) + position as u32)
    }

    /// Lowered type of a field, with its owner's bindings applied.
    pub fn field_type(&self, field: SymbolId, bindings: &Bindings) -> LowerResult<LoweredType> {
        let ty = self
            .table
            .field_type(field)
            .map(|f| f.ty.substitute(bindings))
            .ok_or_else(|| LowerError::MissingDeclaration(self.table.qualified_name(field)))?;
        self.lower(&ty)
    }

    /// Lowered parameter and return types of a function, without a receiver.
    pub fn signature(&self, function: SymbolId, bindings: &Bindings) -> LowerResult<(Vec<LoweredType>, LoweredType)> {
        let signature = self
            .table
            .signature(function)
            .ok_or_else(|| LowerError::MissingDeclaration(self.table.qualified_name(function)))?;
        let params = signature
            .params
            .iter()
            .map(|p| self.lower(&p.substitute(bindings)))
            .collect::<LowerResult<Vec<_>>>()?;
        let ret = self.lower(&signature.return_type.substitute(bindings))?;
        Ok((params, ret))
    }

    /// Function type of a function, with `receiver` prepended when given.
    pub fn function_type(
        &self,
        function: SymbolId,
        receiver: Option<LoweredType>,
        bindings: &Bindings,
    ) -> LowerResult<LoweredType> {
        let (params, ret) = self.signature(function, bindings)?;
        Ok(LoweredType::function(receiver.into_iter().chain(params).collect(), ret))
    }

    pub fn getter_type(&self, field: LoweredType, receiver: Option<LoweredType>) -> LoweredType {
        LoweredType::function(receiver.into_iter().collect(), field)
    }

    pub fn setter_type(&self, field: LoweredType, receiver: Option<LoweredType>) -> LoweredType {
        LoweredType::function(receiver.into_iter().chain([field]).collect(), LoweredType::Void)
    }

    /// Slots of the vtable of `implementor` for `implemented`.
    pub fn vtable_layout(&self, implementor: &DataType, implemented: &DataType) -> LowerResult<Vec<VtableSlot>> {
        let (symbol, _) = implemented
            .as_structure()
            .ok_or_else(|| LowerError::UnsupportedType(implemented.display(self.table).to_string()))?;
        let is_protocol = self.table.structure(symbol).is_some_and(|s| s.is_protocol());

        let mut slots = Vec::new();
        if is_protocol {
            let bindings = self.table.bindings_for(implemented);
            for function in self.slot_functions(symbol, true) {
                slots.push(self.slot(function, &bindings)?);
            }
        } else {
            for class in self.table.ancestry(implementor).iter().rev() {
                let Some((symbol, _)) = class.as_structure() else {
                    continue;
                };
                let bindings = self.table.bindings_for(class);
                for function in self.slot_functions(symbol, false) {
                    slots.push(self.slot(function, &bindings)?);
                }
            }
        }
        Ok(slots)
    }

    /// Functions of `structure` that introduce a slot.
    fn slot_functions(&self, structure: SymbolId, is_protocol: bool) -> Vec<SymbolId> {
        let Some(s) = self.table.structure(structure) else {
            return Vec::new();
        };
        s.functions
            .iter()
            .copied()
            .filter(|f| {
                self.table.function(*f).is_some_and(|function| {
                    !function.is_static
                        && !function.is_constructor
                        && (is_protocol
                            || (function.is_virtual() && function.overrides.get().is_none()))
                })
            })
            .collect()
    }

    fn slot(&self, function: SymbolId, bindings: &Bindings) -> LowerResult<VtableSlot> {
        Ok(VtableSlot {
            function,
            ty: self.function_type(function, Some(LoweredType::opaque()), bindings)?,
        })
    }

    /// Slot index of `function` in the vtable used for calls on `receiver`.
    pub fn slot_index(&self, receiver: &DataType, function: SymbolId) -> LowerResult<u32> {
        let root = self.table.root_function(function);
        self.vtable_layout(receiver, receiver)?
            .iter()
            .position(|slot| slot.function == root)
            .map(|i| i as u32)
            .ok_or_else(|| LowerError::MissingSlot {
                class: receiver.display(self.table).to_string(),
                function: self.table.symbol(function).name.clone(),
            })
    }

    /// Struct type of a vtable whose slot types are all known.
    pub fn vtable_struct(&self, implementor: &DataType, implemented: &DataType) -> LowerResult<LoweredStruct> {
        let mut layout = LoweredStruct::new(self.mangler.vtable(implementor, implemented)?);
        for slot in self.vtable_layout(implementor, implemented)? {
            layout = layout.with_field(self.table.symbol(slot.function).name.clone(), slot.ty);
        }
        Ok(layout)
    }

    /// The runtime type table and protocol entry structs.
    pub fn type_table_layout(&self) -> [LoweredStruct; 2] {
        [
            LoweredStruct::new(TYPE_TABLE)
                .with_field("vtable", LoweredType::opaque())
                .with_field(
                    "protocols",
                    LoweredType::Slice(Box::new(LoweredType::Struct(PROTOCOL_ENTRY.to_string()))),
                ),
            LoweredStruct::new(PROTOCOL_ENTRY)
                .with_field("descriptor", LoweredType::opaque())
                .with_field("vtable", LoweredType::opaque()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::checker::{Analyser, Binder, Diagnostics, FileId};
    use crate::parser::Parser;

    fn analyse(source: &str) -> SymbolTable {
        let file = Parser::new(source).unwrap().parse("test.cv").unwrap();
        let table = Binder::new().bind(std::slice::from_ref(&file));
        let mut diagnostics = Diagnostics::new();
        Analyser::new(&table, FileId(0), &mut diagnostics).analyse(&file);
        assert!(!diagnostics.has_errors(), "{:?}", diagnostics);
        table
    }

    fn class(table: &SymbolTable, name: &str) -> DataType {
        table.self_type(table.find_in_file(FileId(0), name).unwrap())
    }

    #[test]
    fn test_field_order_and_start_index() {
        let table = analyse(
            "open class A { var a1 i32; var a2 i32; } open class B : A { var b1 bool; static var s i32 = 0; } class C : B { var c1 i64; }",
        );
        let builder = LoweredTypeBuilder::new(&table);
        let c = class(&table, "C");
        let layout = builder.class_layout(&c).unwrap();
        let names: Vec<&str> = layout.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["$typetable", "a1", "a2", "b1", "c1"]);
        assert_eq!(builder.calculate_field_start_index(&c), 1 + 2 + 1);

        let b = class(&table, "B");
        let b1 = table.structure(b.as_structure().unwrap().0).unwrap().fields[0];
        assert_eq!(builder.field_index(&b, b1).unwrap(), 3);
    }

    #[test]
    fn test_protocol_is_fat_pointer() {
        let table = analyse("protocol Named { fn Name() i32; }");
        let builder = LoweredTypeBuilder::new(&table);
        let named = class(&table, "Named");
        assert_eq!(
            builder.lower(&named).unwrap(),
            LoweredType::Anonymous(vec![
                LoweredType::opaque(),
                LoweredType::pointer_to("Named$vtable[Named]")
            ])
        );
    }

    #[test]
    fn test_override_reuses_slot() {
        let table = analyse(
            "open class Animal { pub fn Speak() i32 { return 0; } pub fn Walk() i32 { return 1; } } \
             open class Dog : Animal { pub override fn Speak() i32 { return 2; } } \
             class Puppy : Dog { pub override fn Speak() i32 { return 3; } }",
        );
        let builder = LoweredTypeBuilder::new(&table);
        let animal = class(&table, "Animal");
        let puppy = class(&table, "Puppy");

        let slots = builder.vtable_layout(&puppy, &puppy).unwrap();
        assert_eq!(slots.len(), 1);
        let puppy_speak = table.structure(puppy.as_structure().unwrap().0).unwrap().functions[0];
        assert_eq!(builder.slot_index(&puppy, puppy_speak).unwrap(), 0);
        assert_eq!(builder.slot_index(&animal, puppy_speak).unwrap(), 0);

        let walk = table.structure(animal.as_structure().unwrap().0).unwrap().functions[1];
        assert!(matches!(
            builder.slot_index(&animal, walk),
            Err(LowerError::MissingSlot { .. })
        ));
    }

    #[test]
    fn test_memoized_generic_lowering() {
        let table = analyse("class Box[T] { var x T; }");
        let builder = LoweredTypeBuilder::new(&table);
        let symbol = table.find_in_file(FileId(0), "Box").unwrap();
        let boxed = DataType::Structure {
            symbol,
            type_args: vec![DataType::Primitive(PrimitiveKind::I32)],
        };
        let first = builder.lower(&boxed).unwrap();
        assert_eq!(first, LoweredType::pointer_to("Box[i32]"));
        assert_eq!(builder.lower(&boxed).unwrap(), first);
        assert!(builder.lower(&table.self_type(symbol)).is_err());
    }
}
