//! Lowering Integration Tests
//!
//! Compiles small multi-file programs end to end and inspects the lowered IR.
//! Run with: cargo test -p corvid-engine --test lowering_tests

use std::collections::HashMap;

use corvid_engine::ast::{BinaryOp, UnaryOp};
use corvid_engine::compiler::ir::{FieldIndex, LoweredLiteral, LoweredNode};
use corvid_engine::{Compilation, CompileOptions, LoweredProgram, PrettyPrint};

fn compile(sources: &[&str], options: CompileOptions) -> LoweredProgram {
    let mut compilation = Compilation::new(options);
    for (i, source) in sources.iter().enumerate() {
        compilation.add_source(format!("file{}.cv", i), *source);
    }
    let has_errors = compilation.check().expect("parse error").has_errors();
    assert!(!has_errors, "{}", compilation.render_diagnostics().unwrap());
    compilation.lower().expect("lowering failed")
}

fn lower(sources: &[&str]) -> LoweredProgram {
    compile(sources, CompileOptions::sequential())
}

fn parallel() -> CompileOptions {
    CompileOptions {
        workers: 4,
        ..CompileOptions::default()
    }
}

fn body<'p>(program: &'p LoweredProgram, name: &str) -> &'p LoweredNode {
    program
        .function(name)
        .and_then(|f| f.body.as_ref())
        .unwrap_or_else(|| panic!("no body for '{}'", name))
}

fn field_ptrs(node: &LoweredNode) -> Vec<(String, FieldIndex)> {
    let mut found = Vec::new();
    node.walk(&mut |n| {
        if let LoweredNode::FieldPtr { structure, index, .. } = n {
            found.push((structure.clone(), index.clone()));
        }
    });
    found
}

/// A library file with generics and eight files using it.
fn library_program() -> Vec<String> {
    let mut sources = vec![r#"
        namespace lib;
        pub fn max[T](a T, b T) T { if a > b { return a; } return b; }
        pub class Box[T] { pub var value T; pub fn Get() T { return self.value; } }
    "#
    .to_string()];
    for i in 0..8 {
        sources.push(format!(
            "use lib; fn run{i}() i64 {{ let x i64 = {i}; let b = new Box[i64](); return max(x, b.Get()); }}"
        ));
    }
    sources
}

// =============================================================================
// SPECIALIZATION
// =============================================================================

mod specialization {
    use super::*;

    #[test]
    fn test_sequential_and_parallel_output_match() {
        let sources = library_program();
        let sources: Vec<&str> = sources.iter().map(String::as_str).collect();
        let sequential = compile(&sources, CompileOptions::sequential());
        for _ in 0..4 {
            let concurrent = compile(&sources, parallel());
            assert_eq!(sequential, concurrent);
            assert_eq!(sequential.pretty_print(), concurrent.pretty_print());
        }
    }

    #[test]
    fn test_specializations_generated_once_in_owner_file() {
        let sources = library_program();
        let sources: Vec<&str> = sources.iter().map(String::as_str).collect();
        let program = compile(&sources, parallel());

        for name in ["lib.max[i64]", "lib.Box[i64]::Get", "lib.Box[i64]::$init"] {
            let owners: Vec<&str> = program
                .files
                .iter()
                .filter(|f| f.functions.contains_key(name))
                .map(|f| f.file.as_str())
                .collect();
            assert_eq!(owners, vec!["file0.cv"], "{}", name);
        }
        assert_eq!(program.struct_count("lib.Box[i64]"), 1);
        assert!(program.files[0].structs.contains_key("lib.Box[i64]"));
        assert!(program.function("lib.max").is_none());
    }

    #[test]
    fn test_every_reference_is_defined() {
        let sources = library_program();
        let sources: Vec<&str> = sources.iter().map(String::as_str).collect();
        let program = compile(&sources, parallel());
        for file in &program.files {
            for function in file.functions.values() {
                let Some(body) = &function.body else {
                    continue;
                };
                for name in body.referenced_functions() {
                    assert!(program.function(name).is_some(), "'{}' calls undefined '{}'", function.name, name);
                }
            }
        }
    }
}

// =============================================================================
// NAMING
// =============================================================================

mod naming {
    use super::*;

    fn owners<'p>(program: &'p LoweredProgram, name: &str) -> Vec<&'p str> {
        program
            .files
            .iter()
            .filter(|f| f.functions.contains_key(name))
            .map(|f| f.file.as_str())
            .collect()
    }

    #[test]
    fn test_namespace_function_and_module_member_get_distinct_names() {
        let program = lower(&[
            "namespace a; pub fn b() i32 { return 1; }",
            "module a { pub static fn b() i32 { return 2; } }",
        ]);
        assert_eq!(owners(&program, "a.b"), vec!["file0.cv"]);
        assert_eq!(owners(&program, "a::b"), vec!["file1.cv"]);
    }

    #[test]
    fn test_generic_namespace_function_and_module_member_specialize_separately() {
        let program = lower(&[
            "namespace a; pub fn b[T](x T) i32 { return 1; }",
            "module a { pub static fn b[T](x T) i32 { return 2; } } fn mine() i32 { return a.b[i32](0); }",
            "use a; fn other() i32 { return b[i32](0); }",
        ]);
        assert_eq!(owners(&program, "a.b[i32]"), vec!["file0.cv"]);
        assert_eq!(owners(&program, "a::b[i32]"), vec!["file1.cv"]);

        let other = body(&program, "other").referenced_functions();
        assert!(other.contains(&"a.b[i32]"), "{:?}", other);
        assert!(!other.contains(&"a::b[i32]"));
        let mine = body(&program, "mine").referenced_functions();
        assert!(mine.contains(&"a::b[i32]"), "{:?}", mine);
    }
}

// =============================================================================
// CLASSES
// =============================================================================

mod classes {
    use super::*;

    const CHAIN: &str = r#"
        open class A { pub var a i32 = 1; }
        open class B : A { pub var b i64 = 2; }
        class C : B { pub var c bool = true; }
        fn read(c C) i64 { return c.b; }
    "#;

    #[test]
    fn test_inherited_fields_keep_their_offsets() {
        let program = lower(&[CHAIN]);
        let names = |s: &str| -> Vec<String> {
            program.structure(s).unwrap().fields.iter().map(|f| f.name.clone()).collect()
        };
        assert_eq!(names("A"), vec!["$typetable", "a"]);
        assert_eq!(names("B"), vec!["$typetable", "a", "b"]);
        assert_eq!(names("C"), vec!["$typetable", "a", "b", "c"]);

        let reads = field_ptrs(body(&program, "read"));
        assert_eq!(reads, vec![("B".to_string(), FieldIndex::Index(2))]);
    }

    #[test]
    fn test_constructor_initializes_ancestor_fields_first() {
        let program = lower(&[CHAIN]);
        let stores = field_ptrs(body(&program, "C::$init"));
        let indices: Vec<FieldIndex> = stores
            .into_iter()
            .filter(|(structure, _)| structure == "C")
            .map(|(_, index)| index)
            .collect();
        assert_eq!(
            indices,
            vec![
                FieldIndex::Index(0),
                FieldIndex::Index(1),
                FieldIndex::Index(2),
                FieldIndex::Index(3)
            ]
        );
        assert!(body(&program, "C::$init").referenced_functions().contains(&"B::$body"));
        assert!(body(&program, "B::$body").referenced_functions().contains(&"A::$body"));
    }

    #[test]
    fn test_vtables_are_complete() {
        let program = lower(&[r#"
            protocol Named { fn Name() i32; fn Id() i32; }
            open class Animal { pub fn Speak() i32 { return 0; } }
            class Dog : Animal, Named {
                pub override fn Speak() i32 { return 1; }
                pub fn Name() i32 { return 7; }
                pub fn Id() i32 { return 9; }
            }
        "#]);
        let named = program.global("Dog$vtable[Named]").unwrap();
        let Some(LoweredNode::Aggregate { fields, .. }) = &named.initializer else {
            panic!("expected an aggregate vtable");
        };
        assert_eq!(fields.len(), 2);
        let slots = named.initializer.as_ref().unwrap().referenced_functions();
        assert!(slots.contains(&"Dog::Name"));
        assert!(slots.contains(&"Dog::Id"));

        let own = program.global("Dog$vtable[Dog]").unwrap();
        let slots = own.initializer.as_ref().unwrap().referenced_functions();
        assert!(slots.contains(&"Dog::Speak"));
        assert!(!slots.contains(&"Animal::Speak"));

        assert!(program.global("Named$descriptor").is_some());
        let table = program.global("Dog$typetable").unwrap();
        let mut uses_descriptor = false;
        table.initializer.as_ref().unwrap().walk(&mut |n| {
            uses_descriptor |= matches!(n, LoweredNode::Global { name, .. } if name == "Named$descriptor");
        });
        assert!(uses_descriptor);
    }

    #[test]
    fn test_equality_operators_call_is_equal() {
        let program = lower(&[r#"
            class A { var v i32; fn IsEqual(other A) bool { return self.v == other.v; } }
            fn same(a A, b A) bool { return a == b; }
            fn different(a A, b A) bool { return a != b; }
        "#]);
        let same = body(&program, "same");
        assert!(same.referenced_functions().contains(&"A::IsEqual"));
        let mut compares_pointers = false;
        same.walk(&mut |n| {
            compares_pointers |= matches!(n, LoweredNode::Binary { op: BinaryOp::Equal, .. });
        });
        assert!(!compares_pointers);

        let mut negated = false;
        body(&program, "different").walk(&mut |n| {
            negated |= matches!(n, LoweredNode::Unary { op: UnaryOp::Not, .. });
        });
        assert!(negated);
    }
}

// =============================================================================
// LAZY STATICS
// =============================================================================

mod lazy_statics {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Value {
        Int(i128),
        Bool(bool),
        Unit,
    }

    /// Evaluates the handful of nodes lazy getters are made of.
    struct Machine<'p> {
        program: &'p LoweredProgram,
        globals: HashMap<String, Value>,
        calls: HashMap<String, u32>,
        returned: Option<Value>,
    }

    impl<'p> Machine<'p> {
        fn new(program: &'p LoweredProgram) -> Self {
            Self {
                program,
                globals: HashMap::new(),
                calls: HashMap::new(),
                returned: None,
            }
        }

        fn call(&mut self, name: &str) -> Value {
            *self.calls.entry(name.to_string()).or_default() += 1;
            let program = self.program;
            let body = body(program, name);
            let outer = self.returned.take();
            self.exec(body);
            let value = self.returned.take().unwrap_or(Value::Unit);
            self.returned = outer;
            value
        }

        fn global(&mut self, name: &str) -> Value {
            if let Some(value) = self.globals.get(name) {
                return *value;
            }
            let program = self.program;
            let initializer = program.global(name).and_then(|g| g.initializer.as_ref());
            match initializer {
                Some(node) => self.exec(node),
                None => panic!("no global '{}'", name),
            }
        }

        fn exec(&mut self, node: &LoweredNode) -> Value {
            if self.returned.is_some() {
                return Value::Unit;
            }
            match node {
                LoweredNode::Literal { value: LoweredLiteral::Int(v), .. } => Value::Int(*v),
                LoweredNode::Literal { value: LoweredLiteral::Bool(v), .. } => Value::Bool(*v),
                LoweredNode::Zero(_) => Value::Int(0),
                LoweredNode::Load { address, .. } => match &**address {
                    LoweredNode::Global { name, .. } => self.global(name),
                    other => panic!("unsupported load from {:?}", other),
                },
                LoweredNode::Store { target, value } => {
                    let value = self.exec(value);
                    match &**target {
                        LoweredNode::Global { name, .. } => self.globals.insert(name.clone(), value),
                        other => panic!("unsupported store to {:?}", other),
                    };
                    Value::Unit
                }
                LoweredNode::Unary { op: UnaryOp::Not, operand, .. } => match self.exec(operand) {
                    Value::Bool(v) => Value::Bool(!v),
                    other => panic!("'not' applied to {:?}", other),
                },
                LoweredNode::Binary { op: BinaryOp::Add, left, right, .. } => {
                    match (self.exec(left), self.exec(right)) {
                        (Value::Int(a), Value::Int(b)) => Value::Int(a + b),
                        other => panic!("'+' applied to {:?}", other),
                    }
                }
                LoweredNode::Call { callee, .. } => match &**callee {
                    LoweredNode::FunctionRef { name, .. } => self.call(name),
                    other => panic!("unsupported callee {:?}", other),
                },
                LoweredNode::Block { stmts, value } => {
                    for stmt in stmts {
                        self.exec(stmt);
                    }
                    value.as_ref().map_or(Value::Unit, |v| self.exec(v))
                }
                LoweredNode::If {
                    condition,
                    then_branch,
                    else_branch,
                } => {
                    match self.exec(condition) {
                        Value::Bool(true) => self.exec(then_branch),
                        Value::Bool(false) => else_branch.as_ref().map_or(Value::Unit, |e| self.exec(e)),
                        other => panic!("condition is {:?}", other),
                    };
                    Value::Unit
                }
                LoweredNode::Return(value) => {
                    let value = value.as_ref().map_or(Value::Unit, |v| self.exec(v));
                    self.returned = Some(value);
                    Value::Unit
                }
                other => panic!("unsupported node {:?}", other),
            }
        }
    }

    #[test]
    fn test_initializer_runs_once() {
        let program = lower(&[r#"
            fn seed() i32 { return 42; }
            module Config { pub let answer i32 = seed(); }
            fn twice() i32 { return Config.answer + Config.answer; }
        "#]);
        let mut machine = Machine::new(&program);
        assert_eq!(machine.call("twice"), Value::Int(84));
        assert_eq!(machine.calls["seed"], 1);
        assert_eq!(machine.calls["Config::answer$get"], 2);

        assert_eq!(machine.call("twice"), Value::Int(84));
        assert_eq!(machine.calls["seed"], 1);
    }

    #[test]
    fn test_literal_static_is_not_lazy() {
        let program = lower(&["module Limits { pub let max i32 = 10; } fn top() i32 { return Limits.max; }"]);
        assert!(program.global("Limits::max$guard").is_none());
        assert!(program.function("Limits::max$get").is_none());
        let mut machine = Machine::new(&program);
        assert_eq!(machine.call("top"), Value::Int(10));
    }
}
