use crate::compiler::ir::{FieldIndex, Linkage, LoweredNode, LoweredProgram};
use crate::compiler::{Compilation, CompileOptions};
use crate::parser::ast::UnaryOp;

fn lower(sources: &[&str]) -> LoweredProgram {
    let mut compilation = Compilation::new(CompileOptions::sequential());
    for (i, source) in sources.iter().enumerate() {
        compilation.add_source(format!("file{}.cv", i), *source);
    }
    let has_errors = compilation.check().unwrap().has_errors();
    assert!(!has_errors, "{}", compilation.render_diagnostics().unwrap());
    compilation.lower().unwrap()
}

fn body<'p>(program: &'p LoweredProgram, name: &str) -> &'p LoweredNode {
    program
        .function(name)
        .and_then(|f| f.body.as_ref())
        .unwrap_or_else(|| panic!("no body for '{}'", name))
}

fn references(program: &LoweredProgram, function: &str, target: &str) -> bool {
    body(program, function).referenced_functions().contains(&target)
}

fn contains(node: &LoweredNode, predicate: impl Fn(&LoweredNode) -> bool) -> bool {
    let mut found = false;
    node.walk(&mut |n| found |= predicate(n));
    found
}

fn uses_global(node: &LoweredNode, global: &str) -> bool {
    contains(node, |n| matches!(n, LoweredNode::Global { name, .. } if name == global))
}

const ANIMALS: &str = r#"
    open class Animal {
        pub var legs i32 = 4;
        pub fn Speak() i32 { return 0; }
    }
    class Dog : Animal, Named {
        init(legs) { }
        pub override fn Speak() i32 { return 1; }
        pub fn Name() i32 { return 7; }
    }
    protocol Named { fn Name() i32; }
    fn main() i32 {
        let a Animal = new Dog(3);
        return a.Speak();
    }
"#;

#[test]
fn test_main_keeps_its_name() {
    let program = lower(&["fn helper() i32 { return 1; } fn main() i32 { return helper(); }"]);
    let main = program.function("main").unwrap();
    assert_eq!(main.linkage, Linkage::External);
    assert_eq!(program.function("helper").unwrap().linkage, Linkage::Internal);
    assert!(references(&program, "main", "helper"));
}

#[test]
fn test_generic_function_is_specialized_per_type_arguments() {
    let program = lower(&[r#"
        fn max[T](a T, b T) T { if a > b { return a; } return b; }
        fn main() i64 { let x i64 = 3; return max(x, 4); }
        fn other() i64 { let y i64 = 1; return max(y, 2); }
        fn small() i32 { let z i32 = 1; return max(z, 2); }
    "#]);
    assert!(program.function("max").is_none());
    assert!(program.function("max[i64]").is_some());
    assert!(program.function("max[i32]").is_some());
    let copies = program
        .files
        .iter()
        .filter(|f| f.functions.contains_key("max[i64]"))
        .count();
    assert_eq!(copies, 1);
    assert!(references(&program, "main", "max[i64]"));
    assert!(references(&program, "other", "max[i64]"));
}

#[test]
fn test_constructor_stores_type_table_first() {
    let program = lower(&[r#"
        class Point { pub var x i32 = 1; pub var y i32; }
        fn make() Point { return new Point(); }
    "#]);
    let point = program.structure("Point").unwrap();
    let names: Vec<&str> = point.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["$typetable", "x", "y"]);

    let LoweredNode::Block { stmts, .. } = body(&program, "Point::$init") else {
        panic!("expected a block");
    };
    match &stmts[0] {
        LoweredNode::Store { target, value } => {
            assert!(matches!(
                &**target,
                LoweredNode::FieldPtr { index: FieldIndex::Index(0), .. }
            ));
            assert!(matches!(&**value, LoweredNode::Global { name, .. } if name == "Point$typetable"));
        }
        other => panic!("expected the header store, got {:?}", other),
    }
    assert_eq!(stmts.len(), 3);
    // sealed classes have no separate constructor body
    assert!(program.function("Point::$body").is_none());

    assert!(references(&program, "make", "corvid_alloc"));
    assert!(references(&program, "make", "Point::$init"));
    assert_eq!(program.function("corvid_alloc").unwrap().linkage, Linkage::Foreign);
}

#[test]
fn test_virtual_call_goes_through_vtable() {
    let program = lower(&[ANIMALS]);
    let main = body(&program, "main");
    assert!(!main.referenced_functions().contains(&"Animal::Speak"));
    assert!(contains(main, |n| matches!(
        n,
        LoweredNode::Call { callee, .. } if matches!(**callee, LoweredNode::Load { .. })
    )));
    assert!(program.global("Dog$vtable[Dog]").is_some());
    assert!(program.global("Dog$typetable").is_some());
    assert!(program.function("Animal::$body").is_some());
    assert!(references(&program, "Dog::$init", "Animal::$body"));
}

#[test]
fn test_base_member_call_is_direct() {
    let program = lower(&[r#"
        open class Animal { pub fn Speak() i32 { return 0; } }
        class Dog : Animal { pub override fn Speak() i32 { return base.Speak() + 1; } }
    "#]);
    assert!(references(&program, "Dog::Speak", "Animal::Speak"));
}

#[test]
fn test_inequality_negates_is_equal() {
    let program = lower(&[
        "class A { var v i32; fn IsEqual(other A) bool { return self.v == other.v; } } fn f(a A, b A) bool { return a != b; }",
    ]);
    let f = body(&program, "f");
    assert!(contains(f, |n| matches!(
        n,
        LoweredNode::Unary { op: UnaryOp::Not, operand, .. }
            if operand.referenced_functions().contains(&"A::IsEqual")
    )));
}

#[test]
fn test_lazy_static_gets_guard_and_getter() {
    let program = lower(&[r#"
        fn seed() i32 { return 42; }
        module Config { pub let answer i32 = seed(); pub let limit i32 = 10; }
        fn main() i32 { return Config.answer + Config.limit; }
    "#]);
    let guard = program.global("Config::answer$guard").unwrap();
    assert!(!guard.is_constant);
    assert_eq!(guard.linkage, Linkage::Internal);
    assert!(program.global("Config::answer").is_some());

    let getter = body(&program, "Config::answer$get");
    assert!(contains(getter, |n| matches!(n, LoweredNode::If { .. })));
    assert!(getter.referenced_functions().contains(&"seed"));
    assert!(references(&program, "main", "Config::answer$get"));

    let limit = program.global("Config::limit").unwrap();
    assert!(limit.is_constant);
    assert!(matches!(limit.initializer, Some(LoweredNode::Literal { .. })));
    assert!(uses_global(body(&program, "main"), "Config::limit"));
}

#[test]
fn test_generic_base_vtable_slot_is_resolved() {
    let program = lower(&[r#"
        open class Base[T] { pub fn Other() i32 { return 1; } }
        class Leaf : Base[i32] { }
        class Leaf2 : Base[i64] { pub override fn Other() i32 { return 2; } }
    "#]);
    let vtable = program.global("Leaf$vtable[Leaf]").unwrap();
    let initializer = vtable.initializer.as_ref().unwrap();
    assert!(initializer.placeholder().is_none());
    assert!(initializer.referenced_functions().contains(&"Base[i32]::Other"));
    assert!(program.function("Base[i32]::Other").is_some());
    assert!(program.function("Base::Other").is_none());
}

#[test]
fn test_foreign_function_keeps_its_name() {
    let program = lower(&["@foreign fn puts(v i32) i32; fn main() i32 { return puts(1); }"]);
    let puts = program.function("puts").unwrap();
    assert_eq!(puts.linkage, Linkage::Foreign);
    assert!(puts.body.is_none());
    assert!(references(&program, "main", "puts"));
}

#[test]
fn test_protocol_casts() {
    let program = lower(&[r#"
        protocol Named { fn Name() i32; }
        class Dog : Named { pub fn Name() i32 { return 7; } }
        open class Cat : Named { pub fn Name() i32 { return 8; } }
        fn wrap_dog(d Dog) Named { return d as Named; }
        fn wrap_cat(c Cat) Named { return c as Named; }
        fn call(n Named) i32 { return n.Name(); }
    "#]);
    let sealed = body(&program, "wrap_dog");
    assert!(uses_global(sealed, "Dog$vtable[Named]"));
    assert!(!sealed.referenced_functions().contains(&"corvid_protocol_vtable"));

    let open = body(&program, "wrap_cat");
    assert!(open.referenced_functions().contains(&"corvid_protocol_vtable"));
    assert!(uses_global(open, "Named$descriptor"));

    let call = body(&program, "call");
    assert!(contains(call, |n| matches!(n, LoweredNode::ExtractValue { index: 1, .. })));
    assert!(program.structure("Named$vtable[Named]").is_some());
}

#[test]
fn test_generic_class_specialization() {
    let program = lower(&[r#"
        class Box[T] { pub var value T; pub fn Get() T { return self.value; } }
        fn main() i32 { let b = new Box[i32](); return b.Get(); }
    "#]);
    assert!(program.structure("Box[i32]").is_some());
    assert!(program.structure("Box").is_none());
    assert!(program.function("Box[i32]::$init").is_some());
    assert!(references(&program, "main", "Box[i32]::Get"));
}
