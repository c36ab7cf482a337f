use super::*;
use crate::parser::checker::binder::Binder;
use crate::parser::types::PrimitiveKind;
use crate::parser::Parser;

fn check_files(sources: &[&str]) -> (SymbolTable, Vec<SemanticTree>, Diagnostics) {
    let files: Vec<SourceFile> = sources
        .iter()
        .enumerate()
        .map(|(i, src)| Parser::new(src).unwrap().parse(format!("file{}.cv", i)).unwrap())
        .collect();
    let table = Binder::new().bind(&files);
    let mut diagnostics = Diagnostics::new();
    let trees = files
        .iter()
        .enumerate()
        .map(|(i, file)| Analyser::new(&table, FileId(i as u32), &mut diagnostics).analyse(file))
        .collect();
    (table, trees, diagnostics)
}

fn errors(source: &str) -> Vec<CheckError> {
    let (_, _, diagnostics) = check_files(&[source]);
    diagnostics.iter().map(|(_, e)| e.clone()).collect()
}

fn assert_clean(source: &str) {
    let found = errors(source);
    assert!(found.is_empty(), "unexpected diagnostics: {:?}", found);
}

fn function<'t>(tree: &'t SemanticTree, name: &str, table: &SymbolTable) -> &'t SemFunction {
    tree.declarations
        .iter()
        .filter_map(SemanticDeclaration::as_function)
        .find(|f| table.symbol(f.symbol).name == name)
        .map(|f| f.as_ref())
        .unwrap()
}

#[test]
fn test_clean_program() {
    assert_clean(
        r#"
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
        "#,
    );
}

#[test]
fn test_unknown_name() {
    let found = errors("fn main() i32 { return missing; }");
    assert!(matches!(&found[..], [CheckError::NotFound { name, .. }, ..] if name == "missing"));
}

#[test]
fn test_literal_adapts_to_declared_type() {
    let (table, trees, diagnostics) = check_files(&["fn f() u8 { let x u8 = 200; return x + 1; }"]);
    assert!(!diagnostics.has_errors());
    let f = function(&trees[0], "f", &table);
    let block = f.body.block.as_ref().unwrap();
    let SemStmt::Var { initializer, .. } = &block.statements[0] else {
        panic!("expected var");
    };
    let init = initializer.as_ref().unwrap();
    assert_eq!(init.ty, DataType::Primitive(PrimitiveKind::U8));
    assert!(matches!(init.kind, SemExprKind::Literal(_)));
}

#[test]
fn test_widening_inserts_implicit_cast() {
    let (table, trees, diagnostics) =
        check_files(&["fn f(a i32) i64 { let b i64 = a; return b; }"]);
    assert!(!diagnostics.has_errors());
    let f = function(&trees[0], "f", &table);
    let block = f.body.block.as_ref().unwrap();
    let SemStmt::Var { initializer, .. } = &block.statements[0] else {
        panic!("expected var");
    };
    assert!(matches!(
        initializer.as_ref().unwrap().kind,
        SemExprKind::Cast { implicit: true, .. }
    ));
}

#[test]
fn test_narrowing_is_incompatible() {
    let found = errors("fn f(a i64) i32 { return a; }");
    assert!(found
        .iter()
        .any(|e| matches!(e, CheckError::IncompatibleType { .. })));
}

#[test]
fn test_generic_inference() {
    let (table, trees, diagnostics) = check_files(&[
        "fn max[T](a T, b T) T { if a > b { return a; } return b; } fn main() i64 { let x i64 = 3; return max(x, 4); }",
    ]);
    assert!(!diagnostics.has_errors(), "{:?}", diagnostics);
    let main = function(&trees[0], "main", &table);
    let block = main.body.block.as_ref().unwrap();
    let SemStmt::Return { value: Some(value), .. } = &block.statements[1] else {
        panic!("expected return");
    };
    assert_eq!(value.ty, DataType::Primitive(PrimitiveKind::I64));
    let SemExprKind::Call { callee, .. } = &value.kind else {
        panic!("expected call");
    };
    let SemExprKind::Function { type_args, .. } = &callee.kind else {
        panic!("expected function");
    };
    assert_eq!(type_args, &vec![DataType::Primitive(PrimitiveKind::I64)]);
}

#[test]
fn test_cannot_infer_type_arguments() {
    let found = errors("fn make[T]() i32 { return 0; } fn main() i32 { return make(); }");
    assert!(matches!(&found[..], [CheckError::CannotInferTypeArguments { .. }]));
}

#[test]
fn test_wrong_argument_and_type_argument_count() {
    let found = errors("fn f(a i32) i32 { return a; } fn main() i32 { return f(1, 2); }");
    assert!(matches!(&found[..], [CheckError::WrongArgumentCount { expected: 1, actual: 2, .. }]));

    let found = errors("class Box[T] { } fn main() { let b = new Box[i32, i64](); }");
    assert!(matches!(&found[..], [CheckError::WrongTypeArgumentCount { .. }]));
}

#[test]
fn test_immutable_assignment() {
    let found = errors("fn f() { let a = 1; a = 2; }");
    assert!(matches!(&found[..], [CheckError::ImmutableAssignment { name, .. }] if name == "a"));
}

#[test]
fn test_immutable_field_assignable_in_constructor() {
    assert_clean("class P { let x i32; init(v i32) { self.x = v; } }");
    let found = errors("class P { let x i32; fn Set() { self.x = 1; } }");
    assert!(matches!(&found[..], [CheckError::ImmutableAssignment { .. }]));
}

#[test]
fn test_self_in_static_context() {
    let found = errors("class A { var x i32; static fn f() i32 { return self.x; } }");
    assert!(matches!(&found[..], [CheckError::MisplacedSelf { .. }, ..]));

    let found = errors("class A { var x i32; static fn f() i32 { return x; } }");
    assert!(matches!(&found[..], [CheckError::StaticMismatch { .. }, ..]));
}

#[test]
fn test_duplicate_symbols() {
    let found = errors("class A { var x i32; var x i32; } fn f() { let a = 1; let a = 2; }");
    let duplicates = found
        .iter()
        .filter(|e| matches!(e, CheckError::DuplicateSymbol { .. }))
        .count();
    assert_eq!(duplicates, 2);
}

#[test]
fn test_binding_problems_reported_in_their_own_file() {
    let (_, _, diagnostics) = check_files(&[
        "fn f() i32 { return 1; }",
        "use missing; fn f() i32 { return 2; }",
    ]);
    assert!(!diagnostics.is_empty());
    assert!(diagnostics.iter().all(|(file, _)| file.0 == 1));
    let errors: Vec<&CheckError> = diagnostics.iter().map(|(_, e)| e).collect();
    assert!(errors.iter().any(|e| matches!(e, CheckError::DuplicateSymbol { .. })));
    assert!(errors.iter().any(|e| matches!(e, CheckError::NotFound { .. })));
}

#[test]
fn test_override_marks_ancestor_virtual() {
    let (table, _, diagnostics) = check_files(&[
        "open class A { fn Speak() i32 { return 0; } } class B : A { override fn Speak() i32 { return 1; } }",
    ]);
    assert!(!diagnostics.has_errors());
    let a = table.find_in_file(FileId(0), "A").unwrap();
    let speak = table.structure(a).unwrap().functions[0];
    assert!(table.function(speak).unwrap().is_virtual());

    let b = table.find_in_file(FileId(0), "B").unwrap();
    let own = table.structure(b).unwrap().functions[0];
    assert_eq!(table.root_function(own), speak);
}

#[test]
fn test_override_errors() {
    let found = errors("open class A { } class B : A { override fn Speak() { } }");
    assert!(matches!(&found[..], [CheckError::NothingToOverride { .. }]));

    let found = errors(
        "open class A { fn Speak() i32 { return 0; } } class B : A { override fn Speak() bool { return true; } }",
    );
    assert!(matches!(&found[..], [CheckError::IncompatibleType { .. }]));
}

#[test]
fn test_inheritance_rules() {
    let found = errors("class A { } class B : A { }");
    assert!(matches!(&found[..], [CheckError::NotInheritable { .. }]));

    let found = errors("open class A { } open class B { } class C : A, B { }");
    assert!(matches!(&found[..], [CheckError::MultipleInheritance { .. }]));
}

#[test]
fn test_missing_protocol_implementation() {
    let found = errors("protocol P { fn Run() i32; } class A : P { }");
    assert!(matches!(
        &found[..],
        [CheckError::MissingImplementation { function, .. }] if function == "Run"
    ));
}

#[test]
fn test_base_call_rules() {
    let found = errors("open class A { init(x i32) { } } class B : A { init() { } }");
    assert!(matches!(&found[..], [CheckError::MissingBaseCall { .. }]));

    let found = errors("open class A { init(x i32) { } } class B : A { }");
    assert!(matches!(&found[..], [CheckError::MissingBaseCall { .. }]));

    let found =
        errors("open class A { init(x i32) { } } class B : A { init() { let y = 1; base(y); } }");
    assert!(found
        .iter()
        .any(|e| matches!(e, CheckError::BaseCallNotFirst { .. })));

    assert_clean("open class A { init(x i32) { } } class B : A { init() { base(1); } }");
}

#[test]
fn test_constructor_field_initializer_is_prepended() {
    let (table, trees, diagnostics) = check_files(&["class A { var legs i64; init(legs) { } }"]);
    assert!(!diagnostics.has_errors());
    let structure = trees[0].declarations[0].as_structure().unwrap();
    let init = structure.init.as_ref().unwrap();
    let block = init.body.block.as_ref().unwrap();
    let SemStmt::Expr(assign) = &block.statements[0] else {
        panic!("expected assignment");
    };
    let SemExprKind::Assign { target, .. } = &assign.kind else {
        panic!("expected assignment");
    };
    let SemExprKind::Field { field, .. } = &target.kind else {
        panic!("expected field target");
    };
    assert_eq!(table.symbol(*field).name, "legs");
}

#[test]
fn test_property_rules() {
    let found = errors("class A { var x i32 { set(v) { } } }");
    assert!(matches!(&found[..], [CheckError::SetterWithoutGetter { .. }]));

    let found = errors("class A { let x i32 { get { return 1; } set(v) { } } }");
    assert!(matches!(&found[..], [CheckError::SetterOnImmutableField { .. }]));

    let found = errors("module M { pub var x i32 = 1; }");
    assert!(matches!(&found[..], [CheckError::MutablePublicStaticField { .. }]));
}

#[test]
fn test_generic_virtual_function() {
    let found = errors("protocol P { fn Map[T](v T) T; }");
    assert!(matches!(&found[..], [CheckError::GenericVirtualFunction { .. }]));
}

#[test]
fn test_casts() {
    let found = errors("class A { } fn f(a A) bool { return a as bool; }");
    assert!(matches!(&found[..], [CheckError::InvalidCast { .. }]));

    let found = errors("fn f(a i32) i32 { return a as i32; }");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].severity(), crate::parser::checker::error::Severity::Hint);

    assert_clean(
        "protocol P { fn Run() i32; } class A : P { fn Run() i32 { return 1; } } fn f(a A) P { return a as P; }",
    );
    // implementing a protocol does not make the class assignable without a cast
    let found = errors(
        "protocol P { fn Run() i32; } class A : P { fn Run() i32 { return 1; } } fn f(a A) P { return a; }",
    );
    assert!(matches!(&found[..], [CheckError::IncompatibleType { .. }]));
}

#[test]
fn test_structure_equality_needs_is_equal() {
    let found = errors("class A { } fn f(a A, b A) bool { return a == b; }");
    assert!(matches!(&found[..], [CheckError::MissingIsEqual { .. }]));

    assert_clean(
        "class A { var v i32; fn IsEqual(other A) bool { return self.v == other.v; } } fn f(a A, b A) bool { return a != b; }",
    );
}

#[test]
fn test_missing_return() {
    let found = errors("fn f(a bool) i32 { if a { return 1; } }");
    assert!(matches!(&found[..], [CheckError::MissingReturn { .. }]));
    assert_clean("fn f(a bool) i32 { if a { return 1; } else { return 2; } }");
}

#[test]
fn test_cross_file_namespace_lookup() {
    let (_, _, diagnostics) = check_files(&[
        "namespace app.util; fn twice(v i32) i32 { return v * 2; }",
        "namespace app; fn main() i32 { return app.util.twice(2); }",
        "use app.util; fn other() i32 { return twice(3); }",
    ]);
    assert!(!diagnostics.has_errors(), "{:?}", diagnostics);
}

#[test]
fn test_enum_values_and_casts() {
    assert_clean("enum Color { Red, Green } fn f() i32 { let c = Color.Green; return c as i32; }");
    let found = errors("enum Color { Red } fn f() Color { return Color.Blue; }");
    assert!(matches!(&found[..], [CheckError::NotFound { .. }, ..]));
}

#[test]
fn test_declarations_are_recorded_once() {
    let (table, trees, _) = check_files(&["class A { var x i32; fn Get() i32 { return self.x; } }"]);
    let a = table.find_in_file(FileId(0), "A").unwrap();
    assert!(table.symbol(a).declaration.get().is_some());
    let get = table.structure(a).unwrap().functions[0];
    let recorded = table.symbol(get).declaration.get().unwrap();
    assert!(recorded.as_function().is_some());

    let structure = trees[0].declarations[0].as_structure().unwrap();
    let function = &structure.functions[0];
    assert_eq!(trees[0].parents.enclosing_structure(function.id), Some(a));
}
