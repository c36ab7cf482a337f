//! Checking and diagnostic rendering through the compilation driver.

use corvid_engine::{CheckError, Compilation, CompileError, CompileOptions, Severity};

fn checked(sources: &[&str]) -> Compilation {
    let mut compilation = Compilation::new(CompileOptions::sequential());
    for (i, source) in sources.iter().enumerate() {
        compilation.add_source(format!("file{}.cv", i), *source);
    }
    compilation.check().expect("parse error");
    compilation
}

#[test]
fn test_errors_block_lowering() {
    let compilation = checked(&["fn main() i32 { return missing; }"]);
    let diagnostics = compilation.diagnostics().unwrap();
    assert!(diagnostics.has_errors());
    assert_eq!(diagnostics.error_count(), 1);
    assert!(matches!(compilation.lower(), Err(CompileError::HasErrors(1))));
}

#[test]
fn test_rendered_diagnostics_name_file_and_code() {
    let compilation = checked(&[
        "fn ok() i32 { return 1; }",
        "fn main() i32 { return missing; }",
    ]);
    let text = compilation.render_diagnostics().unwrap();
    assert!(text.contains("file1.cv"), "{}", text);
    assert!(text.contains("E0001"), "{}", text);
    assert!(!text.contains("file0.cv"), "{}", text);
}

#[test]
fn test_diagnostics_sorted_by_file() {
    let compilation = checked(&[
        "fn a() i32 { return first; }",
        "fn b() i32 { return second; }",
        "fn c() i32 { return third; }",
    ]);
    let files: Vec<u32> = compilation
        .diagnostics()
        .unwrap()
        .iter()
        .map(|(file, _)| file.0)
        .collect();
    assert_eq!(files, vec![0, 1, 2]);
}

#[test]
fn test_hints_do_not_block_lowering() {
    let compilation = checked(&["fn f(a i32) i32 { return a as i32; }"]);
    let diagnostics = compilation.diagnostics().unwrap();
    assert_eq!(diagnostics.len(), 1);
    let (_, hint) = diagnostics.iter().next().unwrap();
    assert!(matches!(hint, CheckError::RedundantCast { .. }));
    assert_eq!(hint.severity(), Severity::Hint);

    let program = compilation.lower().unwrap();
    assert!(program.function("f").is_some());
}

#[test]
fn test_parallel_check_matches_sequential() {
    let sources = [
        "open class A { init(x i32) { } } class B : A { init() { } }",
        "fn f() i32 { return nothing; }",
        "class C { } fn g(a C, b C) bool { return a == b; }",
    ];
    let render = |options: CompileOptions| {
        let mut compilation = Compilation::new(options);
        for (i, source) in sources.iter().enumerate() {
            compilation.add_source(format!("file{}.cv", i), *source);
        }
        compilation.check().unwrap();
        compilation.render_diagnostics().unwrap()
    };
    let sequential = render(CompileOptions::sequential());
    let parallel = render(CompileOptions {
        workers: 3,
        ..CompileOptions::default()
    });
    assert!(!sequential.is_empty());
    assert_eq!(sequential, parallel);
}
