use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use corvid_engine::{Compilation, CompileOptions, Lexer};

const LIBRARY: &str = r#"
namespace lib;
pub fn max[T](a T, b T) T { if a > b { return a; } return b; }
pub class Box[T] { pub var value T; pub fn Get() T { return self.value; } }
protocol Named { fn Name() i32; }
pub open class Animal {
    pub var legs i32 = 4;
    pub fn Speak() i32 { return 0; }
}
"#;

fn user(i: usize) -> String {
    format!(
        r#"
use lib;
class Dog{i} : Animal, Named {{
    pub override fn Speak() i32 {{ return {i}; }}
    pub fn Name() i32 {{ return self.legs; }}
}}
fn run{i}() i64 {{
    let a Animal = new Dog{i}();
    let b = new Box[i64]();
    let n Named = new Dog{i}() as Named;
    return max(b.Get(), {i}) + (a.Speak() + n.Name()) as i64;
}}
"#
    )
}

fn program(files: usize) -> Vec<(String, String)> {
    let mut sources = vec![("lib.cv".to_string(), LIBRARY.to_string())];
    sources.extend((0..files).map(|i| (format!("user{}.cv", i), user(i))));
    sources
}

fn compile(sources: &[(String, String)], options: CompileOptions) -> usize {
    let mut compilation = Compilation::new(options);
    for (path, text) in sources {
        compilation.add_source(path.clone(), text.clone());
    }
    compilation.check().unwrap();
    compilation.lower().unwrap().files.len()
}

fn bench_lex(c: &mut Criterion) {
    let source = user(0);
    c.bench_function("lex_user_file", |b| {
        b.iter(|| Lexer::new(black_box(&source)).tokenize().unwrap().len());
    });
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    for files in [8, 64] {
        let sources = program(files);
        group.throughput(Throughput::Elements(files as u64));
        group.bench_with_input(BenchmarkId::new("sequential", files), &sources, |b, sources| {
            b.iter(|| compile(black_box(sources), CompileOptions::sequential()));
        });
        group.bench_with_input(BenchmarkId::new("parallel", files), &sources, |b, sources| {
            b.iter(|| compile(black_box(sources), CompileOptions::default()));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_lex, bench_compile);
criterion_main!(benches);
