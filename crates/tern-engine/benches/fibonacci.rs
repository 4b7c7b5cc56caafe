//! Benchmarks for recursive calls through the VM.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use tern_engine::compiler::Compiler;
use tern_engine::parser::parse;
use tern_engine::{Engine, SharedOutput, VM};

const FIBONACCI: &str = "
    function fibonacci(n) {
        if (n <= 1) {
            return n;
        } else {
            return fibonacci(n - 1) + fibonacci(n - 2);
        }
    }
";

/// Execute precompiled bytecode, excluding front-end cost.
fn bench_execute(c: &mut Criterion) {
    let mut group = c.benchmark_group("fibonacci");

    for n in [10, 15, 20] {
        let source = format!("{}fibonacci({});", FIBONACCI, n);
        let program = parse(&source).expect("parse error");
        let mut compiler = Compiler::new();
        compiler.compile(&program).expect("compile error");
        let bytecode = compiler.into_bytecode();

        group.bench_with_input(BenchmarkId::new("execute", n), &bytecode, |b, bytecode| {
            let mut vm = VM::new();
            b.iter(|| vm.execute(black_box(bytecode)).expect("runtime error"))
        });
    }

    group.finish();
}

/// Whole pipeline: parse, analyze, compile and run.
fn bench_eval(c: &mut Criterion) {
    let source = format!("{}logprint(fibonacci(15));", FIBONACCI);

    c.bench_function("eval fibonacci(15)", |b| {
        b.iter(|| {
            let mut engine = Engine::new().with_output(SharedOutput::new());
            engine.eval(black_box(&source)).expect("eval error")
        })
    });
}

criterion_group!(benches, bench_execute, bench_eval);
criterion_main!(benches);
