//! End-to-end program tests
//!
//! Each test runs source through the whole pipeline and checks what the
//! program printed through `logprint`.

use pretty_assertions::assert_eq;
use tern_engine::compiler::{Bytecode, Instruction, OpCode, Operand};
use tern_engine::{Engine, Error, RuntimeErrorKind, SharedOutput, VM, Value, VmConfig};

const FIBONACCI: &str = "
    function fibonacci(n) {
        if (n <= 1) {
            return n;
        } else {
            return fibonacci(n - 1) + fibonacci(n - 2);
        }
    }
";

/// Run a program and capture its output
fn run(source: &str) -> (Result<Value, Error>, Vec<String>) {
    let output = SharedOutput::new();
    let mut engine = Engine::new().with_output(output.clone());
    let result = engine.eval(source);
    (result, output.lines())
}

fn output_of(source: &str) -> Vec<String> {
    let (result, lines) = run(source);
    if let Err(e) = result {
        panic!("program failed: {}", e);
    }
    lines
}

fn runtime_error_of(source: &str) -> (RuntimeErrorKind, Vec<String>) {
    match run(source) {
        (Err(Error::Runtime(e)), lines) => (e.kind, lines),
        (other, _) => panic!("expected a runtime error, got {:?}", other),
    }
}

// ============================================================================
// Functions and recursion
// ============================================================================

#[test]
fn test_fibonacci_of_ten() {
    let source = format!("{}logprint(fibonacci(10));", FIBONACCI);
    assert_eq!(output_of(&source), vec!["55"]);
}

#[test]
fn test_fibonacci_base_cases() {
    let source = format!("{}logprint(fibonacci(0)); logprint(fibonacci(1));", FIBONACCI);
    assert_eq!(output_of(&source), vec!["0", "1"]);
}

#[test]
fn test_fibonacci_sequence_program() {
    let source = format!(
        "{}
        var i = 0;
        while (i < 10) {{
            var result = fibonacci(i);
            logprint(result + 1);
            i = i + 1;
        }}",
        FIBONACCI
    );
    assert_eq!(
        output_of(&source),
        vec!["1", "2", "2", "3", "4", "6", "9", "14", "22", "35"]
    );
}

#[test]
fn test_fibonacci_sequence_from_one() {
    let source = format!(
        "{}
        for (var i = 1; i <= 10; i++) {{
            logprint(fibonacci(i) + 1);
        }}",
        FIBONACCI
    );
    assert_eq!(
        output_of(&source),
        vec!["2", "2", "3", "4", "6", "9", "14", "22", "35", "56"]
    );
}

#[test]
fn test_locals_are_per_activation() {
    let source = "
        function depth(n) {
            var mine = n * 10;
            if (n > 0) {
                depth(n - 1);
            }
            logprint(mine);
            return mine;
        }
        depth(2);
    ";
    assert_eq!(output_of(source), vec!["0", "10", "20"]);
}

#[test]
fn test_functions_see_earlier_globals() {
    let source = "
        var total = 0;
        function add(x) { total = total + x; return total; }
        for (var i = 1; i <= 4; i++) { add(i); }
        logprint(total);
    ";
    assert_eq!(output_of(source), vec!["10"]);
}

#[test]
fn test_logprint_returns_its_argument() {
    assert_eq!(output_of("logprint(logprint('twice'));"), vec!["twice", "twice"]);
}

// ============================================================================
// Control flow
// ============================================================================

#[test]
fn test_do_while_runs_once() {
    let source = "var n = 0; do { logprint('body'); n++; } while (false); logprint(n);";
    assert_eq!(output_of(source), vec!["body", "1"]);
}

#[test]
fn test_while_and_for_can_run_zero_times() {
    let source = "
        while (false) { logprint('while'); }
        for (var i = 0; i < 0; i++) { logprint('for'); }
        logprint('done');
    ";
    assert_eq!(output_of(source), vec!["done"]);
}

#[test]
fn test_for_without_test_exits_through_return() {
    let source = "
        function firstSquareOver(limit) {
            for (var i = 0; ; i++) {
                if (i * i > limit) return i;
            }
        }
        logprint(firstSquareOver(50));
    ";
    assert_eq!(output_of(source), vec!["8"]);
}

#[test]
fn test_if_else_chain() {
    let source = "
        function sign(x) {
            if (x < 0) return 'negative';
            else if (x == 0) return 'zero';
            else return 'positive';
        }
        logprint(sign(-3)); logprint(sign(0)); logprint(sign(9));
    ";
    assert_eq!(output_of(source), vec!["negative", "zero", "positive"]);
}

#[test]
fn test_short_circuit_skips_side_effects() {
    let source = "
        function a() { logprint('a'); return false; }
        function b() { logprint('b'); return true; }
        a() && b();
        b() || a();
    ";
    assert_eq!(output_of(source), vec!["a", "b"]);
}

#[test]
fn test_short_circuit_evaluates_right_when_needed() {
    let source = "
        function t() { logprint('t'); return true; }
        function f() { logprint('f'); return false; }
        logprint(t() && f());
        logprint(f() || t());
    ";
    assert_eq!(output_of(source), vec!["t", "f", "false", "f", "t", "true"]);
}

// ============================================================================
// Updates
// ============================================================================

#[test]
fn test_postfix_increment_yields_old_value() {
    assert_eq!(output_of("var i = 5; logprint(i++); logprint(i);"), vec!["5", "6"]);
}

#[test]
fn test_prefix_updates_yield_new_value() {
    assert_eq!(output_of("var i = 5; logprint(++i); logprint(--i);"), vec!["6", "5"]);
}

#[test]
fn test_postfix_on_local() {
    let source = "function f() { var k = 1; var old = k--; return old * 10 + k; } logprint(f());";
    assert_eq!(output_of(source), vec!["10"]);
}

// ============================================================================
// Values
// ============================================================================

#[test]
fn test_number_formatting() {
    let source = "logprint(7 / 2); logprint(2 ** 0.5 * 0); logprint(10 / 4 * 4); logprint(-1 * 0);";
    assert_eq!(output_of(source), vec!["3.5", "0", "10", "0"]);
}

#[test]
fn test_string_building() {
    let source = "var s = ''; for (var i = 0; i < 3; i++) { s = s + i; } logprint('[' + s + ']');";
    assert_eq!(output_of(source), vec!["[012]"]);
}

#[test]
fn test_uninitialized_variable_is_undefined() {
    assert_eq!(output_of("var u; logprint(u);"), vec!["undefined"]);
}

// ============================================================================
// Runtime errors
// ============================================================================

#[test]
fn test_division_by_zero_halts() {
    let (kind, lines) =
        runtime_error_of("logprint('before'); logprint(5 / 0); logprint('after');");
    assert_eq!(kind, RuntimeErrorKind::DivisionByZero);
    assert_eq!(lines, vec!["before"]);
}

#[test]
fn test_unbounded_recursion_overflows() {
    let output = SharedOutput::new();
    let mut engine =
        Engine::with_config(VmConfig::new().with_max_frames(500)).with_output(output.clone());
    let err = engine
        .eval("function forever(n) { return forever(n + 1); } forever(0);")
        .unwrap_err();

    match err {
        Error::Runtime(e) => assert_eq!(e.kind, RuntimeErrorKind::StackOverflow { limit: 500 }),
        other => panic!("expected stack overflow, got {}", other),
    }
}

#[test]
fn test_default_frame_limit_holds_without_host_recursion() {
    let (kind, _) = runtime_error_of("function down(n) { return down(n - 1); } down(0);");
    assert_eq!(kind, RuntimeErrorKind::StackOverflow { limit: 10_000 });
}

#[test]
fn test_deep_but_bounded_recursion_succeeds() {
    let source = "
        function count(n) { if (n == 0) return 0; return 1 + count(n - 1); }
        logprint(count(5000));
    ";
    assert_eq!(output_of(source), vec!["5000"]);
}

#[test]
fn test_arity_is_checked_when_called() {
    let (kind, lines) = runtime_error_of("function two(a, b) { return a; } logprint(1); two(1);");
    assert_eq!(
        kind,
        RuntimeErrorKind::ArityMismatch {
            function: "two".into(),
            expected: 2,
            found: 1,
        }
    );
    assert_eq!(lines, vec!["1"]);
}

// ============================================================================
// Semantic gate
// ============================================================================

#[test]
fn test_semantic_errors_prevent_execution() {
    let (result, lines) = run("logprint('never'); logprint(missing); undefinedFn();");
    assert!(lines.is_empty());
    match result {
        Err(Error::Semantic(diagnostics)) => {
            let messages: Vec<String> = diagnostics.iter().map(|d| d.message.clone()).collect();
            assert_eq!(
                messages,
                vec!["'missing' is not declared", "function 'undefinedFn' is not declared"]
            );
        }
        other => panic!("expected semantic errors, got {:?}", other),
    }
}

#[test]
fn test_closure_capture_is_rejected() {
    let (result, _) = run("function outer(a) { function inner() { return a; } return inner(); }");
    assert!(matches!(result, Err(Error::Semantic(_))));
}

// ============================================================================
// Layout
// ============================================================================

/// Moves a jump-free program behind a block of dead code.
fn relocate(bytecode: &Bytecode, padding: usize) -> Bytecode {
    let mut moved = Bytecode::new();
    moved.constants = bytecode.constants.clone();
    moved.globals = bytecode.globals;

    let offset = padding + 1;
    moved.emit(Instruction::with_operand(
        OpCode::Jump,
        Operand::Jump(offset as u32),
    ));
    for _ in 0..padding {
        moved.emit(Instruction::simple(OpCode::LoadTrue));
    }
    for instruction in &bytecode.instructions {
        moved.emit(instruction.clone());
    }
    moved
}

#[test]
fn test_straight_line_output_is_layout_independent() {
    let bytecode = tern_engine::compile(
        "var a = 3; var b = a * 4; var c = b - a;
         logprint(a + b + c); logprint(c % 5); logprint('x' + c);",
    )
    .unwrap();
    assert!(bytecode.instructions.iter().all(|i| !i.opcode.is_jump()));

    let run_bytecode = |bytecode: &Bytecode| {
        let output = SharedOutput::new();
        let mut vm = VM::new();
        vm.set_output(Box::new(output.clone()));
        vm.execute(bytecode).unwrap();
        output.lines()
    };

    let expected = run_bytecode(&bytecode);
    assert_eq!(expected, vec!["24", "4", "x9"]);
    for padding in [0, 1, 7] {
        assert_eq!(run_bytecode(&relocate(&bytecode, padding)), expected);
    }
}
