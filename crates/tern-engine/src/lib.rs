// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # tern-engine
//!
//! The compiler and virtual machine for tern, a small C-like scripting
//! language with numbers, strings, booleans, global and local variables,
//! first-order functions and structured control flow.
//!
//! ## Overview
//!
//! Source text goes through a fixed pipeline:
//! - [`lexer`] and [`parser`] build the [`ast`]
//! - [`semantic`] checks every name and call, gating compilation
//! - [`compiler`] lowers the tree to a flat instruction sequence
//! - [`vm`] executes it with an explicit call-frame stack
//!
//! ## Quick Start
//!
//! ```rust
//! use tern_engine::{Engine, Value};
//!
//! let mut engine = Engine::new();
//! let result = engine.eval("var x = 20; x * 2 + 2;").unwrap();
//! assert_eq!(result, Value::Number(42.0));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ast;
pub mod builtins;
pub mod compiler;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod runtime;
pub mod semantic;
pub mod vm;

use std::io::Write;
use std::path::Path;

pub use compiler::{Bytecode, Compiler};
pub use error::{CompileError, Error, Result, RuntimeError, RuntimeErrorKind, SyntaxError};
pub use runtime::Value;
pub use semantic::{Analyzer, Diagnostic};
pub use vm::{SharedOutput, VM, VmConfig};

/// A tern session.
///
/// Each call to [`Engine::eval`] runs one more chunk of source against the
/// same globals and functions, so a REPL can define a function on one line
/// and call it on the next. A chunk that fails to parse, analyze or compile
/// leaves the session exactly as it was.
pub struct Engine {
    analyzer: Analyzer,
    compiler: Compiler,
    vm: VM,
}

impl Engine {
    /// Creates a session with default limits that prints to stdout.
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    /// Creates a session with the given VM limits.
    pub fn with_config(config: VmConfig) -> Self {
        Self {
            analyzer: Analyzer::new(),
            compiler: Compiler::new(),
            vm: VM::with_config(config),
        }
    }

    /// Redirects `logprint` output.
    ///
    /// ```rust
    /// use tern_engine::{Engine, SharedOutput};
    ///
    /// let output = SharedOutput::new();
    /// let mut engine = Engine::new().with_output(output.clone());
    /// engine.eval("logprint('hi');").unwrap();
    /// assert_eq!(output.contents(), "hi\n");
    /// ```
    pub fn with_output<W: Write + 'static>(mut self, out: W) -> Self {
        self.vm.set_output(Box::new(out));
        self
    }

    /// Evaluates source code and returns the value of its final expression
    /// statement, or `undefined`.
    pub fn eval(&mut self, source: &str) -> Result<Value> {
        let program = parser::parse(source)?;

        let mut analyzer = self.analyzer.clone();
        let diagnostics = analyzer.analyze(&program);
        if !diagnostics.is_empty() {
            return Err(Error::Semantic(diagnostics));
        }

        let mut compiler = self.compiler.clone();
        let start = compiler.compile(&program)?;

        // Declarations stay visible even if the chunk fails at runtime
        self.analyzer = analyzer;
        self.compiler = compiler;

        let value = self.vm.run_from(self.compiler.bytecode(), start)?;
        Ok(value)
    }

    /// Reads and evaluates a source file.
    pub fn eval_file(&mut self, path: impl AsRef<Path>) -> Result<Value> {
        let path = path.as_ref();
        tracing::debug!("Loading {}", path.display());
        let source = std::fs::read_to_string(path)?;
        self.eval(&source)
    }

    /// Parses and analyzes source code without running it or changing the
    /// session.
    pub fn check(&self, source: &str) -> Result<()> {
        let program = parser::parse(source)?;
        let diagnostics = self.analyzer.clone().analyze(&program);
        if diagnostics.is_empty() {
            Ok(())
        } else {
            Err(Error::Semantic(diagnostics))
        }
    }

    /// Returns all bytecode compiled in this session.
    pub fn bytecode(&self) -> &Bytecode {
        self.compiler.bytecode()
    }

    /// Returns the VM limits of this session.
    pub fn config(&self) -> VmConfig {
        self.vm.config()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses, analyzes and compiles a standalone program.
pub fn compile(source: &str) -> Result<Bytecode> {
    let program = parser::parse(source)?;

    let diagnostics = Analyzer::new().analyze(&program);
    if !diagnostics.is_empty() {
        return Err(Error::Semantic(diagnostics));
    }

    let mut compiler = Compiler::new();
    compiler.compile(&program)?;
    Ok(compiler.into_bytecode())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> (Engine, SharedOutput) {
        let output = SharedOutput::new();
        (Engine::new().with_output(output.clone()), output)
    }

    #[test]
    fn test_eval_returns_final_expression() {
        let (mut engine, _) = engine();
        assert_eq!(engine.eval("1 + 2;").unwrap(), Value::Number(3.0));
        assert_eq!(engine.eval("var x = 1;").unwrap(), Value::Undefined);
    }

    #[test]
    fn test_session_keeps_declarations() {
        let (mut engine, output) = engine();
        engine.eval("var count = 0;").unwrap();
        engine
            .eval("function bump() { count = count + 1; return count; }")
            .unwrap();
        engine.eval("bump(); bump();").unwrap();
        engine.eval("logprint(count);").unwrap();
        assert_eq!(output.lines(), vec!["2"]);
    }

    #[test]
    fn test_failed_chunk_leaves_session_untouched() {
        let (mut engine, _) = engine();
        engine.eval("var a = 1;").unwrap();

        let err = engine.eval("var b = 2; c;").unwrap_err();
        assert!(matches!(err, Error::Semantic(_)));
        assert_eq!(err.to_string(), "SemanticError: 'c' is not declared at 1:12");

        // `b` was never committed, so it can be declared now
        engine.eval("var b = a + 1;").unwrap();
        assert_eq!(engine.eval("b;").unwrap(), Value::Number(2.0));
    }

    #[test]
    fn test_syntax_error_display() {
        let (mut engine, _) = engine();
        let err = engine.eval("var = 1;").unwrap_err();
        assert!(matches!(err, Error::Syntax(_)));
        assert!(err.to_string().starts_with("SyntaxError: expected identifier"));
    }

    #[test]
    fn test_runtime_error_keeps_declarations() {
        let (mut engine, _) = engine();
        let err = engine.eval("var n = 1 / 0;").unwrap_err();
        assert!(matches!(err, Error::Runtime(_)));
        assert!(!err.is_internal());

        engine.eval("n = 3;").unwrap();
        assert_eq!(engine.eval("n;").unwrap(), Value::Number(3.0));
    }

    #[test]
    fn test_check_does_not_commit() {
        let (mut engine, _) = engine();
        engine.check("var z = 1;").unwrap();
        assert!(engine.check("y;").is_err());
        engine.eval("var z = 2;").unwrap();
        assert!(!engine.bytecode().instructions.is_empty());
    }

    #[test]
    fn test_compile_standalone() {
        let bytecode = compile("function sq(x) { return x * x; } logprint(sq(3));").unwrap();
        assert_eq!(bytecode.functions.len(), 1);
        assert!(compile("logprint(nope);").is_err());
    }

    #[test]
    fn test_with_config() {
        let engine = Engine::with_config(VmConfig::new().with_max_frames(8));
        assert_eq!(engine.config().max_frames, 8);
    }
}
