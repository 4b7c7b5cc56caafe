// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Semantic analysis.
//!
//! The analyzer walks a parsed [`Program`] once and collects every problem
//! it finds instead of stopping at the first. The compiler only runs on a
//! program that produced no diagnostics, so it may treat any unresolved
//! name as an internal error.
//!
//! Rules enforced:
//!
//! - identifiers are declared in an enclosing scope before they are used
//! - a name is declared at most once per block (variables, functions and
//!   parameters share a block's namespace)
//! - calls target a declared function or a builtin, and functions are never
//!   used as values
//! - a function body only sees its own locals and globals (no closures)
//! - `return` only appears inside a function

use std::fmt;

use rustc_hash::FxHashMap;

use crate::ast::{Node, NodeKind, Program};
use crate::builtins;
use crate::lexer::Position;

/// A semantic problem found in the program.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// What is wrong
    pub message: String,
    /// Where the offending node starts
    pub pos: Position,
}

impl Diagnostic {
    /// Creates a diagnostic.
    pub fn new(message: impl Into<String>, pos: Position) -> Self {
        Self {
            message: message.into(),
            pos,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.message, self.pos)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Symbol {
    /// A variable or parameter owned by the function at this nesting level
    /// (0 is the global scope)
    Variable { owner: usize },
    Function,
}

#[derive(Debug, Clone, Default)]
struct Block {
    names: FxHashMap<String, Symbol>,
}

/// Checks a program for semantic errors.
///
/// The global scope survives between calls to [`Analyzer::analyze`], so an
/// interactive session can analyze one line at a time.
#[derive(Debug, Clone)]
pub struct Analyzer {
    blocks: Vec<Block>,
    function_depth: usize,
    diagnostics: Vec<Diagnostic>,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer {
    /// Creates an analyzer with an empty global scope.
    pub fn new() -> Self {
        Self {
            blocks: vec![Block::default()],
            function_depth: 0,
            diagnostics: Vec::new(),
        }
    }

    /// Records a global variable that already exists.
    pub fn declare_global(&mut self, name: impl Into<String>) {
        self.blocks[0]
            .names
            .insert(name.into(), Symbol::Variable { owner: 0 });
    }

    /// Records a function that already exists.
    pub fn declare_function(&mut self, name: impl Into<String>) {
        self.blocks[0].names.insert(name.into(), Symbol::Function);
    }

    /// Analyzes a program, returning every diagnostic in source order.
    ///
    /// Top-level declarations are kept in the global scope afterwards, even
    /// when diagnostics were reported.
    pub fn analyze(&mut self, program: &Program) -> Vec<Diagnostic> {
        for statement in &program.body {
            self.statement(statement);
        }
        tracing::debug!(
            diagnostics = self.diagnostics.len(),
            "semantic analysis finished"
        );
        std::mem::take(&mut self.diagnostics)
    }

    fn report(&mut self, message: impl Into<String>, pos: Position) {
        self.diagnostics.push(Diagnostic::new(message, pos));
    }

    // ========================================================================
    // Scopes
    // ========================================================================

    fn begin_block(&mut self) {
        self.blocks.push(Block::default());
    }

    fn end_block(&mut self) {
        self.blocks.pop();
    }

    fn declare(&mut self, name: &str, symbol: Symbol, pos: Position) {
        if builtins::is_builtin(name) {
            self.report(format!("'{}' is a builtin and cannot be redeclared", name), pos);
            return;
        }
        let Some(block) = self.blocks.last_mut() else {
            return;
        };
        if block.names.contains_key(name) {
            self.report(format!("'{}' is already declared in this scope", name), pos);
            return;
        }
        block.names.insert(name.to_string(), symbol);
    }

    fn lookup(&self, name: &str) -> Option<Symbol> {
        self.blocks
            .iter()
            .rev()
            .find_map(|block| block.names.get(name).copied())
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn statement(&mut self, node: &Node) {
        match &node.kind {
            NodeKind::VarDeclaration(declarators) => {
                for declarator in declarators {
                    self.declarator(declarator);
                }
            }
            NodeKind::Declarator { .. } => self.declarator(node),
            NodeKind::FuncDeclaration {
                ident,
                params,
                block,
            } => self.function(ident, params.as_deref(), block),
            NodeKind::Block(statements) => {
                self.begin_block();
                for statement in statements {
                    self.statement(statement);
                }
                self.end_block();
            }
            NodeKind::If {
                test,
                consequent,
                alternate,
            } => {
                self.expression(test);
                self.statement(consequent);
                if let Some(alternate) = alternate {
                    self.statement(alternate);
                }
            }
            NodeKind::While { test, block } => {
                self.expression(test);
                self.statement(block);
            }
            NodeKind::DoWhile { block, test } => {
                self.statement(block);
                self.expression(test);
            }
            NodeKind::For {
                init,
                test,
                update,
                block,
            } => {
                // The loop header gets its own scope
                self.begin_block();
                if let Some(init) = init {
                    self.statement(init);
                }
                if let Some(test) = test {
                    self.expression(test);
                }
                if let Some(update) = update {
                    self.expression(update);
                }
                self.statement(block);
                self.end_block();
            }
            NodeKind::Return(argument) => {
                if self.function_depth == 0 {
                    self.report("'return' outside of a function", node.pos);
                }
                if let Some(argument) = argument {
                    self.expression(argument);
                }
            }
            NodeKind::Args(_) => {
                self.report("parameter list outside of a function declaration", node.pos)
            }
            _ => self.expression(node),
        }
    }

    fn declarator(&mut self, node: &Node) {
        let NodeKind::Declarator { ident, init } = &node.kind else {
            self.report("expected a declarator", node.pos);
            return;
        };
        // The initializer cannot see the name it initializes
        if let Some(init) = init {
            self.expression(init);
        }
        match ident.ident_name() {
            Some(name) => {
                let owner = self.function_depth;
                self.declare(name, Symbol::Variable { owner }, ident.pos);
            }
            None => self.report("declared name must be an identifier", ident.pos),
        }
    }

    fn function(&mut self, ident: &Node, params: Option<&Node>, block: &Node) {
        // Declared before the body so the function can call itself
        match ident.ident_name() {
            Some(name) => self.declare(name, Symbol::Function, ident.pos),
            None => self.report("function name must be an identifier", ident.pos),
        }

        self.function_depth += 1;
        self.begin_block();

        if let Some(params) = params {
            match &params.kind {
                NodeKind::Args(names) => {
                    let owner = self.function_depth;
                    for param in names {
                        match param.ident_name() {
                            Some(name) => {
                                self.declare(name, Symbol::Variable { owner }, param.pos)
                            }
                            None => self.report("parameter must be an identifier", param.pos),
                        }
                    }
                }
                _ => self.report("malformed parameter list", params.pos),
            }
        }

        // Parameters and the body's top level share one namespace
        match &block.kind {
            NodeKind::Block(statements) => {
                for statement in statements {
                    self.statement(statement);
                }
            }
            _ => self.statement(block),
        }

        self.end_block();
        self.function_depth -= 1;
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn expression(&mut self, node: &Node) {
        match &node.kind {
            NodeKind::Literal(_) => {}
            NodeKind::Ident(name) => self.variable(name, node.pos),
            NodeKind::BinaryExpr { left, right, .. } => {
                self.expression(left);
                self.expression(right);
            }
            NodeKind::UnaryExpr { operand, .. } => {
                if let Some(operand) = operand {
                    self.expression(operand);
                }
            }
            NodeKind::Call { callee, args } => {
                match callee.ident_name() {
                    Some(name) => self.callee(name, callee.pos),
                    None => self.report("call target must be a name", callee.pos),
                }
                for arg in args {
                    self.expression(arg);
                }
            }
            NodeKind::VarDeclaration(_) | NodeKind::Declarator { .. } => self.statement(node),
            _ => self.report(format!("'{}' is not an expression", node), node.pos),
        }
    }

    fn variable(&mut self, name: &str, pos: Position) {
        match self.lookup(name) {
            Some(Symbol::Variable { owner }) => {
                if owner != 0 && owner != self.function_depth {
                    self.report(
                        format!("cannot capture '{}' from an enclosing function", name),
                        pos,
                    );
                }
            }
            Some(Symbol::Function) => {
                self.report(format!("function '{}' cannot be used as a value", name), pos)
            }
            None if builtins::is_builtin(name) => {
                self.report(format!("builtin '{}' cannot be used as a value", name), pos)
            }
            None => self.report(format!("'{}' is not declared", name), pos),
        }
    }

    fn callee(&mut self, name: &str, pos: Position) {
        if builtins::is_builtin(name) {
            return;
        }
        match self.lookup(name) {
            Some(Symbol::Function) => {}
            Some(Symbol::Variable { .. }) => {
                self.report(format!("'{}' is not a function", name), pos)
            }
            None => self.report(format!("function '{}' is not declared", name), pos),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn analyze(src: &str) -> Vec<String> {
        let program = parse(src).unwrap();
        Analyzer::new()
            .analyze(&program)
            .into_iter()
            .map(|d| d.message)
            .collect()
    }

    #[test]
    fn test_valid_program() {
        let diagnostics = analyze(
            "var total = 0;
             function add(a, b) { var sum = a + b; return sum; }
             for (var i = 0; i < 3; i++) { total = add(total, i); }
             logprint(total);",
        );
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    }

    #[test]
    fn test_recursion_is_allowed() {
        assert!(analyze("function f(n) { return f(n - 1); }").is_empty());
    }

    #[test]
    fn test_undeclared_identifier() {
        assert_eq!(analyze("x + 1;"), vec!["'x' is not declared"]);
    }

    #[test]
    fn test_use_before_declaration() {
        assert_eq!(
            analyze("logprint(y); var y = 1;"),
            vec!["'y' is not declared"]
        );
        assert_eq!(analyze("var z = z;"), vec!["'z' is not declared"]);
    }

    #[test]
    fn test_collects_every_diagnostic() {
        let diagnostics = analyze("a; b; return 1; c();");
        assert_eq!(
            diagnostics,
            vec![
                "'a' is not declared",
                "'b' is not declared",
                "'return' outside of a function",
                "function 'c' is not declared",
            ]
        );
    }

    #[test]
    fn test_duplicate_in_same_block() {
        assert_eq!(
            analyze("var a; var a;"),
            vec!["'a' is already declared in this scope"]
        );
        assert_eq!(
            analyze("function f(a) { var a; }"),
            vec!["'a' is already declared in this scope"]
        );
        // Shadowing in an inner block is fine
        assert!(analyze("var a; { var a; }").is_empty());
    }

    #[test]
    fn test_block_scope_ends() {
        assert_eq!(analyze("{ var a = 1; } a;"), vec!["'a' is not declared"]);
        assert_eq!(
            analyze("for (var i = 0; i < 1; i++) {} i;"),
            vec!["'i' is not declared"]
        );
    }

    #[test]
    fn test_functions_and_values_do_not_mix() {
        assert_eq!(
            analyze("function f() {} var x = f;"),
            vec!["function 'f' cannot be used as a value"]
        );
        assert_eq!(analyze("var x = 1; x();"), vec!["'x' is not a function"]);
        assert_eq!(
            analyze("var p = logprint;"),
            vec!["builtin 'logprint' cannot be used as a value"]
        );
    }

    #[test]
    fn test_no_closures() {
        assert_eq!(
            analyze("function outer(a) { function inner() { return a; } return inner(); }"),
            vec!["cannot capture 'a' from an enclosing function"]
        );
    }

    #[test]
    fn test_globals_visible_in_functions() {
        assert!(analyze("var g = 1; function f() { return g; }").is_empty());
        assert_eq!(
            analyze("function f() { return g; } var g = 1;"),
            vec!["'g' is not declared"]
        );
    }

    #[test]
    fn test_builtins_cannot_be_redeclared() {
        assert_eq!(
            analyze("var logprint = 1;"),
            vec!["'logprint' is a builtin and cannot be redeclared"]
        );
    }

    #[test]
    fn test_seeded_session() {
        let mut analyzer = Analyzer::new();
        analyzer.declare_global("x");
        analyzer.declare_function("f");
        let program = parse("f(x);").unwrap();
        assert!(analyzer.analyze(&program).is_empty());
    }

    #[test]
    fn test_declarations_persist_between_programs() {
        let mut analyzer = Analyzer::new();
        assert!(analyzer.analyze(&parse("var a = 1;").unwrap()).is_empty());
        assert!(analyzer.analyze(&parse("a + 1;").unwrap()).is_empty());
    }

    #[test]
    fn test_diagnostic_positions() {
        let program = parse("var a;\n  b;").unwrap();
        let diagnostics = Analyzer::new().analyze(&program);
        assert_eq!(diagnostics[0].pos, Position::new(2, 3));
        assert_eq!(diagnostics[0].to_string(), "'b' is not declared at 2:3");
    }
}
