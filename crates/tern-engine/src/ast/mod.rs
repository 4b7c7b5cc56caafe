// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Abstract Syntax Tree (AST) definitions.
//!
//! The parser builds a [`Program`] whose statements are [`Node`]s. Every node
//! carries the source position it was parsed from and owns its children
//! outright; nothing in the tree is shared and the tree is never mutated
//! after parsing.
//!
//! ## Structure
//!
//! - `operator` - The closed [`Operator`] set
//! - `tree` - Child enumeration, tree rendering and traversal

mod operator;
mod tree;

pub use operator::Operator;

use crate::lexer::Position;

/// A complete program: the statements of the global scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    /// The top-level statements
    pub body: Vec<Node>,
}

impl Program {
    /// Creates a program from its top-level statements.
    pub fn new(body: Vec<Node>) -> Self {
        Self { body }
    }
}

/// A literal value as written in source.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Numeric literal
    Number(f64),
    /// String literal
    String(String),
    /// `true` or `false`
    Boolean(bool),
}

/// A single AST node.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Where the node starts in the source
    pub pos: Position,
    /// What the node is
    pub kind: NodeKind,
}

/// The node taxonomy.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// A literal value
    Literal(Literal),
    /// A variable reference
    Ident(String),
    /// `left op right`, including assignment and the logical operators
    BinaryExpr {
        /// The operator
        op: Operator,
        /// Left operand
        left: Box<Node>,
        /// Right operand
        right: Box<Node>,
    },
    /// Prefix or postfix operator application.
    ///
    /// The operand is only optional for postfix forms.
    UnaryExpr {
        /// The operator
        op: Operator,
        /// Whether the operator precedes its operand
        prefix: bool,
        /// The operand
        operand: Option<Box<Node>>,
    },
    /// `name` or `name = init` inside a `var` statement
    Declarator {
        /// The declared identifier (an `Ident` node)
        ident: Box<Node>,
        /// Optional initializer
        init: Option<Box<Node>>,
    },
    /// `var a = 1, b;`
    VarDeclaration(Vec<Node>),
    /// `{ ... }`
    Block(Vec<Node>),
    /// Formal parameter list of a function (`Ident` nodes)
    Args(Vec<Node>),
    /// `function name(params) { ... }`
    FuncDeclaration {
        /// The function name (an `Ident` node)
        ident: Box<Node>,
        /// The parameter list (an `Args` node), absent for `()`
        params: Option<Box<Node>>,
        /// The body (a `Block` node)
        block: Box<Node>,
    },
    /// `if (test) consequent else alternate`
    If {
        /// The condition
        test: Box<Node>,
        /// The then branch
        consequent: Box<Node>,
        /// The optional else branch
        alternate: Option<Box<Node>>,
    },
    /// `while (test) block`
    While {
        /// The condition
        test: Box<Node>,
        /// The loop body
        block: Box<Node>,
    },
    /// `do block while (test)`
    DoWhile {
        /// The loop body
        block: Box<Node>,
        /// The condition
        test: Box<Node>,
    },
    /// `for (init; test; update) block`
    For {
        /// Runs once before the loop
        init: Option<Box<Node>>,
        /// Absent means always true
        test: Option<Box<Node>>,
        /// Runs after each iteration
        update: Option<Box<Node>>,
        /// The loop body
        block: Box<Node>,
    },
    /// `callee(args...)`
    Call {
        /// The called function or builtin (an `Ident` node)
        callee: Box<Node>,
        /// Arguments, evaluated left to right
        args: Vec<Node>,
    },
    /// `return argument;`
    Return(Option<Box<Node>>),
}

impl Node {
    /// Creates a node at the given position.
    pub fn new(pos: Position, kind: NodeKind) -> Self {
        Self { pos, kind }
    }

    /// Returns the name if this node is an identifier.
    pub fn ident_name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Ident(name) => Some(name),
            _ => None,
        }
    }

    /// Returns true for nodes that produce a value when evaluated.
    ///
    /// Expressions in statement position leave that value on the operand
    /// stack and the compiler discards it.
    pub fn is_expression(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Literal(_)
                | NodeKind::Ident(_)
                | NodeKind::BinaryExpr { .. }
                | NodeKind::UnaryExpr { .. }
                | NodeKind::Call { .. }
        )
    }
}
