// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for every stage of the pipeline.
//!
//! The stages fail differently. Syntax errors stop the parser at the first
//! problem. Semantic diagnostics are collected exhaustively and gate
//! compilation. Compiler errors only signal a defect in the pipeline itself.
//! Runtime errors halt the VM at the first fault.

use thiserror::Error;

use crate::lexer::Position;
use crate::semantic::Diagnostic;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Any error the engine can report.
#[derive(Debug, Error)]
pub enum Error {
    /// The source could not be parsed
    #[error("SyntaxError: {0}")]
    Syntax(#[from] SyntaxError),

    /// The program parsed but failed semantic analysis
    #[error("{}", format_diagnostics(.0))]
    Semantic(Vec<Diagnostic>),

    /// The compiler hit an invariant violation
    #[error("{0}")]
    Compile(#[from] CompileError),

    /// Execution failed
    #[error("{0}")]
    Runtime(#[from] RuntimeError),

    /// Reading a source file failed
    #[error("IOError: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns true when the error reports a defect in the engine rather
    /// than a problem in the user's program.
    pub fn is_internal(&self) -> bool {
        match self {
            Error::Compile(_) => true,
            Error::Runtime(e) => e.is_internal(),
            _ => false,
        }
    }
}

fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| format!("SemanticError: {}", d))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A syntax error produced by the parser.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} at {pos}")]
pub struct SyntaxError {
    /// What went wrong
    pub message: String,
    /// Where it went wrong
    pub pos: Position,
}

impl SyntaxError {
    /// Creates a syntax error.
    pub fn new(message: impl Into<String>, pos: Position) -> Self {
        Self {
            message: message.into(),
            pos,
        }
    }
}

/// An invariant violation inside the compiler.
///
/// Semantic analysis guarantees these never happen for a program it
/// accepted, so each one is a bug in the pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    /// A structural impossibility in the tree or the emitted code
    #[error("internal compiler error at {pos}: {message}")]
    Internal {
        /// Description of the violated invariant
        message: String,
        /// Position of the node being compiled
        pos: Position,
    },
}

impl CompileError {
    /// Creates an internal compiler error.
    pub fn internal(message: impl Into<String>, pos: Position) -> Self {
        CompileError::Internal {
            message: message.into(),
            pos,
        }
    }
}

/// A fatal runtime error raised by the VM.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{} at {}: {kind}", self.label(), self.location())]
pub struct RuntimeError {
    /// What went wrong
    pub kind: RuntimeErrorKind,
    /// Source position of the failing instruction, when known
    pub pos: Option<Position>,
}

impl RuntimeError {
    /// Creates a runtime error.
    pub fn new(kind: RuntimeErrorKind, pos: Option<Position>) -> Self {
        Self { kind, pos }
    }

    /// Returns true for pipeline defects as opposed to user errors.
    pub fn is_internal(&self) -> bool {
        matches!(self.kind, RuntimeErrorKind::Internal(_))
    }

    fn label(&self) -> &'static str {
        if self.is_internal() {
            "InternalError"
        } else {
            "RuntimeError"
        }
    }

    fn location(&self) -> String {
        match self.pos {
            Some(pos) => pos.to_string(),
            None => "<unknown>".to_string(),
        }
    }
}

/// The kinds of runtime failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeErrorKind {
    /// An instruction needed more operands than the stack held
    #[error("stack underflow")]
    StackUnderflow,

    /// The operand stack or the call-frame stack exceeded its capacity
    #[error("stack overflow (limit {limit})")]
    StackOverflow {
        /// The configured capacity that was exceeded
        limit: usize,
    },

    /// A slot operand addressed storage outside the current frame or globals
    #[error("slot {slot} out of range (storage holds {len})")]
    SlotOutOfRange {
        /// The addressed slot
        slot: usize,
        /// Number of addressable slots
        len: usize,
    },

    /// `/` or `%` with a zero divisor
    #[error("division by zero")]
    DivisionByZero,

    /// `CallBuiltin` named a builtin that is not registered
    #[error("unknown builtin '{0}'")]
    UnknownBuiltin(String),

    /// A call supplied the wrong number of arguments
    #[error("{function} expects {expected} argument(s), got {found}")]
    ArityMismatch {
        /// Name of the called function or builtin
        function: String,
        /// Declared parameter count
        expected: usize,
        /// Supplied argument count
        found: usize,
    },

    /// An operator was applied to values it does not support
    #[error("type error: {0}")]
    TypeError(String),

    /// Writing builtin output failed
    #[error("output error: {0}")]
    Output(String),

    /// A malformed instruction stream
    #[error("{0}")]
    Internal(String),
}
