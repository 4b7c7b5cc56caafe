// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Parser for tern source code.
//!
//! Transforms a stream of tokens into an Abstract Syntax Tree (AST). The
//! parser stops at the first syntax error.
//!
//! ## Usage
//!
//! ```rust
//! use tern_engine::parser::Parser;
//!
//! let mut parser = Parser::new("var x = 1 + 2;");
//! let program = parser.parse_program().expect("Should parse");
//! assert_eq!(program.body.len(), 1);
//! ```

#[allow(clippy::module_inception)]
mod parser;

pub use parser::Parser;

use crate::ast::Program;
use crate::error::SyntaxError;

/// Parses a complete program.
pub fn parse(source: &str) -> Result<Program, SyntaxError> {
    let program = Parser::new(source).parse_program()?;

    if tracing::enabled!(tracing::Level::DEBUG) {
        let mut nodes = 0usize;
        for statement in &program.body {
            statement.visit(&mut |_| nodes += 1);
        }
        tracing::debug!("Parsed {} statements, {} nodes", program.body.len(), nodes);
    }

    Ok(program)
}
