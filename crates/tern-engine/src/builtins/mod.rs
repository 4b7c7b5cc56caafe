// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Built-in functions.
//!
//! Builtins are called by name through `CallBuiltin`. They share one
//! namespace with user functions, and the analyzer rejects declarations that
//! would shadow them.

pub mod console;

use std::io::Write;

use rustc_hash::FxHashMap;

use crate::error::RuntimeErrorKind;
use crate::runtime::Value;

/// What a builtin can reach while it runs.
pub struct BuiltinContext<'a> {
    /// Where program output goes
    pub out: &'a mut dyn Write,
}

/// Signature shared by every builtin.
pub type BuiltinFn = fn(&mut BuiltinContext<'_>, &[Value]) -> Result<Value, RuntimeErrorKind>;

/// A registered builtin function.
#[derive(Debug, Clone, Copy)]
pub struct Builtin {
    /// Name the program calls it by
    pub name: &'static str,
    /// Exact number of arguments
    pub arity: usize,
    /// Implementation
    pub func: BuiltinFn,
}

const BUILTINS: &[Builtin] = &[Builtin {
    name: "logprint",
    arity: 1,
    func: console::logprint,
}];

/// Returns true if `name` refers to a builtin.
pub fn is_builtin(name: &str) -> bool {
    BUILTINS.iter().any(|b| b.name == name)
}

/// Returns the names of every builtin.
pub fn names() -> impl Iterator<Item = &'static str> {
    BUILTINS.iter().map(|b| b.name)
}

/// Builds the registry the VM dispatches `CallBuiltin` through.
pub fn register_builtins() -> FxHashMap<&'static str, Builtin> {
    BUILTINS.iter().map(|b| (b.name, *b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_contains_logprint() {
        let registry = register_builtins();
        assert_eq!(registry["logprint"].arity, 1);
        assert!(is_builtin("logprint"));
        assert!(!is_builtin("print"));
    }
}
