//! Console output builtins.

use std::io::Write;

use super::BuiltinContext;
use crate::error::RuntimeErrorKind;
use crate::runtime::Value;

/// logprint - writes its argument and a newline, then returns the argument
pub fn logprint(ctx: &mut BuiltinContext<'_>, args: &[Value]) -> Result<Value, RuntimeErrorKind> {
    let value = args.first().cloned().unwrap_or_default();
    writeln!(ctx.out, "{}", value).map_err(|e| RuntimeErrorKind::Output(e.to_string()))?;
    Ok(value)
}
