//! Runtime value representation.

use std::fmt;

/// A runtime value.
///
/// Values are plain data: every load copies, nothing is shared between
/// slots, so no collector is needed.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// undefined
    #[default]
    Undefined,
    /// Number (IEEE 754 double)
    Number(f64),
    /// String
    String(String),
    /// Boolean value
    Boolean(bool),
}

impl Value {
    /// Returns true if this value is undefined.
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Converts the value to a boolean for conditional jumps.
    ///
    /// `0`, `NaN`, `""`, `false` and `undefined` are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => !n.is_nan() && *n != 0.0,
            Value::String(s) => !s.is_empty(),
        }
    }

    /// Returns the type of this value as a string.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Boolean(_) => "boolean",
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => format_number(*n, f),
            Value::String(s) => write!(f, "{}", s),
        }
    }
}

fn format_number(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if n.is_nan() {
        f.write_str("NaN")
    } else if n.is_infinite() {
        f.write_str(if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else if n == 0.0 {
        // Covers -0
        f.write_str("0")
    } else {
        write!(f, "{}", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Undefined.is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(!Value::Number(f64::NAN).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(!Value::Boolean(false).is_truthy());

        assert!(Value::Number(-1.0).is_truthy());
        assert!(Value::from("0").is_truthy());
        assert!(Value::Boolean(true).is_truthy());
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Number(5.0).to_string(), "5");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
        assert_eq!(Value::Number(-0.0).to_string(), "0");
        assert_eq!(Value::Number(f64::INFINITY).to_string(), "Infinity");
        assert_eq!(Value::Number(f64::NAN).to_string(), "NaN");
        assert_eq!(Value::from("raw").to_string(), "raw");
        assert_eq!(Value::Boolean(true).to_string(), "true");
        assert_eq!(Value::Undefined.to_string(), "undefined");
    }

    #[test]
    fn test_equality_is_per_variant() {
        assert_eq!(Value::Number(1.0), Value::Number(1.0));
        assert_ne!(Value::Number(1.0), Value::from("1"));
        assert_ne!(Value::Boolean(false), Value::Number(0.0));
        assert_ne!(Value::Number(f64::NAN), Value::Number(f64::NAN));
    }
}
