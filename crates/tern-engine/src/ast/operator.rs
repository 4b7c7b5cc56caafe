//! Operators.

use std::fmt;

/// The closed set of operators.
///
/// The symbol is only used for printing; the compiler dispatches on the
/// variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `+`
    Add,
    /// `-`, binary or prefix negation
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `++`
    Incr,
    /// `--`
    Decr,
    /// `**`
    Exp,
    /// `=`
    Assign,
    /// `>=`
    Ge,
    /// `<=`
    Le,
    /// `!=`
    Neq,
    /// `==`
    Eq,
    /// `>`
    Gt,
    /// `<`
    Lt,
    /// `&&`
    And,
    /// `||`
    Or,
    /// `!`
    Not,
}

impl Operator {
    /// Returns the textual symbol of the operator.
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Mod => "%",
            Operator::Incr => "++",
            Operator::Decr => "--",
            Operator::Exp => "**",
            Operator::Assign => "=",
            Operator::Ge => ">=",
            Operator::Le => "<=",
            Operator::Neq => "!=",
            Operator::Eq => "==",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::And => "&&",
            Operator::Or => "||",
            Operator::Not => "!",
        }
    }

    /// Returns true for `++` and `--`.
    pub fn is_update(self) -> bool {
        matches!(self, Operator::Incr | Operator::Decr)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
