// src/value.rs — argument and return-value wrapper

use std::fmt;

use serde::Serialize;

/// The value shapes a target method can consume or produce.
///
/// Arguments and return values flow through the engine as `Value`s so that
/// histories can be compared against the sequential reference and rendered
/// without knowing anything about the target. Equality is per variant and
/// structural; printing matches what the argument generators produce.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Value {
    /// No payload. Methods declared `void` always compare equal on return.
    Unit,
    Int(i64),
    Bool(bool),
    /// A cooperative-blocking token handle passed as an argument.
    /// Tokens carry no identity at the history level.
    Token,
    Pair(Box<Value>, Box<Value>),
}

impl Value {
    pub fn pair(a: Value, b: Value) -> Value {
        Value::Pair(Box::new(a), Box::new(b))
    }

    /// Integer payload, if this is an `Int`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "void"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Token => write!(f, "token"),
            Value::Pair(a, b) => write!(f, "({a}, {b})"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Unit
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_forms() {
        assert_eq!(Value::Unit.to_string(), "void");
        assert_eq!(Value::Int(-3).to_string(), "-3");
        assert_eq!(Value::Token.to_string(), "token");
        assert_eq!(
            Value::pair(Value::Int(1), Value::Bool(true)).to_string(),
            "(1, true)"
        );
    }

    #[test]
    fn unit_compares_equal_only_to_unit() {
        assert_eq!(Value::Unit, Value::Unit);
        assert_ne!(Value::Unit, Value::Int(0));
    }
}
