//! Compile-time values
//!
//! The constant pool, default parameter values and the constant folder all
//! work on [`Value`]. Runtime-only variants (objects, enum members, maps) are
//! carried opaquely.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::function::Function;

/// Tagged value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    /// Compiled function stored in a constant pool
    Function(Box<Function>),
    /// Instance of a class (runtime only)
    Object(String),
    /// Enum member (runtime only)
    Enum { name: String, member: String },
    /// Associative map (runtime only)
    Map(Vec<(Value, Value)>),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Falsy: `null`, `false`, `0`, `0.0`, `""` and `[]`
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::Map(entries) => !entries.is_empty(),
            Value::Function(_) | Value::Object(_) | Value::Enum { .. } => true,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Numeric value as a float; `None` for non-numbers
    pub fn to_float(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Ordered comparison: `-1`, `0` or `1`.
    ///
    /// Defined for two numbers (ints promote to float when mixed) and for
    /// two strings. Everything else is unordered.
    pub fn compare(&self, other: &Value) -> Option<i32> {
        let ordering = match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (a, b) if a.is_number() && b.is_number() => {
                let (a, b) = (a.to_float()?, b.to_float()?);
                a.partial_cmp(&b)?
            }
            _ => return None,
        };
        Some(match ordering {
            Ordering::Less => -1,
            Ordering::Equal => 0,
            Ordering::Greater => 1,
        })
    }

    /// Short type name used in diagnostics and the disassembler
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Function(_) => "function",
            Value::Object(_) => "object",
            Value::Enum { .. } => "enum",
            Value::Map(_) => "map",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => {
                if x.fract() == 0.0 && x.is_finite() {
                    write!(f, "{:.1}", x)
                } else {
                    write!(f, "{}", x)
                }
            }
            Value::String(s) => write!(f, "{:?}", s),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Function(func) => write!(f, "<fn {}>", func.name),
            Value::Object(class) => write!(f, "<{} object>", class),
            Value::Enum { name, member } => write!(f, "{}::{}", name, member),
            Value::Map(entries) => write!(f, "<map of {}>", entries.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::Float(0.0).is_truthy());
        assert!(!Value::string("").is_truthy());
        assert!(!Value::Array(vec![]).is_truthy());

        assert!(Value::Int(-1).is_truthy());
        assert!(Value::string("0").is_truthy());
        assert!(Value::Array(vec![Value::Null]).is_truthy());
    }

    #[test]
    fn test_compare_mixed_numbers() {
        assert_eq!(Value::Int(1).compare(&Value::Float(1.5)), Some(-1));
        assert_eq!(Value::Float(2.0).compare(&Value::Int(2)), Some(0));
        assert_eq!(Value::string("b").compare(&Value::string("a")), Some(1));
        assert_eq!(Value::Int(1).compare(&Value::string("1")), None);
    }

    #[test]
    fn test_structural_equality() {
        let a = Value::Array(vec![Value::Int(1), Value::string("x")]);
        let b = Value::Array(vec![Value::Int(1), Value::string("x")]);
        assert_eq!(a, b);
        assert_ne!(Value::Int(1), Value::Float(1.0));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Float(3.0).to_string(), "3.0");
        assert_eq!(Value::string("hi").to_string(), "\"hi\"");
        assert_eq!(
            Value::Array(vec![Value::Int(1), Value::Null]).to_string(),
            "[1, null]"
        );
    }
}
