use std::{collections::HashMap, fmt};

use chrono::{DateTime, Utc};

/// Static type of an expression or declared variable.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Bool,
    Int,
    String,
    Timestamp,
    List(Box<Type>),
}

impl Type {
    /// Types that support `<`, `<=`, `>` and `>=`.
    pub(crate) fn is_ordered(&self) -> bool {
        matches!(self, Type::Int | Type::String | Type::Timestamp)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Bool => f.write_str("bool"),
            Type::Int => f.write_str("int"),
            Type::String => f.write_str("string"),
            Type::Timestamp => f.write_str("timestamp"),
            Type::List(inner) => write!(f, "list({inner})"),
        }
    }
}

/// A runtime value.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    String(String),
    Timestamp(DateTime<Utc>),
    List(Vec<Value>),
}

impl Value {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::String(_) => "string",
            Value::Timestamp(_) => "timestamp",
            Value::List(_) => "list",
        }
    }

    pub(crate) fn has_type(&self, ty: &Type) -> bool {
        match (self, ty) {
            (Value::Bool(_), Type::Bool)
            | (Value::Int(_), Type::Int)
            | (Value::String(_), Type::String)
            | (Value::Timestamp(_), Type::Timestamp) => true,
            (Value::List(items), Type::List(inner)) => items.iter().all(|v| v.has_type(inner)),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Timestamp(value)
    }
}

/// Supplies variable bindings to a program evaluation.
pub trait Activation {
    /// Returns the value bound to `name`, if any.
    fn resolve(&self, name: &str) -> Option<Value>;
}

impl Activation for HashMap<String, Value> {
    fn resolve(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl Activation for HashMap<&str, Value> {
    fn resolve(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_type_display() {
        let ty = Type::List(Box::new(Type::List(Box::new(Type::String))));
        assert_eq!(ty.to_string(), "list(list(string))");
    }

    #[test]
    fn test_value_has_type() {
        assert!(Value::from("a").has_type(&Type::String));
        assert!(!Value::from(1_i64).has_type(&Type::String));
        assert!(Value::List(vec![]).has_type(&Type::List(Box::new(Type::Int))));
        assert!(!Value::List(vec![Value::from(true)]).has_type(&Type::List(Box::new(Type::Int))));
    }
}
