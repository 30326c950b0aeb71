//! Runtime values

use sixgu_core::RefId;
use std::fmt;

/// Value types during formula evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Empty,
    Boolean(bool),
    Number(f64),
    String(String),
    Array(Vec<Evaluated>),
    /// Object literal, entries in source order
    Object(Vec<(String, Evaluated)>),
    /// Sheet or table seen as a whole
    Record(Record),
}

/// Aggregate value of a named container: one field per named child
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// The container this record was built from
    pub template: RefId,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub id: RefId,
    pub name: String,
    pub value: Evaluated,
}

/// One frame of an entity's value stack
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluated {
    /// Computed from the entity's formula
    Value(Value),
    /// Supplied by a what-if call argument
    Override(Value),
    Error(String),
}

impl Evaluated {
    pub fn value(&self) -> Option<&Value> {
        match self {
            Evaluated::Value(v) | Evaluated::Override(v) => Some(v),
            Evaluated::Error(_) => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Evaluated::Error(_))
    }

    pub fn is_override(&self) -> bool {
        matches!(self, Evaluated::Override(_))
    }

    /// The value, or the error message
    pub fn into_result(self) -> Result<Value, String> {
        match self {
            Evaluated::Value(v) | Evaluated::Override(v) => Ok(v),
            Evaluated::Error(e) => Err(e),
        }
    }

    pub fn to_result(&self) -> Result<Value, String> {
        self.clone().into_result()
    }

    /// Convert to JSON, errors as `{"error": message}`
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Evaluated::Value(v) | Evaluated::Override(v) => v.to_json(),
            Evaluated::Error(e) => serde_json::json!({ "error": e }),
        }
    }
}

impl From<Result<Value, String>> for Evaluated {
    fn from(result: Result<Value, String>) -> Self {
        match result {
            Ok(v) => Evaluated::Value(v),
            Err(e) => Evaluated::Error(e),
        }
    }
}

impl Record {
    pub fn get(&self, name: &str) -> Option<&Evaluated> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Empty => "empty",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Record(_) => "record",
        }
    }

    /// Truthiness for `!`, `&&` and `||`
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Empty => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Record(_) => true,
        }
    }

    /// Convert to number, if possible
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Boolean(true) => Some(1.0),
            Value::Boolean(false) => Some(0.0),
            Value::Empty => Some(0.0),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Force conversion to number for arithmetic
    pub fn to_number(&self) -> Result<f64, String> {
        self.as_number()
            .ok_or_else(|| format!("Expected a number, got {}", self.describe()))
    }

    /// Named member of an object or record
    pub fn get(&self, key: &str) -> Option<&Evaluated> {
        match self {
            Value::Object(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            Value::Record(record) => record.get(key),
            _ => None,
        }
    }

    /// Structural equality: arrays element-wise, objects and records by
    /// their members regardless of order
    pub fn deep_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Empty, Value::Empty) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| evaluated_eq(x, y))
            }
            (Value::Object(_) | Value::Record(_), Value::Object(_) | Value::Record(_)) => {
                let ours = self.members();
                let theirs = other.members();
                ours.len() == theirs.len()
                    && ours.iter().all(|(key, value)| {
                        other
                            .get(key)
                            .map_or(false, |theirs| evaluated_eq(value, theirs))
                    })
            }
            _ => false,
        }
    }

    fn members(&self) -> Vec<(&str, &Evaluated)> {
        match self {
            Value::Object(entries) => entries.iter().map(|(k, v)| (k.as_str(), v)).collect(),
            Value::Record(record) => record
                .fields
                .iter()
                .map(|f| (f.name.as_str(), &f.value))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Short description for error messages
    pub fn describe(&self) -> String {
        match self {
            Value::String(s) => format!("string {}", quote(s)),
            Value::Empty => "an empty value".to_string(),
            other => format!("{} {}", other.type_name(), other),
        }
    }

    /// Convert to JSON; records become objects keyed by field name
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Empty => Json::Null,
            Value::Boolean(b) => Json::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n).map_or(Json::Null, Json::Number),
            Value::String(s) => Json::String(s.clone()),
            Value::Array(items) => Json::Array(items.iter().map(Evaluated::to_json).collect()),
            Value::Object(_) | Value::Record(_) => Json::Object(
                self.members()
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

fn evaluated_eq(a: &Evaluated, b: &Evaluated) -> bool {
    match (a.value(), b.value()) {
        (Some(a), Some(b)) => a.deep_eq(b),
        _ => false,
    }
}

/// Render a number the way formulas write it
pub fn format_number(n: f64) -> String {
    if n == f64::INFINITY {
        "Infinity".to_string()
    } else if n == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else {
        format!("{}", n)
    }
}

fn quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("{:?}", s))
}

/// Nested values: strings quoted, errors marked
fn write_nested(f: &mut fmt::Formatter<'_>, value: &Evaluated) -> fmt::Result {
    match value {
        Evaluated::Value(Value::String(s)) | Evaluated::Override(Value::String(s)) => {
            f.write_str(&quote(s))
        }
        other => write!(f, "{}", other),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => Ok(()),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::String(s) => f.write_str(s),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_nested(f, item)?;
                }
                f.write_str("]")
            }
            Value::Object(_) | Value::Record(_) => {
                let members = self.members();
                if members.is_empty() {
                    return f.write_str("{}");
                }
                f.write_str("{ ")?;
                for (i, (key, value)) in members.into_iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: ", key)?;
                    write_nested(f, value)?;
                }
                f.write_str(" }")
            }
        }
    }
}

impl fmt::Display for Evaluated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Evaluated::Value(v) | Evaluated::Override(v) => write!(f, "{}", v),
            Evaluated::Error(e) => write!(f, "#ERROR({})", e),
        }
    }
}
