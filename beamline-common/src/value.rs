use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// The type a parameter declares in its constructor signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclaredType {
    Int,
    Float,
    Str,
    Any,
}

impl DeclaredType {
    /// Maps a signature annotation (`float`, `Optional[str]`, ...) onto a declared type.
    pub fn from_annotation(annotation: &str) -> Self {
        match annotation.trim() {
            "int" => DeclaredType::Int,
            "float" => DeclaredType::Float,
            "str" | "Optional[str]" => DeclaredType::Str,
            _ => DeclaredType::Any,
        }
    }

    /// Message attached when a raw value cannot be coerced to this type.
    pub fn coercion_message(self) -> &'static str {
        match self {
            DeclaredType::Int => "Must be an integer",
            DeclaredType::Float => "Must be a float",
            DeclaredType::Str => "Must be a string",
            DeclaredType::Any => "Unknown type",
        }
    }
}

impl fmt::Display for DeclaredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeclaredType::Int => "int",
            DeclaredType::Float => "float",
            DeclaredType::Str => "str",
            DeclaredType::Any => "any",
        };
        f.write_str(name)
    }
}

/// The current value held by a parameter record.
///
/// `Empty` means nothing was ever entered (a required constructor argument
/// without a default). `None` is the explicit opt-out sentinel typed as the
/// literal text `None`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Empty,
    Int(i64),
    Float(f64),
    Str(String),
    None,
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Empty => serializer.serialize_none(),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(x) => serializer.serialize_f64(*x),
            Value::Str(s) => serializer.serialize_str(s),
            Value::None => serializer.serialize_str(NONE_SENTINEL),
        }
    }
}

// Session files carry plain literals; the sentinel arrives as the string "None".
#[derive(Deserialize)]
#[serde(untagged)]
enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Literal::deserialize(deserializer)? {
            Literal::Int(i) => Value::Int(i),
            Literal::Float(x) => Value::Float(x),
            Literal::Str(s) if s == NONE_SENTINEL => Value::None,
            Literal::Str(s) => Value::Str(s),
        })
    }
}

/// Literal text that opts a parameter out of validation.
pub const NONE_SENTINEL: &str = "None";

impl Value {
    /// The text a user would have typed to produce this value.
    pub fn raw_text(&self) -> Option<String> {
        match self {
            Value::Empty => None,
            Value::None => Some(NONE_SENTINEL.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(x) => Some(format_float(*x)),
            Value::Str(s) => Some(s.clone()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Renders the value as a literal inside a constructor call expression.
    pub fn render(&self) -> String {
        match self {
            Value::Empty | Value::None => NONE_SENTINEL.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(x) => format_float(*x),
            Value::Str(s) => format!("'{}'", s),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => Ok(()),
            other => f.write_str(&other.raw_text().unwrap_or_default()),
        }
    }
}

/// Float formatting that always keeps a decimal point or exponent (`2000.0`, `1e-9`).
pub fn format_float(x: f64) -> String {
    format!("{:?}", x)
}
