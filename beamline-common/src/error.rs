//! Error types for the engine.
//!
//! Validation problems are never errors here: they live as messages on the
//! records. These types cover misuse of the event interface, type coercion
//! requested outside the validation path, and script import.
use crate::value::DeclaredType;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot convert '{raw}' to {declared}")]
pub struct CoercionError {
    pub raw: String,
    pub declared: DeclaredType,
}

impl CoercionError {
    pub fn new(raw: &str, declared: DeclaredType) -> Self {
        Self { raw: raw.to_string(), declared }
    }
}

/// Structural misuse of a session: events that reference things that do not exist.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("lattice element '{0}' does not exist")]
    UnknownElement(String),
    #[error("distribution '{0}' does not exist")]
    UnknownDistribution(String),
    #[error("'{type_name}' has no parameter named '{parameter}'")]
    UnknownParameter { type_name: String, parameter: String },
    #[error("index {index} is out of range for {what} of length {len}")]
    IndexOutOfRange { what: &'static str, index: usize, len: usize },
    #[error("unknown field '{0}'")]
    UnknownField(String),
    #[error("'{value}' is not a valid {what}")]
    InvalidChoice { what: &'static str, value: String },
    #[error("simulation inputs are not valid: {}", .0.join(", "))]
    NotRunnable(Vec<String>),
}

/// Reasons a previously exported script could not be read back.
///
/// Callers collapse every variant into a single opaque message; the detail
/// only reaches the log.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ImportError {
    #[error("line {line}: expected `name = value`")]
    MissingAssignment { line: usize },
    #[error("line {line}: unbalanced brackets")]
    Unbalanced { line: usize },
    #[error("malformed constructor call '{0}'")]
    MalformedCall(String),
    #[error("malformed list '{0}'")]
    MalformedList(String),
    #[error(transparent)]
    Engine(#[from] EngineError),
}
