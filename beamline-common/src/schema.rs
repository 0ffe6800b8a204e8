//! Derives typed parameter schemas from constructor signature text.
//!
//! A signature looks like
//! `__init__(self: elements.Drift, ds: float, nslice: int = 1, name: Optional[str] = None) -> None`.
//! Only the text inside the first balanced parenthesis pair is considered.
use crate::defaults;
use crate::validator;
use crate::value::{DeclaredType, Value};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Constructor parameter shape, fixed once derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    pub declared_type: DeclaredType,
    pub default: Option<Value>,
    pub unit: Option<String>,
    pub step: f64,
}

impl ParameterSpec {
    pub fn new(name: &str, declared_type: DeclaredType, default: Option<Value>) -> Self {
        Self {
            name: name.to_string(),
            declared_type,
            default,
            unit: defaults::unit(name).map(str::to_string),
            step: defaults::step(name),
        }
    }
}

/// Ordered parameter specs keyed by constructible type name.
pub type SchemaTable = BTreeMap<String, Vec<ParameterSpec>>;

/// A source of constructible types and their signature descriptions.
pub trait ConstructorCatalog {
    /// Every constructible type with its signature text, if it has one.
    fn constructors(&self) -> Vec<(String, Option<String>)>;
}

/// Builds the schema table for every type in the catalog.
///
/// A type without parseable signature text gets an empty parameter list.
pub fn derive_schemas<C: ConstructorCatalog + ?Sized>(catalog: &C) -> SchemaTable {
    let mut table = SchemaTable::new();
    for (type_name, signature) in catalog.constructors() {
        let specs = match signature.as_deref().and_then(parse_signature) {
            Some(specs) => specs,
            None => {
                warn!("No parseable constructor signature for '{}'; it takes no parameters.", type_name);
                Vec::new()
            }
        };
        debug!("Derived {} parameters for '{}'", specs.len(), type_name);
        table.insert(type_name, specs);
    }
    table
}

/// Parses the parameter list of one signature. `None` if there is no parenthesized list.
pub fn parse_signature(signature: &str) -> Option<Vec<ParameterSpec>> {
    let inner = parenthesized(signature)?;
    let specs = split_top_level(inner)
        .into_iter()
        .filter_map(parse_parameter)
        .collect();
    Some(specs)
}

fn parse_parameter(segment: &str) -> Option<ParameterSpec> {
    let segment = segment.trim();
    if segment.is_empty() || segment == "*" || segment == "/" || segment.starts_with("**") {
        return None;
    }

    let (name, declared_type, default) = match segment.split_once(':') {
        Some((name, type_and_default)) => match type_and_default.split_once('=') {
            Some((annotation, default)) => (name, DeclaredType::from_annotation(annotation), Some(default)),
            None => (name, DeclaredType::from_annotation(type_and_default), None),
        },
        None => match segment.split_once('=') {
            Some((name, default)) => (name, DeclaredType::Any, Some(default)),
            None => (segment, DeclaredType::Any, None),
        },
    };

    let name = name.trim();
    if name == "self" {
        return None;
    }

    let default = default.map(|literal| validator::infer(unquote(literal.trim())));
    Some(ParameterSpec::new(name, declared_type, default))
}

/// Strips one pair of matching single or double quotes.
pub(crate) fn unquote(literal: &str) -> &str {
    for quote in ['\'', '"'] {
        if literal.len() >= 2 && literal.starts_with(quote) && literal.ends_with(quote) {
            return &literal[1..literal.len() - 1];
        }
    }
    literal
}

/// Text between the first `(` and its matching `)`.
pub(crate) fn parenthesized(text: &str) -> Option<&str> {
    let open = text.find('(')?;
    let mut depth = 0usize;
    for (offset, ch) in text[open..].char_indices() {
        match ch {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&text[open + 1..open + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Splits on commas that are not nested inside brackets or quotes.
pub(crate) fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, ch) in text.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(ch),
            (None, '(' | '[' | '{') => depth += 1,
            (None, ')' | ']' | '}') => depth -= 1,
            (None, ',') if depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    let tail = &text[start..];
    if !tail.trim().is_empty() {
        parts.push(tail);
    }
    parts
}
