use crate::schema::ParameterSpec;
use crate::validator::{self, Condition};
use crate::value::{DeclaredType, Value, NONE_SENTINEL};
use log::trace;
use serde::{Deserialize, Serialize};

/// One editable parameter with its current value and validation state.
///
/// Records are only mutated through [`ParameterRecord::update`] or
/// [`ParameterRecord::revalidate`], so `errors` always describes `value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterRecord {
    pub name: String,
    pub value: Value,
    pub errors: Vec<String>,
    pub declared_type: DeclaredType,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    pub unit: Option<String>,
    pub step: f64,
}

impl ParameterRecord {
    pub fn new(name: &str, declared_type: DeclaredType, conditions: &[Condition], initial: Value) -> Self {
        let mut record = Self {
            name: name.to_string(),
            value: initial,
            errors: Vec::new(),
            declared_type,
            conditions: conditions.to_vec(),
            unit: crate::defaults::unit(name).map(str::to_string),
            step: crate::defaults::step(name),
        };
        record.revalidate();
        record
    }

    /// A record seeded from a schema default and validated.
    pub fn from_spec(spec: &ParameterSpec) -> Self {
        let mut record = Self::new(
            &spec.name,
            spec.declared_type,
            &[],
            spec.default.clone().unwrap_or_default(),
        );
        record.unit = spec.unit.clone();
        record.step = spec.step;
        record
    }

    /// Applies raw user input.
    ///
    /// Valid input is stored as the coerced typed value. Invalid input is
    /// kept verbatim so the in-progress edit survives, with the messages
    /// attached.
    pub fn update(&mut self, raw: &str) -> &[String] {
        self.errors = validator::validate(Some(raw), self.declared_type, &self.conditions);
        self.value = if !self.errors.is_empty() {
            Value::Str(raw.to_string())
        } else if raw == NONE_SENTINEL {
            Value::None
        } else {
            validator::coerce(raw, self.declared_type).unwrap_or_else(|_| Value::Str(raw.to_string()))
        };
        trace!("{} <- {:?}: {:?}", self.name, raw, self.errors);
        &self.errors
    }

    /// Re-runs validation against the current value.
    pub fn revalidate(&mut self) -> &[String] {
        match self.value.raw_text() {
            Some(raw) => {
                self.update(&raw);
            }
            None => {
                self.errors = validator::validate(None, self.declared_type, &self.conditions);
            }
        }
        &self.errors
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// All messages joined for display, empty when valid.
    pub fn error_text(&self) -> String {
        self.errors.join("; ")
    }
}

/// A constructible instance (lattice element or distribution) and its records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementInstance {
    pub type_name: String,
    pub parameters: Vec<ParameterRecord>,
}

impl ElementInstance {
    pub fn from_schema(type_name: &str, specs: &[ParameterSpec]) -> Self {
        Self {
            type_name: type_name.to_string(),
            parameters: specs.iter().map(ParameterRecord::from_spec).collect(),
        }
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterRecord> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn parameter_mut(&mut self, name: &str) -> Option<&mut ParameterRecord> {
        self.parameters.iter_mut().find(|p| p.name == name)
    }

    pub fn is_valid(&self) -> bool {
        self.parameters.iter().all(ParameterRecord::is_valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_update_stores_coerced_value() {
        let mut record = ParameterRecord::new("npart", DeclaredType::Int, &[Condition::Positive], Value::Int(1));
        assert!(record.update(" 250 ").is_empty());
        assert_eq!(record.value, Value::Int(250));
    }

    #[test]
    fn test_invalid_update_keeps_raw_text() {
        let mut record = ParameterRecord::new("ds", DeclaredType::Float, &[], Value::Float(1.0));
        assert_eq!(record.update("1.2.3"), ["Must be a float"]);
        assert_eq!(record.value, Value::Str("1.2.3".into()));
        assert_eq!(record.revalidate(), ["Must be a float"]);
    }

    #[test]
    fn test_missing_default_is_an_error() {
        let record = ParameterRecord::new("ds", DeclaredType::Float, &[], Value::Empty);
        assert_eq!(record.errors, ["Must be a float"]);
        assert_eq!(record.value, Value::Empty);
    }

    #[test]
    fn test_none_sentinel_opts_out() {
        let mut record = ParameterRecord::new("name", DeclaredType::Str, &[], Value::Empty);
        assert!(record.update("None").is_empty());
        assert_eq!(record.value, Value::None);
    }

    #[test]
    fn test_metadata_comes_from_registry() {
        let record = ParameterRecord::new("mass_MeV", DeclaredType::Float, &[], Value::Float(0.5));
        assert_eq!(record.unit.as_deref(), Some("MeV"));
        assert_eq!(record.step, 0.1);
    }
}
