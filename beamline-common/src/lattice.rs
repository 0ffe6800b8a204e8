use crate::catalog::BuiltinCatalog;
use crate::error::EngineError;
use crate::record::ElementInstance;
use crate::schema::{derive_schemas, SchemaTable};
use crate::validator;
use crate::value::Value;
use log::debug;

/// The ordered beamline. Element order is the tracking order.
#[derive(Debug, Clone)]
pub struct Lattice {
    schemas: SchemaTable,
    pub elements: Vec<ElementInstance>,
}

impl Default for Lattice {
    fn default() -> Self {
        Self::new(derive_schemas(&BuiltinCatalog::Elements))
    }
}

impl Lattice {
    pub fn new(schemas: SchemaTable) -> Self {
        Self { schemas, elements: Vec::new() }
    }

    /// Names of every element type that can be added.
    pub fn element_types(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Appends an element seeded with its schema defaults. Returns its index.
    pub fn add(&mut self, type_name: &str) -> Result<usize, EngineError> {
        let specs = self
            .schemas
            .get(type_name)
            .ok_or_else(|| EngineError::UnknownElement(type_name.to_string()))?;
        self.elements.push(ElementInstance::from_schema(type_name, specs));
        debug!("Added lattice element {} at index {}", type_name, self.elements.len() - 1);
        Ok(self.elements.len() - 1)
    }

    pub fn remove(&mut self, index: usize) -> Result<ElementInstance, EngineError> {
        self.check_index(index)?;
        Ok(self.elements.remove(index))
    }

    /// Swaps the element with its predecessor. No-op for the first element.
    pub fn move_up(&mut self, index: usize) -> Result<(), EngineError> {
        self.check_index(index)?;
        if index > 0 {
            self.elements.swap(index, index - 1);
        }
        Ok(())
    }

    /// Swaps the element with its successor. No-op for the last element.
    pub fn move_down(&mut self, index: usize) -> Result<(), EngineError> {
        self.check_index(index)?;
        if index + 1 < self.elements.len() {
            self.elements.swap(index, index + 1);
        }
        Ok(())
    }

    /// Routes raw input to one element parameter. Returns the resulting messages.
    pub fn update_parameter(&mut self, index: usize, name: &str, raw: &str) -> Result<Vec<String>, EngineError> {
        self.check_index(index)?;
        let element = &mut self.elements[index];
        let type_name = element.type_name.clone();
        let record = element.parameter_mut(name).ok_or_else(|| EngineError::UnknownParameter {
            type_name,
            parameter: name.to_string(),
        })?;
        Ok(record.update(raw).to_vec())
    }

    /// Overrides the default of `parameter` on every element type that has it.
    ///
    /// Only elements added afterwards pick up the new default.
    pub fn set_default(&mut self, parameter: &str, raw: &str) -> usize {
        let mut changed = 0;
        for spec in self.schemas.values_mut().flatten() {
            if spec.name == parameter {
                spec.default = Some(validator::infer(raw));
                changed += 1;
            }
        }
        debug!("Default of '{}' set to {:?} on {} element types", parameter, raw, changed);
        changed
    }

    pub fn clear(&mut self) {
        self.elements.clear();
    }

    /// Default for a parameter as the schema currently records it.
    pub fn default_of(&self, type_name: &str, parameter: &str) -> Option<&Value> {
        self.schemas
            .get(type_name)?
            .iter()
            .find(|spec| spec.name == parameter)?
            .default
            .as_ref()
    }

    fn check_index(&self, index: usize) -> Result<(), EngineError> {
        if index < self.elements.len() {
            Ok(())
        } else {
            Err(EngineError::IndexOutOfRange { what: "lattice", index, len: self.elements.len() })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(lattice: &Lattice) -> Vec<&str> {
        lattice.elements.iter().map(|e| e.type_name.as_str()).collect()
    }

    #[test]
    fn test_add_unknown_element_is_rejected() {
        let mut lattice = Lattice::default();
        assert_eq!(lattice.add("Warp"), Err(EngineError::UnknownElement("Warp".into())));
        assert!(lattice.is_empty());
    }

    #[test]
    fn test_required_parameters_start_invalid() {
        let mut lattice = Lattice::default();
        let index = lattice.add("Drift").unwrap();
        let drift = &lattice.elements[index];
        assert_eq!(drift.parameter("ds").unwrap().errors, ["Must be a float"]);
        assert!(drift.parameter("nslice").unwrap().is_valid());
        assert!(drift.parameter("name").unwrap().is_valid());

        assert!(lattice.update_parameter(index, "ds", "0.25").unwrap().is_empty());
        assert!(lattice.elements[index].is_valid());
    }

    #[test]
    fn test_reordering_respects_bounds() {
        let mut lattice = Lattice::default();
        for name in ["Drift", "Quad", "Sbend"] {
            lattice.add(name).unwrap();
        }
        lattice.move_up(0).unwrap();
        lattice.move_down(2).unwrap();
        assert_eq!(types(&lattice), ["Drift", "Quad", "Sbend"]);

        lattice.move_up(2).unwrap();
        assert_eq!(types(&lattice), ["Drift", "Sbend", "Quad"]);
        lattice.move_down(0).unwrap();
        assert_eq!(types(&lattice), ["Sbend", "Drift", "Quad"]);

        assert!(lattice.move_up(3).is_err());
        lattice.remove(1).unwrap();
        assert_eq!(types(&lattice), ["Sbend", "Quad"]);
    }

    #[test]
    fn test_default_override_applies_to_new_elements() {
        let mut lattice = Lattice::default();
        let before = lattice.add("Quad").unwrap();
        assert!(lattice.set_default("nslice", "25") > 1);
        let after = lattice.add("Quad").unwrap();
        assert_eq!(lattice.elements[before].parameter("nslice").unwrap().value, Value::Int(1));
        assert_eq!(lattice.elements[after].parameter("nslice").unwrap().value, Value::Int(25));
        assert_eq!(lattice.default_of("Drift", "nslice"), Some(&Value::Int(25)));
    }
}
