//! Converts parameter records into constructor-call expressions.
//!
//! Serialization is lenient: a record that still carries errors is emitted
//! as `0` instead of failing the whole call. The validity gate is what keeps
//! such calls from ever reaching a simulation. Exported listings do not go
//! through here; they write each record's own text.
use crate::distribution::{twiss_to_quadratic, DistributionInputType, DistributionSection, TwissPlane};
use crate::record::{ElementInstance, ParameterRecord};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// `Type(name=value, ...)` with values already rendered as literals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructorCall {
    pub type_name: String,
    pub arguments: Vec<(String, String)>,
}

impl fmt::Display for ConstructorCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.type_name)?;
        for (i, (name, value)) in self.arguments.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", name, value)?;
        }
        f.write_str(")")
    }
}

fn lenient(record: &ParameterRecord) -> Value {
    if record.is_valid() {
        record.value.clone()
    } else {
        Value::Int(0)
    }
}

/// One call per element, in lattice order.
pub fn serialize(elements: &[ElementInstance]) -> Vec<ConstructorCall> {
    elements.iter().map(serialize_element).collect()
}

pub fn serialize_element(element: &ElementInstance) -> ConstructorCall {
    ConstructorCall {
        type_name: element.type_name.clone(),
        arguments: element
            .parameters
            .iter()
            .map(|p| (p.name.clone(), lenient(p).render()))
            .collect(),
    }
}

/// The distribution constructor. Twiss input is converted to quadratic form first.
pub fn serialize_distribution(section: &DistributionSection) -> ConstructorCall {
    let arguments = match section.input_type {
        DistributionInputType::Quadratic => section
            .parameters
            .iter()
            .map(|p| (p.name.clone(), lenient(p).render()))
            .collect(),
        DistributionInputType::Twiss => {
            let number = |name: &str| {
                section
                    .parameters
                    .iter()
                    .find(|p| p.name == name)
                    .and_then(|p| lenient(p).as_f64())
                    .unwrap_or(0.0)
            };
            let plane = |axis: &str| TwissPlane {
                beta: number(&format!("beta_{}", axis)),
                alpha: number(&format!("alpha_{}", axis)),
                emitt: number(&format!("emitt_{}", axis)),
            };
            let accepted = section.constructor_parameters();
            twiss_to_quadratic([plane("x"), plane("y"), plane("t")])
                .into_iter()
                .filter(|(name, _)| accepted.contains(name))
                .map(|(name, value)| (name.to_string(), Value::Float(value).render()))
                .collect()
        }
    };
    ConstructorCall { type_name: section.selected.clone(), arguments }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::Lattice;

    #[test]
    fn test_display_uses_keyword_arguments() {
        let call = ConstructorCall {
            type_name: "Drift".into(),
            arguments: vec![("ds".into(), "0.25".into()), ("name".into(), "'d1'".into())],
        };
        assert_eq!(call.to_string(), "Drift(ds=0.25, name='d1')");
    }

    #[test]
    fn test_invalid_records_become_zero() {
        let mut lattice = Lattice::default();
        let index = lattice.add("Aperture").unwrap();
        lattice.update_parameter(index, "xmax", "1e-3").unwrap();
        lattice.update_parameter(index, "ymax", "wide").unwrap();
        let call = &serialize(&lattice.elements)[0];
        assert_eq!(
            call.to_string(),
            "Aperture(xmax=0.001, ymax=0, shape='rectangular', dx=0.0, dy=0.0, rotation=0.0, name=None)"
        );
    }

    #[test]
    fn test_twiss_is_converted() {
        let mut section = DistributionSection::default();
        for (name, raw) in [
            ("beta_x", "4.0"),
            ("beta_y", "4.0"),
            ("beta_t", "1.0"),
            ("emitt_x", "1.0"),
            ("emitt_y", "1.0"),
            ("emitt_t", "4.0"),
        ] {
            section.update_parameter(name, raw).unwrap();
        }
        let call = serialize_distribution(&section);
        assert_eq!(call.type_name, "Waterbag");
        assert_eq!(call.arguments[0], ("lambdaX".to_string(), "2.0".to_string()));
        assert_eq!(call.arguments[5], ("lambdaPt".to_string(), "2.0".to_string()));
        assert_eq!(call.arguments.len(), 9);
    }

    #[test]
    fn test_empty_distribution_takes_no_arguments() {
        let mut section = DistributionSection::default();
        section.select("Empty").unwrap();
        assert_eq!(serialize_distribution(&section).to_string(), "Empty()");
    }
}
