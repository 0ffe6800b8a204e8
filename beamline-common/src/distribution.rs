use crate::catalog::{BuiltinCatalog, TWISS_SIGNATURE};
use crate::error::EngineError;
use crate::record::ParameterRecord;
use crate::schema::{derive_schemas, parse_signature, ParameterSpec, SchemaTable};
use crate::validator::Condition;
use log::debug;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Distribution the section starts with.
pub const DEFAULT_DISTRIBUTION: &str = "Waterbag";

/// The only distribution with its own parameter set; it has no Twiss form.
const THERMAL: &str = "Thermal";

/// How the beam's phase-space ellipse is entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DistributionInputType {
    #[default]
    Twiss,
    Quadratic,
}

impl DistributionInputType {
    /// Name used in TOML sessions and exported listings.
    pub fn key(self) -> &'static str {
        match self {
            DistributionInputType::Twiss => "twiss",
            DistributionInputType::Quadratic => "quadratic",
        }
    }
}

impl FromStr for DistributionInputType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Twiss" | "twiss" => Ok(DistributionInputType::Twiss),
            "Quadratic" | "quadratic" | "Quadratic Form" => Ok(DistributionInputType::Quadratic),
            other => Err(EngineError::InvalidChoice { what: "distribution type", value: other.to_string() }),
        }
    }
}

/// Selected initial beam distribution and its parameter records.
#[derive(Debug, Clone)]
pub struct DistributionSection {
    schemas: SchemaTable,
    twiss: Vec<ParameterSpec>,
    pub selected: String,
    pub input_type: DistributionInputType,
    /// Set when the selected distribution only accepts quadratic-form input.
    pub type_locked: bool,
    pub parameters: Vec<ParameterRecord>,
}

impl Default for DistributionSection {
    fn default() -> Self {
        Self::new(derive_schemas(&BuiltinCatalog::Distributions))
    }
}

impl DistributionSection {
    pub fn new(schemas: SchemaTable) -> Self {
        let mut section = Self {
            schemas,
            twiss: parse_signature(TWISS_SIGNATURE).unwrap_or_default(),
            selected: DEFAULT_DISTRIBUTION.to_string(),
            input_type: DistributionInputType::default(),
            type_locked: false,
            parameters: Vec::new(),
        };
        section.populate();
        section
    }

    pub fn distributions(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    /// Switches distribution; parameter records are rebuilt from defaults.
    pub fn select(&mut self, name: &str) -> Result<(), EngineError> {
        if !self.schemas.contains_key(name) {
            return Err(EngineError::UnknownDistribution(name.to_string()));
        }
        self.selected = name.to_string();
        self.type_locked = name == THERMAL;
        if self.type_locked {
            self.input_type = DistributionInputType::Quadratic;
        }
        self.populate();
        Ok(())
    }

    pub fn set_input_type(&mut self, input_type: DistributionInputType) -> Result<(), EngineError> {
        if self.type_locked && input_type != DistributionInputType::Quadratic {
            return Err(EngineError::InvalidChoice {
                what: "distribution type",
                value: format!("{:?} for {}", input_type, self.selected),
            });
        }
        self.input_type = input_type;
        self.populate();
        Ok(())
    }

    pub fn update_parameter(&mut self, name: &str, raw: &str) -> Result<Vec<String>, EngineError> {
        let record = self
            .parameters
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| EngineError::UnknownParameter {
                type_name: self.selected.clone(),
                parameter: name.to_string(),
            })?;
        Ok(record.update(raw).to_vec())
    }

    /// Parameter names the selected constructor accepts, in order.
    pub fn constructor_parameters(&self) -> Vec<&str> {
        self.schemas
            .get(&self.selected)
            .map(|specs| specs.iter().map(|s| s.name.as_str()).collect())
            .unwrap_or_default()
    }

    /// Rebuilds the records for the current distribution and input type.
    pub fn populate(&mut self) {
        self.parameters = match self.input_type {
            DistributionInputType::Twiss => self.twiss.iter().map(twiss_record).collect(),
            DistributionInputType::Quadratic => self
                .schemas
                .get(&self.selected)
                .map(|specs| specs.iter().map(ParameterRecord::from_spec).collect())
                .unwrap_or_default(),
        };
        debug!(
            "Populated {} parameters for {} ({:?})",
            self.parameters.len(),
            self.selected,
            self.input_type
        );
    }
}

// beta and emittance divide or sit under a square root in the conversion.
fn twiss_record(spec: &ParameterSpec) -> ParameterRecord {
    let mut record = ParameterRecord::from_spec(spec);
    if spec.name.starts_with("beta_") || spec.name.starts_with("emitt_") {
        record.conditions = vec![Condition::NonZero, Condition::Positive];
        record.revalidate();
    }
    record
}

/// Courant-Snyder parameters of one phase-space plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TwissPlane {
    pub beta: f64,
    pub alpha: f64,
    pub emitt: f64,
}

impl TwissPlane {
    /// `(lambda, lambda_p, mu)` of the equivalent quadratic form.
    pub fn to_quadratic(self) -> (f64, f64, f64) {
        let gamma = (1.0 + self.alpha * self.alpha) / self.beta;
        let lambda = (self.emitt / gamma).sqrt();
        let lambda_p = (self.emitt / self.beta).sqrt();
        let mu = self.alpha / (self.beta * gamma).sqrt();
        (lambda, lambda_p, mu)
    }
}

/// Converts Twiss planes `[x, y, t]` into the nine quadratic-form constructor arguments.
pub fn twiss_to_quadratic(planes: [TwissPlane; 3]) -> Vec<(&'static str, f64)> {
    let [x, y, t] = planes.map(TwissPlane::to_quadratic);
    vec![
        ("lambdaX", x.0),
        ("lambdaY", y.0),
        ("lambdaT", t.0),
        ("lambdaPx", x.1),
        ("lambdaPy", y.1),
        ("lambdaPt", t.1),
        ("muxpx", x.2),
        ("muypy", y.2),
        ("mutpt", t.2),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(section: &DistributionSection) -> Vec<&str> {
        section.parameters.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn test_twiss_is_the_default_form() {
        let section = DistributionSection::default();
        assert_eq!(section.selected, "Waterbag");
        assert_eq!(names(&section)[..3], ["beta_x", "beta_y", "beta_t"]);
        assert_eq!(section.parameters[0].unit.as_deref(), Some("m"));
        // beta and emittance are required, alpha defaults to zero
        assert_eq!(section.parameters.iter().filter(|p| !p.is_valid()).count(), 6);
    }

    #[test]
    fn test_thermal_locks_quadratic_form() {
        let mut section = DistributionSection::default();
        section.select("Thermal").unwrap();
        assert!(section.type_locked);
        assert_eq!(section.input_type, DistributionInputType::Quadratic);
        assert_eq!(names(&section), ["k", "kT", "kT_halo", "normalize", "normalize_halo", "halo"]);
        assert!(section.set_input_type(DistributionInputType::Twiss).is_err());

        section.select("Gaussian").unwrap();
        assert!(!section.type_locked);
        section.set_input_type(DistributionInputType::Twiss).unwrap();
        assert_eq!(names(&section)[0], "beta_x");
    }

    #[test]
    fn test_unknown_distribution() {
        let mut section = DistributionSection::default();
        assert!(matches!(section.select("Flat"), Err(EngineError::UnknownDistribution(_))));
        assert_eq!(section.selected, "Waterbag");
    }

    #[test]
    fn test_twiss_beta_and_emittance_must_be_positive() {
        let mut section = DistributionSection::default();
        assert_eq!(section.update_parameter("beta_x", "0").unwrap(), ["Must be non-zero."]);
        assert_eq!(section.update_parameter("emitt_t", "-1e-6").unwrap(), ["Must be positive."]);
        assert!(section.update_parameter("alpha_x", "-1.5").unwrap().is_empty());

        section.set_input_type(DistributionInputType::Quadratic).unwrap();
        assert!(section.parameters.iter().all(|p| p.conditions.is_empty()));
    }

    #[test]
    fn test_twiss_round_numbers() {
        let plane = TwissPlane { beta: 4.0, alpha: 0.0, emitt: 1.0 };
        let (lambda, lambda_p, mu) = plane.to_quadratic();
        assert!((lambda - 2.0).abs() < 1e-12);
        assert!((lambda_p - 0.5).abs() < 1e-12);
        assert_eq!(mu, 0.0);
    }
}
