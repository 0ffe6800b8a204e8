use crate::defaults::{Section, MAX_LEVELS, PARTICLE_SHAPES};
use crate::distribution::DistributionInputType;
use crate::inputs::{InputField, KinEnergyUnit};
use crate::session::{Event, Session};
use crate::space_charge::{Axis, GridField, PoissonSolver};
use crate::value::format_float;
use anyhow::Result;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// Global beam inputs, keyed like the exported listing (npart, mass_MeV, ...)
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct InputsConfig {
    #[serde(default)]
    pub kin_energy_unit: KinEnergyUnit,
    #[serde(flatten)]
    pub fields: BTreeMap<String, toml::Value>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct DistributionConfig {
    #[serde(default = "default_distribution")]
    pub name: String,
    #[serde(rename = "type", default)]
    pub input_type: DistributionInputType,
    #[serde(default)]
    pub parameters: BTreeMap<String, toml::Value>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SpaceChargeConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub poisson_solver: PoissonSolver,
    #[serde(default)]
    pub max_level: usize,
    #[serde(default = "default_particle_shape")]
    pub particle_shape: u8,
    pub n_cell: Option<[toml::Value; 3]>,
    pub blocking_factor: Option<[toml::Value; 3]>,
    pub prob_relative: Option<Vec<toml::Value>>,
    // Multigrid settings (mlmg_*), only checked when the solver is multigrid
    #[serde(flatten)]
    pub solver_settings: BTreeMap<String, toml::Value>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct CsrConfig {
    #[serde(default)]
    pub enabled: bool,
    pub bins: Option<toml::Value>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ElementConfig {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(flatten)]
    pub parameters: BTreeMap<String, toml::Value>,
}

// A complete dashboard session, loaded from session.toml.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct SessionConfig {
    #[serde(default)]
    pub inputs: InputsConfig,
    #[serde(default)]
    pub distribution: DistributionConfig,
    #[serde(default)]
    pub space_charge: SpaceChargeConfig,
    #[serde(default)]
    pub csr: CsrConfig,
    #[serde(default)]
    pub lattice: Vec<ElementConfig>,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        DistributionConfig {
            name: default_distribution(),
            input_type: DistributionInputType::default(),
            parameters: BTreeMap::new(),
        }
    }
}

impl Default for SpaceChargeConfig {
    fn default() -> Self {
        SpaceChargeConfig {
            enabled: false,
            poisson_solver: PoissonSolver::default(),
            max_level: 0,
            particle_shape: default_particle_shape(),
            n_cell: None,
            blocking_factor: None,
            prob_relative: None,
            solver_settings: BTreeMap::new(),
        }
    }
}

impl SessionConfig {
    /// Loads a session description from a TOML file.
    ///
    /// Only structural problems are rejected here. Field values that fail
    /// validation are loaded as-is and show up in the validity report.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read session file '{}': {}", path_ref.display(), e))?;
        let config = Self::from_toml(&config_str)
            .map_err(|e| anyhow::anyhow!("Invalid session file '{}': {}", path_ref.display(), e))?;
        debug!("Loaded session with {} lattice elements", config.lattice.len());
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: SessionConfig = toml::from_str(text)?;

        let sc = &config.space_charge;
        if !MAX_LEVELS.contains(&sc.max_level) {
            anyhow::bail!("max_level must be one of {:?}.", MAX_LEVELS);
        }
        if !PARTICLE_SHAPES.contains(&sc.particle_shape) {
            anyhow::bail!("particle_shape must be one of {:?}.", PARTICLE_SHAPES);
        }
        if let Some(prob_relative) = &sc.prob_relative {
            if prob_relative.len() != sc.max_level + 1 {
                anyhow::bail!(
                    "prob_relative needs {} entries for max_level {}, found {}.",
                    sc.max_level + 1,
                    sc.max_level,
                    prob_relative.len()
                );
            }
        }
        if config.lattice.is_empty() {
            warn!("Session has an empty lattice; it will not be runnable.");
        }

        Ok(config)
    }

    /// The events that rebuild this session from defaults, in dependency order.
    pub fn events(&self) -> Result<Vec<Event>> {
        let mut events = Vec::new();

        events.push(Event::SetKinEnergyUnit(self.inputs.kin_energy_unit));
        for (key, value) in &self.inputs.fields {
            let field: InputField = key.parse()?;
            events.push(Event::SetInput { field, raw: raw_text(value) });
        }

        let sc = &self.space_charge;
        events.push(Event::SetSpaceCharge(sc.enabled));
        events.push(Event::SetPoissonSolver(sc.poisson_solver));
        events.push(Event::SetMaxLevel(sc.max_level));
        events.push(Event::SetParticleShape(sc.particle_shape));
        for (field, values) in [(GridField::NCell, &sc.n_cell), (GridField::BlockingFactor, &sc.blocking_factor)] {
            if let Some(values) = values {
                for (axis, value) in Axis::ALL.into_iter().zip(values) {
                    events.push(Event::SetGrid { axis, field, raw: raw_text(value) });
                }
            }
        }
        for (index, value) in sc.prob_relative.iter().flatten().enumerate() {
            events.push(Event::SetProbRelative { index, raw: raw_text(value) });
        }
        for (key, value) in &sc.solver_settings {
            let field: InputField = key.parse()?;
            if field.section() != Section::SpaceCharge {
                anyhow::bail!("'{}' does not belong in [space_charge].", key);
            }
            events.push(Event::SetInput { field, raw: raw_text(value) });
        }

        events.push(Event::SetCsr(self.csr.enabled));
        if let Some(bins) = &self.csr.bins {
            events.push(Event::SetInput { field: InputField::CsrBins, raw: raw_text(bins) });
        }

        events.push(Event::SelectDistribution(self.distribution.name.clone()));
        events.push(Event::SetDistributionType(self.distribution.input_type));
        for (name, value) in &self.distribution.parameters {
            events.push(Event::SetDistributionParameter { name: name.clone(), raw: raw_text(value) });
        }

        for (index, element) in self.lattice.iter().enumerate() {
            events.push(Event::AddElement(element.type_name.clone()));
            for (name, value) in &element.parameters {
                events.push(Event::SetElementParameter { index, name: name.clone(), raw: raw_text(value) });
            }
        }

        Ok(events)
    }

    /// Builds a fresh session through the ordinary event path.
    pub fn into_session(&self) -> Result<Session> {
        let mut session = Session::new();
        session
            .apply_all(self.events()?)
            .map_err(|e| anyhow::anyhow!("Failed to apply session file: {}", e))?;
        Ok(session)
    }
}

// TOML scalars become the text a user would have typed.
fn raw_text(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Integer(i) => i.to_string(),
        toml::Value::Float(x) => format_float(*x),
        toml::Value::Boolean(b) => (if *b { "True" } else { "False" }).to_string(),
        other => other.to_string(),
    }
}

fn default_distribution() -> String {
    crate::distribution::DEFAULT_DISTRIBUTION.to_string()
}

fn default_particle_shape() -> u8 {
    2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use std::io::Write;

    const SESSION: &str = r#"
[inputs]
npart = 10000
kin_energy = 2.0
kin_energy_unit = "GeV"
bunch_charge_C = 1e-9
charge_qe = -1
mass_MeV = 0.510998

[distribution]
name = "Waterbag"
type = "quadratic"
[distribution.parameters]
lambdaX = 3.9e-7
lambdaY = 3.9e-7
lambdaT = 1.0e-3
lambdaPx = 3.9e-7
lambdaPy = 3.9e-7
lambdaPt = 1.0e-3
muxpx = 0.0
muypy = 0.0
mutpt = 0.0

[space_charge]
enabled = true
max_level = 1
n_cell = [64, 64, 48]
prob_relative = [1.1, 1.05]

[[lattice]]
type = "Drift"
ds = 0.25
nslice = 10

[[lattice]]
type = "Quad"
ds = 1.0
k = -2.5
"#;

    #[test]
    fn test_load_builds_runnable_session() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SESSION.as_bytes()).unwrap();

        let config = SessionConfig::load(file.path()).unwrap();
        let session = config.into_session().unwrap();
        assert_eq!(session.validity().errors, Vec::<String>::new());
        assert_eq!(session.inputs.kin_energy_mev(), 2000.0);
        assert_eq!(session.inputs.value(InputField::ChargeQe), &Value::Int(-1));
        assert_eq!(session.space_charge.n_cell(), [64, 64, 48]);
        assert_eq!(session.space_charge.prob_relative.values(), [1.1, 1.05]);
        assert_eq!(session.lattice.elements[1].type_name, "Quad");
    }

    #[test]
    fn test_invalid_values_are_loaded_not_rejected() {
        let config = SessionConfig::from_toml("[inputs]\nnpart = -5\n").unwrap();
        let errors = config.into_session().unwrap().validity().errors;
        assert!(errors.contains(&"Number of Particles: Must be positive.".to_string()));
    }

    #[test]
    fn test_structural_errors() {
        assert!(SessionConfig::from_toml("[space_charge]\nmax_level = 7\n").is_err());
        assert!(SessionConfig::from_toml("[space_charge]\nmax_level = 1\nprob_relative = [1.1]\n").is_err());
        let unknown = SessionConfig::from_toml("[inputs]\nwarp = 9\n").unwrap();
        assert!(unknown.into_session().is_err());
        let unknown = SessionConfig::from_toml("[[lattice]]\ntype = \"Undulator\"\n").unwrap();
        assert!(unknown.into_session().is_err());
        assert!(SessionConfig::load("/nonexistent/session.toml").is_err());
    }
}
