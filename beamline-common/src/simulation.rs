//! Packs a valid session into the inputs of one simulation run.
//!
//! The engine does not integrate anything itself; a [`SimulationBackend`]
//! receives the request and reports back whatever output lines it produced.
use crate::error::EngineError;
use crate::inputs::InputField;
use crate::record::ParameterRecord;
use crate::serializer::{serialize, serialize_distribution, ConstructorCall};
use crate::session::Session;
use crate::space_charge::PoissonSolver;
use crate::value::Value;
use log::info;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpaceChargeSettings {
    pub poisson_solver: PoissonSolver,
    pub dynamic_size: bool,
    pub max_level: usize,
    pub n_cell: [i64; 3],
    pub blocking_factor: [i64; 3],
    pub prob_relative: Vec<f64>,
    /// Present only for the multigrid solver.
    pub mlmg: Option<MultigridSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultigridSettings {
    pub relative_tolerance: f64,
    pub absolute_tolerance: f64,
    pub max_iters: i64,
    pub verbosity: i64,
}

/// Everything a backend needs to start one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRequest {
    pub npart: i64,
    pub kin_energy_mev: f64,
    pub bunch_charge_c: f64,
    pub charge_qe: i64,
    pub mass_mev: f64,
    pub particle_shape: u8,
    pub distribution: ConstructorCall,
    pub lattice: Vec<ConstructorCall>,
    pub space_charge: Option<SpaceChargeSettings>,
    pub csr_bins: Option<i64>,
}

impl SimulationRequest {
    /// Builds a request, refusing sessions the validity gate rejects.
    pub fn build(session: &Session) -> Result<Self, EngineError> {
        let report = session.validity();
        if !report.can_run {
            return Err(EngineError::NotRunnable(report.errors));
        }

        let inputs = &session.inputs;
        let float = |field| inputs.value(field).as_f64().unwrap_or(0.0);
        let int = |field| inputs.value(field).as_i64().unwrap_or(0);

        let sc = &session.space_charge;
        let space_charge = sc.enabled.then(|| SpaceChargeSettings {
            poisson_solver: sc.solver,
            dynamic_size: sc.dynamic_size,
            max_level: sc.max_level,
            n_cell: sc.n_cell(),
            blocking_factor: sc.blocking_factor(),
            prob_relative: sc.prob_relative.values().to_vec(),
            mlmg: (sc.solver == PoissonSolver::Multigrid).then(|| MultigridSettings {
                relative_tolerance: float(InputField::MlmgRelativeTolerance),
                absolute_tolerance: float(InputField::MlmgAbsoluteTolerance),
                max_iters: int(InputField::MlmgMaxIters),
                verbosity: int(InputField::MlmgVerbosity),
            }),
        });

        // Twiss input that passed the gate can still convert to inf or NaN.
        let distribution = serialize_distribution(&session.distribution);
        let non_finite: Vec<String> = distribution
            .arguments
            .iter()
            .filter(|(_, text)| text.parse::<f64>().is_ok_and(|x| !x.is_finite()))
            .map(|(name, text)| format!("{}: Must be finite, got {}", name, text))
            .collect();
        if !non_finite.is_empty() {
            return Err(EngineError::NotRunnable(non_finite));
        }

        Ok(Self {
            npart: int(InputField::Npart),
            kin_energy_mev: inputs.kin_energy_mev(),
            bunch_charge_c: float(InputField::BunchCharge),
            charge_qe: int(InputField::ChargeQe),
            mass_mev: float(InputField::MassMev),
            particle_shape: sc.particle_shape,
            distribution,
            lattice: serialize(&session.lattice.elements),
            space_charge,
            csr_bins: session.csr.then(|| int(InputField::CsrBins)),
        })
    }
}

/// Renders the session as an importable listing.
///
/// Unlike [`SimulationRequest::build`] this works on invalid sessions too:
/// every record is written from its own value, so errored entries keep their
/// typed text and Twiss input stays Twiss. Importing the listing reproduces
/// the session's validity report.
pub fn script_lines(session: &Session) -> Vec<String> {
    let mut lines = vec!["# beamline session".to_string()];
    let inputs = &session.inputs;

    for (field, record) in inputs.records() {
        lines.push(format!("{} = {}", field.key(), literal(&record.value)));
    }
    lines.push(format!("kin_energy_unit = '{}'", inputs.kin_energy_unit()));

    let sc = &session.space_charge;
    lines.push(format!("space_charge = {}", boolean(sc.enabled)));
    lines.push(format!("poisson_solver = '{}'", sc.solver));
    lines.push(format!("max_level = {}", sc.max_level));
    lines.push(format!("particle_shape = {}", sc.particle_shape));
    for (key, value) in sc.grid_values() {
        lines.push(format!("{} = {}", key, literal(&value)));
    }
    let prob_relative: Vec<String> = sc
        .prob_relative
        .fields()
        .iter()
        .map(|f| if f.raw.is_empty() { "0".to_string() } else { f.raw.clone() })
        .collect();
    lines.push(format!("prob_relative = [{}]", prob_relative.join(", ")));
    lines.push(format!("csr = {}", boolean(session.csr)));

    let distribution = &session.distribution;
    lines.push(format!("distribution_type = '{}'", distribution.input_type.key()));
    lines.push(format!(
        "distribution = distribution.{}",
        listing_call(&distribution.selected, &distribution.parameters)
    ));
    lines.push("lattice = [".to_string());
    for element in &session.lattice.elements {
        lines.push(format!("    elements.{},", listing_call(&element.type_name, &element.parameters)));
    }
    lines.push("]".to_string());
    lines
}

fn listing_call(type_name: &str, records: &[ParameterRecord]) -> ConstructorCall {
    ConstructorCall {
        type_name: type_name.to_string(),
        arguments: records.iter().map(|r| (r.name.clone(), literal(&r.value))).collect(),
    }
}

fn boolean(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

// Text entries are quoted, so an errored value comes back as the same text
// and an unset one as an empty string, both of which fail validation again.
fn literal(value: &Value) -> String {
    match value {
        Value::Empty => "''".to_string(),
        Value::Str(s) if s.contains('\'') => format!("\"{}\"", s),
        Value::Str(s) => format!("'{}'", s),
        other => other.render(),
    }
}

/// Lines produced by a backend run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationOutput {
    pub lines: Vec<String>,
}

/// Seam between the engine and whatever actually tracks the beam.
pub trait SimulationBackend {
    fn run(&mut self, request: &SimulationRequest) -> anyhow::Result<SimulationOutput>;
}

/// Runs the session on `backend` if the validity gate allows it.
pub fn run_simulation<B: SimulationBackend + ?Sized>(
    session: &Session,
    backend: &mut B,
) -> anyhow::Result<SimulationOutput> {
    let request = SimulationRequest::build(session)?;
    info!(
        "Starting simulation: {} particles, {} lattice elements, space charge {}",
        request.npart,
        request.lattice.len(),
        if request.space_charge.is_some() { "on" } else { "off" }
    );
    let output = backend.run(&request)?;
    info!("Simulation finished with {} output lines", output.lines.len());
    Ok(output)
}
