use crate::inputs::InputField;
use crate::record::ParameterRecord;
use crate::session::Session;
use crate::space_charge::PoissonSolver;
use serde::{Deserialize, Serialize};

/// Digest entry emitted when the lattice has no elements.
pub const LATTICE_EMPTY: &str = "LatticeListIsEmpty";

/// Whether the current session may be handed to the simulation, and why not.
///
/// Always derived from a session, never stored alongside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityReport {
    pub errors: Vec<String>,
    pub can_run: bool,
}

impl ValidityReport {
    /// Scans every record that currently takes part in the run.
    ///
    /// Space-charge and CSR records are only scanned while their subsystem
    /// is enabled, so stale invalid values underneath a disabled toggle do
    /// not block the run.
    pub fn collect(session: &Session) -> Self {
        let mut errors = Vec::new();

        for param in &session.distribution.parameters {
            push_record(&mut errors, String::new(), param);
        }

        for element in &session.lattice.elements {
            let prefix = format!("Lattice {} - ", element.type_name);
            for param in &element.parameters {
                push_record(&mut errors, prefix.clone(), param);
            }
        }

        for field in [
            InputField::Npart,
            InputField::KinEnergy,
            InputField::BunchCharge,
            InputField::ChargeQe,
            InputField::MassMev,
        ] {
            push_labelled(&mut errors, field.label(), session.inputs.record(field));
        }

        if session.lattice.is_empty() {
            errors.push(LATTICE_EMPTY.to_string());
        }

        if session.csr {
            push_labelled(&mut errors, InputField::CsrBins.label(), session.inputs.record(InputField::CsrBins));
        }

        let space_charge = &session.space_charge;
        if space_charge.enabled {
            for group in &space_charge.grid {
                push_record(&mut errors, String::new(), &group.n_cell);
            }
            for group in &space_charge.grid {
                push_record(&mut errors, String::new(), &group.blocking_factor);
            }
            for (index, field) in space_charge.prob_relative.fields().iter().enumerate() {
                if !field.errors.is_empty() {
                    errors.push(format!("prob_relative[{}]: {}", index, field.errors.join("; ")));
                }
            }
            if space_charge.solver == PoissonSolver::Multigrid {
                for field in [
                    InputField::MlmgRelativeTolerance,
                    InputField::MlmgAbsoluteTolerance,
                    InputField::MlmgMaxIters,
                    InputField::MlmgVerbosity,
                ] {
                    push_labelled(&mut errors, field.label(), session.inputs.record(field));
                }
            }
        }

        let can_run = errors.is_empty();
        Self { errors, can_run }
    }
}

fn push_record(errors: &mut Vec<String>, prefix: String, record: &ParameterRecord) {
    if !record.is_valid() {
        errors.push(format!("{}{}: {}", prefix, record.name, record.error_text()));
    }
}

fn push_labelled(errors: &mut Vec<String>, label: &str, record: &ParameterRecord) {
    if !record.is_valid() {
        errors.push(format!("{}: {}", label, record.error_text()));
    }
}
