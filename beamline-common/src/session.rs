//! The single owner of all dashboard state and the event entry point.
//!
//! Every external input is one [`Event`]. [`Session::apply`] performs the
//! whole reconciliation pass for it and returns the fresh validity report,
//! so no state change ever triggers another one behind the caller's back.
use crate::defaults::Section;
use crate::distribution::{DistributionInputType, DistributionSection};
use crate::error::EngineError;
use crate::gate::ValidityReport;
use crate::import;
use crate::inputs::{InputField, InputParameters, KinEnergyUnit};
use crate::lattice::Lattice;
use crate::space_charge::{Axis, GridField, PoissonSolver, SpaceCharge};
use log::{debug, info, warn};

/// Message shown for any script that cannot be imported.
pub const IMPORT_FAILED: &str = "Unable to parse";

/// A discrete user input.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    SetInput { field: InputField, raw: String },
    SetKinEnergyUnit(KinEnergyUnit),
    SetSpaceCharge(bool),
    SetPoissonSolver(PoissonSolver),
    SetMaxLevel(usize),
    SetParticleShape(u8),
    SetGrid { axis: Axis, field: GridField, raw: String },
    SetProbRelative { index: usize, raw: String },
    SetCsr(bool),
    AddElement(String),
    RemoveElement(usize),
    MoveElementUp(usize),
    MoveElementDown(usize),
    SetElementParameter { index: usize, name: String, raw: String },
    SetElementDefault { name: String, raw: String },
    SelectDistribution(String),
    SetDistributionType(DistributionInputType),
    SetDistributionParameter { name: String, raw: String },
    Reset(Section),
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// Keys of the fields the event may have changed, including dependents.
    pub touched: Vec<String>,
    pub report: ValidityReport,
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    pub inputs: InputParameters,
    pub distribution: DistributionSection,
    pub lattice: Lattice,
    pub space_charge: SpaceCharge,
    pub csr: bool,
    /// Set when the last script import failed.
    pub import_error: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current validity, computed from scratch.
    pub fn validity(&self) -> ValidityReport {
        ValidityReport::collect(self)
    }

    pub fn can_run(&self) -> bool {
        self.validity().can_run
    }

    /// Applies one event and reconciles everything that depends on it.
    ///
    /// An `Err` means the event itself was malformed (unknown element,
    /// index out of range); the session is left unchanged in that case.
    pub fn apply(&mut self, event: Event) -> Result<Outcome, EngineError> {
        let was_runnable = self.can_run();
        let touched = self.touched_keys(&event);
        debug!("Applying {:?}", event);

        match event {
            Event::SetInput { field, raw } => {
                self.inputs.set(field, &raw);
            }
            Event::SetKinEnergyUnit(unit) => self.inputs.set_kin_energy_unit(unit),
            Event::SetSpaceCharge(enabled) => self.space_charge.set_enabled(enabled),
            Event::SetPoissonSolver(solver) => self.space_charge.set_solver(solver),
            Event::SetMaxLevel(level) => self.space_charge.set_max_level(level)?,
            Event::SetParticleShape(shape) => self.space_charge.set_particle_shape(shape)?,
            Event::SetGrid { axis, field, raw } => self.space_charge.set_grid(axis, field, &raw),
            Event::SetProbRelative { index, raw } => self.space_charge.set_prob_relative(index, &raw)?,
            Event::SetCsr(enabled) => self.csr = enabled,
            Event::AddElement(type_name) => {
                self.lattice.add(&type_name)?;
            }
            Event::RemoveElement(index) => {
                self.lattice.remove(index)?;
            }
            Event::MoveElementUp(index) => self.lattice.move_up(index)?,
            Event::MoveElementDown(index) => self.lattice.move_down(index)?,
            Event::SetElementParameter { index, name, raw } => {
                self.lattice.update_parameter(index, &name, &raw)?;
            }
            Event::SetElementDefault { name, raw } => {
                self.lattice.set_default(&name, &raw);
            }
            Event::SelectDistribution(name) => self.distribution.select(&name)?,
            Event::SetDistributionType(input_type) => self.distribution.set_input_type(input_type)?,
            Event::SetDistributionParameter { name, raw } => {
                self.distribution.update_parameter(&name, &raw)?;
            }
            Event::Reset(section) => self.reset(section),
        }

        let report = self.validity();
        if report.can_run != was_runnable {
            info!("Simulation inputs are now {}", if report.can_run { "valid" } else { "invalid" });
        }
        Ok(Outcome { touched, report })
    }

    fn touched_keys(&self, event: &Event) -> Vec<String> {
        match event {
            Event::SetInput { field, .. } => vec![field.key().into()],
            Event::SetKinEnergyUnit(_) => vec!["kin_energy_unit".into(), InputField::KinEnergy.key().into()],
            Event::SetSpaceCharge(_) => vec!["space_charge".into(), "dynamic_size".into()],
            Event::SetPoissonSolver(_) => vec!["poisson_solver".into(), "prob_relative".into()],
            Event::SetMaxLevel(_) => vec!["max_level".into(), "prob_relative".into()],
            Event::SetParticleShape(_) => vec!["particle_shape".into()],
            Event::SetGrid { axis, .. } => vec![GridField::NCell.key(*axis), GridField::BlockingFactor.key(*axis)],
            Event::SetProbRelative { index, .. } => (*index..self.space_charge.prob_relative.len())
                .take(2)
                .map(|i| format!("prob_relative[{}]", i))
                .collect(),
            Event::SetCsr(_) => vec!["csr".into()],
            Event::SetElementParameter { index, name, .. } => vec![format!("lattice[{}].{}", index, name)],
            Event::AddElement(_)
            | Event::RemoveElement(_)
            | Event::MoveElementUp(_)
            | Event::MoveElementDown(_)
            | Event::SetElementDefault { .. } => vec!["lattice".into()],
            Event::SetDistributionParameter { name, .. } => vec![format!("distribution.{}", name)],
            Event::SelectDistribution(_) | Event::SetDistributionType(_) => vec!["distribution".into()],
            Event::Reset(section) => vec![format!("{:?}", section)],
        }
    }

    /// Applies events in order, stopping at the first malformed one.
    pub fn apply_all<I>(&mut self, events: I) -> Result<Outcome, EngineError>
    where
        I: IntoIterator<Item = Event>,
    {
        let mut outcome = Outcome { touched: Vec::new(), report: self.validity() };
        for event in events {
            let next = self.apply(event)?;
            outcome.touched.extend(next.touched);
            outcome.report = next.report;
        }
        Ok(outcome)
    }

    /// Replaces one section's records with their defaults, revalidated.
    pub fn reset(&mut self, section: Section) {
        match section {
            Section::InputParameters | Section::Csr => {
                self.inputs.reset(section);
                if section == Section::Csr {
                    self.csr = false;
                }
            }
            Section::Distribution => self.distribution = DistributionSection::default(),
            Section::Lattice => self.lattice.clear(),
            Section::SpaceCharge => {
                self.inputs.reset(section);
                self.space_charge.reset();
            }
            Section::All => *self = Self::default(),
        }
        debug!("Reset {:?}", section);
    }

    /// Replaces the session with the contents of an exported script.
    ///
    /// The script is applied to a fresh session through the ordinary event
    /// path, so every imported record is revalidated. On any failure the
    /// current state is kept and `import_error` carries one opaque message.
    pub fn import_script(&mut self, text: &str) -> Outcome {
        match import::parse_script(text).and_then(|script| {
            let mut fresh = Session::new();
            fresh.apply_all(script.into_events())?;
            Ok(fresh)
        }) {
            Ok(fresh) => {
                *self = fresh;
                info!("Imported script: {} lattice elements", self.lattice.len());
            }
            Err(e) => {
                warn!("Script import failed: {}", e);
                self.import_error = Some(IMPORT_FAILED.to_string());
            }
        }
        Outcome { touched: vec![format!("{:?}", Section::All)], report: self.validity() }
    }
}
