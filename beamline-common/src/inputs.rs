//! Global scalar fields: beam and reference-particle inputs, CSR bins, and
//! multigrid solver settings.
use crate::defaults::{self, Section};
use crate::error::EngineError;
use crate::record::ParameterRecord;
use crate::validator::Condition;
use crate::value::{DeclaredType, Value};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Closed set of global fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputField {
    Npart,
    KinEnergy,
    BunchCharge,
    ChargeQe,
    MassMev,
    CsrBins,
    MlmgRelativeTolerance,
    MlmgAbsoluteTolerance,
    MlmgMaxIters,
    MlmgVerbosity,
}

impl InputField {
    pub const ALL: [InputField; 10] = [
        InputField::Npart,
        InputField::KinEnergy,
        InputField::BunchCharge,
        InputField::ChargeQe,
        InputField::MassMev,
        InputField::CsrBins,
        InputField::MlmgRelativeTolerance,
        InputField::MlmgAbsoluteTolerance,
        InputField::MlmgMaxIters,
        InputField::MlmgVerbosity,
    ];

    /// Field name as it appears in sessions and exported scripts.
    pub fn key(self) -> &'static str {
        match self {
            InputField::Npart => "npart",
            InputField::KinEnergy => "kin_energy",
            InputField::BunchCharge => "bunch_charge_C",
            InputField::ChargeQe => "charge_qe",
            InputField::MassMev => "mass_MeV",
            InputField::CsrBins => "csr_bins",
            InputField::MlmgRelativeTolerance => "mlmg_relative_tolerance",
            InputField::MlmgAbsoluteTolerance => "mlmg_absolute_tolerance",
            InputField::MlmgMaxIters => "mlmg_max_iters",
            InputField::MlmgVerbosity => "mlmg_verbosity",
        }
    }

    /// Label used in the validity digest.
    pub fn label(self) -> &'static str {
        match self {
            InputField::Npart => "Number of Particles",
            InputField::KinEnergy => "Kinetic Energy",
            InputField::BunchCharge => "Bunch Charge",
            InputField::ChargeQe => "Ref. Particle Charge",
            InputField::MassMev => "Ref. Particle Mass",
            InputField::CsrBins => "CSR Bins",
            other => other.key(),
        }
    }

    pub fn declared_type(self) -> DeclaredType {
        match self {
            InputField::Npart
            | InputField::ChargeQe
            | InputField::CsrBins
            | InputField::MlmgMaxIters
            | InputField::MlmgVerbosity => DeclaredType::Int,
            _ => DeclaredType::Float,
        }
    }

    pub fn conditions(self) -> &'static [Condition] {
        match self {
            InputField::Npart
            | InputField::KinEnergy
            | InputField::MassMev
            | InputField::CsrBins
            | InputField::MlmgMaxIters => &[Condition::NonZero, Condition::Positive],
            InputField::ChargeQe => &[Condition::NonZero],
            InputField::BunchCharge => &[],
            InputField::MlmgRelativeTolerance
            | InputField::MlmgAbsoluteTolerance
            | InputField::MlmgVerbosity => &[Condition::Positive],
        }
    }

    /// The reset group the field belongs to.
    pub fn section(self) -> Section {
        match self {
            InputField::CsrBins => Section::Csr,
            InputField::MlmgRelativeTolerance
            | InputField::MlmgAbsoluteTolerance
            | InputField::MlmgMaxIters
            | InputField::MlmgVerbosity => Section::SpaceCharge,
            _ => Section::InputParameters,
        }
    }

    fn fresh_record(self) -> ParameterRecord {
        let initial = defaults::default_value(self.key()).unwrap_or_default();
        ParameterRecord::new(self.key(), self.declared_type(), self.conditions(), initial)
    }
}

impl FromStr for InputField {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InputField::ALL
            .into_iter()
            .find(|field| field.key() == s)
            .ok_or_else(|| EngineError::UnknownField(s.to_string()))
    }
}

/// Display unit of the kinetic energy field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum KinEnergyUnit {
    #[serde(rename = "meV")]
    MilliElectronVolt,
    #[serde(rename = "eV")]
    ElectronVolt,
    #[serde(rename = "keV")]
    KiloElectronVolt,
    #[default]
    #[serde(rename = "MeV")]
    MegaElectronVolt,
    #[serde(rename = "GeV")]
    GigaElectronVolt,
    #[serde(rename = "TeV")]
    TeraElectronVolt,
}

impl KinEnergyUnit {
    pub const ALL: [KinEnergyUnit; 6] = [
        KinEnergyUnit::MilliElectronVolt,
        KinEnergyUnit::ElectronVolt,
        KinEnergyUnit::KiloElectronVolt,
        KinEnergyUnit::MegaElectronVolt,
        KinEnergyUnit::GigaElectronVolt,
        KinEnergyUnit::TeraElectronVolt,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            KinEnergyUnit::MilliElectronVolt => "meV",
            KinEnergyUnit::ElectronVolt => "eV",
            KinEnergyUnit::KiloElectronVolt => "keV",
            KinEnergyUnit::MegaElectronVolt => "MeV",
            KinEnergyUnit::GigaElectronVolt => "GeV",
            KinEnergyUnit::TeraElectronVolt => "TeV",
        }
    }

    /// Multiplier that converts a value in this unit to MeV.
    pub fn to_mev(self) -> f64 {
        match self {
            KinEnergyUnit::MilliElectronVolt => 1e-9,
            KinEnergyUnit::ElectronVolt => 1e-6,
            KinEnergyUnit::KiloElectronVolt => 1e-3,
            KinEnergyUnit::MegaElectronVolt => 1.0,
            KinEnergyUnit::GigaElectronVolt => 1e3,
            KinEnergyUnit::TeraElectronVolt => 1e6,
        }
    }
}

impl fmt::Display for KinEnergyUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for KinEnergyUnit {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KinEnergyUnit::ALL
            .into_iter()
            .find(|unit| unit.symbol() == s.trim())
            .ok_or_else(|| EngineError::InvalidChoice { what: "kinetic energy unit", value: s.to_string() })
    }
}

/// Records for every [`InputField`] plus the derived kinetic energy in MeV.
#[derive(Debug, Clone)]
pub struct InputParameters {
    records: BTreeMap<InputField, ParameterRecord>,
    kin_energy_unit: KinEnergyUnit,
    kin_energy_mev: f64,
}

impl Default for InputParameters {
    fn default() -> Self {
        let mut inputs = Self {
            records: InputField::ALL.into_iter().map(|f| (f, f.fresh_record())).collect(),
            kin_energy_unit: KinEnergyUnit::default(),
            kin_energy_mev: 0.0,
        };
        inputs.refresh_kin_energy();
        inputs
    }
}

impl InputParameters {
    pub fn record(&self, field: InputField) -> &ParameterRecord {
        // Every field is inserted on construction and never removed.
        &self.records[&field]
    }

    pub fn value(&self, field: InputField) -> &Value {
        &self.record(field).value
    }

    pub fn records(&self) -> impl Iterator<Item = (InputField, &ParameterRecord)> {
        self.records.iter().map(|(field, record)| (*field, record))
    }

    /// Applies raw input to one field and returns its messages.
    pub fn set(&mut self, field: InputField, raw: &str) -> Vec<String> {
        let record = self.records.entry(field).or_insert_with(|| field.fresh_record());
        let errors = record.update(raw).to_vec();
        if field == InputField::KinEnergy {
            self.refresh_kin_energy();
        }
        errors
    }

    pub fn kin_energy_unit(&self) -> KinEnergyUnit {
        self.kin_energy_unit
    }

    pub fn set_kin_energy_unit(&mut self, unit: KinEnergyUnit) {
        self.kin_energy_unit = unit;
        self.refresh_kin_energy();
    }

    /// Kinetic energy handed to the simulation, always in MeV.
    pub fn kin_energy_mev(&self) -> f64 {
        self.kin_energy_mev
    }

    /// Restores the fields of one reset group to their defaults.
    pub fn reset(&mut self, section: Section) {
        for field in InputField::ALL {
            if section == Section::All || field.section() == section {
                self.records.insert(field, field.fresh_record());
            }
        }
        if matches!(section, Section::All | Section::InputParameters) {
            self.kin_energy_unit = KinEnergyUnit::default();
            self.refresh_kin_energy();
        }
    }

    // A zero or invalid display value leaves the last converted energy in place.
    fn refresh_kin_energy(&mut self) {
        let record = self.record(InputField::KinEnergy);
        match record.value.as_f64() {
            Some(value) if record.is_valid() && value != 0.0 => {
                self.kin_energy_mev = value * self.kin_energy_unit.to_mev();
                debug!("kin_energy = {} {} -> {} MeV", value, self.kin_energy_unit, self.kin_energy_mev);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let inputs = InputParameters::default();
        assert!(inputs.records().all(|(_, r)| r.is_valid()));
        assert_eq!(inputs.value(InputField::ChargeQe), &Value::Int(-1));
        assert_eq!(inputs.kin_energy_mev(), 2000.0);
    }

    #[test]
    fn test_kinetic_energy_follows_unit() {
        let mut inputs = InputParameters::default();
        inputs.set(InputField::KinEnergy, "2");
        inputs.set_kin_energy_unit(KinEnergyUnit::GigaElectronVolt);
        assert_eq!(inputs.kin_energy_mev(), 2000.0);
        inputs.set_kin_energy_unit(KinEnergyUnit::KiloElectronVolt);
        assert!((inputs.kin_energy_mev() - 0.002).abs() < 1e-15);

        // invalid input keeps the last good conversion
        assert_eq!(inputs.set(InputField::KinEnergy, "-3"), ["Must be positive."]);
        assert!((inputs.kin_energy_mev() - 0.002).abs() < 1e-15);
    }

    #[test]
    fn test_field_conditions() {
        let mut inputs = InputParameters::default();
        assert_eq!(inputs.set(InputField::ChargeQe, "0"), ["Must be non-zero."]);
        assert!(inputs.set(InputField::ChargeQe, "1").is_empty());
        assert_eq!(inputs.set(InputField::Npart, "1.5"), ["Must be an integer"]);
        assert!(inputs.set(InputField::BunchCharge, "-1e-9").is_empty());
    }

    #[test]
    fn test_reset_only_touches_its_section() {
        let mut inputs = InputParameters::default();
        inputs.set(InputField::Npart, "abc");
        inputs.set(InputField::CsrBins, "0");
        inputs.reset(Section::Csr);
        assert!(inputs.record(InputField::CsrBins).is_valid());
        assert!(!inputs.record(InputField::Npart).is_valid());
        inputs.reset(Section::All);
        assert_eq!(inputs.value(InputField::Npart), &Value::Int(1000));
    }

    #[test]
    fn test_set_after_reset_edits_the_fresh_record() {
        let mut inputs = InputParameters::default();
        inputs.reset(Section::All);
        assert!(inputs.set(InputField::Npart, "250").is_empty());
        assert_eq!(inputs.value(InputField::Npart), &Value::Int(250));
        assert_eq!(inputs.records().count(), InputField::ALL.len());
    }

    #[test]
    fn test_unit_parsing() {
        assert_eq!("keV".parse::<KinEnergyUnit>().unwrap(), KinEnergyUnit::KiloElectronVolt);
        assert!("kev".parse::<KinEnergyUnit>().is_err());
        assert_eq!("mass_MeV".parse::<InputField>().unwrap(), InputField::MassMev);
    }
}
