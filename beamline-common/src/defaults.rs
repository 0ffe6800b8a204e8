//! Static defaults, step sizes, and display units for dashboard parameters.
//!
//! Every lookup first tries the full parameter name and then falls back to
//! its base name, the part before the first `_` (`beta_x` -> `beta`).
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Seed for `prob_relative[0]` under the FFT Poisson solver.
pub const PROB_RELATIVE_FIRST_FFT: f64 = 1.1;
/// Seed for `prob_relative[0]` under the multigrid Poisson solver.
pub const PROB_RELATIVE_FIRST_MULTIGRID: f64 = 3.1;

/// Step used by numeric fields that are not listed in the step table.
pub const DEFAULT_STEP: f64 = 1.0;

pub const MAX_LEVELS: [usize; 5] = [0, 1, 2, 3, 4];
pub const PARTICLE_SHAPES: [u8; 3] = [1, 2, 3];

/// Named groups of fields that can be reset together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    InputParameters,
    Distribution,
    Lattice,
    SpaceCharge,
    Csr,
    All,
}

fn lookup<T: Copy>(table: &[(&str, T)], name: &str) -> Option<T> {
    let find = |key: &str| table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v);
    find(name).or_else(|| find(base_name(name)))
}

/// The part of a parameter name before the first underscore.
pub fn base_name(name: &str) -> &str {
    name.split('_').next().unwrap_or(name)
}

const STEPS: &[(&str, f64)] = &[
    ("mass_MeV", 0.1),
    ("bunch_charge_C", 1e-11),
    ("prob_relative", 0.1),
    ("mlmg_relative_tolerance", 1e-12),
    ("mlmg_absolute_tolerance", 1e-12),
    ("beta", 0.1),
    ("emitt", 1e-7),
    ("alpha", 0.1),
];

const UNITS: &[(&str, &str)] = &[
    ("charge_qe", "qe"),
    ("mass_MeV", "MeV"),
    ("bunch_charge_C", "C"),
    ("mlmg_absolute_tolerance", "V/m"),
    ("beta", "m"),
    ("emitt", "m"),
];

/// Numeric step for a parameter's input control.
pub fn step(name: &str) -> f64 {
    lookup(STEPS, name).unwrap_or(DEFAULT_STEP)
}

/// Display unit for a parameter, if it has one.
pub fn unit(name: &str) -> Option<&'static str> {
    lookup(UNITS, name)
}

/// Default value for a global dashboard field.
pub fn default_value(name: &str) -> Option<Value> {
    let value = match name {
        "charge_qe" => Value::Int(-1),
        "mass_MeV" => Value::Float(0.51099895),
        "npart" => Value::Int(1000),
        "kin_energy" => Value::Float(2e3),
        "kin_energy_unit" => Value::Str("MeV".into()),
        "bunch_charge_C" => Value::Float(1e-9),
        "selected_distribution" => Value::Str("Waterbag".into()),
        "selected_distribution_type" => Value::Str("Twiss".into()),
        "poisson_solver" => Value::Str("fft".into()),
        "particle_shape" => Value::Int(2),
        "max_level" => Value::Int(0),
        "n_cell_x" | "n_cell_y" | "n_cell_z" => Value::Int(32),
        "blocking_factor_x" | "blocking_factor_y" | "blocking_factor_z" => Value::Int(16),
        "prob_relative_first_value_fft" => Value::Float(PROB_RELATIVE_FIRST_FFT),
        "prob_relative_first_value_multigrid" => Value::Float(PROB_RELATIVE_FIRST_MULTIGRID),
        "mlmg_relative_tolerance" => Value::Float(1.0e-7),
        "mlmg_absolute_tolerance" => Value::Int(0),
        "mlmg_verbosity" => Value::Int(1),
        "mlmg_max_iters" => Value::Int(100),
        "csr_bins" => Value::Int(150),
        _ => {
            let base = base_name(name);
            if base == name {
                return None;
            }
            return default_value(base);
        }
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_name_fallback() {
        assert_eq!(step("beta_x"), 0.1);
        assert_eq!(step("emitt_t"), 1e-7);
        assert_eq!(unit("beta_y"), Some("m"));
        assert_eq!(default_value("n_cell_z"), Some(Value::Int(32)));
        assert_eq!(default_value("blocking_factor_x"), Some(Value::Int(16)));
    }

    #[test]
    fn test_full_name_wins_over_base() {
        assert_eq!(step("mass_MeV"), 0.1);
        assert_eq!(unit("mlmg_absolute_tolerance"), Some("V/m"));
        assert_eq!(unit("mlmg_max_iters"), None);
    }

    #[test]
    fn test_unlisted_parameters() {
        assert_eq!(step("ds"), DEFAULT_STEP);
        assert_eq!(unit("ds"), None);
        assert_eq!(default_value("ds"), None);
    }
}
