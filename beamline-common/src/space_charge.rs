//! Space-charge settings and their cross-field reconciliation.
//!
//! Two dependent groups live here. Each grid axis pairs an `n_cell` with a
//! `blocking_factor` that must divide it. The `prob_relative` sequence has
//! one entry per mesh-refinement level and must decrease strictly, with a
//! lower bound on the first entry that depends on the Poisson solver.
use crate::defaults::{self, PROB_RELATIVE_FIRST_FFT, PROB_RELATIVE_FIRST_MULTIGRID};
use crate::error::EngineError;
use crate::record::ParameterRecord;
use crate::validator::Condition;
use crate::value::{format_float, DeclaredType, Value};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const NOT_A_MULTIPLE: &str = "Must be a multiple of blocking factor.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        }
    }
}

/// Which half of a grid axis pair an edit targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridField {
    NCell,
    BlockingFactor,
}

impl GridField {
    pub fn key(self, axis: Axis) -> String {
        match self {
            GridField::NCell => format!("n_cell_{}", axis.suffix()),
            GridField::BlockingFactor => format!("blocking_factor_{}", axis.suffix()),
        }
    }

    /// Inverse of [`GridField::key`].
    pub fn parse_key(key: &str) -> Option<(GridField, Axis)> {
        Axis::ALL.into_iter().find_map(|axis| {
            [GridField::NCell, GridField::BlockingFactor]
                .into_iter()
                .find(|field| field.key(axis) == key)
                .map(|field| (field, axis))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PoissonSolver {
    #[default]
    Fft,
    Multigrid,
}

impl PoissonSolver {
    pub fn name(self) -> &'static str {
        match self {
            PoissonSolver::Fft => "fft",
            PoissonSolver::Multigrid => "multigrid",
        }
    }

    /// Seed for the first `prob_relative` entry of a fresh sequence.
    pub fn first_prob_relative(self) -> f64 {
        match self {
            PoissonSolver::Fft => PROB_RELATIVE_FIRST_FFT,
            PoissonSolver::Multigrid => PROB_RELATIVE_FIRST_MULTIGRID,
        }
    }
}

impl fmt::Display for PoissonSolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PoissonSolver {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "fft" => Ok(PoissonSolver::Fft),
            "multigrid" => Ok(PoissonSolver::Multigrid),
            other => Err(EngineError::InvalidChoice { what: "Poisson solver", value: other.to_string() }),
        }
    }
}

/// `n_cell` and `blocking_factor` of one axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridAxisGroup {
    pub n_cell: ParameterRecord,
    pub blocking_factor: ParameterRecord,
}

impl GridAxisGroup {
    fn new(axis: Axis) -> Self {
        let n_cell_key = GridField::NCell.key(axis);
        let blocking_key = GridField::BlockingFactor.key(axis);
        let mut group = Self {
            n_cell: ParameterRecord::new(
                &n_cell_key,
                DeclaredType::Int,
                &[],
                defaults::default_value(&n_cell_key).unwrap_or_default(),
            ),
            blocking_factor: ParameterRecord::new(
                &blocking_key,
                DeclaredType::Int,
                &[Condition::NonZero, Condition::Positive],
                defaults::default_value(&blocking_key).unwrap_or_default(),
            ),
        };
        group.reconcile();
        group
    }

    pub fn record(&self, field: GridField) -> &ParameterRecord {
        match field {
            GridField::NCell => &self.n_cell,
            GridField::BlockingFactor => &self.blocking_factor,
        }
    }

    fn record_mut(&mut self, field: GridField) -> &mut ParameterRecord {
        match field {
            GridField::NCell => &mut self.n_cell,
            GridField::BlockingFactor => &mut self.blocking_factor,
        }
    }

    /// Revalidates both records and, when both are valid, their divisibility.
    ///
    /// A divisibility failure replaces whatever `n_cell` reported; the
    /// blocking factor never carries it. Running this twice on unchanged
    /// records leaves them unchanged.
    pub fn reconcile(&mut self) {
        self.n_cell.revalidate();
        self.blocking_factor.revalidate();
        if !(self.n_cell.is_valid() && self.blocking_factor.is_valid()) {
            return;
        }
        if let (Some(n_cell), Some(blocking_factor)) = (self.n_cell.value.as_i64(), self.blocking_factor.value.as_i64()) {
            if n_cell % blocking_factor != 0 {
                self.n_cell.errors = vec![NOT_A_MULTIPLE.to_string()];
            }
        }
    }

    pub fn is_valid(&self) -> bool {
        self.n_cell.is_valid() && self.blocking_factor.is_valid()
    }
}

/// One entry of the `prob_relative` sequence as the user sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbRelativeField {
    /// Text as entered.
    pub raw: String,
    pub errors: Vec<String>,
    pub step: f64,
}

/// `prob_relative` values and their per-entry validation state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProbRelative {
    values: Vec<f64>,
    fields: Vec<ProbRelativeField>,
}

impl ProbRelative {
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn fields(&self) -> &[ProbRelativeField] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Sizes the sequence to `len`, preserving existing entries.
    ///
    /// An empty sequence is seeded with the solver threshold followed by
    /// zeros; an existing one is truncated or padded with zeros. Every
    /// entry is revalidated afterwards.
    pub fn resize(&mut self, len: usize, solver: PoissonSolver) {
        if self.values.is_empty() {
            self.values = std::iter::once(solver.first_prob_relative())
                .chain(std::iter::repeat(0.0))
                .take(len)
                .collect();
        } else {
            self.values.resize(len, 0.0);
        }
        let step = defaults::step("prob_relative");
        self.fields = self
            .values
            .iter()
            .map(|value| ProbRelativeField { raw: format_float(*value), errors: Vec::new(), step })
            .collect();
        for index in 0..self.fields.len() {
            self.fields[index].errors = self.check(index, solver);
        }
    }

    /// Applies raw input to entry `index` and revalidates it and its successor.
    ///
    /// Entries further down are deliberately not revalidated.
    pub fn update(&mut self, index: usize, raw: &str, solver: PoissonSolver) -> Result<(), EngineError> {
        if index >= self.values.len() {
            return Err(EngineError::IndexOutOfRange { what: "prob_relative", index, len: self.values.len() });
        }
        self.values[index] = raw.trim().parse::<f64>().unwrap_or(0.0);
        self.fields[index].raw = raw.to_string();
        self.fields[index].errors = self.check(index, solver);
        if index + 1 < self.values.len() {
            self.fields[index + 1].errors = self.check(index + 1, solver);
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.fields.clear();
    }

    fn check(&self, index: usize, solver: PoissonSolver) -> Vec<String> {
        let Ok(value) = self.fields[index].raw.trim().parse::<f64>() else {
            return vec!["Must be a float.".to_string()];
        };
        let message = if index == 0 {
            match solver {
                // Multigrid rejects below 3 only; exactly 3 passes.
                PoissonSolver::Multigrid if value < 3.0 => Some("Must be greater than 3.".to_string()),
                PoissonSolver::Fft if value <= 1.0 => Some("Must be greater than 1.".to_string()),
                _ => None,
            }
        } else {
            let previous = self.values[index - 1];
            if value >= previous {
                Some(format!("Must be less than previous value ({}).", format_float(previous)))
            } else if value <= 1.0 {
                Some("Must be greater than 1.".to_string())
            } else {
                None
            }
        };
        message.into_iter().collect()
    }
}

/// Full space-charge configuration.
#[derive(Debug, Clone)]
pub struct SpaceCharge {
    pub enabled: bool,
    pub dynamic_size: bool,
    pub solver: PoissonSolver,
    pub particle_shape: u8,
    pub max_level: usize,
    pub grid: [GridAxisGroup; 3],
    pub prob_relative: ProbRelative,
}

impl Default for SpaceCharge {
    fn default() -> Self {
        let mut space_charge = Self {
            enabled: false,
            dynamic_size: false,
            solver: PoissonSolver::default(),
            particle_shape: 2,
            max_level: 0,
            grid: Axis::ALL.map(GridAxisGroup::new),
            prob_relative: ProbRelative::default(),
        };
        space_charge.prob_relative.resize(space_charge.max_level + 1, space_charge.solver);
        space_charge
    }
}

impl SpaceCharge {
    /// Toggles the subsystem; dynamic sizing follows it.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.dynamic_size = enabled;
    }

    pub fn set_solver(&mut self, solver: PoissonSolver) {
        self.solver = solver;
        self.prob_relative.resize(self.max_level + 1, solver);
    }

    pub fn set_max_level(&mut self, max_level: usize) -> Result<(), EngineError> {
        if !defaults::MAX_LEVELS.contains(&max_level) {
            return Err(EngineError::InvalidChoice { what: "max level", value: max_level.to_string() });
        }
        self.max_level = max_level;
        self.prob_relative.resize(max_level + 1, self.solver);
        Ok(())
    }

    pub fn set_particle_shape(&mut self, shape: u8) -> Result<(), EngineError> {
        if !defaults::PARTICLE_SHAPES.contains(&shape) {
            return Err(EngineError::InvalidChoice { what: "particle shape", value: shape.to_string() });
        }
        self.particle_shape = shape;
        Ok(())
    }

    pub fn axis(&self, axis: Axis) -> &GridAxisGroup {
        &self.grid[axis.index()]
    }

    /// Applies raw input to one grid record and reconciles that axis.
    pub fn set_grid(&mut self, axis: Axis, field: GridField, raw: &str) {
        let group = &mut self.grid[axis.index()];
        group.record_mut(field).update(raw);
        group.reconcile();
        debug!(
            "grid {}: n_cell {:?} {:?}, blocking_factor {:?} {:?}",
            axis.suffix(),
            group.n_cell.value,
            group.n_cell.errors,
            group.blocking_factor.value,
            group.blocking_factor.errors
        );
    }

    pub fn reconcile_axis(&mut self, axis: Axis) {
        self.grid[axis.index()].reconcile();
    }

    pub fn set_prob_relative(&mut self, index: usize, raw: &str) -> Result<(), EngineError> {
        self.prob_relative.update(index, raw, self.solver)
    }

    /// Grid cell counts per axis; invalid entries read as 0.
    pub fn n_cell(&self) -> [i64; 3] {
        self.grid.each_ref().map(|g| g.n_cell.value.as_i64().unwrap_or(0))
    }

    pub fn blocking_factor(&self) -> [i64; 3] {
        self.grid.each_ref().map(|g| g.blocking_factor.value.as_i64().unwrap_or(0))
    }

    /// Restores defaults and reseeds the `prob_relative` sequence.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Values for display and export, keyed like the session fields.
    pub fn grid_values(&self) -> Vec<(String, Value)> {
        self.grid
            .iter()
            .flat_map(|g| [&g.n_cell, &g.blocking_factor])
            .map(|r| (r.name.clone(), r.value.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn errors(group: &GridAxisGroup) -> (Vec<String>, Vec<String>) {
        (group.n_cell.errors.clone(), group.blocking_factor.errors.clone())
    }

    #[test]
    fn test_defaults_are_consistent() {
        let sc = SpaceCharge::default();
        assert!(sc.grid.iter().all(GridAxisGroup::is_valid));
        assert_eq!(sc.prob_relative.values(), [1.1]);
        assert_eq!(sc.n_cell(), [32, 32, 32]);
    }

    #[test]
    fn test_divisibility_is_reported_on_n_cell() {
        let mut sc = SpaceCharge::default();
        sc.set_grid(Axis::X, GridField::BlockingFactor, "3");
        sc.set_grid(Axis::X, GridField::NCell, "10");
        assert_eq!(errors(sc.axis(Axis::X)), (vec![NOT_A_MULTIPLE.to_string()], vec![]));

        sc.set_grid(Axis::X, GridField::NCell, "12");
        assert_eq!(errors(sc.axis(Axis::X)), (vec![], vec![]));
        assert!(sc.axis(Axis::Y).is_valid());
    }

    #[test]
    fn test_fixing_blocking_factor_clears_n_cell() {
        let mut sc = SpaceCharge::default();
        sc.set_grid(Axis::Z, GridField::NCell, "24");
        assert_eq!(sc.axis(Axis::Z).n_cell.errors, [NOT_A_MULTIPLE]);
        sc.set_grid(Axis::Z, GridField::BlockingFactor, "8");
        assert!(sc.axis(Axis::Z).is_valid());
    }

    #[test]
    fn test_invalid_blocking_factor_skips_divisibility() {
        let mut sc = SpaceCharge::default();
        sc.set_grid(Axis::Y, GridField::NCell, "10");
        sc.set_grid(Axis::Y, GridField::BlockingFactor, "0");
        assert_eq!(errors(sc.axis(Axis::Y)), (vec![], vec!["Must be non-zero.".to_string()]));
        sc.set_grid(Axis::Y, GridField::BlockingFactor, "-2");
        assert_eq!(sc.axis(Axis::Y).blocking_factor.errors, ["Must be positive."]);
        sc.set_grid(Axis::Y, GridField::NCell, "ten");
        assert_eq!(sc.axis(Axis::Y).n_cell.errors, ["Must be an integer"]);
        assert_eq!(sc.axis(Axis::Y).n_cell.value, Value::Str("ten".into()));
    }

    #[test]
    fn test_grid_reconciliation_is_idempotent() {
        let mut sc = SpaceCharge::default();
        sc.set_grid(Axis::X, GridField::NCell, "10");
        sc.set_grid(Axis::X, GridField::BlockingFactor, "3");
        sc.reconcile_axis(Axis::X);
        let first = sc.axis(Axis::X).clone();
        sc.reconcile_axis(Axis::X);
        assert_eq!(sc.axis(Axis::X), &first);
    }

    #[test]
    fn test_grid_key_round_trip() {
        assert_eq!(GridField::parse_key("blocking_factor_z"), Some((GridField::BlockingFactor, Axis::Z)));
        assert_eq!(GridField::parse_key("n_cell_q"), None);
    }

    #[test]
    fn test_prob_relative_seed_and_resize() {
        let mut pr = ProbRelative::default();
        pr.resize(3, PoissonSolver::Fft);
        assert_eq!(pr.values(), [1.1, 0.0, 0.0]);
        pr.resize(2, PoissonSolver::Fft);
        assert_eq!(pr.values(), [1.1, 0.0]);
    }

    #[test]
    fn test_prob_relative_keeps_user_values_across_solver_change() {
        let mut sc = SpaceCharge::default();
        sc.set_max_level(1).unwrap();
        sc.set_prob_relative(1, "1.05").unwrap();
        sc.set_solver(PoissonSolver::Multigrid);
        assert_eq!(sc.prob_relative.values(), [1.1, 1.05]);
        assert_eq!(sc.prob_relative.fields()[0].errors, ["Must be greater than 3."]);
        assert!(sc.prob_relative.fields()[1].errors.is_empty());
    }

    #[test]
    fn test_prob_relative_first_entry_bounds() {
        let mut pr = ProbRelative::default();
        pr.resize(1, PoissonSolver::Multigrid);
        assert_eq!(pr.values(), [3.1]);
        pr.update(0, "3", PoissonSolver::Multigrid).unwrap();
        assert!(pr.fields()[0].errors.is_empty());
        pr.update(0, "2.99", PoissonSolver::Multigrid).unwrap();
        assert_eq!(pr.fields()[0].errors, ["Must be greater than 3."]);
        pr.update(0, "1", PoissonSolver::Fft).unwrap();
        assert_eq!(pr.fields()[0].errors, ["Must be greater than 1."]);
        pr.update(0, "x", PoissonSolver::Fft).unwrap();
        assert_eq!(pr.fields()[0].errors, ["Must be a float."]);
        assert_eq!(pr.values(), [0.0]);
    }

    #[test]
    fn test_prob_relative_revalidates_one_hop_only() {
        let mut pr = ProbRelative::default();
        pr.resize(3, PoissonSolver::Fft);
        pr.update(0, "4", PoissonSolver::Fft).unwrap();
        pr.update(1, "3", PoissonSolver::Fft).unwrap();
        pr.update(2, "2", PoissonSolver::Fft).unwrap();
        assert!(pr.fields().iter().all(|f| f.errors.is_empty()));

        pr.update(0, "1.5", PoissonSolver::Fft).unwrap();
        assert!(pr.fields()[0].errors.is_empty());
        assert_eq!(pr.fields()[1].errors, ["Must be less than previous value (1.5)."]);
        // entry 2 is two hops away and keeps its stale state
        assert!(pr.fields()[2].errors.is_empty());
    }

    #[test]
    fn test_prob_relative_out_of_range() {
        let mut pr = ProbRelative::default();
        pr.resize(1, PoissonSolver::Fft);
        assert!(matches!(pr.update(1, "2", PoissonSolver::Fft), Err(EngineError::IndexOutOfRange { .. })));
    }

    #[test]
    fn test_invalid_choices() {
        let mut sc = SpaceCharge::default();
        assert!(sc.set_max_level(5).is_err());
        assert!(sc.set_particle_shape(0).is_err());
        assert!("spectral".parse::<PoissonSolver>().is_err());
        sc.set_enabled(true);
        assert!(sc.dynamic_size);
    }
}
