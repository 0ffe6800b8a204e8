//! Versioned constructor signatures of the external simulation library.
//!
//! The table mirrors the constructor signatures the library's Python
//! bindings publish, so schemas can be derived without loading the library.
use crate::schema::ConstructorCatalog;

/// Version of the simulation library interface these signatures describe.
pub const SCHEMA_VERSION: &str = "24.10";

const TAIL: &str = "dx: float = 0, dy: float = 0, rotation: float = 0";

const ELEMENTS: &[(&str, &str)] = &[
    ("Aperture", "xmax: float, ymax: float, shape: str = 'rectangular', {tail}, name: Optional[str] = None"),
    ("BeamMonitor", "name: str, backend: str = 'default', encoding: str = 'g'"),
    ("Buncher", "V: float, k: float, {tail}, name: Optional[str] = None"),
    ("CFbend", "ds: float, rc: float, k: float, {tail}, nslice: int = 1, name: Optional[str] = None"),
    ("ChrDrift", "ds: float, {tail}, nslice: int = 1, name: Optional[str] = None"),
    ("ChrQuad", "ds: float, k: float, unit: int = 0, {tail}, nslice: int = 1, name: Optional[str] = None"),
    ("ConstF", "ds: float, kx: float, ky: float, kt: float, {tail}, nslice: int = 1, name: Optional[str] = None"),
    ("DipEdge", "psi: float, rc: float, g: float, K2: float = 0, {tail}, name: Optional[str] = None"),
    ("Drift", "ds: float, {tail}, nslice: int = 1, name: Optional[str] = None"),
    ("ExactDrift", "ds: float, {tail}, nslice: int = 1, name: Optional[str] = None"),
    ("ExactSbend", "ds: float, phi: float, B: float = 0.0, {tail}, nslice: int = 1, name: Optional[str] = None"),
    ("Kicker", "xkick: float, ykick: float, unit: str = 'dimensionless', {tail}, name: Optional[str] = None"),
    ("Multipole", "multipole: int, K_normal: float, K_skew: float, {tail}, name: Optional[str] = None"),
    ("NonlinearLens", "knll: float, cnll: float, {tail}, name: Optional[str] = None"),
    ("PRot", "phi_in: float, phi_out: float, name: Optional[str] = None"),
    ("Quad", "ds: float, k: float, {tail}, nslice: int = 1, name: Optional[str] = None"),
    ("Sbend", "ds: float, rc: float, {tail}, nslice: int = 1, name: Optional[str] = None"),
    ("ShortRF", "V: float, freq: float, phase: float = -90.0, {tail}, name: Optional[str] = None"),
    ("Sol", "ds: float, ks: float, {tail}, nslice: int = 1, name: Optional[str] = None"),
    ("ThinDipole", "theta: float, rc: float, {tail}, name: Optional[str] = None"),
];

const QUADRATIC: &str = "lambdaX: float, lambdaY: float, lambdaT: float, lambdaPx: float, lambdaPy: float, lambdaPt: float, muxpx: float = 0.0, muypy: float = 0.0, mutpt: float = 0.0";

const DISTRIBUTIONS: &[(&str, &str)] = &[
    ("Empty", ""),
    ("Gaussian", QUADRATIC),
    ("KVdist", QUADRATIC),
    ("Kurth4D", QUADRATIC),
    ("Kurth6D", QUADRATIC),
    ("Semigaussian", QUADRATIC),
    ("Thermal", "k: float, kT: float, kT_halo: float, normalize: float, normalize_halo: float, halo: float = 0.0"),
    ("Triangle", QUADRATIC),
    ("Waterbag", QUADRATIC),
];

/// Signature of the helper that turns Twiss parameters into quadratic-form parameters.
pub const TWISS_SIGNATURE: &str = "twiss(beta_x: float, beta_y: float, beta_t: float, emitt_x: float, emitt_y: float, emitt_t: float, alpha_x: float = 0.0, alpha_y: float = 0.0, alpha_t: float = 0.0)";

/// The two constructor families the dashboard builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinCatalog {
    Elements,
    Distributions,
}

impl BuiltinCatalog {
    fn module(self) -> &'static str {
        match self {
            BuiltinCatalog::Elements => "elements",
            BuiltinCatalog::Distributions => "distribution",
        }
    }

    fn entries(self) -> &'static [(&'static str, &'static str)] {
        match self {
            BuiltinCatalog::Elements => ELEMENTS,
            BuiltinCatalog::Distributions => DISTRIBUTIONS,
        }
    }
}

impl ConstructorCatalog for BuiltinCatalog {
    fn constructors(&self) -> Vec<(String, Option<String>)> {
        self.entries()
            .iter()
            .map(|(name, params)| {
                let params = params.replace("{tail}", TAIL);
                let separator = if params.is_empty() { "" } else { ", " };
                let signature = format!(
                    "__init__(self: {}.{}{}{}) -> None",
                    self.module(),
                    name,
                    separator,
                    params
                );
                (name.to_string(), Some(signature))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::derive_schemas;
    use crate::value::{DeclaredType, Value};

    #[test]
    fn test_element_tail_is_expanded() {
        let table = derive_schemas(&BuiltinCatalog::Elements);
        let quad: Vec<&str> = table["Quad"].iter().map(|s| s.name.as_str()).collect();
        assert_eq!(quad, ["ds", "k", "dx", "dy", "rotation", "nslice", "name"]);
        assert_eq!(table["Aperture"][2].default, Some(Value::Str("rectangular".into())));
    }

    #[test]
    fn test_distribution_schemas() {
        let table = derive_schemas(&BuiltinCatalog::Distributions);
        assert!(table["Empty"].is_empty());
        assert_eq!(table["Waterbag"].len(), 9);
        assert!(table["Thermal"].iter().all(|s| s.declared_type == DeclaredType::Float));
    }
}
