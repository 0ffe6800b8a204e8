//! Reads a previously exported configuration listing back into events.
//!
//! The listing is a sequence of `name = literal` statements. Brackets may
//! span lines, `#` starts a comment, and two statements are special:
//! `distribution = Type(k=v, ...)` and `lattice = [Type(k=v, ...), ...]`.
//! The distribution's arguments are read in the form named by
//! `distribution_type`, quadratic when the listing does not say.
//! Parsing produces events only; validation happens when the events are
//! applied to a session.
use crate::catalog::{BuiltinCatalog, TWISS_SIGNATURE};
use crate::distribution::DistributionInputType;
use crate::error::{EngineError, ImportError};
use crate::inputs::{InputField, KinEnergyUnit};
use crate::schema::{derive_schemas, parenthesized, parse_signature, split_top_level, unquote, SchemaTable};
use crate::session::Event;
use crate::space_charge::{Axis, GridField, PoissonSolver};
use log::trace;

/// Events recovered from a listing, already in dependency order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Script {
    inputs: Vec<Event>,
    space_charge: Vec<Event>,
    grid: Vec<Event>,
    prob_relative: Vec<String>,
    csr: Vec<Event>,
    distribution: Vec<Event>,
    lattice: Vec<Event>,
}

impl Script {
    /// Orders the events so that every dependency is applied first: the
    /// solver and level before `prob_relative`, the distribution choice
    /// before its parameters, each element before its parameters.
    pub fn into_events(self) -> Vec<Event> {
        let prob_relative = self
            .prob_relative
            .into_iter()
            .enumerate()
            .map(|(index, raw)| Event::SetProbRelative { index, raw });
        self.inputs
            .into_iter()
            .chain(self.space_charge)
            .chain(self.grid)
            .chain(prob_relative)
            .chain(self.csr)
            .chain(self.distribution)
            .chain(self.lattice)
            .collect()
    }
}

/// A parsed `Type(...)` call; positional arguments carry no keyword yet.
#[derive(Debug, Clone, PartialEq)]
struct Call {
    text: String,
    type_name: String,
    arguments: Vec<(Option<String>, String)>,
}

impl Call {
    /// Names positional arguments after `order`, the constructor's parameter list.
    fn resolve(self, order: &[&str]) -> Result<(String, Vec<(String, String)>), ImportError> {
        let mut arguments = Vec::with_capacity(self.arguments.len());
        for (position, (keyword, raw)) in self.arguments.into_iter().enumerate() {
            let name = match keyword {
                Some(name) => name,
                None => order
                    .get(position)
                    .map(|name| name.to_string())
                    .ok_or_else(|| ImportError::MalformedCall(self.text.clone()))?,
            };
            arguments.push((name, raw));
        }
        Ok((self.type_name, arguments))
    }
}

fn parameter_order<'a>(schemas: &'a SchemaTable, type_name: &str) -> Vec<&'a str> {
    schemas
        .get(type_name)
        .map(|specs| specs.iter().map(|s| s.name.as_str()).collect())
        .unwrap_or_default()
}

pub fn parse_script(text: &str) -> Result<Script, ImportError> {
    let elements = derive_schemas(&BuiltinCatalog::Elements);
    let distributions = derive_schemas(&BuiltinCatalog::Distributions);
    let twiss = parse_signature(TWISS_SIGNATURE).unwrap_or_default();
    let mut script = Script::default();
    let mut distribution: Option<Call> = None;
    let mut distribution_type: Option<DistributionInputType> = None;
    let mut space_charge = SpaceChargeStatements::default();
    let mut element_count = 0;

    for (line, statement) in statements(text)? {
        let (name, rhs) = statement
            .split_once('=')
            .ok_or(ImportError::MissingAssignment { line })?;
        let (name, rhs) = (name.trim(), rhs.trim());
        trace!("line {}: {} = {}", line, name, rhs);

        match name {
            "distribution" => distribution = Some(parse_call(rhs)?),
            "distribution_type" => distribution_type = Some(unquote(rhs).parse::<DistributionInputType>()?),
            "lattice" => {
                for item in parse_list(rhs)? {
                    let call = parse_call(item)?;
                    let order = parameter_order(&elements, &call.type_name);
                    let (type_name, arguments) = call.resolve(&order)?;
                    script.lattice.push(Event::AddElement(type_name));
                    script.lattice.extend(arguments.into_iter().map(|(name, raw)| {
                        Event::SetElementParameter { index: element_count, name, raw }
                    }));
                    element_count += 1;
                }
            }
            "kin_energy_unit" => {
                let unit = unquote(rhs).parse::<KinEnergyUnit>()?;
                script.inputs.push(Event::SetKinEnergyUnit(unit));
            }
            "kin_energy_MeV" => {
                script.inputs.push(Event::SetKinEnergyUnit(KinEnergyUnit::MegaElectronVolt));
                script.inputs.push(Event::SetInput { field: InputField::KinEnergy, raw: literal(rhs) });
            }
            "space_charge" => space_charge.enabled = Some(parse_bool(rhs)?),
            "dynamic_size" => {}
            "poisson_solver" => space_charge.solver = Some(unquote(rhs).parse::<PoissonSolver>()?),
            "max_level" => space_charge.max_level = Some(parse_number("max level", rhs)?),
            "particle_shape" => space_charge.particle_shape = Some(parse_number("particle shape", rhs)?),
            "n_cell" | "blocking_factor" => {
                let field = if name == "n_cell" { GridField::NCell } else { GridField::BlockingFactor };
                let values = parse_list(rhs)?;
                if values.len() != Axis::ALL.len() {
                    return Err(ImportError::MalformedList(rhs.to_string()));
                }
                for (axis, raw) in Axis::ALL.into_iter().zip(values) {
                    script.grid.push(Event::SetGrid { axis, field, raw: literal(raw) });
                }
            }
            "prob_relative" => script.prob_relative = parse_list(rhs)?.into_iter().map(literal).collect(),
            "csr" => script.csr.push(Event::SetCsr(parse_bool(rhs)?)),
            other => {
                if let Some((field, axis)) = GridField::parse_key(other) {
                    script.grid.push(Event::SetGrid { axis, field, raw: literal(rhs) });
                } else {
                    let field = other.parse::<InputField>()?;
                    script.inputs.push(Event::SetInput { field, raw: literal(rhs) });
                }
            }
        }
    }

    match distribution {
        Some(call) => {
            let input_type = distribution_type.unwrap_or(DistributionInputType::Quadratic);
            let order = match input_type {
                DistributionInputType::Twiss => twiss.iter().map(|s| s.name.as_str()).collect(),
                DistributionInputType::Quadratic => parameter_order(&distributions, &call.type_name),
            };
            let (type_name, arguments) = call.resolve(&order)?;
            script.distribution.push(Event::SelectDistribution(type_name));
            script.distribution.push(Event::SetDistributionType(input_type));
            script.distribution.extend(
                arguments
                    .into_iter()
                    .map(|(name, raw)| Event::SetDistributionParameter { name, raw }),
            );
        }
        None => script.distribution.extend(distribution_type.map(Event::SetDistributionType)),
    }

    script.space_charge = space_charge.into_events(script.prob_relative.len());
    Ok(script)
}

#[derive(Debug, Default)]
struct SpaceChargeStatements {
    enabled: Option<bool>,
    solver: Option<PoissonSolver>,
    max_level: Option<usize>,
    particle_shape: Option<u8>,
}

impl SpaceChargeStatements {
    fn into_events(self, prob_relative_len: usize) -> Vec<Event> {
        // Without an explicit level, the listed prob_relative entries decide it.
        let max_level = self.max_level.or_else(|| prob_relative_len.checked_sub(1));
        let mut events = Vec::new();
        events.extend(self.enabled.map(Event::SetSpaceCharge));
        events.extend(self.solver.map(Event::SetPoissonSolver));
        events.extend(max_level.map(Event::SetMaxLevel));
        events.extend(self.particle_shape.map(Event::SetParticleShape));
        events
    }
}

/// Splits the listing into `(first line number, statement)` pairs.
fn statements(text: &str) -> Result<Vec<(usize, String)>, ImportError> {
    let mut out = Vec::new();
    let mut buffer = String::new();
    let mut start = 0;
    let mut depth = 0i32;

    for (index, raw_line) in text.lines().enumerate() {
        let line = strip_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }
        if buffer.is_empty() {
            start = index + 1;
        } else {
            buffer.push(' ');
        }
        buffer.push_str(line);
        for ch in line.chars() {
            match ch {
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth -= 1,
                _ => {}
            }
        }
        if depth < 0 {
            return Err(ImportError::Unbalanced { line: index + 1 });
        }
        if depth == 0 {
            out.push((start, std::mem::take(&mut buffer)));
        }
    }

    if depth != 0 {
        return Err(ImportError::Unbalanced { line: start });
    }
    Ok(out)
}

fn strip_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    for (i, ch) in line.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (None, '\'' | '"') => quote = Some(ch),
            (None, '#') => return &line[..i],
            _ => {}
        }
    }
    line
}

fn literal(text: &str) -> String {
    unquote(text.trim()).to_string()
}

fn parse_bool(text: &str) -> Result<bool, ImportError> {
    match text.trim() {
        "True" | "true" => Ok(true),
        "False" | "false" => Ok(false),
        other => Err(EngineError::InvalidChoice { what: "boolean", value: other.to_string() }.into()),
    }
}

fn parse_number<T: std::str::FromStr>(what: &'static str, text: &str) -> Result<T, ImportError> {
    text.trim()
        .parse::<T>()
        .map_err(|_| EngineError::InvalidChoice { what, value: text.to_string() }.into())
}

fn parse_list(text: &str) -> Result<Vec<&str>, ImportError> {
    let inner = text
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| ImportError::MalformedList(text.to_string()))?;
    Ok(split_top_level(inner).into_iter().map(str::trim).filter(|s| !s.is_empty()).collect())
}

fn parse_call(text: &str) -> Result<Call, ImportError> {
    let malformed = || ImportError::MalformedCall(text.to_string());
    let text = text.trim();
    let open = text.find('(').ok_or_else(malformed)?;
    if !text.ends_with(')') {
        return Err(malformed());
    }
    let qualified = text[..open].trim();
    let type_name = qualified.rsplit('.').next().unwrap_or(qualified).to_string();
    let inner = parenthesized(text).ok_or_else(malformed)?;

    let arguments = split_top_level(inner)
        .into_iter()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(|argument| {
            let keyword = argument
                .split_once('=')
                .filter(|(name, _)| !name.contains(['\'', '"', '(', '[']));
            match keyword {
                Some((name, value)) => (Some(name.trim().to_string()), literal(value)),
                None => (None, literal(argument)),
            }
        })
        .collect();
    Ok(Call { text: text.to_string(), type_name, arguments })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_assignments() {
        let script = parse_script("charge_qe = -1\nmass_MeV = 0.510998  # electron\n").unwrap();
        assert_eq!(
            script.into_events(),
            vec![
                Event::SetInput { field: InputField::ChargeQe, raw: "-1".into() },
                Event::SetInput { field: InputField::MassMev, raw: "0.510998".into() },
            ]
        );
    }

    #[test]
    fn test_multiline_lattice() {
        let text = "lattice = [\n    elements.Drift(ds=0.25, nslice=25),\n    elements.Quad(1.0, -2.5),\n]\n";
        let events = parse_script(text).unwrap().into_events();
        assert_eq!(events[0], Event::AddElement("Drift".into()));
        assert_eq!(events[2], Event::SetElementParameter { index: 0, name: "nslice".into(), raw: "25".into() });
        assert_eq!(events[3], Event::AddElement("Quad".into()));
        assert_eq!(events[5], Event::SetElementParameter { index: 1, name: "k".into(), raw: "-2.5".into() });
    }

    #[test]
    fn test_prob_relative_follows_level_and_solver() {
        let text = "prob_relative = [3.5, 2.0]\npoisson_solver = 'multigrid'\nspace_charge = True\n";
        let events = parse_script(text).unwrap().into_events();
        assert_eq!(
            events,
            vec![
                Event::SetSpaceCharge(true),
                Event::SetPoissonSolver(PoissonSolver::Multigrid),
                Event::SetMaxLevel(1),
                Event::SetProbRelative { index: 0, raw: "3.5".into() },
                Event::SetProbRelative { index: 1, raw: "2.0".into() },
            ]
        );
    }

    #[test]
    fn test_string_arguments_keep_equals_signs() {
        let text = "lattice = [BeamMonitor(name='a=b', backend='h5')]";
        let events = parse_script(text).unwrap().into_events();
        assert_eq!(events[1], Event::SetElementParameter { index: 0, name: "name".into(), raw: "a=b".into() });
    }

    #[test]
    fn test_distribution_type_names_the_argument_form() {
        let text = "distribution = distribution.Gaussian(2.0, 2.0)\ndistribution_type = 'twiss'\n";
        let events = parse_script(text).unwrap().into_events();
        assert_eq!(
            events,
            vec![
                Event::SelectDistribution("Gaussian".into()),
                Event::SetDistributionType(DistributionInputType::Twiss),
                Event::SetDistributionParameter { name: "beta_x".into(), raw: "2.0".into() },
                Event::SetDistributionParameter { name: "beta_y".into(), raw: "2.0".into() },
            ]
        );

        let events = parse_script("distribution = Gaussian(1.0)").unwrap().into_events();
        assert_eq!(events[1], Event::SetDistributionType(DistributionInputType::Quadratic));
        assert_eq!(events[2], Event::SetDistributionParameter { name: "lambdaX".into(), raw: "1.0".into() });
    }

    #[test]
    fn test_failures() {
        assert!(matches!(parse_script("npart 1000"), Err(ImportError::MissingAssignment { line: 1 })));
        assert!(matches!(parse_script("lattice = [Drift(ds=1.0)"), Err(ImportError::Unbalanced { .. })));
        assert!(matches!(parse_script("warp_factor = 9"), Err(ImportError::Engine(EngineError::UnknownField(_)))));
        assert!(parse_script("n_cell = [32, 32]").is_err());
        assert!(parse_script("lattice = [Drift(1.0, 0, 0, 0, 1, None, 7, 8)]").is_err());
    }
}
