use anyhow::Result;
use beamline_common::{SimulationBackend, SimulationOutput, SimulationRequest};
use log::{debug, info};

/// Backend that only echoes the run it was asked to perform.
///
/// Used when no tracking code is linked in; the output lines describe the
/// request in the order a tracking run would consume it.
#[derive(Debug, Default)]
pub struct DryRunBackend {
    pub runs: usize,
}

impl SimulationBackend for DryRunBackend {
    fn run(&mut self, request: &SimulationRequest) -> Result<SimulationOutput> {
        self.runs += 1;
        debug!("Dry run request: {:#?}", request);

        let mut lines = vec![
            format!("npart = {}", request.npart),
            format!("kin_energy_MeV = {}", request.kin_energy_mev),
            format!("bunch_charge_C = {:e}", request.bunch_charge_c),
            format!("reference particle: charge {} qe, mass {} MeV", request.charge_qe, request.mass_mev),
            format!("particle_shape = {}", request.particle_shape),
            format!("distribution = {}", request.distribution),
        ];
        match &request.space_charge {
            Some(sc) => {
                lines.push(format!(
                    "space charge: {} solver, max_level {}, n_cell {:?}, blocking_factor {:?}, prob_relative {:?}",
                    sc.poisson_solver, sc.max_level, sc.n_cell, sc.blocking_factor, sc.prob_relative
                ));
                if let Some(mlmg) = &sc.mlmg {
                    lines.push(format!(
                        "mlmg: rtol {:e}, atol {:e}, max_iters {}, verbosity {}",
                        mlmg.relative_tolerance, mlmg.absolute_tolerance, mlmg.max_iters, mlmg.verbosity
                    ));
                }
            }
            None => lines.push("space charge: off".to_string()),
        }
        match request.csr_bins {
            Some(bins) => lines.push(format!("csr: {} bins", bins)),
            None => lines.push("csr: off".to_string()),
        }
        lines.extend(request.lattice.iter().enumerate().map(|(i, call)| format!("lattice[{}] = {}", i, call)));

        info!("Dry run {} complete ({} lattice elements)", self.runs, request.lattice.len());
        Ok(SimulationOutput { lines })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beamline_common::{run_simulation, DistributionInputType, Event, Session};

    #[test]
    fn test_dry_run_lists_lattice_in_order() {
        let mut session = Session::new();
        session
            .apply_all([
                Event::SelectDistribution("Empty".into()),
                Event::SetDistributionType(DistributionInputType::Quadratic),
                Event::AddElement("Drift".into()),
                Event::SetElementParameter { index: 0, name: "ds".into(), raw: "0.5".into() },
                Event::AddElement("BeamMonitor".into()),
                Event::SetElementParameter { index: 1, name: "name".into(), raw: "end".into() },
            ])
            .unwrap();

        let mut backend = DryRunBackend::default();
        let output = run_simulation(&session, &mut backend).unwrap();
        assert_eq!(backend.runs, 1);
        assert!(output.lines.contains(&"distribution = Empty()".to_string()));
        assert!(output.lines.contains(&"space charge: off".to_string()));
        assert_eq!(
            output.lines.last().map(String::as_str),
            Some("lattice[1] = BeamMonitor(name='end', backend='default', encoding='g')")
        );
    }
}
