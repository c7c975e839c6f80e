use crate::core::models::ids::ParticleSystemId;
use crate::core::models::workspace::Workspace;
use crate::engine::config::{NeighborConfig, SolverConfig};
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::solver::Solver;
use crate::engine::tasks::neighbors::{self, NeighborCensus};
use tracing::{info, instrument};

/// Runs a neighbor census of `system` on a fresh solver.
#[instrument(skip_all, name = "neighbor_census_workflow")]
pub fn run(
    workspace: &mut Workspace,
    system: ParticleSystemId,
    solver_config: &SolverConfig,
    config: &NeighborConfig,
    reporter: &ProgressReporter,
) -> Result<NeighborCensus, EngineError> {
    reporter.report(Progress::PhaseStart { name: "Setup" });
    let solver = Solver::new(solver_config.clone())?;
    let particles = workspace.system(system)?.len();
    info!(particles, threads = solver.num_threads(), "Starting neighbor census.");
    reporter.report(Progress::PhaseFinish);

    reporter.report(Progress::PhaseStart {
        name: "Neighbor Census",
    });
    let census = neighbors::run(workspace, &solver, system, config, reporter)?;
    reporter.report(Progress::PhaseFinish);

    Ok(census)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::domain::{Boundary, Domain};
    use crate::engine::config::SolverConfigBuilder;
    use nalgebra::Point3;
    use std::sync::Mutex;

    #[test]
    fn workflow_reports_both_phases() {
        let mut workspace = Workspace::new();
        let domain = Domain::new(
            &[0.0, 0.0],
            &[4.0, 4.0],
            &[1.0],
            &[Boundary::Periodic, Boundary::Open],
        )
        .unwrap();
        let positions = (0..16)
            .map(|k| Point3::new((k % 4) as f64 + 0.5, (k / 4) as f64 + 0.5, 0.0))
            .collect();
        let system = workspace
            .add_particle_system("grid", domain, positions)
            .unwrap();

        let phases = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            if let Progress::PhaseStart { name } = event {
                phases.lock().unwrap().push(name);
            }
        }));
        let census = run(
            &mut workspace,
            system,
            &SolverConfigBuilder::new().num_threads(2).build().unwrap(),
            &NeighborConfig::new(1.01, true).unwrap(),
            &reporter,
        )
        .unwrap();
        drop(reporter);

        assert_eq!(phases.into_inner().unwrap(), vec!["Setup", "Neighbor Census"]);
        // Periodic in x, open in y: edge rows have three neighbors, inner rows four.
        assert_eq!(census.counts[0], 3);
        assert_eq!(census.counts[5], 4);
        assert_eq!(census.total(), 2 * 4 * 3 + 2 * 4 * 4);
    }
}
