use crate::core::expr::node::Expression;
use crate::core::math::tensor::Tensor;
use crate::core::models::ids::{FieldId, ParticleSystemId};
use crate::core::models::particles::ParticleSystem;
use crate::core::models::workspace::{Symbol, Workspace, WorkspaceError};
use crate::engine::config::NeighborConfig;
use crate::engine::equation::{Equation, Target};
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::solver::Solver;
use tracing::{info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Per-particle neighbor counts of one system.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborCensus {
    /// The workspace field the counts were written to.
    pub field: FieldId,
    pub counts: Vec<usize>,
}

impl NeighborCensus {
    pub fn min(&self) -> usize {
        self.counts.iter().copied().min().unwrap_or(0)
    }

    pub fn max(&self) -> usize {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    pub fn mean(&self) -> f64 {
        if self.counts.is_empty() {
            0.0
        } else {
            self.total() as f64 / self.counts.len() as f64
        }
    }
}

/// Counts, for every particle of `system`, the other particles closer than the configured radius.
///
/// The counts are computed by a `neighbor_count` interaction solved into the
/// field `<system>.neighbor_count`, so they exercise the full grid query path.
/// The field is created on the first census and overwritten by later ones.
/// With `config.verify` set they are compared against an all-pairs scan.
///
/// # Errors
///
/// Returns [`EngineError::VerificationFailed`] for the first particle whose
/// grid count disagrees with the all-pairs count, and
/// [`WorkspaceError::DuplicateSymbol`] if the census name is bound to
/// something other than a field of `system`.
#[instrument(skip_all, name = "neighbor_census_task")]
pub fn run(
    workspace: &mut Workspace,
    solver: &Solver,
    system: ParticleSystemId,
    config: &NeighborConfig,
    reporter: &ProgressReporter,
) -> Result<NeighborCensus, EngineError> {
    info!(radius = config.radius, "Counting neighbors.");
    reporter.report(Progress::Message("Counting neighbors...".to_string()));

    workspace.update_space(system)?;
    let field = census_field(workspace, system)?;
    let mut count = Expression::interaction(
        "neighbor_count",
        vec![Expression::named_constant("radius", config.radius)],
    )?;
    count.assign(system);
    let equation = Equation::new("neighbor_census", Target::Field(field), count);
    solver.solve(workspace, &equation)?;

    let counts = workspace
        .field(field)?
        .values()
        .iter()
        .map(|value| Ok(value.value()? as usize))
        .collect::<Result<Vec<_>, EngineError>>()?;

    if config.verify {
        let expected = brute_force_counts(workspace.system(system)?, config.radius);
        if let Some((particle, (&grid, &brute_force))) = counts
            .iter()
            .zip(&expected)
            .enumerate()
            .find(|(_, (grid, brute))| grid != brute)
        {
            warn!(particle, grid, brute_force, "Grid and all-pairs counts disagree.");
            return Err(EngineError::VerificationFailed {
                particle,
                grid,
                brute_force,
            });
        }
        info!("Grid counts match the all-pairs scan.");
    }

    let census = NeighborCensus { field, counts };
    info!(
        particles = census.counts.len(),
        min = census.min(),
        max = census.max(),
        mean = census.mean(),
        "Neighbor census complete."
    );
    Ok(census)
}

fn census_field(
    workspace: &mut Workspace,
    system: ParticleSystemId,
) -> Result<FieldId, WorkspaceError> {
    let name = format!("{}.neighbor_count", workspace.system(system)?.name());
    match workspace.lookup(&name) {
        Ok(Symbol::Field(id)) if workspace.field_owner(id)? == system => Ok(id),
        Ok(_) => Err(WorkspaceError::DuplicateSymbol(name)),
        Err(WorkspaceError::UndefinedSymbol(_)) => {
            workspace.add_field(&name, system, Tensor::scalar(0.0))
        }
        Err(err) => Err(err),
    }
}

/// All-pairs neighbor counts under the minimum-image convention.
///
/// Matches the grid as long as `radius` is at most half the length of every
/// periodic axis; mirror images are not counted.
pub fn brute_force_counts(system: &ParticleSystem, radius: f64) -> Vec<usize> {
    let positions = system.positions();
    let domain = system.domain();
    let count = |i: usize| {
        positions
            .iter()
            .enumerate()
            .filter(|&(j, xj)| j != i && domain.displacement(&positions[i], xj).norm() < radius)
            .count()
    };

    #[cfg(feature = "parallel")]
    let counts = (0..positions.len()).into_par_iter().map(count).collect();
    #[cfg(not(feature = "parallel"))]
    let counts = (0..positions.len()).map(count).collect();
    counts
}
