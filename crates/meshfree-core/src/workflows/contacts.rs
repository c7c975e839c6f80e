use crate::core::expr::node::Expression;
use crate::core::models::ids::ParticleSystemId;
use crate::core::models::workspace::Workspace;
use crate::engine::config::ContactConfig;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::tasks::contacts::{self, ContactReport};
use tracing::{info, instrument};

#[derive(Debug, Clone, PartialEq)]
pub struct ContactResult {
    pub report: ContactReport,
    /// `permutation[new] = old` applied by the spatial sort, when one ran.
    pub permutation: Option<Vec<usize>>,
}

/// Optionally reorders `system` along the hash grid, then refreshes its contacts.
///
/// Reordering moves particles that share a cell next to each other in
/// memory. Every field and pair list attached to the system, including an
/// existing contact list, follows the new order.
#[instrument(skip_all, name = "contact_refresh_workflow")]
pub fn run(
    workspace: &mut Workspace,
    system: ParticleSystemId,
    diameter: &Expression,
    config: &ContactConfig,
    reorder: bool,
    reporter: &ProgressReporter,
) -> Result<ContactResult, EngineError> {
    let permutation = if reorder {
        reporter.report(Progress::PhaseStart {
            name: "Spatial Sort",
        });
        let permutation = workspace.sort_particles(system)?;
        info!(particles = permutation.len(), "Particles reordered along the grid.");
        reporter.report(Progress::PhaseFinish);
        Some(permutation)
    } else {
        None
    };

    reporter.report(Progress::PhaseStart {
        name: "Contact Refresh",
    });
    let report = contacts::run(workspace, system, diameter, config, reporter)?;
    reporter.report(Progress::PhaseFinish);

    Ok(ContactResult {
        report,
        permutation,
    })
}
