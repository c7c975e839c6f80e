use crate::core::expr::interaction::REST_LENGTH_PAYLOAD;
use crate::core::expr::node::Expression;
use crate::core::models::field::TimeLevel;
use crate::core::models::ids::{PairListId, ParticleSystemId};
use crate::core::models::workspace::{Symbol, Workspace, WorkspaceError};
use crate::core::pairs::hysteron::Transition;
use crate::core::pairs::list::{LongRangePairs, PairsError};
use crate::core::space::grid::SpaceError;
use crate::engine::config::ContactConfig;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// What one contact refresh changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContactReport {
    /// Pair list holding the contacts.
    pub pairs: Option<PairListId>,
    /// New pairs created for overlapping neighbors.
    pub formed: usize,
    /// Hysterons that switched to engaged this pass.
    pub engaged: usize,
    /// Hysterons that switched to disengaged this pass.
    pub disengaged: usize,
    /// Disengaged pairs removed because their particles no longer overlap.
    pub removed: usize,
    /// Pairs left after the pass.
    pub active: usize,
}

impl ContactReport {
    fn record(&mut self, transition: Transition) {
        match transition {
            Transition::Engaged => self.engaged += 1,
            Transition::Disengaged => self.disengaged += 1,
            Transition::None => {}
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    i: usize,
    j: usize,
    distance: f64,
    penetration: f64,
}

/// Forms, updates and retires contact pairs for `system`.
///
/// Penetration of a pair is `(d_i + d_j) / 2 - |x_i - x_j|` with `d` the
/// per-particle `diameter`. Grid neighbors with positive penetration that
/// are not yet paired get a new pair whose rest length is their current
/// distance. Every pair's hysteron is then fed its penetration, and pairs
/// that are disengaged with negative penetration are deleted.
///
/// The contact list named by `config.pairs_name` is created on first use.
///
/// # Arguments
///
/// * `workspace` - Holds the particle system and receives the pair list.
/// * `system` - The particles in contact.
/// * `diameter` - Per-particle (or uniform) contact diameter.
/// * `config` - Hysteresis thresholds and the pair list name.
/// * `reporter` - Progress sink.
#[instrument(skip_all, name = "contact_refresh_task")]
pub fn run(
    workspace: &mut Workspace,
    system: ParticleSystemId,
    diameter: &Expression,
    config: &ContactConfig,
    reporter: &ProgressReporter,
) -> Result<ContactReport, EngineError> {
    reporter.report(Progress::Message("Refreshing contacts...".to_string()));
    let pairs_id = contact_list(workspace, system, config)?;

    workspace.update_space(system)?;
    let particles = workspace.system(system)?;
    let len = particles.len();

    let diameters = (0..len)
        .map(|i| Ok(diameter.evaluate(workspace, i, TimeLevel::Current)?.value()?))
        .collect::<Result<Vec<f64>, EngineError>>()?;
    let search_radius = diameters.iter().copied().fold(0.0_f64, f64::max);

    let overlaps = |i: usize| -> Result<Vec<Candidate>, SpaceError> {
        let mut found = Vec::new();
        particles.for_each_neighbor::<_, SpaceError>(i, search_radius, |neighbor| {
            if neighbor.j > i && !neighbor.guide.is_mirrored() {
                let penetration = 0.5 * (diameters[i] + diameters[neighbor.j]) - neighbor.distance;
                if penetration > 0.0 {
                    found.push(Candidate {
                        i,
                        j: neighbor.j,
                        distance: neighbor.distance,
                        penetration,
                    });
                }
            }
            Ok(())
        })?;
        Ok(found)
    };

    #[cfg(feature = "parallel")]
    let candidates: Vec<Vec<Candidate>> = (0..len)
        .into_par_iter()
        .map(overlaps)
        .collect::<Result<_, _>>()?;
    #[cfg(not(feature = "parallel"))]
    let candidates: Vec<Vec<Candidate>> = (0..len).map(overlaps).collect::<Result<_, _>>()?;

    let domain = particles.domain().clone();
    let positions = particles.positions().to_vec();
    debug!(
        particles = len,
        search_radius,
        candidates = candidates.iter().map(Vec::len).sum::<usize>(),
        "Collected overlapping neighbors."
    );

    let pairs = workspace.pairs_mut(pairs_id)?;
    let mut report = ContactReport {
        pairs: Some(pairs_id),
        ..ContactReport::default()
    };
    let mut penetrations = Vec::with_capacity(pairs.len());
    let mut known = HashSet::with_capacity(pairs.len());
    for index in 0..pairs.len() {
        let (i, j) = (pairs.first()[index], pairs.second()[index]);
        let (xi, xj) = match (positions.get(i), positions.get(j)) {
            (Some(xi), Some(xj)) => (xi, xj),
            _ => {
                return Err(PairsError::IndexOutOfRange {
                    index: i.max(j),
                    len,
                }
                .into());
            }
        };
        let penetration =
            0.5 * (diameters[i] + diameters[j]) - domain.displacement(xi, xj).norm();
        report.record(pairs.hysteron_mut(index)?.update(penetration));
        penetrations.push(penetration);
        known.insert((i.min(j), i.max(j)));
    }

    for candidate in candidates.into_iter().flatten() {
        if !known.insert((candidate.i, candidate.j)) {
            continue;
        }
        let id = pairs.add_pair(candidate.i, candidate.j, &[candidate.distance])?;
        let index = pairs.index_of(id).ok_or(PairsError::UnknownPair(id))?;
        report.record(pairs.hysteron_mut(index)?.update(candidate.penetration));
        report.formed += 1;
    }

    let separated: Vec<_> = penetrations
        .iter()
        .enumerate()
        .filter(|&(index, &penetration)| {
            penetration < 0.0 && pairs.hysteron(index).is_ok_and(|h| !h.is_engaged())
        })
        .map(|(index, _)| pairs.ids()[index])
        .collect();
    for id in &separated {
        pairs.delete_pair(*id)?;
    }
    report.removed = separated.len();
    report.active = pairs.len();

    info!(
        formed = report.formed,
        engaged = report.engaged,
        disengaged = report.disengaged,
        removed = report.removed,
        active = report.active,
        "Contact refresh complete."
    );
    Ok(report)
}

/// Looks up the contact list of `system`, creating it if it does not exist yet.
///
/// An existing list keeps its own hysteresis thresholds; a mismatch with
/// `config` is logged.
fn contact_list(
    workspace: &mut Workspace,
    system: ParticleSystemId,
    config: &ContactConfig,
) -> Result<PairListId, EngineError> {
    match workspace.lookup(&config.pairs_name) {
        Ok(Symbol::Pairs(id)) => {
            if workspace.pairs_owner(id)? != system {
                return Err(WorkspaceError::InvalidHandle("contact pair list").into());
            }
            let pairs = workspace.pairs(id)?;
            if !pairs.has_hysteresis() {
                return Err(PairsError::HysteresisDisabled.into());
            }
            if !pairs.has_payload(REST_LENGTH_PAYLOAD) || pairs.payload_names().len() != 1 {
                return Err(PairsError::UnknownPayload(REST_LENGTH_PAYLOAD.to_string()).into());
            }
            if let Some((alpha, beta)) = pairs.thresholds() {
                if (alpha, beta) != (config.alpha, config.beta) {
                    warn!(
                        pairs = %config.pairs_name,
                        alpha,
                        beta,
                        requested_alpha = config.alpha,
                        requested_beta = config.beta,
                        "Existing contact list has different hysteresis thresholds; keeping its own."
                    );
                }
            }
            Ok(id)
        }
        Ok(_) => Err(WorkspaceError::DuplicateSymbol(config.pairs_name.clone()).into()),
        Err(WorkspaceError::UndefinedSymbol(_)) => {
            let pairs = LongRangePairs::new(&config.pairs_name, &[REST_LENGTH_PAYLOAD])?
                .with_hysteresis(config.alpha, config.beta)?;
            Ok(workspace.add_pair_list(system, pairs)?)
        }
        Err(e) => Err(e.into()),
    }
}
