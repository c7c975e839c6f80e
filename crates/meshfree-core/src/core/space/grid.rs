use super::guide::{Guide, Wrap};
use super::stencil::Stencil;
use crate::core::models::domain::{Boundary, Domain};
use nalgebra::{Point3, Vector3};
use std::sync::OnceLock;
use thiserror::Error;
use tracing::debug;

/// Sentinel stored in `cell_start`/`cell_end` for cells holding no particle.
pub const EMPTY_CELL: usize = usize::MAX;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SpaceError {
    #[error("Spatial index is stale; the grid must be rebuilt before querying neighbors")]
    StaleSpatialIndex,
    #[error("Particle {index} is not indexed by the grid ({len} particles)")]
    UnknownParticle { index: usize, len: usize },
}

/// A neighbor cell to scan, with the mirror wraps needed to reach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellVisit {
    pub hash: usize,
    pub guide: Guide,
}

/// A candidate neighbor produced by the grid query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub j: usize,
    /// `x_i - x_j`, measured to the (possibly wrapped or reflected) image of `j`.
    pub relative: Vector3<f64>,
    pub distance: f64,
    pub guide: Guide,
}

/// Uniform-grid spatial hash owned by one particle system.
///
/// After [`ParticleSpace::update`], `cell_start[h]..=cell_end[h]` indexes the
/// slice of `sorted` holding exactly the particles whose position hashes to cell
/// `h`. Any position write must call [`ParticleSpace::expire`]; queries on an
/// expired grid fail with [`SpaceError::StaleSpatialIndex`].
#[derive(Debug, Clone)]
pub struct ParticleSpace {
    domain: Domain,
    hash_keys: Vec<usize>,
    sorted: Vec<usize>,
    cell_start: Vec<usize>,
    cell_end: Vec<usize>,
    /// `stencils[r - 1]` holds the stencil of reach `r`, built on first use.
    stencils: Vec<OnceLock<Stencil>>,
    up_to_date: bool,
}

impl ParticleSpace {
    pub fn new(domain: Domain) -> Self {
        let cells = domain.total_cells();
        let max_reach = (0..domain.dimensions())
            .map(|axis| useful_reach(&domain, axis))
            .max()
            .unwrap_or(1);
        Self {
            domain,
            hash_keys: Vec::new(),
            sorted: Vec::new(),
            cell_start: vec![EMPTY_CELL; cells],
            cell_end: vec![EMPTY_CELL; cells],
            stencils: (0..max_reach).map(|_| OnceLock::new()).collect(),
            up_to_date: false,
        }
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// The 3^d stencil of adjacent cells.
    pub fn stencil(&self) -> &Stencil {
        self.stencil_for(1)
    }

    /// The cached stencil of `reach` rings, clamped to the reaches the grid can use.
    pub fn stencil_for(&self, reach: usize) -> &Stencil {
        let reach = reach.clamp(1, self.stencils.len());
        self.stencils[reach - 1].get_or_init(|| Stencil::new(self.domain.dimensions(), reach))
    }

    /// Largest reach that can still add cells on some axis.
    pub fn max_reach(&self) -> usize {
        self.stencils.len()
    }

    pub fn is_up_to_date(&self) -> bool {
        self.up_to_date
    }

    pub fn expire(&mut self) {
        self.up_to_date = false;
    }

    pub fn len(&self) -> usize {
        self.hash_keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hash_keys.is_empty()
    }

    /// Rehashes every particle and bucket-sorts the indices by cell.
    pub fn update(&mut self, positions: &[Point3<f64>]) {
        let cells = self.domain.total_cells();

        self.hash_keys.clear();
        self.hash_keys
            .extend(positions.iter().map(|p| self.domain.hash(p)));

        let mut counts = vec![0usize; cells];
        for &hash in &self.hash_keys {
            counts[hash] += 1;
        }

        self.cell_start.clear();
        self.cell_start.resize(cells, EMPTY_CELL);
        self.cell_end.clear();
        self.cell_end.resize(cells, EMPTY_CELL);

        let mut offset = 0;
        for (hash, &count) in counts.iter().enumerate() {
            if count > 0 {
                self.cell_start[hash] = offset;
                self.cell_end[hash] = offset + count - 1;
                offset += count;
            }
        }

        let mut cursor = self.cell_start.clone();
        self.sorted.clear();
        self.sorted.resize(positions.len(), 0);
        for (index, &hash) in self.hash_keys.iter().enumerate() {
            self.sorted[cursor[hash]] = index;
            cursor[hash] += 1;
        }

        self.up_to_date = true;
        debug!(
            particles = positions.len(),
            cells,
            occupied = counts.iter().filter(|&&c| c > 0).count(),
            "Rebuilt particle space."
        );
    }

    fn ensure_up_to_date(&self) -> Result<(), SpaceError> {
        if self.up_to_date {
            Ok(())
        } else {
            Err(SpaceError::StaleSpatialIndex)
        }
    }

    /// Particle indices ordered by cell: `permutation()[new] = old`.
    pub fn permutation(&self) -> Result<&[usize], SpaceError> {
        self.ensure_up_to_date()?;
        Ok(&self.sorted)
    }

    pub fn hash_key(&self, index: usize) -> Result<usize, SpaceError> {
        self.ensure_up_to_date()?;
        self.hash_keys
            .get(index)
            .copied()
            .ok_or(SpaceError::UnknownParticle {
                index,
                len: self.hash_keys.len(),
            })
    }

    /// Bucket bounds of a cell, `None` for an empty cell.
    pub fn cell_bounds(&self, hash: usize) -> Option<(usize, usize)> {
        let start = *self.cell_start.get(hash)?;
        if start == EMPTY_CELL {
            return None;
        }
        Some((start, self.cell_end[hash]))
    }

    pub fn cell_members(&self, hash: usize) -> &[usize] {
        match self.cell_bounds(hash) {
            Some((start, end)) => &self.sorted[start..=end],
            None => &[],
        }
    }

    /// Number of stencil rings needed to cover `radius` on every axis.
    ///
    /// Each axis asks for no more rings than can reach a new cell on it, so a
    /// radius larger than the domain costs no more than scanning every cell.
    pub fn reach_for(&self, radius: f64) -> usize {
        let dims = self.domain.dimensions();
        let cell_size = self.domain.cell_size();
        (0..dims)
            .map(|axis| {
                let cap = useful_reach(&self.domain, axis);
                let rings = (radius / cell_size[axis]).ceil();
                if rings.is_finite() && rings > 1.0 {
                    (rings.min(cap as f64) as usize).max(1)
                } else if rings > 1.0 {
                    cap
                } else {
                    1
                }
            })
            .max()
            .unwrap_or(1)
    }

    /// Occupied cells around `cell`, with mirror wraps resolved.
    ///
    /// Offsets leaving the domain through an open boundary are dropped; periodic
    /// offsets wrap modulo the cell count; mirror offsets are reflected back into
    /// the grid and recorded in the visit's guide. Each (cell, mirror) pair is
    /// visited at most once even when a large stencil wraps onto itself.
    pub fn neighbor_cells(&self, cell: [usize; 3], reach: usize) -> Vec<CellVisit> {
        let dims = self.domain.dimensions();
        let counts = self.domain.cell_counts();
        let stencil = self.stencil_for(reach);

        let mut visits: Vec<CellVisit> = Vec::with_capacity(stencil.len());
        'offsets: for offset in stencil.offsets() {
            let mut target = [0usize; 3];
            let mut guide = Guide::default();

            for axis in 0..dims {
                let n = counts[axis] as isize;
                let t = cell[axis] as isize + offset[axis];
                if (0..n).contains(&t) {
                    target[axis] = t as usize;
                    continue;
                }
                match self.domain.boundary(axis) {
                    Boundary::Open => continue 'offsets,
                    Boundary::Periodic => target[axis] = t.rem_euclid(n) as usize,
                    Boundary::Mirror => {
                        let reflected = if t < 0 { -t - 1 } else { 2 * n - t - 1 };
                        if !(0..n).contains(&reflected) {
                            continue 'offsets;
                        }
                        target[axis] = reflected as usize;
                        guide.set(
                            axis,
                            if t < 0 {
                                Wrap::MirrorLower
                            } else {
                                Wrap::MirrorUpper
                            },
                        );
                    }
                }
            }

            let hash = self.domain.flatten(target);
            if self.cell_start[hash] == EMPTY_CELL {
                continue;
            }
            let visit = CellVisit { hash, guide };
            if !visits.contains(&visit) {
                visits.push(visit);
            }
        }
        visits
    }

    /// Walks every candidate neighbor of particle `i` within the stencil that
    /// covers `radius`.
    ///
    /// Candidates are not filtered by distance and include `i` itself; callers
    /// apply their own cutoff and self-pair checks.
    pub fn for_each_neighbor<F, E>(
        &self,
        positions: &[Point3<f64>],
        i: usize,
        radius: f64,
        mut visit: F,
    ) -> Result<(), E>
    where
        F: FnMut(Neighbor) -> Result<(), E>,
        E: From<SpaceError>,
    {
        self.ensure_up_to_date()?;
        if positions.len() != self.hash_keys.len() {
            return Err(SpaceError::StaleSpatialIndex.into());
        }
        let xi = positions.get(i).ok_or(SpaceError::UnknownParticle {
            index: i,
            len: positions.len(),
        })?;

        let dims = self.domain.dimensions();
        let minimum = self.domain.minimum();
        let maximum = self.domain.maximum();
        let cell = self.domain.cell_of(xi);

        for cell_visit in self.neighbor_cells(cell, self.reach_for(radius)) {
            for &j in self.cell_members(cell_visit.hash) {
                let mut image = positions[j];
                let mut guide = cell_visit.guide;
                for axis in 0..dims {
                    match guide.axis(axis) {
                        Wrap::MirrorLower => image[axis] = 2.0 * minimum[axis] - image[axis],
                        Wrap::MirrorUpper => image[axis] = 2.0 * maximum[axis] - image[axis],
                        Wrap::None | Wrap::Periodic => {}
                    }
                }

                let raw = xi - image;
                let relative = self.domain.minimum_image(raw);
                for axis in 0..dims {
                    if relative[axis] != raw[axis] {
                        guide.set(axis, Wrap::Periodic);
                    }
                }

                visit(Neighbor {
                    j,
                    relative,
                    distance: relative.norm(),
                    guide,
                })?;
            }
        }
        Ok(())
    }
}

/// Rings beyond which an axis yields no new cells: the whole axis on open
/// axes, half the period on periodic ones and the reflected copy on mirror ones.
fn useful_reach(domain: &Domain, axis: usize) -> usize {
    let n = domain.cell_counts()[axis];
    let reach = match domain.boundary(axis) {
        Boundary::Open => n.saturating_sub(1),
        Boundary::Periodic => n / 2,
        Boundary::Mirror => n,
    };
    reach.max(1)
}
