use super::domain::Domain;
use super::field::{StorageError, TimeLevel, permute, validate_permutation};
use crate::core::math::tensor::Tensor;
use crate::core::space::grid::{Neighbor, ParticleSpace, SpaceError};
use nalgebra::Point3;

/// A set of particles: their positions and the hash grid indexing them.
///
/// Positions are the system's own per-particle field. Every write to a position
/// expires the embedded [`ParticleSpace`]; it must be rebuilt with
/// [`ParticleSystem::update_space`] before the next neighbor query.
#[derive(Debug, Clone)]
pub struct ParticleSystem {
    name: String,
    positions: Vec<Point3<f64>>,
    previous: Option<Vec<Point3<f64>>>,
    space: ParticleSpace,
}

impl ParticleSystem {
    /// Creates a particle system over `domain`.
    ///
    /// Positions on periodic axes are wrapped into the primary domain.
    pub fn new(name: impl Into<String>, domain: Domain, mut positions: Vec<Point3<f64>>) -> Self {
        for position in &mut positions {
            domain.wrap_position(position);
        }
        Self {
            name: name.into(),
            positions,
            previous: None,
            space: ParticleSpace::new(domain),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn domain(&self) -> &Domain {
        self.space.domain()
    }

    pub fn dimensions(&self) -> usize {
        self.space.domain().dimensions()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    pub fn space(&self) -> &ParticleSpace {
        &self.space
    }

    fn out_of_range(&self, index: usize) -> StorageError {
        StorageError::IndexOutOfRange {
            name: self.name.clone(),
            index,
            len: self.positions.len(),
        }
    }

    pub fn position(&self, index: usize) -> Result<&Point3<f64>, StorageError> {
        self.positions
            .get(index)
            .ok_or_else(|| self.out_of_range(index))
    }

    /// The position of particle `index` as a column vector of the domain's dimensionality.
    pub fn position_tensor(&self, index: usize, level: TimeLevel) -> Result<Tensor, StorageError> {
        let buffer = match level {
            TimeLevel::Current => &self.positions,
            TimeLevel::Previous => self
                .previous
                .as_ref()
                .ok_or_else(|| StorageError::PreviousUnavailable(self.name.clone()))?,
        };
        let position = buffer.get(index).ok_or_else(|| self.out_of_range(index))?;
        Ok(Tensor::from_vector3(&position.coords, self.dimensions()))
    }

    /// Checks that `value` has one component per domain axis.
    pub fn check_position(&self, value: &Tensor) -> Result<(), StorageError> {
        let dimensions = self.dimensions();
        if value.numel() != dimensions {
            return Err(StorageError::ShapeMismatch {
                name: self.name.clone(),
                expected: (dimensions, 1),
                found: value.shape(),
            });
        }
        Ok(())
    }

    /// Moves particle `index`, expiring the grid.
    pub fn set_position(&mut self, index: usize, value: &Tensor) -> Result<(), StorageError> {
        self.check_position(value)?;
        let mut position = Point3::from(value.to_vector3());
        self.space.domain().wrap_position(&mut position);
        let len = self.positions.len();
        let slot = self
            .positions
            .get_mut(index)
            .ok_or_else(|| StorageError::IndexOutOfRange {
                name: self.name.clone(),
                index,
                len,
            })?;
        *slot = position;
        self.space.expire();
        Ok(())
    }

    /// Rebuilds the hash grid from the current positions.
    pub fn update_space(&mut self) {
        self.space.update(&self.positions);
    }

    pub fn expire(&mut self) {
        self.space.expire();
    }

    /// Visits every grid candidate around particle `i`; see [`ParticleSpace::for_each_neighbor`].
    pub fn for_each_neighbor<F, E>(&self, i: usize, radius: f64, visit: F) -> Result<(), E>
    where
        F: FnMut(Neighbor) -> Result<(), E>,
        E: From<SpaceError>,
    {
        self.space
            .for_each_neighbor(&self.positions, i, radius, visit)
    }

    pub fn is_two_step(&self) -> bool {
        self.previous.is_some()
    }

    pub fn double_steps(&mut self, enabled: bool) {
        match (enabled, self.previous.is_some()) {
            (true, false) => self.previous = Some(self.positions.clone()),
            (false, true) => self.previous = None,
            _ => {}
        }
    }

    pub fn store_previous(&mut self) {
        if let Some(previous) = self.previous.as_mut() {
            previous.clone_from(&self.positions);
        }
    }

    /// Grows or truncates the system. New particles are placed at the domain minimum.
    pub fn set_number_of_nodes(&mut self, len: usize) {
        let origin = Point3::from(*self.space.domain().minimum());
        self.positions.resize(len, origin);
        if let Some(previous) = self.previous.as_mut() {
            previous.resize(len, origin);
        }
        self.space.expire();
    }

    /// Reorders particles so that the new particle `k` is the old particle `permutation[k]`.
    pub fn sort(&mut self, permutation: &[usize]) -> Result<(), StorageError> {
        validate_permutation(&self.name, permutation, self.positions.len())?;
        self.positions = permute(&self.positions, permutation);
        if let Some(previous) = self.previous.as_mut() {
            *previous = permute(previous, permutation);
        }
        self.space.expire();
        Ok(())
    }

    pub fn delete_member(&mut self, index: usize) -> Result<(), StorageError> {
        if index >= self.positions.len() {
            return Err(self.out_of_range(index));
        }
        self.positions.remove(index);
        if let Some(previous) = self.previous.as_mut() {
            previous.remove(index);
        }
        self.space.expire();
        Ok(())
    }

    pub fn duplicate_member(&mut self, index: usize) -> Result<usize, StorageError> {
        let copy = *self.position(index)?;
        self.positions.push(copy);
        if let Some(previous) = self.previous.as_mut() {
            let old = previous[index];
            previous.push(old);
        }
        self.space.expire();
        Ok(self.positions.len() - 1)
    }
}
