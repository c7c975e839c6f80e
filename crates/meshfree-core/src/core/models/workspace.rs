use super::domain::Domain;
use super::field::{Field, StorageError};
use super::ids::{FieldId, PairListId, ParticleSystemId, VariableId};
use super::particles::ParticleSystem;
use super::variable::Variable;
use crate::core::math::tensor::Tensor;
use crate::core::pairs::list::{LongRangePairs, PairsError};
use crate::core::space::grid::SpaceError;
use nalgebra::Point3;
use slotmap::{SecondaryMap, SlotMap};
use std::collections::HashMap;
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum WorkspaceError {
    #[error("Undefined symbol '{0}'")]
    UndefinedSymbol(String),
    #[error("Symbol '{0}' is already defined")]
    DuplicateSymbol(String),
    #[error("Stale or foreign {0} handle")]
    InvalidHandle(&'static str),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Spatial index error: {0}")]
    Space(#[from] SpaceError),
    #[error("Pair list error: {0}")]
    Pairs(#[from] PairsError),
}

/// What a name in the workspace refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
    System(ParticleSystemId),
    Field(FieldId),
    Variable(VariableId),
    Pairs(PairListId),
}

/// Produces unique names for generated symbols.
#[derive(Debug, Clone, Default)]
pub struct NameGenerator {
    counters: HashMap<String, usize>,
}

impl NameGenerator {
    /// The next name of the form `prefix#n` for this prefix.
    pub fn next(&mut self, prefix: &str) -> String {
        let counter = self.counters.entry(prefix.to_string()).or_insert(0);
        let name = format!("{prefix}#{counter}");
        *counter += 1;
        name
    }
}

/// Owns every particle system, field, variable and pair list of a simulation.
///
/// Symbols are addressed by stable handles; a name table maps user-visible
/// names to handles. Fields and pair lists are attached to one particle system
/// and follow it through every particle-count-changing operation, which is only
/// available through the workspace so that attached storage never drifts out of
/// step with the positions.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    /// Primary storage for particle systems.
    systems: SlotMap<ParticleSystemId, ParticleSystem>,
    /// Primary storage for per-particle fields.
    fields: SlotMap<FieldId, Field>,
    /// The particle system each field is attached to.
    field_owner: SecondaryMap<FieldId, ParticleSystemId>,
    variables: SlotMap<VariableId, Variable>,
    pair_lists: SlotMap<PairListId, LongRangePairs>,
    /// The particle system each pair list indexes into.
    pair_owner: SecondaryMap<PairListId, ParticleSystemId>,
    symbols: HashMap<String, Symbol>,
    names: NameGenerator,
}

impl Workspace {
    /// Creates an empty workspace.
    pub fn new() -> Self {
        Self::default()
    }

    fn claim(&mut self, name: &str) -> Result<(), WorkspaceError> {
        if self.symbols.contains_key(name) {
            return Err(WorkspaceError::DuplicateSymbol(name.to_string()));
        }
        Ok(())
    }

    /// Returns a name that is not yet bound in this workspace.
    pub fn fresh_name(&mut self, prefix: &str) -> String {
        loop {
            let name = self.names.next(prefix);
            if !self.symbols.contains_key(&name) {
                return name;
            }
        }
    }

    /// Adds a particle system and binds it to `name`.
    ///
    /// # Arguments
    ///
    /// * `name` - The symbol name of the system.
    /// * `domain` - The region covered by the system's hash grid.
    /// * `positions` - Initial particle positions.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::DuplicateSymbol`] if `name` is already bound.
    pub fn add_particle_system(
        &mut self,
        name: &str,
        domain: Domain,
        positions: Vec<Point3<f64>>,
    ) -> Result<ParticleSystemId, WorkspaceError> {
        self.claim(name)?;
        let id = self
            .systems
            .insert(ParticleSystem::new(name, domain, positions));
        self.symbols.insert(name.to_string(), Symbol::System(id));
        Ok(id)
    }

    /// Adds a field attached to `system`, one `template` value per particle.
    pub fn add_field(
        &mut self,
        name: &str,
        system: ParticleSystemId,
        template: Tensor,
    ) -> Result<FieldId, WorkspaceError> {
        self.claim(name)?;
        let len = self.system(system)?.len();
        let two_step = self.system(system)?.is_two_step();
        let mut field = Field::new(name, template, len);
        field.double_steps(two_step);
        let id = self.fields.insert(field);
        self.field_owner.insert(id, system);
        self.symbols.insert(name.to_string(), Symbol::Field(id));
        Ok(id)
    }

    pub fn add_variable(&mut self, name: &str, value: Tensor) -> Result<VariableId, WorkspaceError> {
        self.claim(name)?;
        let id = self.variables.insert(Variable::new(name, value));
        self.symbols.insert(name.to_string(), Symbol::Variable(id));
        Ok(id)
    }

    /// Attaches a pair list to `system`; the list is bound to its own name.
    pub fn add_pair_list(
        &mut self,
        system: ParticleSystemId,
        pairs: LongRangePairs,
    ) -> Result<PairListId, WorkspaceError> {
        let name = pairs.name().to_string();
        self.claim(&name)?;
        self.system(system)?;
        let id = self.pair_lists.insert(pairs);
        self.pair_owner.insert(id, system);
        self.symbols.insert(name, Symbol::Pairs(id));
        Ok(id)
    }

    /// Resolves a name to the symbol it is bound to.
    pub fn lookup(&self, name: &str) -> Result<Symbol, WorkspaceError> {
        self.symbols
            .get(name)
            .copied()
            .ok_or_else(|| WorkspaceError::UndefinedSymbol(name.to_string()))
    }

    pub fn symbols(&self) -> impl Iterator<Item = (&str, Symbol)> {
        self.symbols.iter().map(|(name, &symbol)| (name.as_str(), symbol))
    }

    pub fn system(&self, id: ParticleSystemId) -> Result<&ParticleSystem, WorkspaceError> {
        self.systems
            .get(id)
            .ok_or(WorkspaceError::InvalidHandle("particle system"))
    }

    pub fn system_mut(
        &mut self,
        id: ParticleSystemId,
    ) -> Result<&mut ParticleSystem, WorkspaceError> {
        self.systems
            .get_mut(id)
            .ok_or(WorkspaceError::InvalidHandle("particle system"))
    }

    pub fn systems(&self) -> impl Iterator<Item = (ParticleSystemId, &ParticleSystem)> {
        self.systems.iter()
    }

    pub fn contains_system(&self, id: ParticleSystemId) -> bool {
        self.systems.contains_key(id)
    }

    pub fn field(&self, id: FieldId) -> Result<&Field, WorkspaceError> {
        self.fields.get(id).ok_or(WorkspaceError::InvalidHandle("field"))
    }

    pub fn field_mut(&mut self, id: FieldId) -> Result<&mut Field, WorkspaceError> {
        self.fields
            .get_mut(id)
            .ok_or(WorkspaceError::InvalidHandle("field"))
    }

    /// The particle system a field is attached to.
    pub fn field_owner(&self, id: FieldId) -> Result<ParticleSystemId, WorkspaceError> {
        self.field_owner
            .get(id)
            .copied()
            .ok_or(WorkspaceError::InvalidHandle("field"))
    }

    pub fn variable(&self, id: VariableId) -> Result<&Variable, WorkspaceError> {
        self.variables
            .get(id)
            .ok_or(WorkspaceError::InvalidHandle("variable"))
    }

    pub fn variable_mut(&mut self, id: VariableId) -> Result<&mut Variable, WorkspaceError> {
        self.variables
            .get_mut(id)
            .ok_or(WorkspaceError::InvalidHandle("variable"))
    }

    pub fn pairs(&self, id: PairListId) -> Result<&LongRangePairs, WorkspaceError> {
        self.pair_lists
            .get(id)
            .ok_or(WorkspaceError::InvalidHandle("pair list"))
    }

    pub fn pairs_mut(&mut self, id: PairListId) -> Result<&mut LongRangePairs, WorkspaceError> {
        self.pair_lists
            .get_mut(id)
            .ok_or(WorkspaceError::InvalidHandle("pair list"))
    }

    pub fn pairs_owner(&self, id: PairListId) -> Result<ParticleSystemId, WorkspaceError> {
        self.pair_owner
            .get(id)
            .copied()
            .ok_or(WorkspaceError::InvalidHandle("pair list"))
    }

    /// Fields attached to `system`.
    pub fn fields_of(&self, system: ParticleSystemId) -> Vec<FieldId> {
        self.field_owner
            .iter()
            .filter(|&(_, &owner)| owner == system)
            .map(|(id, _)| id)
            .collect()
    }

    /// Pair lists attached to `system`.
    pub fn pair_lists_of(&self, system: ParticleSystemId) -> Vec<PairListId> {
        self.pair_owner
            .iter()
            .filter(|&(_, &owner)| owner == system)
            .map(|(id, _)| id)
            .collect()
    }

    /// Rebuilds the hash grid of one particle system.
    pub fn update_space(&mut self, system: ParticleSystemId) -> Result<(), WorkspaceError> {
        self.system_mut(system)?.update_space();
        Ok(())
    }

    /// Rebuilds every stale hash grid.
    pub fn update_spaces(&mut self) {
        for (_, system) in self.systems.iter_mut() {
            if !system.space().is_up_to_date() {
                system.update_space();
            }
        }
    }

    /// Resizes a particle system and everything attached to it.
    ///
    /// Pairs referencing removed particles are dropped.
    pub fn set_number_of_nodes(
        &mut self,
        system: ParticleSystemId,
        len: usize,
    ) -> Result<(), WorkspaceError> {
        self.system_mut(system)?.set_number_of_nodes(len);
        for id in self.fields_of(system) {
            self.fields[id].set_number_of_nodes(len);
        }
        for id in self.pair_lists_of(system) {
            self.pair_lists[id].truncate_particles(len);
        }
        trace!(len, "Resized particle system.");
        Ok(())
    }

    /// Deletes particle `index`; higher indices shift down by one.
    pub fn delete_member(
        &mut self,
        system: ParticleSystemId,
        index: usize,
    ) -> Result<(), WorkspaceError> {
        self.system_mut(system)?.delete_member(index)?;
        for id in self.fields_of(system) {
            self.fields[id].delete_member(index)?;
        }
        for id in self.pair_lists_of(system) {
            self.pair_lists[id].remove_particle(index);
        }
        trace!(index, "Deleted particle.");
        Ok(())
    }

    /// Appends a copy of particle `index` and returns the copy's index.
    pub fn duplicate_member(
        &mut self,
        system: ParticleSystemId,
        index: usize,
    ) -> Result<usize, WorkspaceError> {
        let copy = self.system_mut(system)?.duplicate_member(index)?;
        for id in self.fields_of(system) {
            self.fields[id].duplicate_member(index)?;
        }
        trace!(index, copy, "Duplicated particle.");
        Ok(copy)
    }

    /// Physically reorders a particle system into grid-cell order.
    ///
    /// Positions, attached fields and attached pair lists are permuted together,
    /// and the grid is rebuilt so that bucket contents are contiguous in memory.
    /// Returns the applied permutation, `sorted[new] = old`.
    pub fn sort_particles(
        &mut self,
        system: ParticleSystemId,
    ) -> Result<Vec<usize>, WorkspaceError> {
        let particles = self.system_mut(system)?;
        particles.update_space();
        let sorted = particles.space().permutation()?.to_vec();
        particles.sort(&sorted)?;
        particles.update_space();

        for id in self.fields_of(system) {
            self.fields[id].sort_field(&sorted)?;
        }
        for id in self.pair_lists_of(system) {
            self.pair_lists[id].sort_pairs(&sorted);
        }
        trace!(particles = sorted.len(), "Sorted particles into cell order.");
        Ok(sorted)
    }

    /// Enables or disables previous-step storage on every symbol.
    pub fn double_steps(&mut self, enabled: bool) {
        for (_, system) in self.systems.iter_mut() {
            system.double_steps(enabled);
        }
        for (_, field) in self.fields.iter_mut() {
            field.double_steps(enabled);
        }
        for (_, variable) in self.variables.iter_mut() {
            variable.double_steps(enabled);
        }
    }

    /// Copies current values into the previous-step buffers of every two-step symbol.
    pub fn store_previous(&mut self) {
        for (_, system) in self.systems.iter_mut() {
            system.store_previous();
        }
        for (_, field) in self.fields.iter_mut() {
            field.store_previous();
        }
        for (_, variable) in self.variables.iter_mut() {
            variable.store_previous();
        }
    }
}
