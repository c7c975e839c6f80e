use super::hysteron::Hysteron;
use std::fmt;
use thiserror::Error;
use tracing::{trace, warn};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PairsError {
    #[error("Pair {0} does not exist")]
    UnknownPair(PairId),
    #[error("Pair id {0} is already in use")]
    DuplicatePairId(PairId),
    #[error("Pair list has no payload named '{0}'")]
    UnknownPayload(String),
    #[error("Payload name '{0}' is declared twice")]
    DuplicatePayload(String),
    #[error("Pair payload has {found} value(s), expected {expected}")]
    PayloadLength { expected: usize, found: usize },
    #[error("Pair index {index} is out of range ({len} pairs)")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("Hysteresis thresholds must satisfy alpha < beta (alpha = {alpha}, beta = {beta})")]
    InvalidThresholds { alpha: f64, beta: f64 },
    #[error("Hysteresis is not enabled on this pair list")]
    HysteresisDisabled,
}

/// Stable identifier of a pair; unaffected by particle or pair reordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairId(pub u64);

impl fmt::Display for PairId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A borrowed view of one pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairRef<'a> {
    pub index: usize,
    pub id: PairId,
    pub first: usize,
    pub second: usize,
    pub hysteron: Option<&'a Hysteron>,
}

/// Persistent particle-to-particle connectivity not derived from the grid.
///
/// All per-pair arrays are kept the same length. Pairs are addressed by their
/// [`PairId`]; their position in the arrays changes on deletion, which swaps the
/// last pair into the freed slot.
#[derive(Debug, Clone, PartialEq)]
pub struct LongRangePairs {
    name: String,
    first: Vec<usize>,
    second: Vec<usize>,
    ids: Vec<PairId>,
    payload_names: Vec<String>,
    payloads: Vec<Vec<f64>>,
    thresholds: Option<(f64, f64)>,
    hysterons: Vec<Hysteron>,
    next_id: u64,
}

impl LongRangePairs {
    /// Creates an empty list carrying one scalar payload array per name.
    pub fn new(name: impl Into<String>, payload_names: &[&str]) -> Result<Self, PairsError> {
        let mut names: Vec<String> = Vec::with_capacity(payload_names.len());
        for &payload in payload_names {
            if names.iter().any(|n| n == payload) {
                return Err(PairsError::DuplicatePayload(payload.to_string()));
            }
            names.push(payload.to_string());
        }
        Ok(Self {
            name: name.into(),
            first: Vec::new(),
            second: Vec::new(),
            ids: Vec::new(),
            payloads: vec![Vec::new(); names.len()],
            payload_names: names,
            thresholds: None,
            hysterons: Vec::new(),
            next_id: 0,
        })
    }

    /// Enables a per-pair hysteron with the given disengage/engage thresholds.
    ///
    /// Existing pairs receive a disengaged hysteron.
    pub fn with_hysteresis(mut self, alpha: f64, beta: f64) -> Result<Self, PairsError> {
        let template = Hysteron::new(alpha, beta)?;
        self.thresholds = Some((alpha, beta));
        self.hysterons = vec![template; self.ids.len()];
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn first(&self) -> &[usize] {
        &self.first
    }

    pub fn second(&self) -> &[usize] {
        &self.second
    }

    pub fn ids(&self) -> &[PairId] {
        &self.ids
    }

    pub fn payload_names(&self) -> &[String] {
        &self.payload_names
    }

    pub fn thresholds(&self) -> Option<(f64, f64)> {
        self.thresholds
    }

    pub fn has_hysteresis(&self) -> bool {
        self.thresholds.is_some()
    }

    pub fn get(&self, index: usize) -> Option<PairRef<'_>> {
        Some(PairRef {
            index,
            id: *self.ids.get(index)?,
            first: self.first[index],
            second: self.second[index],
            hysteron: self.hysterons.get(index),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = PairRef<'_>> + '_ {
        (0..self.len()).filter_map(move |index| self.get(index))
    }

    /// Appends a pair and returns its fresh id.
    pub fn add_pair(&mut self, i: usize, j: usize, payload: &[f64]) -> Result<PairId, PairsError> {
        let id = PairId(self.next_id);
        self.insert(id, i, j, payload, false)?;
        Ok(id)
    }

    /// Appends a pair under a caller-chosen id, e.g. when restoring a saved list.
    pub fn insert(
        &mut self,
        id: PairId,
        i: usize,
        j: usize,
        payload: &[f64],
        engaged: bool,
    ) -> Result<(), PairsError> {
        if payload.len() != self.payload_names.len() {
            return Err(PairsError::PayloadLength {
                expected: self.payload_names.len(),
                found: payload.len(),
            });
        }
        if self.ids.contains(&id) {
            return Err(PairsError::DuplicatePairId(id));
        }
        if let Some((alpha, beta)) = self.thresholds {
            self.hysterons
                .push(Hysteron::new(alpha, beta)?.with_state(engaged));
        }
        self.first.push(i);
        self.second.push(j);
        self.ids.push(id);
        for (column, &value) in self.payloads.iter_mut().zip(payload) {
            column.push(value);
        }
        self.next_id = self.next_id.max(id.0 + 1);
        trace!(list = %self.name, %id, i, j, "Added pair.");
        Ok(())
    }

    pub fn index_of(&self, id: PairId) -> Option<usize> {
        self.ids.iter().position(|&candidate| candidate == id)
    }

    /// Removes a pair by id; the last pair moves into its slot.
    pub fn delete_pair(&mut self, id: PairId) -> Result<(), PairsError> {
        let index = self.index_of(id).ok_or(PairsError::UnknownPair(id))?;
        self.swap_remove(index);
        trace!(list = %self.name, %id, "Deleted pair.");
        Ok(())
    }

    fn swap_remove(&mut self, index: usize) {
        self.first.swap_remove(index);
        self.second.swap_remove(index);
        self.ids.swap_remove(index);
        for column in &mut self.payloads {
            column.swap_remove(index);
        }
        if !self.hysterons.is_empty() {
            self.hysterons.swap_remove(index);
        }
    }

    /// Index of the pair joining `i` and `j` in either orientation.
    pub fn get_pair_index(&self, i: usize, j: usize) -> Option<usize> {
        self.first
            .iter()
            .zip(&self.second)
            .position(|(&a, &b)| (a == i && b == j) || (a == j && b == i))
    }

    /// Indices of every pair with `particle` as an endpoint.
    pub fn involving(&self, particle: usize) -> Vec<usize> {
        self.first
            .iter()
            .zip(&self.second)
            .enumerate()
            .filter(|(_, (a, b))| **a == particle || **b == particle)
            .map(|(index, _)| index)
            .collect()
    }

    fn column(&self, name: &str) -> Result<usize, PairsError> {
        self.payload_names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| PairsError::UnknownPayload(name.to_string()))
    }

    pub fn has_payload(&self, name: &str) -> bool {
        self.payload_names.iter().any(|n| n == name)
    }

    pub fn payload(&self, name: &str) -> Result<&[f64], PairsError> {
        let column = self.column(name)?;
        Ok(&self.payloads[column])
    }

    pub fn payload_mut(&mut self, name: &str) -> Result<&mut [f64], PairsError> {
        let column = self.column(name)?;
        Ok(&mut self.payloads[column])
    }

    /// All payload values of one pair, in declaration order.
    pub fn payload_row(&self, index: usize) -> Result<Vec<f64>, PairsError> {
        if index >= self.len() {
            return Err(PairsError::IndexOutOfRange {
                index,
                len: self.len(),
            });
        }
        Ok(self.payloads.iter().map(|column| column[index]).collect())
    }

    pub fn hysteron(&self, index: usize) -> Result<&Hysteron, PairsError> {
        if !self.has_hysteresis() {
            return Err(PairsError::HysteresisDisabled);
        }
        let len = self.len();
        self.hysterons
            .get(index)
            .ok_or(PairsError::IndexOutOfRange { index, len })
    }

    pub fn hysteron_mut(&mut self, index: usize) -> Result<&mut Hysteron, PairsError> {
        if !self.has_hysteresis() {
            return Err(PairsError::HysteresisDisabled);
        }
        let len = self.len();
        self.hysterons
            .get_mut(index)
            .ok_or(PairsError::IndexOutOfRange { index, len })
    }

    /// Rewrites endpoints after particles were reordered by `sorted`, where
    /// `sorted[new] = old`.
    ///
    /// An old-to-new lookup table is filled in one pass over `sorted`, then every
    /// endpoint is remapped in one pass over the pairs. Pairs referencing a
    /// particle that `sorted` does not list are dropped; the number of dropped
    /// pairs is returned.
    pub fn sort_pairs(&mut self, sorted: &[usize]) -> usize {
        let capacity = self
            .first
            .iter()
            .chain(&self.second)
            .copied()
            .max()
            .map_or(0, |m| m + 1)
            .max(sorted.iter().copied().max().map_or(0, |m| m + 1));
        let mut new_of = vec![usize::MAX; capacity];
        for (new, &old) in sorted.iter().enumerate() {
            new_of[old] = new;
        }

        let before = self.len();
        self.retain_and_map(|a, b| match (new_of[a], new_of[b]) {
            (usize::MAX, _) | (_, usize::MAX) => None,
            mapped => Some(mapped),
        });
        let dropped = before - self.len();
        if dropped > 0 {
            warn!(
                list = %self.name,
                dropped,
                "Dropped pairs referencing particles missing from the permutation."
            );
        }
        dropped
    }

    /// Drops pairs touching `particle` and shifts higher endpoints down by one,
    /// mirroring an order-preserving particle deletion.
    pub fn remove_particle(&mut self, particle: usize) -> usize {
        let before = self.len();
        self.retain_and_map(|a, b| {
            if a == particle || b == particle {
                return None;
            }
            let shift = |k: usize| if k > particle { k - 1 } else { k };
            Some((shift(a), shift(b)))
        });
        before - self.len()
    }

    /// Drops pairs with an endpoint at or beyond `len`.
    pub fn truncate_particles(&mut self, len: usize) -> usize {
        let before = self.len();
        self.retain_and_map(|a, b| (a < len && b < len).then_some((a, b)));
        before - self.len()
    }

    /// Keeps pairs for which `f` returns new endpoints, preserving relative order.
    fn retain_and_map<F>(&mut self, mut f: F)
    where
        F: FnMut(usize, usize) -> Option<(usize, usize)>,
    {
        let mut write = 0;
        for read in 0..self.ids.len() {
            let Some((a, b)) = f(self.first[read], self.second[read]) else {
                continue;
            };
            self.first[write] = a;
            self.second[write] = b;
            self.ids[write] = self.ids[read];
            for column in &mut self.payloads {
                column[write] = column[read];
            }
            if !self.hysterons.is_empty() {
                self.hysterons[write] = self.hysterons[read];
            }
            write += 1;
        }
        self.first.truncate(write);
        self.second.truncate(write);
        self.ids.truncate(write);
        for column in &mut self.payloads {
            column.truncate(write);
        }
        self.hysterons.truncate(write);
    }
}
