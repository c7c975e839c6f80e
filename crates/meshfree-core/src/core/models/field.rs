use crate::core::math::tensor::Tensor;
use std::sync::OnceLock;
use thiserror::Error;

/// Selects which buffer of a two-step quantity is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TimeLevel {
    #[default]
    Current,
    Previous,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StorageError {
    #[error("Index {index} is out of range for '{name}' with {len} member(s)")]
    IndexOutOfRange {
        name: String,
        index: usize,
        len: usize,
    },
    #[error("Value for '{name}' must have shape {expected:?}, found {found:?}")]
    ShapeMismatch {
        name: String,
        expected: (usize, usize),
        found: (usize, usize),
    },
    #[error("Previous time level of '{0}' was requested but two-step storage is disabled")]
    PreviousUnavailable(String),
    #[error("Permutation for '{name}' is invalid: {reason}")]
    InvalidPermutation { name: String, reason: String },
}

/// Checks that `permutation` is a bijection over `0..len`.
pub(crate) fn validate_permutation(
    name: &str,
    permutation: &[usize],
    len: usize,
) -> Result<(), StorageError> {
    let invalid = |reason: String| StorageError::InvalidPermutation {
        name: name.to_string(),
        reason,
    };
    if permutation.len() != len {
        return Err(invalid(format!(
            "expected {len} entries, found {}",
            permutation.len()
        )));
    }
    let mut seen = vec![false; len];
    for &old in permutation {
        match seen.get_mut(old) {
            Some(slot) if !*slot => *slot = true,
            Some(_) => return Err(invalid(format!("index {old} appears twice"))),
            None => return Err(invalid(format!("index {old} is out of range"))),
        }
    }
    Ok(())
}

/// Reorders `values` so that `values[new] = old_values[permutation[new]]`.
pub(crate) fn permute<T: Clone>(values: &[T], permutation: &[usize]) -> Vec<T> {
    permutation.iter().map(|&old| values[old].clone()).collect()
}

/// Lazily computed maximum of a scalar field, reset by every write.
#[derive(Debug, Clone, Default)]
struct ScalarMax(OnceLock<Option<f64>>);

impl PartialEq for ScalarMax {
    fn eq(&self, _: &Self) -> bool {
        true
    }
}

/// A named per-particle quantity.
///
/// Every member holds a tensor with the shape of `template`. With two-step
/// storage enabled the field also keeps the values of the previous time step,
/// which are rearranged together with the current values by every lifecycle
/// operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: String,
    template: Tensor,
    values: Vec<Tensor>,
    previous: Option<Vec<Tensor>>,
    max: ScalarMax,
}

impl Field {
    /// Creates a field of `len` members, each initialised to `template`.
    pub fn new(name: impl Into<String>, template: Tensor, len: usize) -> Self {
        Self {
            name: name.into(),
            values: vec![template.clone(); len],
            template,
            previous: None,
            max: ScalarMax::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn template(&self) -> &Tensor {
        &self.template
    }

    pub fn values(&self) -> &[Tensor] {
        &self.values
    }

    pub fn is_two_step(&self) -> bool {
        self.previous.is_some()
    }

    /// Largest current value, or `None` when the field is empty or not scalar.
    ///
    /// Computed once and cached until the next write, so interactions may ask
    /// for it from every particle.
    pub fn max_scalar(&self) -> Option<f64> {
        *self.max.0.get_or_init(|| {
            self.values
                .iter()
                .try_fold(None, |max: Option<f64>, value| {
                    let x = value.value().ok()?;
                    Some(Some(max.map_or(x, |m| m.max(x))))
                })
                .flatten()
        })
    }

    fn invalidate(&mut self) {
        self.max = ScalarMax::default();
    }

    /// Checks that `value` may be stored in this field.
    ///
    /// A one-element value is accepted for a one-element template regardless of
    /// whether it is flagged scalar; otherwise the shape must match exactly.
    pub fn check_value(&self, value: &Tensor) -> Result<(), StorageError> {
        let compatible = self.template.same_shape(value)
            || (self.template.numel() == 1 && value.numel() == 1);
        if compatible {
            Ok(())
        } else {
            Err(StorageError::ShapeMismatch {
                name: self.name.clone(),
                expected: self.template.shape(),
                found: value.shape(),
            })
        }
    }

    fn out_of_range(&self, index: usize) -> StorageError {
        StorageError::IndexOutOfRange {
            name: self.name.clone(),
            index,
            len: self.values.len(),
        }
    }

    pub fn value(&self, index: usize, level: TimeLevel) -> Result<&Tensor, StorageError> {
        let buffer = match level {
            TimeLevel::Current => &self.values,
            TimeLevel::Previous => self
                .previous
                .as_ref()
                .ok_or_else(|| StorageError::PreviousUnavailable(self.name.clone()))?,
        };
        buffer.get(index).ok_or_else(|| self.out_of_range(index))
    }

    /// Overwrites the current value of one member after [`Field::check_value`].
    pub fn set_value(&mut self, index: usize, value: Tensor) -> Result<(), StorageError> {
        self.check_value(&value)?;
        let len = self.values.len();
        let slot = self
            .values
            .get_mut(index)
            .ok_or_else(|| StorageError::IndexOutOfRange {
                name: self.name.clone(),
                index,
                len,
            })?;
        *slot = value;
        self.invalidate();
        Ok(())
    }

    /// Enables or disables the previous-step buffer.
    pub fn double_steps(&mut self, enabled: bool) {
        match (enabled, self.previous.is_some()) {
            (true, false) => self.previous = Some(self.values.clone()),
            (false, true) => self.previous = None,
            _ => {}
        }
    }

    /// Copies the current values into the previous-step buffer.
    pub fn store_previous(&mut self) {
        if let Some(previous) = self.previous.as_mut() {
            previous.clone_from(&self.values);
        }
    }

    /// Grows (with template values) or truncates the field to `len` members.
    pub fn set_number_of_nodes(&mut self, len: usize) {
        self.invalidate();
        self.values.resize(len, self.template.clone());
        if let Some(previous) = self.previous.as_mut() {
            previous.resize(len, self.template.clone());
        }
    }

    /// Reorders members so that the new member `k` is the old member `permutation[k]`.
    pub fn sort_field(&mut self, permutation: &[usize]) -> Result<(), StorageError> {
        validate_permutation(&self.name, permutation, self.values.len())?;
        self.values = permute(&self.values, permutation);
        if let Some(previous) = self.previous.as_mut() {
            *previous = permute(previous, permutation);
        }
        Ok(())
    }

    /// Removes one member, shifting later members down by one.
    pub fn delete_member(&mut self, index: usize) -> Result<(), StorageError> {
        if index >= self.values.len() {
            return Err(self.out_of_range(index));
        }
        self.values.remove(index);
        self.invalidate();
        if let Some(previous) = self.previous.as_mut() {
            previous.remove(index);
        }
        Ok(())
    }

    /// Appends a copy of member `index` and returns the index of the copy.
    pub fn duplicate_member(&mut self, index: usize) -> Result<usize, StorageError> {
        let copy = self.value(index, TimeLevel::Current)?.clone();
        self.values.push(copy);
        self.invalidate();
        if let Some(previous) = self.previous.as_mut() {
            let old = previous[index].clone();
            previous.push(old);
        }
        Ok(self.values.len() - 1)
    }
}
