use super::field::{StorageError, TimeLevel};
use crate::core::math::tensor::Tensor;

/// A named global quantity holding one mutable value.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    name: String,
    value: Tensor,
    previous: Option<Tensor>,
}

impl Variable {
    pub fn new(name: impl Into<String>, value: Tensor) -> Self {
        Self {
            name: name.into(),
            value,
            previous: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self, level: TimeLevel) -> Result<&Tensor, StorageError> {
        match level {
            TimeLevel::Current => Ok(&self.value),
            TimeLevel::Previous => self
                .previous
                .as_ref()
                .ok_or_else(|| StorageError::PreviousUnavailable(self.name.clone())),
        }
    }

    /// Replaces the current value. Variables may change shape.
    pub fn set_value(&mut self, value: Tensor) {
        self.value = value;
    }

    pub fn is_two_step(&self) -> bool {
        self.previous.is_some()
    }

    pub fn double_steps(&mut self, enabled: bool) {
        match (enabled, self.previous.is_some()) {
            (true, false) => self.previous = Some(self.value.clone()),
            (false, true) => self.previous = None,
            _ => {}
        }
    }

    pub fn store_previous(&mut self) {
        if let Some(previous) = self.previous.as_mut() {
            previous.clone_from(&self.value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn previous_value_follows_store_previous() {
        let mut dt = Variable::new("dt", Tensor::scalar(0.1));
        assert!(dt.value(TimeLevel::Previous).is_err());

        dt.double_steps(true);
        dt.set_value(Tensor::scalar(0.2));
        assert_eq!(dt.value(TimeLevel::Previous).unwrap(), &Tensor::scalar(0.1));

        dt.store_previous();
        assert_eq!(dt.value(TimeLevel::Previous).unwrap(), &Tensor::scalar(0.2));

        dt.double_steps(false);
        assert!(!dt.is_two_step());
    }
}
