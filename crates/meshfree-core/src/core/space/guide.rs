use crate::core::math::tensor::Tensor;
use nalgebra::Vector3;

/// The wrap applied on one axis to bring a neighbor into range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Wrap {
    #[default]
    None,
    /// The neighbor was taken from the periodic image across the domain.
    Periodic,
    /// The neighbor is a ghost reflected about the lower boundary plane.
    MirrorLower,
    /// The neighbor is a ghost reflected about the upper boundary plane.
    MirrorUpper,
}

impl Wrap {
    pub fn is_mirror(self) -> bool {
        matches!(self, Wrap::MirrorLower | Wrap::MirrorUpper)
    }
}

/// Per-axis record of how a neighbor was wrapped.
///
/// Models use it to sign-correct quantities that are not invariant under
/// reflection: a velocity component normal to a mirror plane flips, while the
/// position difference is already computed from the reflected image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Guide {
    axes: [Wrap; 3],
}

impl Guide {
    pub fn axis(&self, axis: usize) -> Wrap {
        self.axes[axis]
    }

    pub fn set(&mut self, axis: usize, wrap: Wrap) {
        self.axes[axis] = wrap;
    }

    pub fn is_wrapped(&self) -> bool {
        self.axes.iter().any(|&wrap| wrap != Wrap::None)
    }

    pub fn is_mirrored(&self) -> bool {
        self.axes.iter().any(|wrap| wrap.is_mirror())
    }

    /// -1 on mirrored axes, +1 elsewhere.
    pub fn sign(&self, axis: usize) -> f64 {
        if self.axes[axis].is_mirror() { -1.0 } else { 1.0 }
    }

    /// Product of the per-axis signs; pseudo-vectors such as angular velocity
    /// pick up this factor under reflection.
    pub fn parity(&self) -> f64 {
        (0..3).map(|axis| self.sign(axis)).product()
    }

    pub fn reflect(&self, v: &Vector3<f64>) -> Vector3<f64> {
        Vector3::new(v.x * self.sign(0), v.y * self.sign(1), v.z * self.sign(2))
    }

    /// Flips the mirrored components of a column vector; other shapes are
    /// returned unchanged.
    pub fn reflect_tensor(&self, value: &Tensor) -> Tensor {
        if !self.is_mirrored() || !value.is_vector() {
            return value.clone();
        }
        let components: Vec<f64> = value
            .elements()
            .into_iter()
            .enumerate()
            .map(|(axis, c)| {
                if axis < 3 && self.axes[axis].is_mirror() { -c } else { c }
            })
            .collect();
        Tensor::vector(&components)
    }

    /// Encodes the guide as a vector: 0 untouched, 1 periodic, -1 mirrored.
    pub fn to_tensor(&self, dimensions: usize) -> Tensor {
        let components: Vec<f64> = self.axes[..dimensions.min(3)]
            .iter()
            .map(|wrap| match wrap {
                Wrap::None => 0.0,
                Wrap::Periodic => 1.0,
                Wrap::MirrorLower | Wrap::MirrorUpper => -1.0,
            })
            .collect();
        Tensor::vector(&components)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mirrored_x() -> Guide {
        let mut guide = Guide::default();
        guide.set(0, Wrap::MirrorLower);
        guide
    }

    #[test]
    fn default_guide_is_unwrapped() {
        let guide = Guide::default();
        assert!(!guide.is_wrapped());
        assert_eq!(guide.parity(), 1.0);
    }

    #[test]
    fn mirror_flips_normal_component_only() {
        let reflected = mirrored_x().reflect(&Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(reflected, Vector3::new(-1.0, 2.0, 3.0));
        assert_eq!(mirrored_x().parity(), -1.0);
    }

    #[test]
    fn reflect_tensor_leaves_scalars_untouched() {
        let guide = mirrored_x();
        assert_eq!(guide.reflect_tensor(&Tensor::scalar(4.0)), Tensor::scalar(4.0));
        assert_eq!(
            guide.reflect_tensor(&Tensor::vector(&[1.0, 2.0])).elements(),
            vec![-1.0, 2.0]
        );
    }

    #[test]
    fn periodic_wrap_does_not_change_sign() {
        let mut guide = Guide::default();
        guide.set(1, Wrap::Periodic);
        assert!(guide.is_wrapped());
        assert!(!guide.is_mirrored());
        assert_eq!(guide.to_tensor(2).elements(), vec![0.0, 1.0]);
    }
}
