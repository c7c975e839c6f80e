use itertools::Itertools;

/// The block of cell offsets visited around a particle's own cell.
///
/// With `reach = 1` this is the classic 3^d neighborhood. Larger reaches are
/// used when the interaction radius spans more than one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stencil {
    dimensions: usize,
    reach: usize,
    offsets: Vec<[isize; 3]>,
}

impl Stencil {
    pub fn new(dimensions: usize, reach: usize) -> Self {
        let r = reach as isize;
        let offsets = (0..dimensions)
            .map(|_| -r..=r)
            .multi_cartesian_product()
            .map(|combination| {
                let mut offset = [0isize; 3];
                for (slot, value) in offset.iter_mut().zip(combination) {
                    *slot = value;
                }
                offset
            })
            .collect();

        Self {
            dimensions,
            reach,
            offsets,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn reach(&self) -> usize {
        self.reach
    }

    pub fn offsets(&self) -> &[[isize; 3]] {
        &self.offsets
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}
