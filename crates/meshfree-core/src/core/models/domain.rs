use crate::core::math::tensor::Tensor;
use nalgebra::{Point3, Vector3};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    #[error("Domain dimensionality must be between 1 and 3, found {0}")]
    Dimensionality(usize),
    #[error("Domain bound '{name}' has {found} component(s), expected {expected}")]
    ComponentCount {
        name: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Domain minimum must be below maximum on axis {axis} ({minimum} >= {maximum})")]
    InvertedBounds {
        axis: usize,
        minimum: f64,
        maximum: f64,
    },
    #[error("Cell size on axis {axis} must be positive and finite, found {value}")]
    InvalidCellSize { axis: usize, value: f64 },
}

/// How the grid treats neighbor cells that fall outside the domain on an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Boundary {
    /// Cells beyond the boundary are dropped.
    #[default]
    Open,
    /// Cells wrap around to the opposite side.
    Periodic,
    /// Cells are reflected about the boundary plane (ghost images).
    Mirror,
}

/// The rectangular region covered by a particle system's hash grid.
///
/// Unused axes (beyond `dimensions`) are pinned to a single cell so that
/// every per-axis loop can run over three axes.
#[derive(Debug, Clone, PartialEq)]
pub struct Domain {
    dimensions: usize,
    minimum: Vector3<f64>,
    maximum: Vector3<f64>,
    cell_size: Vector3<f64>,
    boundaries: [Boundary; 3],
    cell_counts: [usize; 3],
}

impl Domain {
    /// Creates a validated domain.
    ///
    /// `cell_size` may hold a single value applied to every axis. On periodic and
    /// mirror axes the cell size is enlarged so that a whole number of cells tiles
    /// the axis exactly, which keeps wrapped and reflected cells aligned with the
    /// boundary. On open axes the last cell may extend past the maximum.
    pub fn new(
        minimum: &[f64],
        maximum: &[f64],
        cell_size: &[f64],
        boundaries: &[Boundary],
    ) -> Result<Self, DomainError> {
        let dimensions = minimum.len();
        if !(1..=3).contains(&dimensions) {
            return Err(DomainError::Dimensionality(dimensions));
        }
        check_components("maximum", maximum.len(), dimensions)?;
        if cell_size.len() != 1 {
            check_components("cell-size", cell_size.len(), dimensions)?;
        }
        if !boundaries.is_empty() {
            check_components("boundaries", boundaries.len(), dimensions)?;
        }

        let mut domain = Self {
            dimensions,
            minimum: Vector3::zeros(),
            maximum: Vector3::repeat(1.0),
            cell_size: Vector3::repeat(1.0),
            boundaries: [Boundary::Open; 3],
            cell_counts: [1; 3],
        };

        for axis in 0..dimensions {
            let (lo, hi) = (minimum[axis], maximum[axis]);
            if !(lo < hi) {
                return Err(DomainError::InvertedBounds {
                    axis,
                    minimum: lo,
                    maximum: hi,
                });
            }
            let requested = if cell_size.len() == 1 {
                cell_size[0]
            } else {
                cell_size[axis]
            };
            if !(requested > 0.0 && requested.is_finite()) {
                return Err(DomainError::InvalidCellSize {
                    axis,
                    value: requested,
                });
            }
            let boundary = boundaries.get(axis).copied().unwrap_or_default();
            let length = hi - lo;

            let (count, size) = match boundary {
                Boundary::Periodic | Boundary::Mirror => {
                    let count = ((length / requested).floor() as usize).max(1);
                    (count, length / count as f64)
                }
                Boundary::Open => (((length / requested).ceil() as usize).max(1), requested),
            };

            domain.minimum[axis] = lo;
            domain.maximum[axis] = hi;
            domain.cell_size[axis] = size;
            domain.boundaries[axis] = boundary;
            domain.cell_counts[axis] = count;
        }

        Ok(domain)
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn minimum(&self) -> &Vector3<f64> {
        &self.minimum
    }

    pub fn maximum(&self) -> &Vector3<f64> {
        &self.maximum
    }

    pub fn cell_size(&self) -> &Vector3<f64> {
        &self.cell_size
    }

    /// The effective cell size as a tensor of the domain's dimensionality.
    pub fn cell_size_tensor(&self) -> Tensor {
        Tensor::from_vector3(&self.cell_size, self.dimensions)
    }

    /// The smallest cell edge over the active axes.
    pub fn min_cell_size(&self) -> f64 {
        (0..self.dimensions)
            .map(|axis| self.cell_size[axis])
            .fold(f64::INFINITY, f64::min)
    }

    pub fn length(&self, axis: usize) -> f64 {
        self.maximum[axis] - self.minimum[axis]
    }

    pub fn boundary(&self, axis: usize) -> Boundary {
        self.boundaries[axis]
    }

    pub fn boundaries(&self) -> &[Boundary] {
        &self.boundaries[..self.dimensions]
    }

    /// Bit `a` is set when axis `a` is periodic.
    pub fn periodic_mask(&self) -> u8 {
        (0..self.dimensions)
            .filter(|&axis| self.boundaries[axis] == Boundary::Periodic)
            .fold(0, |mask, axis| mask | (1 << axis))
    }

    pub fn cell_counts(&self) -> [usize; 3] {
        self.cell_counts
    }

    pub fn total_cells(&self) -> usize {
        self.cell_counts.iter().product()
    }

    /// Integer cell coordinate of `x` on `axis`: wrapped on periodic axes,
    /// clamped into the grid otherwise.
    pub fn cell_coordinate(&self, axis: usize, x: f64) -> usize {
        let n = self.cell_counts[axis];
        if axis >= self.dimensions {
            return 0;
        }
        let raw = ((x - self.minimum[axis]) / self.cell_size[axis]).floor();
        match self.boundaries[axis] {
            Boundary::Periodic => {
                let wrapped = (raw as i64).rem_euclid(n as i64);
                wrapped as usize
            }
            Boundary::Open | Boundary::Mirror => raw.clamp(0.0, (n - 1) as f64) as usize,
        }
    }

    pub fn cell_of(&self, position: &Point3<f64>) -> [usize; 3] {
        [
            self.cell_coordinate(0, position.x),
            self.cell_coordinate(1, position.y),
            self.cell_coordinate(2, position.z),
        ]
    }

    /// Flattens a cell coordinate with row-major strides (x varies fastest).
    pub fn flatten(&self, cell: [usize; 3]) -> usize {
        let [nx, ny, _] = self.cell_counts;
        (cell[2] * ny + cell[1]) * nx + cell[0]
    }

    pub fn hash(&self, position: &Point3<f64>) -> usize {
        self.flatten(self.cell_of(position))
    }

    /// Applies the minimum-image convention to a displacement on periodic axes.
    pub fn minimum_image(&self, mut delta: Vector3<f64>) -> Vector3<f64> {
        for axis in 0..self.dimensions {
            if self.boundaries[axis] == Boundary::Periodic {
                let length = self.length(axis);
                delta[axis] -= length * (delta[axis] / length).round();
            }
        }
        delta
    }

    /// Displacement `a - b`, respecting periodic axes.
    pub fn displacement(&self, a: &Point3<f64>, b: &Point3<f64>) -> Vector3<f64> {
        self.minimum_image(a - b)
    }

    /// Maps a position on a periodic axis back into the primary domain.
    pub fn wrap_position(&self, position: &mut Point3<f64>) {
        for axis in 0..self.dimensions {
            if self.boundaries[axis] == Boundary::Periodic {
                let length = self.length(axis);
                let offset = (position[axis] - self.minimum[axis]).rem_euclid(length);
                position[axis] = self.minimum[axis] + offset;
            }
        }
    }
}

fn check_components(name: &'static str, found: usize, expected: usize) -> Result<(), DomainError> {
    if found != expected {
        return Err(DomainError::ComponentCount {
            name,
            expected,
            found,
        });
    }
    Ok(())
}

/// Either one cell edge for every axis or one per axis.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CellSizeConfig {
    Uniform(f64),
    PerAxis(Vec<f64>),
}

/// Serializable description of a domain, as found in scenario files.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct DomainConfig {
    pub minimum: Vec<f64>,
    pub maximum: Vec<f64>,
    pub cell_size: CellSizeConfig,
    #[serde(default)]
    pub boundaries: Vec<Boundary>,
}

impl TryFrom<DomainConfig> for Domain {
    type Error = DomainError;

    fn try_from(config: DomainConfig) -> Result<Self, Self::Error> {
        let cell_size = match config.cell_size {
            CellSizeConfig::Uniform(size) => vec![size],
            CellSizeConfig::PerAxis(sizes) => sizes,
        };
        Domain::new(
            &config.minimum,
            &config.maximum,
            &cell_size,
            &config.boundaries,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(boundary: Boundary) -> Domain {
        Domain::new(&[0.0, 0.0], &[10.0, 10.0], &[1.0], &[boundary, boundary]).unwrap()
    }

    #[test]
    fn new_rejects_inverted_bounds_and_bad_cells() {
        assert!(matches!(
            Domain::new(&[1.0], &[0.0], &[0.1], &[]),
            Err(DomainError::InvertedBounds { axis: 0, .. })
        ));
        assert!(matches!(
            Domain::new(&[0.0], &[1.0], &[0.0], &[]),
            Err(DomainError::InvalidCellSize { .. })
        ));
        assert!(matches!(
            Domain::new(&[0.0; 4], &[1.0; 4], &[0.1], &[]),
            Err(DomainError::Dimensionality(4))
        ));
        assert!(matches!(
            Domain::new(&[0.0, 0.0], &[1.0], &[0.1], &[]),
            Err(DomainError::ComponentCount { name: "maximum", .. })
        ));
    }

    #[test]
    fn cell_counts_cover_the_domain() {
        let domain = Domain::new(&[0.0, 0.0], &[10.0, 4.5], &[1.0], &[]).unwrap();
        assert_eq!(domain.cell_counts(), [10, 5, 1]);
        assert_eq!(domain.total_cells(), 50);
    }

    #[test]
    fn periodic_axes_tile_the_period_exactly() {
        let domain = Domain::new(&[0.0], &[10.0], &[3.0], &[Boundary::Periodic]).unwrap();
        assert_eq!(domain.cell_counts()[0], 3);
        assert!((domain.cell_size()[0] - 10.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn mirror_axes_end_exactly_on_the_wall() {
        let domain = Domain::new(
            &[0.0, 0.0],
            &[9.5, 9.5],
            &[1.0],
            &[Boundary::Mirror, Boundary::Open],
        )
        .unwrap();
        assert_eq!(domain.cell_counts()[0], 9);
        let edge = domain.cell_size()[0] * domain.cell_counts()[0] as f64;
        assert!((edge - 9.5).abs() < 1e-12);
        assert_eq!(domain.cell_counts()[1], 10);
        assert_eq!(domain.cell_size()[1], 1.0);
    }

    #[test]
    fn cell_coordinates_wrap_or_clamp() {
        let periodic = square(Boundary::Periodic);
        assert_eq!(periodic.cell_coordinate(0, -0.5), 9);
        assert_eq!(periodic.cell_coordinate(0, 10.2), 0);

        let open = square(Boundary::Open);
        assert_eq!(open.cell_coordinate(0, -0.5), 0);
        assert_eq!(open.cell_coordinate(0, 12.0), 9);
    }

    #[test]
    fn hash_uses_row_major_strides() {
        let domain = square(Boundary::Open);
        assert_eq!(domain.hash(&Point3::new(3.5, 2.5, 0.0)), 2 * 10 + 3);
    }

    #[test]
    fn minimum_image_only_applies_to_periodic_axes() {
        let delta = Vector3::new(-9.8, 0.0, 0.0);
        assert!((square(Boundary::Periodic).minimum_image(delta).x - 0.2).abs() < 1e-12);
        assert_eq!(square(Boundary::Open).minimum_image(delta).x, -9.8);
    }

    #[test]
    fn periodic_mask_sets_one_bit_per_periodic_axis() {
        let domain = Domain::new(
            &[0.0, 0.0, 0.0],
            &[1.0, 1.0, 1.0],
            &[0.1],
            &[Boundary::Periodic, Boundary::Open, Boundary::Periodic],
        )
        .unwrap();
        assert_eq!(domain.periodic_mask(), 0b101);
    }

    #[test]
    fn domain_config_deserializes_from_toml() {
        let config: DomainConfig = toml::from_str(
            r#"
            minimum = [0.0, 0.0]
            maximum = [10.0, 10.0]
            cell-size = 1.0
            boundaries = ["periodic", "mirror"]
            "#,
        )
        .unwrap();
        let domain = Domain::try_from(config).unwrap();
        assert_eq!(domain.boundaries(), &[Boundary::Periodic, Boundary::Mirror]);
        assert_eq!(domain.dimensions(), 2);
    }
}
