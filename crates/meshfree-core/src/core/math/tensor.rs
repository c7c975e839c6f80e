use nalgebra::{DMatrix, Vector3};
use std::fmt;
use std::ops::{Mul, Neg};
use thiserror::Error;

/// Largest square size accepted by `determinant` and `inverse`.
const MAX_DENSE_SOLVE_SIZE: usize = 3;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TensorError {
    #[error("Shape mismatch in '{op}': {lhs:?} vs {rhs:?}")]
    ShapeMismatch {
        op: &'static str,
        lhs: (usize, usize),
        rhs: (usize, usize),
    },
    #[error("Index {index} out of range for tensor with {numel} element(s)")]
    IndexOutOfRange { index: usize, numel: usize },
    #[error("Element ({row}, {col}) out of range for tensor of shape {shape:?}")]
    ElementOutOfRange {
        row: usize,
        col: usize,
        shape: (usize, usize),
    },
    #[error("Operation '{op}' requires scalar operands, found shape {shape:?}")]
    NotScalar {
        op: &'static str,
        shape: (usize, usize),
    },
    #[error("Operation '{op}' requires a square tensor, found shape {shape:?}")]
    NotSquare {
        op: &'static str,
        shape: (usize, usize),
    },
    #[error("Operation '{op}' is only supported up to {max}x{max}, found shape {shape:?}")]
    UnsupportedSize {
        op: &'static str,
        max: usize,
        shape: (usize, usize),
    },
    #[error("Matrix is singular and cannot be inverted")]
    Singular,
}

/// Comparison operators defined on scalar-shaped tensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    Equal,
    NotEqual,
}

/// A dynamically shaped numeric value: scalar, column vector or matrix.
///
/// `scalar` separates a pure scalar (which broadcasts against any shape) from a
/// 1x1 matrix. Both broadcast in binary arithmetic since they hold one element,
/// but only the pure scalar keeps its flag through an operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    data: DMatrix<f64>,
    scalar: bool,
}

impl Default for Tensor {
    fn default() -> Self {
        Self::scalar(0.0)
    }
}

impl From<f64> for Tensor {
    fn from(value: f64) -> Self {
        Self::scalar(value)
    }
}

impl Tensor {
    /// Creates a zero-filled tensor of the given shape.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::filled(rows, cols, 0.0)
    }

    pub fn filled(rows: usize, cols: usize, value: f64) -> Self {
        Self {
            data: DMatrix::from_element(rows, cols, value),
            scalar: false,
        }
    }

    pub fn scalar(value: f64) -> Self {
        Self {
            data: DMatrix::from_element(1, 1, value),
            scalar: true,
        }
    }

    /// Builds a tensor from row-major elements.
    pub fn from_row_slice(rows: usize, cols: usize, elements: &[f64]) -> Result<Self, TensorError> {
        if elements.len() != rows * cols {
            return Err(TensorError::ShapeMismatch {
                op: "from_row_slice",
                lhs: (rows, cols),
                rhs: (elements.len(), 1),
            });
        }
        Ok(Self {
            data: DMatrix::from_row_slice(rows, cols, elements),
            scalar: false,
        })
    }

    /// Builds a column vector.
    pub fn vector(components: &[f64]) -> Self {
        Self {
            data: DMatrix::from_column_slice(components.len(), 1, components),
            scalar: false,
        }
    }

    /// Column vector holding the first `dimensions` components of `v`.
    pub fn from_vector3(v: &Vector3<f64>, dimensions: usize) -> Self {
        Self::vector(&v.as_slice()[..dimensions.min(3)])
    }

    pub fn identity(n: usize) -> Self {
        Self {
            data: DMatrix::identity(n, n),
            scalar: false,
        }
    }

    pub fn from_matrix(data: DMatrix<f64>) -> Self {
        Self {
            data,
            scalar: false,
        }
    }

    /// A zero tensor with the same shape and scalar flag as `self`.
    pub fn zeros_like(&self) -> Self {
        Self {
            data: DMatrix::zeros(self.rows(), self.cols()),
            scalar: self.scalar,
        }
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.shape()
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    pub fn is_scalar(&self) -> bool {
        self.scalar
    }

    pub fn is_vector(&self) -> bool {
        !self.scalar && self.cols() == 1
    }

    pub fn as_matrix(&self) -> &DMatrix<f64> {
        &self.data
    }

    /// Whether `other` may be stored where `self` lives without changing shape.
    pub fn same_shape(&self, other: &Self) -> bool {
        self.shape() == other.shape()
    }

    /// The single element of a one-element tensor.
    pub fn value(&self) -> Result<f64, TensorError> {
        if self.numel() != 1 {
            return Err(TensorError::NotScalar {
                op: "value",
                shape: self.shape(),
            });
        }
        Ok(self.data[(0, 0)])
    }

    /// Reads an element by its row-major linear index.
    pub fn get(&self, index: usize) -> Result<f64, TensorError> {
        let (row, col) = self.split_index(index)?;
        Ok(self.data[(row, col)])
    }

    pub fn get_at(&self, row: usize, col: usize) -> Result<f64, TensorError> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(TensorError::ElementOutOfRange {
                row,
                col,
                shape: self.shape(),
            })
    }

    pub fn set(&mut self, index: usize, value: f64) -> Result<(), TensorError> {
        let (row, col) = self.split_index(index)?;
        self.data[(row, col)] = value;
        Ok(())
    }

    pub fn set_at(&mut self, row: usize, col: usize, value: f64) -> Result<(), TensorError> {
        let shape = self.shape();
        let slot = self
            .data
            .get_mut((row, col))
            .ok_or(TensorError::ElementOutOfRange { row, col, shape })?;
        *slot = value;
        Ok(())
    }

    /// Elements in row-major order.
    pub fn elements(&self) -> Vec<f64> {
        self.data.transpose().as_slice().to_vec()
    }

    /// Interprets the first three elements as a 3-vector, padding with zeros.
    pub fn to_vector3(&self) -> Vector3<f64> {
        let elements = self.elements();
        let mut v = Vector3::zeros();
        for (slot, value) in v.iter_mut().zip(elements) {
            *slot = value;
        }
        v
    }

    fn split_index(&self, index: usize) -> Result<(usize, usize), TensorError> {
        if index >= self.numel() {
            return Err(TensorError::IndexOutOfRange {
                index,
                numel: self.numel(),
            });
        }
        Ok((index / self.cols(), index % self.cols()))
    }

    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(f64) -> f64,
    {
        Self {
            data: self.data.map(f),
            scalar: self.scalar,
        }
    }

    /// Applies `f` element by element, broadcasting one-element operands.
    pub fn zip_broadcast<F>(&self, rhs: &Self, op: &'static str, f: F) -> Result<Self, TensorError>
    where
        F: Fn(f64, f64) -> f64,
    {
        if self.same_shape(rhs) {
            return Ok(Self {
                data: self.data.zip_map(&rhs.data, f),
                scalar: self.scalar && rhs.scalar,
            });
        }
        if rhs.numel() == 1 {
            let b = rhs.data[(0, 0)];
            return Ok(Self {
                data: self.data.map(|a| f(a, b)),
                scalar: self.scalar,
            });
        }
        if self.numel() == 1 {
            let a = self.data[(0, 0)];
            return Ok(Self {
                data: rhs.data.map(|b| f(a, b)),
                scalar: rhs.scalar,
            });
        }
        Err(TensorError::ShapeMismatch {
            op,
            lhs: self.shape(),
            rhs: rhs.shape(),
        })
    }

    pub fn try_add(&self, rhs: &Self) -> Result<Self, TensorError> {
        self.zip_broadcast(rhs, "+", |a, b| a + b)
    }

    pub fn try_sub(&self, rhs: &Self) -> Result<Self, TensorError> {
        self.zip_broadcast(rhs, "-", |a, b| a - b)
    }

    /// Matrix product, or scaling when either operand holds one element.
    pub fn try_mul(&self, rhs: &Self) -> Result<Self, TensorError> {
        if self.numel() == 1 || rhs.numel() == 1 {
            return self.zip_broadcast(rhs, "*", |a, b| a * b);
        }
        if self.cols() != rhs.rows() {
            return Err(TensorError::ShapeMismatch {
                op: "*",
                lhs: self.shape(),
                rhs: rhs.shape(),
            });
        }
        Ok(Self::from_matrix(&self.data * &rhs.data))
    }

    pub fn try_div(&self, rhs: &Self) -> Result<Self, TensorError> {
        self.zip_broadcast(rhs, "/", |a, b| a / b)
    }

    pub fn try_pow(&self, rhs: &Self) -> Result<Self, TensorError> {
        self.zip_broadcast(rhs, "^", f64::powf)
    }

    pub fn term_product(&self, rhs: &Self) -> Result<Self, TensorError> {
        self.zip_broadcast(rhs, "termprod", |a, b| a * b)
    }

    pub fn term_min(&self, rhs: &Self) -> Result<Self, TensorError> {
        self.zip_broadcast(rhs, "min", f64::min)
    }

    pub fn term_max(&self, rhs: &Self) -> Result<Self, TensorError> {
        self.zip_broadcast(rhs, "max", f64::max)
    }

    pub fn term_mod(&self, rhs: &Self) -> Result<Self, TensorError> {
        self.zip_broadcast(rhs, "mod", |a, b| a % b)
    }

    pub fn term_atan2(&self, rhs: &Self) -> Result<Self, TensorError> {
        self.zip_broadcast(rhs, "atan2", f64::atan2)
    }

    fn scalar_pair(&self, rhs: &Self, op: &'static str) -> Result<(f64, f64), TensorError> {
        for t in [self, rhs] {
            if t.numel() != 1 {
                return Err(TensorError::NotScalar {
                    op,
                    shape: t.shape(),
                });
            }
        }
        Ok((self.data[(0, 0)], rhs.data[(0, 0)]))
    }

    fn boolean(flag: bool) -> Self {
        Self::scalar(if flag { 1.0 } else { 0.0 })
    }

    pub fn compare(&self, rhs: &Self, comparison: Comparison) -> Result<Self, TensorError> {
        let (a, b) = self.scalar_pair(rhs, "compare")?;
        let flag = match comparison {
            Comparison::Less => a < b,
            Comparison::Greater => a > b,
            Comparison::LessEqual => a <= b,
            Comparison::GreaterEqual => a >= b,
            Comparison::Equal => a == b,
            Comparison::NotEqual => a != b,
        };
        Ok(Self::boolean(flag))
    }

    pub fn and(&self, rhs: &Self) -> Result<Self, TensorError> {
        let (a, b) = self.scalar_pair(rhs, "&&")?;
        Ok(Self::boolean(a != 0.0 && b != 0.0))
    }

    pub fn or(&self, rhs: &Self) -> Result<Self, TensorError> {
        let (a, b) = self.scalar_pair(rhs, "||")?;
        Ok(Self::boolean(a != 0.0 || b != 0.0))
    }

    pub fn not(&self) -> Result<Self, TensorError> {
        let a = self.truthy_value("!")?;
        Ok(Self::boolean(!a))
    }

    /// Interprets a one-element tensor as a boolean (non-zero is true).
    pub fn is_truthy(&self) -> Result<bool, TensorError> {
        self.truthy_value("condition")
    }

    fn truthy_value(&self, op: &'static str) -> Result<bool, TensorError> {
        if self.numel() != 1 {
            return Err(TensorError::NotScalar {
                op,
                shape: self.shape(),
            });
        }
        Ok(self.data[(0, 0)] != 0.0)
    }

    pub fn transpose(&self) -> Self {
        Self {
            data: self.data.transpose(),
            scalar: self.scalar,
        }
    }

    fn require_square(&self, op: &'static str) -> Result<(), TensorError> {
        if self.rows() != self.cols() {
            return Err(TensorError::NotSquare {
                op,
                shape: self.shape(),
            });
        }
        Ok(())
    }

    fn require_small_square(&self, op: &'static str) -> Result<(), TensorError> {
        self.require_square(op)?;
        if self.rows() > MAX_DENSE_SOLVE_SIZE {
            return Err(TensorError::UnsupportedSize {
                op,
                max: MAX_DENSE_SOLVE_SIZE,
                shape: self.shape(),
            });
        }
        Ok(())
    }

    pub fn trace(&self) -> Result<Self, TensorError> {
        self.require_square("trace")?;
        Ok(Self::scalar(self.data.trace()))
    }

    pub fn determinant(&self) -> Result<Self, TensorError> {
        self.require_small_square("det")?;
        Ok(Self::scalar(self.data.determinant()))
    }

    pub fn inverse(&self) -> Result<Self, TensorError> {
        self.require_small_square("inv")?;
        let inverse = self.data.clone().try_inverse().ok_or(TensorError::Singular)?;
        Ok(Self {
            data: inverse,
            scalar: self.scalar,
        })
    }

    /// Euclidean (Frobenius) norm.
    pub fn norm(&self) -> f64 {
        self.data.norm()
    }

    /// Element-wise comparison within an absolute tolerance.
    pub fn approx_eq(&self, other: &Self, tolerance: f64) -> bool {
        self.same_shape(other)
            && self
                .data
                .iter()
                .zip(other.data.iter())
                .all(|(a, b)| (a - b).abs() <= tolerance)
    }
}

impl Neg for Tensor {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self {
            data: -self.data,
            scalar: self.scalar,
        }
    }
}

impl Neg for &Tensor {
    type Output = Tensor;

    fn neg(self) -> Self::Output {
        -self.clone()
    }
}

impl Mul<f64> for Tensor {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self::Output {
        Self {
            data: self.data * rhs,
            scalar: self.scalar,
        }
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scalar {
            return write!(f, "{}", self.data[(0, 0)]);
        }
        write!(f, "[")?;
        for (r, row) in self.data.row_iter().enumerate() {
            if r > 0 {
                write!(f, ", ")?;
            }
            write!(f, "[")?;
            for (c, value) in row.iter().enumerate() {
                if c > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", value)?;
            }
            write!(f, "]")?;
        }
        write!(f, "]")
    }
}
