//! # Spatial Hashing Module
//!
//! Uniform-grid spatial hash answering "which particles lie near particle i" in
//! amortized constant time per neighbor.
//!
//! - [`grid`] - The `ParticleSpace` bucket structure and the neighbor query protocol
//! - [`stencil`] - Precomputed neighbor-cell offset blocks
//! - [`guide`] - Per-axis record of periodic and mirror wraps applied to a neighbor

pub mod grid;
pub mod guide;
pub mod stencil;
