//! # Core Module
//!
//! Fundamental building blocks of the interaction evaluation engine.
//!
//! ## Architecture
//!
//! - **Numerics** ([`math`]) - The dynamically shaped `Tensor` flowing through every evaluation
//! - **Data Models** ([`models`]) - Domain, fields, variables, particle systems and the workspace arena
//! - **Spatial Hashing** ([`space`]) - Uniform grid, neighbor stencils and wrap guides
//! - **Expression Trees** ([`expr`]) - Evaluable nodes, operator and interaction catalogues
//! - **Connectivity** ([`pairs`]) - Long-range pair lists, hysteresis and CSV round-tripping

pub mod expr;
pub mod math;
pub mod models;
pub mod pairs;
pub mod space;
