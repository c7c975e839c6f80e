//! # Expression Module
//!
//! Expression trees evaluated once per particle per step.
//!
//! ## Key Components
//!
//! - [`node`] - The `Expression` node type: constants, symbol leaves, operators and interactions
//! - [`operator`] - The closed operator and function catalogue with arity checks
//! - [`interaction`] - Pairwise interactions folded over grid neighbors or pair lists
//! - [`kernels`] - SPH smoothing kernels
//! - [`display`] - Infix rendering against a workspace
//! - [`error`] - `EvalError`, raised at construction and evaluation time

pub mod display;
pub mod error;
pub mod interaction;
pub mod kernels;
pub mod node;
pub mod operator;
