//! # meshfree Core Library
//!
//! The interaction evaluation engine of a meshless particle simulator (SPH, DEM,
//! N-body and related methods). Governing equations are represented as expression
//! trees that are evaluated once per particle per step; interaction nodes pull values
//! from spatially nearby particles through a uniform hash grid.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer architecture:
//!
//! - **[`core`]: The Foundation.** The `Tensor` value type, the workspace arena of
//!   particle systems, fields and variables, the spatial hash grid, the expression
//!   tree with its operator and interaction catalogues, and long-range pair lists.
//!
//! - **[`engine`]: The Logic Core.** Stateful orchestration: equations, the solver
//!   with its persistent worker pool, configuration, progress reporting and the
//!   neighbor/contact tasks.
//!
//! - **[`workflows`]: The Public API.** Complete procedures (neighbor census, contact
//!   refresh) that tie the engine and core together behind a single entry point.

pub mod core;
pub mod engine;
pub mod workflows;
