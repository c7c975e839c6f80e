//! # Engine Module
//!
//! The stateful layer of the interaction evaluation engine. It couples expression trees
//! to the symbols they update, runs those updates on a persistent worker pool, and hosts
//! the per-step tasks that maintain neighbor statistics and contact connectivity.
//!
//! ## Overview
//!
//! Everything in [`crate::core`] is evaluated one particle at a time. The engine turns
//! that into whole-system operations: an [`equation::Equation`] names a target symbol,
//! a right-hand side and an optional condition, and the [`solver::Solver`] partitions the
//! particle range into contiguous slices that are evaluated concurrently against an
//! immutable view of the workspace before any value is committed.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Solver thread count, slicing policy and contact thresholds
//! - **Equations** ([`equation`]) - Target resolution, size checks, conditional assignment
//! - **Solver** ([`solver`]) - The worker pool and the evaluate-then-commit barrier
//! - **Tasks** ([`tasks`]) - Neighbor census and contact refresh passes
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress events
//! - **Error Handling** ([`error`]) - `EngineError`, aggregating every lower-level error
//!
//! ## Key Capabilities
//!
//! - **Deterministic parallel assignment**: results do not depend on the number of threads
//! - **Broadcast right-hand sides**: a particle-independent value is assigned to every slot
//! - **Conditional updates** through a boolean condition expression per equation
//! - **Hysteretic contact tracking** built on long-range pair lists

pub mod config;
pub mod equation;
pub mod error;
pub mod progress;
pub mod solver;
pub mod tasks;
