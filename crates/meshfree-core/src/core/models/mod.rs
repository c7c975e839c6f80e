//! # Core Models Module
//!
//! Data structures that hold the simulation state evaluated by expression trees.
//!
//! ## Key Components
//!
//! - [`domain`] - Grid extent, cell size and per-axis boundary treatment
//! - [`field`] - Per-particle tensor arrays with optional previous-step storage
//! - [`variable`] - Single mutable tensors shared by every particle
//! - [`particles`] - Particle positions together with their spatial hash grid
//! - [`workspace`] - The arena owning every symbol, addressed by stable handles
//! - [`ids`] - Handle types for particle systems, fields, variables and pair lists
//!
//! ## Usage
//!
//! ```ignore
//! use meshfree::core::models::{domain::Domain, workspace::Workspace};
//!
//! let mut workspace = Workspace::new();
//! let domain = Domain::new(&[0.0, 0.0], &[1.0, 1.0], &[0.1], &[])?;
//! let fluid = workspace.add_particle_system("fluid", domain, positions)?;
//! let density = workspace.add_field("rho", fluid, Tensor::scalar(1000.0))?;
//! ```

pub mod domain;
pub mod field;
pub mod ids;
pub mod particles;
pub mod variable;
pub mod workspace;
