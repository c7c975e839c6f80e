//! Per-step passes built on the solver and the pairwise interaction protocol.
//!
//! Each submodule exposes a `run` function that takes the workspace and a
//! progress reporter and returns a small report of what it did.

pub mod contacts;
pub mod neighbors;
