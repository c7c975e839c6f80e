//! # Workflows Module
//!
//! High-level entry points that run a complete procedure on a populated
//! [`Workspace`](crate::core::models::workspace::Workspace).
//!
//! ## Overview
//!
//! A workflow sets up the engine (worker pool, temporary fields, pair lists),
//! rebuilds whatever spatial state it needs, runs one or more tasks and reports
//! its phases through a [`ProgressReporter`](crate::engine::progress::ProgressReporter).
//!
//! - **Neighbor Census** ([`neighbors`]) - Per-particle neighbor counts, optionally
//!   checked against an all-pairs scan
//! - **Contact Refresh** ([`contacts`]) - Spatial reordering followed by hysteretic
//!   contact formation and loss

pub mod contacts;
pub mod neighbors;
