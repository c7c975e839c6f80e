//! # Long-Range Pairs Module
//!
//! Connectivity between particles that is not derived from the current grid:
//! springs, bonds and persistent contacts.
//!
//! - [`list`] - `LongRangePairs` with stable pair ids, payload arrays and particle remapping
//! - [`hysteron`] - Two-threshold engage/disengage state attached to each pair
//! - [`io`] - CSV save/load preserving ids, payloads and contact state

pub mod hysteron;
pub mod io;
pub mod list;
