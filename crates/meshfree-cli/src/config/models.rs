use meshfree::core::models::domain::Domain;
use meshfree::engine::config::{ContactConfig, NeighborConfig, SolverConfig};
use nalgebra::Point3;

/// Everything a command needs, merged from the scenario file, `--set`
/// overrides, command-line flags and defaults.
pub struct AppConfig {
    pub domain: Domain,
    pub positions: Vec<Point3<f64>>,
    /// Per-particle diameters; particles without one use `contacts.diameter`.
    pub diameters: Vec<Option<f64>>,
    pub solver: SolverConfig,
    pub neighbors: NeighborConfig,
    pub contacts: ContactConfig,
    pub diameter: f64,
}
