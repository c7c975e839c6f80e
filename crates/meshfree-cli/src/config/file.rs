use crate::error::{CliError, Result};
use meshfree::core::models::domain::DomainConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileParticle {
    pub position: Vec<f64>,
    pub diameter: Option<f64>,
}

/// Particles on a regular lattice filling the domain, one per `spacing`.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileLattice {
    pub spacing: f64,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileSolverConfig {
    pub threads: Option<usize>,
    pub chunk_size: Option<usize>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileNeighborConfig {
    pub radius: Option<f64>,
    pub verify: Option<bool>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileContactConfig {
    pub alpha: Option<f64>,
    pub beta: Option<f64>,
    /// Uniform diameter for particles that do not carry their own.
    pub diameter: Option<f64>,
    pub pairs_name: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub domain: DomainConfig,
    #[serde(default)]
    pub particles: Vec<FileParticle>,
    /// CSV file with `x[,y[,z]][,diameter]` columns, relative to the scenario file.
    pub particles_csv: Option<PathBuf>,
    pub lattice: Option<FileLattice>,
    pub solver: Option<FileSolverConfig>,
    pub neighbors: Option<FileNeighborConfig>,
    pub contacts: Option<FileContactConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading scenario from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        if let (Some(csv), Some(dir)) = (config.particles_csv.as_mut(), path.parent()) {
            if csv.is_relative() {
                *csv = dir.join(&*csv);
            }
        }
        Ok(config)
    }
}
