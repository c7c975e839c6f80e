use super::defaults::DefaultsConfig;
use super::file::{FileConfig, FileLattice, FileParticle};
use super::models::AppConfig;
use crate::error::{CliError, Result};
use meshfree::core::models::domain::Domain;
use meshfree::engine::config::{
    ChunkPolicy, ContactConfigBuilder, NeighborConfig, SolverConfig, SolverConfigBuilder,
};
use nalgebra::Point3;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// Command-line values that take precedence over the scenario file.
#[derive(Debug, Default, Clone)]
pub struct Overrides<'a> {
    pub threads: Option<usize>,
    pub radius: Option<f64>,
    pub verify: bool,
    pub set_values: &'a [String],
}

pub fn build_config(config_path: &Path, overrides: &Overrides) -> Result<AppConfig> {
    let file_config = FileConfig::from_file(config_path)?;
    build_from_file(file_config, overrides)
}

pub fn build_from_file(file_config: FileConfig, overrides: &Overrides) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();
    let mut file_config = apply_set_values(file_config, overrides.set_values)?;

    let domain = Domain::try_from(file_config.domain.clone())
        .map_err(|e| CliError::Config(e.to_string()))?;
    let (positions, diameters) = load_particles(&file_config, &domain)?;
    info!(particles = positions.len(), "Loaded particles.");

    let solver_file = file_config.solver.take().unwrap_or_default();
    let solver = {
        let threads = overrides
            .threads
            .or(solver_file.threads)
            .unwrap_or_else(|| SolverConfig::default().num_threads);
        let policy = solver_file
            .chunk_size
            .map_or(ChunkPolicy::PerThread, ChunkPolicy::Fixed);
        SolverConfigBuilder::new()
            .num_threads(threads)
            .chunk_policy(policy)
            .build()
            .map_err(|e| CliError::Config(e.to_string()))?
    };

    let neighbor_file = file_config.neighbors.take().unwrap_or_default();
    let neighbors = NeighborConfig::new(
        overrides
            .radius
            .or(neighbor_file.radius)
            .unwrap_or(defaults.radius),
        overrides.verify || neighbor_file.verify.unwrap_or(defaults.verify),
    )
    .map_err(|e| CliError::Config(e.to_string()))?;

    let contact_file = file_config.contacts.take().unwrap_or_default();
    let diameter = contact_file.diameter.unwrap_or(defaults.diameter);
    if !(diameter.is_finite() && diameter > 0.0) {
        return Err(CliError::Config(format!(
            "contacts.diameter must be positive, got {diameter}"
        )));
    }
    let contacts = ContactConfigBuilder::new()
        .alpha(contact_file.alpha.unwrap_or(defaults.alpha))
        .beta(contact_file.beta.unwrap_or(defaults.beta))
        .pairs_name(contact_file.pairs_name.unwrap_or(defaults.pairs_name))
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    debug!(?solver, ?neighbors, ?contacts, "Scenario configuration merged.");
    Ok(AppConfig {
        domain,
        positions,
        diameters,
        solver,
        neighbors,
        contacts,
        diameter,
    })
}

type Particles = (Vec<Point3<f64>>, Vec<Option<f64>>);

fn load_particles(config: &FileConfig, domain: &Domain) -> Result<Particles> {
    let sources = [
        !config.particles.is_empty(),
        config.particles_csv.is_some(),
        config.lattice.is_some(),
    ];
    match sources.iter().filter(|&&given| given).count() {
        1 => {}
        0 => {
            return Err(CliError::Config(
                "the scenario defines no particles: use [[particles]], particles-csv or [lattice]"
                    .to_string(),
            ));
        }
        _ => {
            return Err(CliError::Config(
                "[[particles]], particles-csv and [lattice] are mutually exclusive".to_string(),
            ));
        }
    }

    if let Some(path) = &config.particles_csv {
        return read_particles_csv(path, domain.dimensions());
    }
    if let Some(lattice) = &config.lattice {
        return lattice_particles(lattice, domain);
    }
    inline_particles(&config.particles, domain.dimensions())
}

fn to_point(coordinates: &[f64], dimensions: usize) -> Result<Point3<f64>> {
    if coordinates.len() != dimensions {
        return Err(CliError::Config(format!(
            "particle position {coordinates:?} has {} component(s), the domain has {dimensions}",
            coordinates.len()
        )));
    }
    let mut point = Point3::origin();
    for (axis, &x) in coordinates.iter().enumerate() {
        point[axis] = x;
    }
    Ok(point)
}

fn inline_particles(particles: &[FileParticle], dimensions: usize) -> Result<Particles> {
    let positions = particles
        .iter()
        .map(|p| to_point(&p.position, dimensions))
        .collect::<Result<Vec<_>>>()?;
    let diameters = particles.iter().map(|p| p.diameter).collect();
    Ok((positions, diameters))
}

#[derive(Deserialize)]
struct ParticleRecord {
    x: f64,
    y: Option<f64>,
    z: Option<f64>,
    diameter: Option<f64>,
}

fn read_particles_csv(path: &Path, dimensions: usize) -> Result<Particles> {
    let parse_error = |e: csv::Error| CliError::FileParsing {
        path: path.to_path_buf(),
        source: e.into(),
    };
    let mut reader = csv::Reader::from_path(path).map_err(parse_error)?;
    let mut positions = Vec::new();
    let mut diameters = Vec::new();
    for record in reader.deserialize::<ParticleRecord>() {
        let record = record.map_err(parse_error)?;
        let coordinates: Vec<f64> = [Some(record.x), record.y, record.z]
            .into_iter()
            .flatten()
            .collect();
        positions.push(to_point(&coordinates, dimensions)?);
        diameters.push(record.diameter);
    }
    Ok((positions, diameters))
}

fn lattice_particles(lattice: &FileLattice, domain: &Domain) -> Result<Particles> {
    if !(lattice.spacing.is_finite() && lattice.spacing > 0.0) {
        return Err(CliError::Config(format!(
            "lattice.spacing must be positive, got {}",
            lattice.spacing
        )));
    }
    let dims = domain.dimensions();
    let mut counts = [1usize; 3];
    for (axis, count) in counts.iter_mut().enumerate().take(dims) {
        *count = (domain.length(axis) / lattice.spacing).floor().max(1.0) as usize;
    }
    let total = counts.iter().product::<usize>();
    let positions: Vec<_> = (0..total)
        .map(|k| {
            let index = [k % counts[0], (k / counts[0]) % counts[1], k / (counts[0] * counts[1])];
            let mut point = Point3::origin();
            for axis in 0..dims {
                point[axis] =
                    domain.minimum()[axis] + (index[axis] as f64 + 0.5) * lattice.spacing;
            }
            point
        })
        .collect();
    let diameters = vec![None; positions.len()];
    Ok((positions, diameters))
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str, kind: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid {kind} value for {key}: {value}")))
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let Some((key, value_str)) = kv_pair.split_once('=') else {
            return Err(CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            )));
        };

        match key {
            "solver.threads" => {
                config.solver.get_or_insert_with(Default::default).threads =
                    Some(parse_value(key, value_str, "integer")?);
            }
            "solver.chunk-size" => {
                config.solver.get_or_insert_with(Default::default).chunk_size =
                    Some(parse_value(key, value_str, "integer")?);
            }
            "neighbors.radius" => {
                config.neighbors.get_or_insert_with(Default::default).radius =
                    Some(parse_value(key, value_str, "float")?);
            }
            "neighbors.verify" => {
                config.neighbors.get_or_insert_with(Default::default).verify =
                    Some(parse_value(key, value_str, "boolean")?);
            }
            "contacts.alpha" => {
                config.contacts.get_or_insert_with(Default::default).alpha =
                    Some(parse_value(key, value_str, "float")?);
            }
            "contacts.beta" => {
                config.contacts.get_or_insert_with(Default::default).beta =
                    Some(parse_value(key, value_str, "float")?);
            }
            "contacts.diameter" => {
                config.contacts.get_or_insert_with(Default::default).diameter =
                    Some(parse_value(key, value_str, "float")?);
            }
            "contacts.pairs-name" => {
                config.contacts.get_or_insert_with(Default::default).pairs_name =
                    Some(value_str.to_string());
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unknown configuration key for --set: {}",
                    key
                )));
            }
        }
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::file::FileNeighborConfig;
    use std::fs;
    use tempfile::tempdir;

    fn file_config(extra: &str) -> FileConfig {
        toml::from_str(&format!(
            "{extra}\n[domain]\nminimum = [0.0, 0.0]\nmaximum = [4.0, 2.0]\ncell-size = 1.0\n"
        ))
        .unwrap()
    }

    fn lattice_config() -> FileConfig {
        file_config("lattice = { spacing = 1.0 }")
    }

    #[test]
    fn defaults_fill_missing_sections() {
        let app = build_from_file(lattice_config(), &Overrides::default()).unwrap();
        assert_eq!(app.positions.len(), 8);
        assert_eq!(app.positions[0], Point3::new(0.5, 0.5, 0.0));
        assert_eq!(app.neighbors.radius, 1.0);
        assert!(!app.neighbors.verify);
        assert_eq!(app.contacts.pairs_name, "contacts");
        assert_eq!(app.diameter, 1.0);
        assert!(app.solver.num_threads >= 1);
    }

    #[test]
    fn command_line_beats_set_values_beats_file() {
        let mut config = lattice_config();
        config.neighbors = Some(FileNeighborConfig {
            radius: Some(0.3),
            verify: None,
        });
        let set_values = vec!["neighbors.radius=0.4".to_string(), "solver.threads=3".to_string()];
        let overrides = Overrides {
            set_values: &set_values,
            ..Default::default()
        };
        let app = build_from_file(config.clone(), &overrides).unwrap();
        assert_eq!(app.neighbors.radius, 0.4);
        assert_eq!(app.solver.num_threads, 3);

        let overrides = Overrides {
            threads: Some(5),
            radius: Some(0.7),
            verify: true,
            set_values: &set_values,
        };
        let app = build_from_file(config, &overrides).unwrap();
        assert_eq!(app.neighbors.radius, 0.7);
        assert_eq!(app.solver.num_threads, 5);
        assert!(app.neighbors.verify);
    }

    #[test]
    fn bad_set_values_are_rejected() {
        for bad in ["neighbors.radius", "contacts.beta=abc", "solver.fibers=2"] {
            let set_values = vec![bad.to_string()];
            let overrides = Overrides {
                set_values: &set_values,
                ..Default::default()
            };
            assert!(matches!(
                build_from_file(lattice_config(), &overrides),
                Err(CliError::Config(_))
            ));
        }
    }

    #[test]
    fn inverted_thresholds_are_a_config_error() {
        let set_values = vec!["contacts.alpha=0.5".to_string(), "contacts.beta=0.1".to_string()];
        let overrides = Overrides {
            set_values: &set_values,
            ..Default::default()
        };
        assert!(matches!(
            build_from_file(lattice_config(), &overrides),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn particle_sources_are_exclusive_and_required() {
        assert!(build_from_file(file_config(""), &Overrides::default()).is_err());
        let mut both = lattice_config();
        both.particles.push(FileParticle {
            position: vec![1.0, 1.0],
            diameter: None,
        });
        assert!(build_from_file(both, &Overrides::default()).is_err());
    }

    #[test]
    fn inline_particles_must_match_the_domain_dimension() {
        let mut config = file_config("");
        config.particles.push(FileParticle {
            position: vec![1.0, 1.0, 1.0],
            diameter: None,
        });
        assert!(matches!(
            build_from_file(config, &Overrides::default()),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn csv_particles_carry_optional_diameters() {
        let dir = tempdir().unwrap();
        let csv_path = dir.path().join("cloud.csv");
        fs::write(&csv_path, "x,y,diameter\n0.5,0.5,0.2\n1.5,0.5,\n").unwrap();
        let mut config = file_config("");
        config.particles_csv = Some(csv_path);
        let app = build_from_file(config, &Overrides::default()).unwrap();
        assert_eq!(app.positions.len(), 2);
        assert_eq!(app.diameters, vec![Some(0.2), None]);
    }
}
