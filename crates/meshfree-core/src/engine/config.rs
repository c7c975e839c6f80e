use std::ops::Range;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// How the particle range of one solve is cut into work items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChunkPolicy {
    /// One contiguous slice per worker thread.
    #[default]
    PerThread,
    /// Contiguous slices of at most this many particles.
    Fixed(usize),
}

impl ChunkPolicy {
    /// Cuts `[0, size)` into contiguous, disjoint, ordered slices.
    ///
    /// # Arguments
    ///
    /// * `size` - Number of particles to cover.
    /// * `num_threads` - Worker count, used by [`ChunkPolicy::PerThread`].
    ///
    /// # Return
    ///
    /// Non-empty ranges whose concatenation is exactly `0..size`. An empty
    /// range list is returned for `size == 0`.
    pub fn slices(&self, size: usize, num_threads: usize) -> Vec<Range<usize>> {
        if size == 0 {
            return Vec::new();
        }
        let chunk = match *self {
            ChunkPolicy::PerThread => size.div_ceil(num_threads.max(1)),
            ChunkPolicy::Fixed(chunk) => chunk.max(1),
        };
        (0..size)
            .step_by(chunk)
            .map(|start| start..(start + chunk).min(size))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfig {
    pub num_threads: usize,
    pub chunk_policy: ChunkPolicy,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            num_threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            chunk_policy: ChunkPolicy::default(),
        }
    }
}

#[derive(Default)]
pub struct SolverConfigBuilder {
    num_threads: Option<usize>,
    chunk_policy: Option<ChunkPolicy>,
}

impl SolverConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_threads(mut self, n: usize) -> Self {
        self.num_threads = Some(n);
        self
    }
    pub fn chunk_policy(mut self, policy: ChunkPolicy) -> Self {
        self.chunk_policy = Some(policy);
        self
    }

    pub fn build(self) -> Result<SolverConfig, ConfigError> {
        let num_threads = self
            .num_threads
            .ok_or(ConfigError::MissingParameter("num_threads"))?;
        if num_threads == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "num_threads",
                reason: "at least one worker thread is required".to_string(),
            });
        }
        let chunk_policy = self.chunk_policy.unwrap_or_default();
        if chunk_policy == ChunkPolicy::Fixed(0) {
            return Err(ConfigError::InvalidParameter {
                name: "chunk_policy",
                reason: "fixed chunks must hold at least one particle".to_string(),
            });
        }
        Ok(SolverConfig {
            num_threads,
            chunk_policy,
        })
    }
}

/// Parameters of a neighbor census.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborConfig {
    pub radius: f64,
    pub verify: bool,
}

impl NeighborConfig {
    pub fn new(radius: f64, verify: bool) -> Result<Self, ConfigError> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err(ConfigError::InvalidParameter {
                name: "radius",
                reason: format!("expected a positive finite radius, got {radius}"),
            });
        }
        Ok(Self { radius, verify })
    }
}

/// Thresholds of the contact refresh rule.
///
/// `alpha` is the penetration below which an engaged contact disengages and
/// `beta` the penetration above which a disengaged one engages.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactConfig {
    pub alpha: f64,
    pub beta: f64,
    /// Name of the pair list holding the contacts.
    pub pairs_name: String,
}

#[derive(Default)]
pub struct ContactConfigBuilder {
    alpha: Option<f64>,
    beta: Option<f64>,
    pairs_name: Option<String>,
}

impl ContactConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alpha(mut self, alpha: f64) -> Self {
        self.alpha = Some(alpha);
        self
    }
    pub fn beta(mut self, beta: f64) -> Self {
        self.beta = Some(beta);
        self
    }
    pub fn pairs_name(mut self, name: impl Into<String>) -> Self {
        self.pairs_name = Some(name.into());
        self
    }

    pub fn build(self) -> Result<ContactConfig, ConfigError> {
        let alpha = self.alpha.ok_or(ConfigError::MissingParameter("alpha"))?;
        let beta = self.beta.ok_or(ConfigError::MissingParameter("beta"))?;
        if !(alpha.is_finite() && beta.is_finite() && alpha < beta) {
            return Err(ConfigError::InvalidParameter {
                name: "alpha",
                reason: format!("expected finite thresholds with alpha < beta, got {alpha} and {beta}"),
            });
        }
        Ok(ContactConfig {
            alpha,
            beta,
            pairs_name: self.pairs_name.unwrap_or_else(|| "contacts".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solver_builder_requires_threads() {
        assert_eq!(
            SolverConfigBuilder::new().build(),
            Err(ConfigError::MissingParameter("num_threads"))
        );
        assert!(matches!(
            SolverConfigBuilder::new().num_threads(0).build(),
            Err(ConfigError::InvalidParameter { name: "num_threads", .. })
        ));
        let config = SolverConfigBuilder::new().num_threads(4).build().unwrap();
        assert_eq!(config.chunk_policy, ChunkPolicy::PerThread);
    }

    #[test]
    fn per_thread_slices_are_contiguous_and_cover_the_range() {
        let slices = ChunkPolicy::PerThread.slices(10, 3);
        assert_eq!(slices, vec![0..4, 4..8, 8..10]);
        assert_eq!(ChunkPolicy::PerThread.slices(2, 8), vec![0..1, 1..2]);
        assert!(ChunkPolicy::PerThread.slices(0, 4).is_empty());
    }

    #[test]
    fn fixed_slices_respect_the_chunk_length() {
        assert_eq!(ChunkPolicy::Fixed(4).slices(9, 1), vec![0..4, 4..8, 8..9]);
    }

    #[test]
    fn contact_builder_validates_thresholds() {
        assert_eq!(
            ContactConfigBuilder::new().beta(0.1).build(),
            Err(ConfigError::MissingParameter("alpha"))
        );
        assert!(
            ContactConfigBuilder::new()
                .alpha(0.2)
                .beta(0.1)
                .build()
                .is_err()
        );
        let config = ContactConfigBuilder::new()
            .alpha(0.0)
            .beta(0.01)
            .build()
            .unwrap();
        assert_eq!(config.pairs_name, "contacts");
    }

    #[test]
    fn neighbor_config_rejects_non_positive_radius() {
        assert!(NeighborConfig::new(0.0, false).is_err());
        assert!(NeighborConfig::new(f64::NAN, false).is_err());
        assert!(NeighborConfig::new(0.5, true).is_ok());
    }
}
