use thiserror::Error;

use super::config::ConfigError;
use crate::core::expr::error::EvalError;
use crate::core::math::tensor::TensorError;
use crate::core::models::domain::DomainError;
use crate::core::models::field::StorageError;
use crate::core::models::workspace::WorkspaceError;
use crate::core::pairs::list::PairsError;
use crate::core::space::grid::SpaceError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Evaluation failed: {0}")]
    Eval(#[from] EvalError),

    #[error("Workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    #[error("Tensor error: {0}")]
    Tensor(#[from] TensorError),

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Spatial index error: {0}")]
    Space(#[from] SpaceError),

    #[error("Pair list error: {0}")]
    Pairs(#[from] PairsError),

    #[error(
        "Equation '{equation}' assigns {rhs} value(s) to a target of size {lhs}"
    )]
    InconsistentFieldSize {
        equation: String,
        lhs: usize,
        rhs: usize,
    },

    #[error("Neighbor verification failed for particle {particle}: grid found {grid}, brute force found {brute_force}")]
    VerificationFailed {
        particle: usize,
        grid: usize,
        brute_force: usize,
    },

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(String),
}
