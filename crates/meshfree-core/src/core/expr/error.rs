use crate::core::math::tensor::TensorError;
use crate::core::models::field::StorageError;
use crate::core::models::workspace::WorkspaceError;
use crate::core::pairs::list::PairsError;
use crate::core::space::grid::SpaceError;
use thiserror::Error;

/// Errors raised while building or evaluating an expression tree.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error("Tensor error: {0}")]
    Tensor(#[from] TensorError),
    #[error("Spatial index error: {0}")]
    Space(#[from] SpaceError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Pair list error: {0}")]
    Pairs(#[from] PairsError),
    #[error("Workspace error: {0}")]
    Workspace(#[from] WorkspaceError),
    #[error("Interaction '{0}' is not assigned to a particle system")]
    NotAssigned(String),
    #[error("Interaction '{0}' is not assigned to a pair list")]
    PairsNotAssigned(String),
    #[error("'{name}' takes {expected} argument(s), found {found}")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("Unknown function or interaction '{0}'")]
    UnknownFunction(String),
    #[error("Invalid argument to '{name}': {reason}")]
    InvalidArgument { name: String, reason: String },
}
