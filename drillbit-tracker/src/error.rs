//! Error types for the tracker

use thiserror::Error;

use crate::backend::BackendError;
use crate::environment::EnvironmentComponent;

/// Result type for tracker operations
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Tracker error types
#[derive(Debug, Error)]
pub enum TrackerError {
    /// No environment has been loaded or saved yet
    #[error("No environment loaded - load or save an environment first")]
    EnvironmentNotLoaded,

    /// No project group has been loaded or saved yet
    #[error("No project group loaded - load or save a project group first")]
    ProjectGroupNotLoaded,

    /// The project group resolves to no simulations
    #[error("Project group has no projects to simulate")]
    EmptySimulationSet,

    /// Statement generation requires every forecast to be locked
    #[error("Environment components are not all locked")]
    EnvironmentUnlocked,

    /// Component cannot be locked in its current state
    #[error("{0} is not lockable")]
    NotLockable(EnvironmentComponent),

    /// Component is locked and cannot be edited
    #[error("{0} is locked")]
    ComponentLocked(EnvironmentComponent),

    /// Aggregate is missing data needed for the operation
    #[error("Invalid input: {0}")]
    Invalid(String),

    /// Configuration file could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Record lookup by id failed
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Backend error
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Record did not match the expected schema
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
