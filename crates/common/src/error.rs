//! Error types for the host framework

use thiserror::Error;

/// Result type alias using [`HostError`]
pub type HostResult<T> = std::result::Result<T, HostError>;

/// Errors raised by a host while resolving, inspecting or running targets
#[derive(Error, Debug)]
pub enum HostError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid target string: {0:?}")]
    InvalidTarget(String),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Target not found: {project}:{target}")]
    TargetNotFound { project: String, target: String },

    #[error("Configuration '{configuration}' not found for target {target}")]
    ConfigurationNotFound { target: String, configuration: String },

    #[error("Target {0} has no command and cannot be scheduled")]
    NotSchedulable(String),

    #[error("Failed to spawn target {target}: {reason}")]
    Spawn { target: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
