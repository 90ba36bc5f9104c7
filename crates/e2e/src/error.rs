//! Error types for the e2e builder

use thiserror::Error;

/// Configuration errors. These are the only failures `execute` returns as
/// `Err`; everything else is reported as an unsuccessful output.
#[derive(Error, Debug)]
pub enum BuilderError {
    #[error(
        "The 'baseUrl' option cannot be used with 'devServerTarget'. \
         When present, 'devServerTarget' is used to set up 'baseUrl' automatically."
    )]
    ConflictingBaseUrl,

    #[error("Invalid dev server target: {0}")]
    InvalidTarget(String),
}

pub type BuilderResult<T> = Result<T, BuilderError>;

/// Failures while running the test runner out of process
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Failed to spawn runner process {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type LaunchResult<T> = Result<T, LaunchError>;
