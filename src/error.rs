// src/error.rs

use thiserror::Error;

/// Core error types for the downloader
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// I/O error with context
    #[error("I/O error: {0}")]
    IoError(String),

    /// Malformed or inconsistent configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Two artefact slots share one identifier
    #[error("Duplicate artefact: {0}")]
    DuplicateArtefact(String),

    /// A source could not be turned into a download URL
    #[error("Resolution error: {0}")]
    ResolutionError(String),

    /// A resolved download URL did not answer the reachability probe
    #[error("Unreachable artefact: {0}")]
    UnreachableError(String),

    /// HTTP transfer failure or non-success status
    #[error("Download error: {0}")]
    DownloadError(String),

    /// Response body could not be parsed
    #[error("Parse error: {0}")]
    ParseError(String),

    /// A required external program is not installed
    #[error("Missing dependency: {0}")]
    DependencyMissing(String),

    /// Artefact accessed in a lifecycle state that does not allow it
    #[error("Artefact {artefact} is {actual}, but this requires {required}")]
    InvalidState {
        artefact: String,
        actual: String,
        required: String,
    },
}

impl Error {
    /// Process exit code for this error's family
    ///
    /// Scripted callers can tell configuration problems apart from
    /// resolution, reachability, dependency and download failures.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::ConfigError(_) | Error::DuplicateArtefact(_) => 2,
            Error::ResolutionError(_) => 3,
            Error::UnreachableError(_) => 4,
            Error::DependencyMissing(_) => 5,
            Error::DownloadError(_) => 6,
            _ => 1,
        }
    }
}

/// Result type alias using the downloader's Error type
pub type Result<T> = std::result::Result<T, Error>;
