//! Core error types for FamDB

use thiserror::Error;

/// Main error type for FamDB operations.
///
/// Variants are grouped to match the error taxonomy in the design docs:
/// fatal-at-open, fatal-at-write, recoverable, and diagnostic conditions are
/// all represented, but only fatal conditions are expected to propagate out
/// of a top-level operation unhandled.
#[derive(Error, Debug)]
pub enum FamdbError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Taxonomy error: {0}")]
    Taxonomy(String),

    #[error("Partition error: {0}")]
    Partition(String),

    #[error("Container error: {0}")]
    Container(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Files interrupted during edit: {0}")]
    InterruptedWrite(String),

    #[error("Cross-file consistency mismatch: {0}")]
    Inconsistent(String),

    #[error("Other error: {0}")]
    Other(String),
}

/// Result type alias for FamDB operations
pub type FamdbResult<T> = Result<T, FamdbError>;

impl From<serde_json::Error> for FamdbError {
    fn from(err: serde_json::Error) -> Self {
        FamdbError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for FamdbError {
    fn from(err: toml::de::Error) -> Self {
        FamdbError::Configuration(err.to_string())
    }
}

impl From<toml::ser::Error> for FamdbError {
    fn from(err: toml::ser::Error) -> Self {
        FamdbError::Configuration(err.to_string())
    }
}

impl From<anyhow::Error> for FamdbError {
    fn from(err: anyhow::Error) -> Self {
        FamdbError::Other(err.to_string())
    }
}
