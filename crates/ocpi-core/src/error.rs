//! Error types for the OCPI core types

use thiserror::Error;

use crate::validation::ValidationError;

/// Result type alias using OcpiError
pub type Result<T> = std::result::Result<T, OcpiError>;

/// Errors raised while building or parsing OCPI values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OcpiError {
    /// A field failed validation
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Version string is not one this crate knows about
    #[error("Unsupported OCPI version: {0}")]
    UnsupportedVersion(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for OcpiError {
    fn from(err: serde_json::Error) -> Self {
        OcpiError::Serialization(err.to_string())
    }
}
