//! Error types for the Memoria engine.

use crate::{CollectionName, Version};
use thiserror::Error;

/// All possible errors from the Memoria engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Validation errors
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("missing required field: {0}")]
    MissingRequiredField(String),

    #[error("type mismatch for field '{field}': expected {expected}, got {got}")]
    TypeMismatch {
        field: String,
        expected: String,
        got: String,
    },

    // Key errors
    #[error("missing primary key field: {0}")]
    MissingKey(String),

    #[error("invalid primary key in field '{field}': expected string or integer, got {got}")]
    InvalidKey { field: String, got: String },

    // Operation errors
    #[error("version conflict: expected {expected}, got {actual}")]
    VersionConflict { expected: Version, actual: Version },

    // Registry errors
    #[error("collection not found: {0}")]
    CollectionNotFound(CollectionName),

    #[error("collection already exists: {0}")]
    CollectionAlreadyExists(CollectionName),

    #[error("invalid schema: {0}")]
    InvalidSchema(String),
}

impl Error {
    /// Whether this error was raised while sanitizing a payload.
    ///
    /// Validation errors are always raised before any lock is taken or any
    /// state is touched.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidPayload(_) | Error::MissingRequiredField(_) | Error::TypeMismatch { .. }
        )
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
