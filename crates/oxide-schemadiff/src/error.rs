//! Error types for schema diffing and migration planning.

use std::path::PathBuf;

use crate::dialect::Dialect;

/// Errors that can occur while diffing snapshots or planning migrations.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// The target dialect has no valid expression for an operation.
    #[error("Operation '{operation}' is not supported by the {dialect} dialect")]
    UnsupportedOperation {
        /// The dialect that rejected the operation.
        dialect: Dialect,
        /// Name of the rejected operation.
        operation: String,
    },

    /// The generated version identifier is longer than allowed.
    #[error("Version name '{name}' exceeds the maximum length of {max} characters")]
    VersionNameTooLong {
        /// The rejected version name.
        name: String,
        /// The configured maximum length.
        max: usize,
    },

    /// A snapshot failed validation.
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// An artifact carries no downgrade section.
    #[error("Migration '{0}' has no downgrade section")]
    NoDowngrade(String),

    /// Invalid migration version state transition.
    #[error("Invalid migration state: {0}")]
    InvalidState(String),

    /// Failed to parse a migration artifact.
    #[error("Failed to parse migration file '{path}': {message}")]
    ParseError {
        /// Path to the migration file.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// IO error (reading/writing migration files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MigrateError {
    /// Creates an [`MigrateError::UnsupportedOperation`] error.
    #[must_use]
    pub fn unsupported(dialect: Dialect, operation: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            dialect,
            operation: operation.into(),
        }
    }
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
