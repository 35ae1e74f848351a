//! Error types for the snapvault library
//!
//! This module defines all error types that can occur during snapvault
//! operations. Errors are designed to be informative and actionable,
//! providing clear context about what went wrong.

use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Results in the snapvault library
pub type Result<T> = std::result::Result<T, VaultError>;

/// Main error type for all snapvault operations
#[derive(Debug, Error)]
pub enum VaultError {
    /// I/O errors during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors during JSON serialization/deserialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration rejected before any side effect
    #[error("Validation failed: {0}")]
    Validation(String),

    /// No record exists yet for a managed root
    ///
    /// This is a legitimate first-run state, not a failure; callers that
    /// can proceed without a prior snapshot match on it explicitly.
    #[error("No records have been created for this metarecord")]
    NoRecord,

    /// A record referenced by name is missing from the index or from disk
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    /// Persistence target is not a directory
    #[error("Not a directory: {0:?}")]
    NotADirectory(PathBuf),

    /// Exclusion pattern could not be compiled
    #[error("Invalid exclusion pattern: {0}")]
    InvalidPattern(#[from] globset::Error),

    /// Walk directory error from walkdir crate
    #[error("Walk directory error")]
    WalkDir(#[from] walkdir::Error),

    /// A worker thread panicked instead of returning an error
    #[error("Worker panicked: {0}")]
    WorkerPanic(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl VaultError {
    /// Create a validation error with a custom message
    pub fn validation(msg: impl Into<String>) -> Self {
        VaultError::Validation(msg.into())
    }

    /// Create an internal error with a custom message
    pub fn internal(msg: impl Into<String>) -> Self {
        VaultError::Internal(msg.into())
    }

    /// Check if this error is the benign "no snapshot yet" state
    pub fn is_first_run(&self) -> bool {
        matches!(self, VaultError::NoRecord)
    }
}
