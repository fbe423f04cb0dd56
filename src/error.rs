//! Error types for contactlink.
//!
//! All errors are strongly typed using thiserror. Normalization and matching
//! never fail; only contact creation without an identity, storage faults and
//! runtime plumbing surface as errors.

use std::path::PathBuf;

use thiserror::Error;

use crate::storage::StorageError;

/// Validation errors that occur during input or configuration validation.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The record has neither a name nor an email.
    #[error("Cannot create a contact without a name or an email")]
    MissingIdentity,

    /// A threshold lies outside `[0.0, 1.0]`.
    #[error("Threshold '{field}' = {value} is out of range [0.0, 1.0]")]
    InvalidThreshold {
        /// Dotted config path of the threshold.
        field: String,
        /// The rejected value.
        value: f64,
    },

    /// Configuration values are inconsistent.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// What is inconsistent.
        reason: String,
    },
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// The file that was requested.
        path: PathBuf,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The file parsed but failed validation.
    #[error("Invalid config: {0}")]
    Invalid(#[from] ValidationError),
}

/// Top-level error type for resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The record or configuration is invalid.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The contact store failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration could not be loaded.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// The worker queue rejected a job.
    #[error("Worker queue is full (capacity {capacity})")]
    QueueFull {
        /// Configured queue capacity.
        capacity: usize,
    },

    /// The worker pool has shut down.
    #[error("Worker pool disconnected")]
    Disconnected,

    /// A worker did not answer in time.
    #[error("Timed out after {duration_ms}ms waiting for a worker result")]
    Timeout {
        /// How long the caller waited.
        duration_ms: u64,
    },

    /// An invariant was violated inside the crate.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the violation.
        message: String,
    },
}

impl ResolveError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a storage error.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Returns true if re-running the same resolution may succeed.
    ///
    /// Resolution is derived purely from storage state plus the input record,
    /// so storage faults and a saturated queue are safe to retry.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Validation(_) | Self::Config(_) | Self::Internal { .. } => false,
            Self::Storage(e) => !matches!(e, StorageError::DuplicateKey(_)),
            Self::QueueFull { .. } | Self::Timeout { .. } => true,
            Self::Disconnected => false,
        }
    }
}

/// A batch stopped early on a fault that skipping cannot fix.
///
/// Records before `resume_from` were fully resolved; re-running the batch from
/// `resume_from` continues where it stopped.
#[derive(Debug, Error)]
#[error("Batch aborted at record {resume_from}: {source}")]
pub struct BatchError {
    /// Index of the first record that was not resolved.
    pub resume_from: usize,
    /// The fault that stopped the batch.
    #[source]
    pub source: ResolveError,
}

/// Result type alias for resolution operations.
pub type ResolveResult<T> = Result<T, ResolveError>;
