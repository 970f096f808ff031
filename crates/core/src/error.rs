//! Error types for recmap
//!
//! This module defines the error taxonomy shared by the mapping layer and
//! every store adapter. We use `thiserror` for automatic `Display` and
//! `Error` trait implementations.
//!
//! Errors are returned values and are never retried internally; retry policy
//! belongs to the caller.

use crate::schema::SchemaError;
use crate::wire::WireError;
use std::fmt;
use thiserror::Error;

/// Result type alias for recmap operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed driver error carried inside [`Error::Backend`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why a conditional key-value write was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConflictKind {
    /// Insert found the key already present
    AlreadyExists,
    /// Update found the key missing
    NotExist,
}

impl ConflictKind {
    /// Reply marker the conditional scripts return for this rejection
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictKind::AlreadyExists => "AlreadyExists",
            ConflictKind::NotExist => "NotExist",
        }
    }
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error types for recmap
#[derive(Debug, Error)]
pub enum Error {
    /// Read returned no record for the key
    #[error("record not found: {key}")]
    NotFound {
        /// Table name or composite key that was looked up
        key: String,
    },

    /// Request could not be turned into a command
    #[error("validation failed: {0}")]
    Validation(String),

    /// Schema metadata is unusable (e.g. no primary key)
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Relational update matched no row
    #[error("update affected 0 rows in {table}")]
    AffectedZero {
        /// Table the update ran against
        table: String,
    },

    /// Conditional key-value write rejected
    #[error("conflict on {key}: {kind}")]
    Conflict {
        /// Rejection reason
        kind: ConflictKind,
        /// Composite key or table involved
        key: String,
    },

    /// Record could not be encoded
    #[error("marshal error: {0}")]
    Marshal(String),

    /// Stored data could not be decoded into the record
    #[error("unmarshal error: {0}")]
    Unmarshal(String),

    /// Underlying store client or driver failed
    #[error("backend error: {message}")]
    Backend {
        /// What the adapter was doing
        message: String,
        /// Driver error, when there is one
        #[source]
        source: Option<BoxError>,
    },

    /// Operation is not supported by this backend
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),
}

impl Error {
    /// Backend failure without an underlying driver error
    pub fn backend(message: impl Into<String>) -> Self {
        Error::Backend {
            message: message.into(),
            source: None,
        }
    }

    /// Backend failure wrapping a driver error
    pub fn backend_with<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Backend {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Conflict for a conditional write
    pub fn conflict(kind: ConflictKind, key: impl Into<String>) -> Self {
        Error::Conflict {
            kind,
            key: key.into(),
        }
    }

    /// Empty read result
    pub fn not_found(key: impl Into<String>) -> Self {
        Error::NotFound { key: key.into() }
    }

    /// Check if this is a not-found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Check if this error was raised before any backend call
    ///
    /// Schema errors count as validation errors.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_) | Error::Schema(_))
    }

    /// Check if this is a conflict, optionally of a specific kind
    pub fn is_conflict(&self, kind: Option<ConflictKind>) -> bool {
        match (self, kind) {
            (Error::Conflict { .. }, None) => true,
            (Error::Conflict { kind: actual, .. }, Some(expected)) => *actual == expected,
            _ => false,
        }
    }
}

impl From<WireError> for Error {
    fn from(e: WireError) -> Self {
        Error::Unmarshal(e.to_string())
    }
}
