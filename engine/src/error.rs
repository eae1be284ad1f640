//! Error types for the Ottoman engine.

use crate::DocumentId;
use thiserror::Error;

/// All possible errors from the Ottoman engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Server-reported errors
    #[error("document update conflict: {0}")]
    Conflict(DocumentId),

    #[error("document not found: {0}")]
    NotFound(DocumentId),

    // Reconciliation errors
    #[error("conflict on never-synced document cannot be merged: {0}")]
    Unmergeable(DocumentId),

    // Document errors
    #[error("document has no id")]
    MissingId,

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("{document} lists {listed} fields but persists {persisted}")]
    IncompleteFields {
        document: &'static str,
        listed: usize,
        persisted: usize,
    },
}

impl Error {
    /// True for a write rejected because of a stale revision.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_) | Error::Unmergeable(_))
    }

    /// True when the referenced document does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidDocument(err.to_string())
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
