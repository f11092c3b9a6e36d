//! Error types used throughout the sync engine

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for LedgerSync
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum SyncError {
    /// Missing or malformed configuration, including absent company
    /// credentials.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Rejected credentials or tokens on either external system.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Non-success or malformed response from an external system.
    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation attempted against a record in the wrong lifecycle state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Security error: {0}")]
    Security(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Returns true for errors that invalidate every remaining call in the
    /// current job.
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }
}

/// Result type alias for LedgerSync operations
pub type Result<T> = std::result::Result<T, SyncError>;
