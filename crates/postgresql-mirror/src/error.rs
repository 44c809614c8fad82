//! Error types for the mirror pipeline.
//!
//! # Error Categories
//!
//! | Variant | Disposition | Description |
//! |---------|-------------|-------------|
//! | `PostgreSQL` | Retry | Driver/server error: broken connection, constraint violation |
//! | `StatementTimeout` | Retry | Statement did not finish within the configured timeout |
//! | `Connection` | Retry | Connection dropped or refused while executing |
//! | `Payload` | Discard | Job payload cannot be deserialized |
//! | `MissingRecordId` | Discard | Update/delete without a primary key value |
//! | `InvalidIdentifier` | Discard | Table or column name cannot be quoted |
//! | `UnknownEntity` | Discard | Entity name does not resolve to a table |
//! | `Config` | Swallow | Mirror configuration is unusable |
//! | `Internal` | Swallow | Anything else |
//!
//! Only database errors are assumed to be transient. Everything else is either
//! a payload that can never succeed or a bug, and retrying it would loop
//! forever.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for mirror operations.
pub type Result<T> = std::result::Result<T, MirrorError>;

/// What the job runtime should do with a failed mirror job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Retry with backoff, up to the attempt limit.
    Retry,
    /// Drop the job immediately; it can never succeed.
    Discard,
    /// Log and drop without retrying.
    Swallow,
}

/// Errors that can occur while mirroring a write.
#[derive(Error, Debug)]
pub enum MirrorError {
    /// PostgreSQL connection or query error.
    #[error("PostgreSQL error: {0}")]
    PostgreSQL(#[from] tokio_postgres::Error),

    #[error("Statement timed out after {0:?}")]
    StatementTimeout(Duration),

    /// Connection lost or refused.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Job payload could not be deserialized.
    #[error("Invalid job payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("Missing record id for {operation} on {table}")]
    MissingRecordId { operation: String, table: String },

    #[error("Invalid identifier {name:?}: {reason}")]
    InvalidIdentifier { name: String, reason: &'static str },

    #[error("Cannot resolve a table for entity {0:?}")]
    UnknownEntity(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MirrorError {
    pub fn disposition(&self) -> Disposition {
        match self {
            MirrorError::PostgreSQL(_)
            | MirrorError::StatementTimeout(_)
            | MirrorError::Connection(_) => Disposition::Retry,
            MirrorError::Payload(_)
            | MirrorError::MissingRecordId { .. }
            | MirrorError::InvalidIdentifier { .. }
            | MirrorError::UnknownEntity(_) => Disposition::Discard,
            MirrorError::Config(_) | MirrorError::Internal(_) => Disposition::Swallow,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.disposition() == Disposition::Retry
    }
}
