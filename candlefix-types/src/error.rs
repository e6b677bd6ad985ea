use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for the candlefix workspace.
///
/// Errors travel inside reports, so every variant carries owned, serializable
/// context rather than the source error of the underlying driver.
#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RepairError {
    /// The store could not be reached or the session could not be established.
    #[error("connection failed: {0}")]
    Connection(String),

    /// A store round-trip exceeded its deadline.
    #[error("store operation timed out: {operation}")]
    Timeout {
        /// Operation label, e.g. "fetch_candles".
        operation: String,
    },

    /// The store reported it cannot serve the request right now (overloaded,
    /// not enough replicas, bootstrapping).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A query was rejected or failed in a non-transient way.
    #[error("query failed: {0}")]
    Query(String),

    /// A stored value could not be interpreted (unparsable price, null where a
    /// value is required, unknown column type).
    #[error("data issue: {0}")]
    Data(String),

    /// Invalid input argument or configuration.
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    /// A guarded write found the row modified since it was read.
    #[error("concurrent modification of {key}")]
    Conflict {
        /// Display form of the row key.
        key: String,
    },

    /// The run was cancelled before this unit of work started.
    #[error("cancelled")]
    Cancelled,

    /// A transient error persisted through every retry.
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Total attempts made, including the first one.
        attempts: u32,
        /// The error returned by the final attempt.
        last: Box<RepairError>,
    },

    /// Unknown/opaque error.
    #[error("unknown error: {0}")]
    Other(String),
}

impl RepairError {
    /// Helper: build a `Timeout` error for an operation label.
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// Helper: build a `Conflict` error for a row key.
    pub fn conflict(key: impl std::fmt::Display) -> Self {
        Self::Conflict {
            key: key.to_string(),
        }
    }

    /// Returns true if retrying the same call may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Unavailable(_))
    }

    /// Returns true for errors that must abort the whole run.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}
