//! Error types for the factor aggregation pipeline.
//!
//! Only two kinds of failure ever leave a partition: malformed input (which
//! the pipeline counts and skips, never propagates) and fatal errors such as
//! I/O failures, which abort the partition as a whole.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, FactorError>;

/// Errors produced by the factor aggregation pipeline.
#[derive(Debug, Error)]
pub enum FactorError {
    /// An input line could not be decoded into a snapshot.
    #[error("malformed record: {reason}")]
    MalformedRecord { reason: String },

    /// A time-of-day code is not a valid HHMMSS value.
    #[error("invalid trade time {value}: {reason}")]
    InvalidTradeTime { value: u32, reason: &'static str },

    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Underlying I/O failure (fatal for the partition being processed).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other failure.
    #[error("{0}")]
    Generic(String),
}

impl FactorError {
    /// Build a generic error from any message.
    pub fn generic(msg: impl Into<String>) -> Self {
        FactorError::Generic(msg.into())
    }

    /// Build a malformed-record error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        FactorError::MalformedRecord {
            reason: reason.into(),
        }
    }

    /// True for errors that only invalidate a single record.
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            FactorError::MalformedRecord { .. } | FactorError::InvalidTradeTime { .. }
        )
    }
}

impl From<String> for FactorError {
    fn from(msg: String) -> Self {
        FactorError::Generic(msg)
    }
}
