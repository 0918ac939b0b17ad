//! Errors raised while building or validating CRM records.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Rule violations detected by the record constructors and the stores.
///
/// Messages are user-facing: bulk imports report them verbatim next to the rejected
/// entry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Input failed a field rule (empty name, bad email or phone, non-positive price).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Records that must agree do not (an order placed for a different customer).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// `{0}` names the kind of record, e.g. `Customer not found`.
    #[error("{0} not found")]
    NotFound(String),

    /// Uniqueness rule hit, e.g. a second customer with the same email.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(record: impl Into<String>) -> Self {
        Self::NotFound(record.into())
    }
}
