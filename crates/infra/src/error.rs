use thiserror::Error;

use siteledger_core::DomainError;

/// Repository operation error.
///
/// These are **infrastructure errors** (storage, concurrency) as opposed to
/// domain errors (validation, invariants).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// Optimistic concurrency check failed (version or stream length mismatch).
    #[error("optimistic concurrency check failed: {0}")]
    Conflict(String),

    /// A record with the same identity or natural key already exists.
    #[error("duplicate record: {0}")]
    Duplicate(String),

    #[error("record not found: {0}")]
    NotFound(String),

    /// The backing store cannot serve the request (e.g. a poisoned lock).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl RepositoryError {
    pub(crate) fn poisoned() -> Self {
        RepositoryError::Unavailable("lock poisoned".to_string())
    }
}

/// Error returned by the engine services.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(RepositoryError),
}

impl From<RepositoryError> for ServiceError {
    fn from(value: RepositoryError) -> Self {
        match value {
            // Version races and natural-key clashes surface as domain conflicts.
            RepositoryError::Conflict(msg) | RepositoryError::Duplicate(msg) => {
                ServiceError::Domain(DomainError::Conflict(msg))
            }
            other => ServiceError::Store(other),
        }
    }
}

impl ServiceError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Domain(e) => e.code(),
            ServiceError::Store(RepositoryError::Unavailable(_)) => "store_unavailable",
            ServiceError::Store(_) => "store_error",
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
