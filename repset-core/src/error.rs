//! Error types shared across the session core.

use thiserror::Error;

/// Failure reported by a [`Backend`](crate::backend::Backend) call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("transient backend failure: {0}")]
    Transient(String),
    #[error("request rejected: {0}")]
    Rejected(String),
}

impl BackendError {
    /// Whether retrying the same request could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Transient(_))
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("workout not found: {0}")]
    NotFound(String),
    #[error("not authorized to load workout")]
    Unauthorized,
    #[error("workout could not be loaded after {attempts} attempts: {reason}")]
    Transient { attempts: u32, reason: String },
}

impl LoadError {
    pub(crate) fn from_backend(err: BackendError, attempts: u32) -> Self {
        match err {
            BackendError::NotFound(what) => LoadError::NotFound(what),
            BackendError::Unauthorized => LoadError::Unauthorized,
            BackendError::Transient(reason) | BackendError::Rejected(reason) => {
                LoadError::Transient { attempts, reason }
            }
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid operation: {0}")]
pub struct InvalidOperation(pub String);

impl InvalidOperation {
    pub fn new(reason: impl Into<String>) -> Self {
        InvalidOperation(reason.into())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PersistenceError {
    #[error("workout log was never created")]
    MissingLog,
    #[error("rating must be between 1 and 5, got {0}")]
    InvalidRating(u8),
    #[error("workout is already finished")]
    AlreadyFinished,
    #[error("failed to finalize workout log after {attempts} attempts: {source}")]
    Finalize {
        attempts: u32,
        #[source]
        source: BackendError,
    },
}
