use thiserror::Error as ThisError;
use uniffi::Error;

use crate::error::{InvalidOperation, LoadError, PersistenceError};

#[derive(Debug, ThisError, Error)]
#[uniffi(flat_error)]
#[non_exhaustive]
pub enum RepsetError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("could not save workout: {0}")]
    Persistence(String),
    #[error("error: {0}")]
    Common(String),
}

impl From<LoadError> for RepsetError {
    fn from(e: LoadError) -> Self {
        match e {
            LoadError::NotFound(what) => RepsetError::NotFound(what),
            LoadError::Unauthorized => RepsetError::Unauthorized,
            transient @ LoadError::Transient { .. } => RepsetError::Network(transient.to_string()),
        }
    }
}

impl From<InvalidOperation> for RepsetError {
    fn from(e: InvalidOperation) -> Self {
        RepsetError::InvalidOperation(e.0)
    }
}

impl From<PersistenceError> for RepsetError {
    fn from(e: PersistenceError) -> Self {
        match e {
            PersistenceError::InvalidRating(_) | PersistenceError::AlreadyFinished => {
                RepsetError::InvalidOperation(e.to_string())
            }
            other => RepsetError::Persistence(other.to_string()),
        }
    }
}

impl From<anyhow::Error> for RepsetError {
    fn from(e: anyhow::Error) -> Self {
        RepsetError::Common(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;

    #[test]
    fn core_errors_map_to_ffi_variants() {
        assert!(matches!(
            RepsetError::from(LoadError::Transient {
                attempts: 3,
                reason: "offline".into()
            }),
            RepsetError::Network(_)
        ));
        assert!(matches!(
            RepsetError::from(PersistenceError::InvalidRating(9)),
            RepsetError::InvalidOperation(_)
        ));
        let finalize = PersistenceError::Finalize {
            attempts: 2,
            source: BackendError::Transient("502".into()),
        };
        assert!(matches!(RepsetError::from(finalize), RepsetError::Persistence(_)));
    }
}
