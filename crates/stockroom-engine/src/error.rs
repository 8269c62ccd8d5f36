//! # Engine Error Types
//!
//! What callers of the engines see: either a domain rejection (insufficient
//! stock, invalid transition, not found) or a database failure. Any error
//! returned from inside an engine transaction means the transaction was
//! rolled back in full.

use thiserror::Error;

use stockroom_core::{CoreError, ValidationError};
use stockroom_db::{DbError, LedgerError};

/// Errors surfaced by the business engines.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Domain(#[from] CoreError),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<LedgerError> for EngineError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Domain(e) => EngineError::Domain(e),
            LedgerError::Db(e) => EngineError::Db(e),
        }
    }
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::Domain(err.into())
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::Db(err.into())
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
