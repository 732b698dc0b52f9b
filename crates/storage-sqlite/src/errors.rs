//! Storage error type and its mapping onto the core taxonomy.

use diesel::result::DatabaseErrorKind;
use thiserror::Error;

use turismo_core::StoreError;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("write actor unavailable: {0}")]
    Writer(String),
}

impl From<StorageError> for StoreError {
    fn from(err: StorageError) -> Self {
        match &err {
            StorageError::Database(diesel::result::Error::DatabaseError(
                DatabaseErrorKind::ForeignKeyViolation,
                info,
            )) => StoreError::ReferentialIntegrity(info.message().to_string()),
            _ => StoreError::Internal(err.to_string()),
        }
    }
}
