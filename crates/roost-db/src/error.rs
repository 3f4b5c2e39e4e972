//! Error types for the storage layer.
//!
//! All engine operations return [`StorageError`]. The variants follow the
//! caller-facing taxonomy: malformed input is [`StorageError::Validation`],
//! an unreachable backend is [`StorageError::Connection`], and a reference
//! that does not resolve is [`StorageError::Integrity`]. Nothing here is
//! retried; classification is left to the caller.

use roost_types::TypesError;

/// Errors that can occur in the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// An entity was rejected before reaching the backend.
    #[error("validation error: {0}")]
    Validation(String),

    /// The backing file or database could not be reached.
    #[error("connection error: {0}")]
    Connection(String),

    /// A foreign key or amenity link does not resolve.
    #[error("integrity error: {0}")]
    Integrity(String),

    /// Encoding the snapshot artifact failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A `PostgreSQL` operation failed for a reason other than connectivity
    /// or integrity.
    #[error("PostgreSQL error: {0}")]
    Postgres(sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl StorageError {
    /// Whether the backend was unreachable.
    pub const fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Whether a reference failed to resolve.
    pub const fn is_integrity(&self) -> bool {
        matches!(self, Self::Integrity(_))
    }

    /// Whether the input entity was rejected.
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        if is_unreachable(&err) {
            return Self::Connection(err.to_string());
        }
        if let Some(db) = err.as_database_error() {
            if db.is_foreign_key_violation() {
                return Self::Integrity(db.message().to_owned());
            }
        }
        Self::Postgres(err)
    }
}

impl From<TypesError> for StorageError {
    fn from(err: TypesError) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Errors that mean the server was never reached or went away.
const fn is_unreachable(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_)
    )
}
