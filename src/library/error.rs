use super::validation::ValidationError;
use rusqlite::ErrorCode;
use std::sync::PoisonError;
use thiserror::Error;

/// Errors returned by every public library operation.
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Track {track_id} is already part of album {album_id}")]
    DuplicateAssociation { album_id: i64, track_id: i64 },

    #[error("Index {index} out of range, expected {min}..={max}")]
    IndexOutOfRange { index: i64, min: i64, max: i64 },

    #[error("Integrity violation: {0}")]
    IntegrityViolation(#[source] rusqlite::Error),

    #[error("Migration to version {version} failed: {source}")]
    MigrationFailure {
        version: usize,
        source: anyhow::Error,
    },

    #[error("Library db is at schema version {version} with {pending} migration(s) pending, run update_db first")]
    SchemaOutdated { version: usize, pending: usize },

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

pub type LibraryResult<T> = Result<T, LibraryError>;

impl LibraryError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        LibraryError::NotFound { entity, id }
    }
}

impl From<rusqlite::Error> for LibraryError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
                ErrorCode::ConstraintViolation => LibraryError::IntegrityViolation(err),
                ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::CannotOpen
                | ErrorCode::NotADatabase
                | ErrorCode::ReadOnly
                | ErrorCode::SystemIoFailure
                | ErrorCode::DiskFull
                | ErrorCode::PermissionDenied => LibraryError::StoreUnavailable(err.to_string()),
                _ => LibraryError::IntegrityViolation(err),
            },
            _ => LibraryError::IntegrityViolation(err),
        }
    }
}

impl<T> From<PoisonError<T>> for LibraryError {
    fn from(err: PoisonError<T>) -> Self {
        LibraryError::StoreUnavailable(format!("connection lock poisoned: {}", err))
    }
}
