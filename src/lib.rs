//! # Stashdb - Local keyed object store
//!
//! A small embedded record store for local-first apps.
//!
//! Stashdb provides:
//! - Named collections ("stores") of JSON records keyed by a string `id`
//! - Lazily opened, per-handle connections that recover from stale sessions
//! - A change bus that announces every mutation to in-process listeners
//! - Typed records with patch structures for partial updates
//! - Local and session value slots with defaults
//! - Directory access and media capture helpers that feed the `files` store
//! - A CLI and an HTTP surface over the same collections

pub mod storage;
pub mod connection;
pub mod retry;
pub mod events;
pub mod record;
pub mod models;
pub mod collection;
pub mod database;
pub mod slot;
pub mod capability;
pub mod server;
pub mod output;
pub mod config;
pub mod ui;

// Re-exports for convenient access
pub use collection::Collection;
pub use connection::{Connection, ConnectionState};
pub use database::Database;
pub use events::{ChangeBus, ChangeEvent, ChangeSubscription};
pub use models::{MediaFile, MediaFilePatch, MediaType, Post, PostPatch};
pub use record::{Document, DocumentPatch, Item};
pub use retry::RetryPolicy;
pub use slot::{SlotScope, ValueSlot};
pub use storage::{Backend, Session, SqliteBackend, SqliteStore};

/// Result type alias for Stashdb operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Stashdb operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The session was closed or invalidated. Recovered by reopening.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Database version {found} is newer than supported version {supported}")]
    VersionMismatch { found: i64, supported: i64 },

    #[error("Invalid store name: {0:?}")]
    InvalidStoreName(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Storage error: {0}")]
    Storage(#[source] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl Error {
    /// True when the failure came from a closed or invalidated session.
    pub fn is_stale(&self) -> bool {
        matches!(self, Error::InvalidState(_))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        match err.sqlite_error_code() {
            Some(ErrorCode::ApiMisuse) => Error::InvalidState(err.to_string()),
            Some(ErrorCode::DiskFull) => Error::QuotaExceeded(err.to_string()),
            Some(ErrorCode::PermissionDenied | ErrorCode::ReadOnly | ErrorCode::CannotOpen) => {
                Error::PermissionDenied(err.to_string())
            }
            _ => Error::Storage(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_failure(code: i32) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(code), None)
    }

    #[test]
    fn test_sqlite_errors_are_classified() {
        assert!(Error::from(sqlite_failure(rusqlite::ffi::SQLITE_MISUSE)).is_stale());
        assert!(matches!(
            Error::from(sqlite_failure(rusqlite::ffi::SQLITE_FULL)),
            Error::QuotaExceeded(_)
        ));
        assert!(matches!(
            Error::from(sqlite_failure(rusqlite::ffi::SQLITE_READONLY)),
            Error::PermissionDenied(_)
        ));
        assert!(matches!(
            Error::from(sqlite_failure(rusqlite::ffi::SQLITE_CORRUPT)),
            Error::Storage(_)
        ));
    }

    #[test]
    fn test_only_invalid_state_is_stale() {
        assert!(Error::InvalidState("closed".into()).is_stale());
        assert!(!Error::QuotaExceeded("full".into()).is_stale());
        assert!(!Error::InvalidKey("".into()).is_stale());
    }
}
