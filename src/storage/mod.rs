//! Storage Layer - SQLite-backed persistence
//!
//! System of record is SQLite with tables:
//! - object_stores(name, key_path, created_at)
//! - records(store, id, value)
//!
//! The schema version lives in `PRAGMA user_version`.

pub mod backend;
pub mod schema;
pub mod sqlite;

pub use backend::{Backend, Session};
pub use sqlite::{DbStats, SqliteBackend, SqliteStore};
