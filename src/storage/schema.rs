//! Database schema definitions

/// Schema version stored in `PRAGMA user_version`
pub const SCHEMA_VERSION: i64 = 1;

/// Name of the database when none is configured
pub const DEFAULT_DATABASE_NAME: &str = "app_database";

/// Field every record is keyed by
pub const KEY_PATH: &str = "id";

/// SQL to create the object store registry
pub const CREATE_OBJECT_STORES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS object_stores (
    name TEXT PRIMARY KEY,
    key_path TEXT NOT NULL DEFAULT 'id',
    created_at INTEGER NOT NULL
)
"#;

/// SQL to create the records table
/// Values are JSON text, one row per (store, id)
pub const CREATE_RECORDS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    store TEXT NOT NULL,
    id TEXT NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (store, id)
)
"#;

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    vec![CREATE_OBJECT_STORES_TABLE, CREATE_RECORDS_TABLE]
}
