//! SQLite storage implementation

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use crate::{Result, Error};
use super::backend::{Backend, Session};
use super::schema;

/// SQLite-backed session over the record store
pub struct SqliteStore {
    conn: Option<Connection>,
}

impl SqliteStore {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    /// Open a database by SQLite URI, e.g. a shared-cache memory database
    pub fn open_uri(uri: &str) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(uri, flags)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        let store = Self { conn: Some(conn) };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Initialize the database schema, refusing databases from a newer version
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        let found = self.schema_version()?;
        if found > schema::SCHEMA_VERSION {
            return Err(Error::VersionMismatch {
                found,
                supported: schema::SCHEMA_VERSION,
            });
        }

        for stmt in schema::all_schema_statements() {
            conn.execute(stmt, [])?;
        }

        if found < schema::SCHEMA_VERSION {
            conn.pragma_update(None, "user_version", schema::SCHEMA_VERSION)?;
        }
        Ok(())
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| Error::InvalidState("database connection is closed".to_string()))
    }
}

impl Session for SqliteStore {
    fn create_store(&mut self, store: &str) -> Result<()> {
        self.conn()?.execute(
            "INSERT OR IGNORE INTO object_stores (name, key_path, created_at) VALUES (?1, ?2, ?3)",
            params![store, schema::KEY_PATH, chrono::Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }

    fn put(&mut self, store: &str, id: &str, value: &str) -> Result<()> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO records (store, id, value) VALUES (?1, ?2, ?3)",
            params![store, id, value],
        )?;
        Ok(())
    }

    fn get(&self, store: &str, id: &str) -> Result<Option<String>> {
        self.conn()?
            .query_row(
                "SELECT value FROM records WHERE store = ?1 AND id = ?2",
                params![store, id],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    fn get_all(&self, store: &str) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT value FROM records WHERE store = ?1 ORDER BY id")?;
        let values = stmt
            .query_map([store], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(values)
    }

    fn delete(&mut self, store: &str, id: &str) -> Result<()> {
        self.conn()?.execute(
            "DELETE FROM records WHERE store = ?1 AND id = ?2",
            params![store, id],
        )?;
        Ok(())
    }

    fn count(&self, store: &str) -> Result<usize> {
        let count: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM records WHERE store = ?1",
            [store],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn store_names(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT name FROM object_stores ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }

    fn schema_version(&self) -> Result<i64> {
        let version = self
            .conn()?
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;
        Ok(version)
    }

    fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| Error::from(e))?;
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.conn.is_none()
    }
}

enum Location {
    File(PathBuf),
    /// Shared-cache memory database. The anchor connection keeps it alive
    /// while individual sessions come and go.
    ///
    /// Shared-cache connections take table locks that fail with
    /// `SQLITE_LOCKED` instead of waiting on the busy timeout, so every
    /// session on the same database runs its statements under `gate`.
    Memory {
        uri: String,
        gate: Arc<Mutex<()>>,
        _anchor: Mutex<Connection>,
    },
}

/// Opens [`SqliteStore`] sessions against one database
pub struct SqliteBackend {
    location: Location,
}

impl SqliteBackend {
    /// Backend for a database file
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            location: Location::File(path.into()),
        }
    }

    /// Backend for a named in-memory database that lives as long as the backend
    pub fn memory(name: &str) -> Result<Self> {
        let uri = format!(
            "file:{}-{}?mode=memory&cache=shared",
            name,
            uuid::Uuid::new_v4().simple()
        );
        let anchor = SqliteStore::open_uri(&uri)?;
        let conn = anchor
            .conn
            .ok_or_else(|| Error::InvalidState("anchor connection closed".to_string()))?;
        Ok(Self {
            location: Location::Memory {
                uri,
                gate: Arc::new(Mutex::new(())),
                _anchor: Mutex::new(conn),
            },
        })
    }
}

/// A session on a shared-cache memory database, serialized with its siblings
struct GatedSession {
    inner: SqliteStore,
    gate: Arc<Mutex<()>>,
}

fn lock_gate(gate: &Mutex<()>) -> Result<MutexGuard<'_, ()>> {
    gate.lock()
        .map_err(|_| Error::Task("memory database gate poisoned".to_string()))
}

impl GatedSession {
    fn open(uri: &str, gate: Arc<Mutex<()>>) -> Result<Self> {
        let inner = {
            let _guard = lock_gate(&gate)?;
            SqliteStore::open_uri(uri)?
        };
        Ok(Self { inner, gate })
    }
}

impl Session for GatedSession {
    fn create_store(&mut self, store: &str) -> Result<()> {
        let _guard = lock_gate(&self.gate)?;
        self.inner.create_store(store)
    }

    fn put(&mut self, store: &str, id: &str, value: &str) -> Result<()> {
        let _guard = lock_gate(&self.gate)?;
        self.inner.put(store, id, value)
    }

    fn get(&self, store: &str, id: &str) -> Result<Option<String>> {
        let _guard = lock_gate(&self.gate)?;
        self.inner.get(store, id)
    }

    fn get_all(&self, store: &str) -> Result<Vec<String>> {
        let _guard = lock_gate(&self.gate)?;
        self.inner.get_all(store)
    }

    fn delete(&mut self, store: &str, id: &str) -> Result<()> {
        let _guard = lock_gate(&self.gate)?;
        self.inner.delete(store, id)
    }

    fn count(&self, store: &str) -> Result<usize> {
        let _guard = lock_gate(&self.gate)?;
        self.inner.count(store)
    }

    fn store_names(&self) -> Result<Vec<String>> {
        let _guard = lock_gate(&self.gate)?;
        self.inner.store_names()
    }

    fn schema_version(&self) -> Result<i64> {
        let _guard = lock_gate(&self.gate)?;
        self.inner.schema_version()
    }

    fn close(&mut self) -> Result<()> {
        let _guard = lock_gate(&self.gate)?;
        self.inner.close()
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

impl Backend for SqliteBackend {
    fn open(&self) -> Result<Box<dyn Session>> {
        match &self.location {
            Location::File(path) => Ok(Box::new(SqliteStore::open(path)?)),
            Location::Memory { uri, gate, .. } => {
                Ok(Box::new(GatedSession::open(uri, Arc::clone(gate))?))
            }
        }
    }

    fn describe(&self) -> String {
        match &self.location {
            Location::File(path) => path.display().to_string(),
            Location::Memory { uri, .. } => uri.clone(),
        }
    }
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct DbStats {
    pub location: String,
    pub schema_version: i64,
    pub stores: Vec<StoreStats>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct StoreStats {
    pub name: String,
    pub records: usize,
}

impl DbStats {
    pub fn total_records(&self) -> usize {
        self.stores.iter().map(|s| s.records).sum()
    }
}

impl std::fmt::Display for DbStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Database Statistics:")?;
        writeln!(f, "  Location: {}", self.location)?;
        writeln!(f, "  Schema version: {}", self.schema_version)?;
        for store in &self.stores {
            writeln!(f, "  {}: {}", store.name, store.records)?;
        }
        write!(f, "  Total records: {}", self.total_records())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(name: &str) -> SqliteStore {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.create_store(name).unwrap();
        store
    }

    #[test]
    fn test_record_crud() {
        let mut store = store_with("posts");

        store.put("posts", "1", r#"{"id":"1","title":"hello"}"#).unwrap();
        assert_eq!(
            store.get("posts", "1").unwrap().as_deref(),
            Some(r#"{"id":"1","title":"hello"}"#)
        );

        store.put("posts", "1", r#"{"id":"1","title":"again"}"#).unwrap();
        assert_eq!(store.count("posts").unwrap(), 1);

        store.delete("posts", "1").unwrap();
        assert!(store.get("posts", "1").unwrap().is_none());

        // deleting a missing id is fine
        store.delete("posts", "1").unwrap();
    }

    #[test]
    fn test_stores_are_partitioned() {
        let mut store = store_with("files");
        store.create_store("objects").unwrap();

        store.put("files", "a", "{}").unwrap();
        store.put("objects", "a", "[]").unwrap();

        assert_eq!(store.get_all("files").unwrap(), vec!["{}".to_string()]);
        assert_eq!(store.get_all("objects").unwrap(), vec!["[]".to_string()]);
        assert_eq!(store.store_names().unwrap(), vec!["files", "objects"]);
    }

    #[test]
    fn test_closed_session_is_stale() {
        let mut store = store_with("files");
        store.close().unwrap();

        assert!(store.is_closed());
        let err = store.get("files", "a").unwrap_err();
        assert!(err.is_stale());
    }

    #[test]
    fn test_schema_version_is_recorded() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.schema_version().unwrap(), schema::SCHEMA_VERSION);
    }

    #[test]
    fn test_newer_database_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.pragma_update(None, "user_version", schema::SCHEMA_VERSION + 1)
                .unwrap();
        }

        let err = SqliteStore::open(&path).err().unwrap();
        assert!(matches!(err, Error::VersionMismatch { .. }));
    }

    #[test]
    fn test_memory_backend_shares_data_between_sessions() {
        let backend = SqliteBackend::memory("shared").unwrap();

        let mut first = backend.open().unwrap();
        first.create_store("files").unwrap();
        first.put("files", "1", "{}").unwrap();
        first.close().unwrap();

        let second = backend.open().unwrap();
        assert_eq!(second.count("files").unwrap(), 1);
        assert_eq!(second.schema_version().unwrap(), schema::SCHEMA_VERSION);
    }

    #[test]
    fn test_memory_sessions_write_concurrently() {
        let backend = Arc::new(SqliteBackend::memory("writers").unwrap());
        backend.open().unwrap().create_store("posts").unwrap();

        let writers: Vec<_> = (0..4)
            .map(|w| {
                let backend = Arc::clone(&backend);
                std::thread::spawn(move || {
                    let mut session = backend.open().unwrap();
                    for i in 0..50 {
                        session.put("posts", &format!("{w}-{i}"), "{}").unwrap();
                        session.count("posts").unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        assert_eq!(backend.open().unwrap().count("posts").unwrap(), 200);
    }
}
