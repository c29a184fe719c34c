//! Backend seam between collection handles and the storage engine

use crate::Result;

/// An open session against the database.
///
/// Values are JSON text. Once a session is closed every call fails with
/// [`crate::Error::InvalidState`].
pub trait Session: Send {
    /// Register a store. Registering an existing store is a no-op.
    fn create_store(&mut self, store: &str) -> Result<()>;

    /// Insert or overwrite the value stored under `id`.
    fn put(&mut self, store: &str, id: &str, value: &str) -> Result<()>;

    fn get(&self, store: &str, id: &str) -> Result<Option<String>>;

    /// Every value in the store, in key order.
    fn get_all(&self, store: &str) -> Result<Vec<String>>;

    /// Remove `id` if present.
    fn delete(&mut self, store: &str, id: &str) -> Result<()>;

    fn count(&self, store: &str) -> Result<usize>;

    fn store_names(&self) -> Result<Vec<String>>;

    /// Schema version stored in the database itself
    fn schema_version(&self) -> Result<i64>;

    fn close(&mut self) -> Result<()>;

    fn is_closed(&self) -> bool;
}

/// Opens sessions against one named database.
pub trait Backend: Send + Sync {
    fn open(&self) -> Result<Box<dyn Session>>;

    /// Human readable location, used in logs and stats output
    fn describe(&self) -> String;
}
