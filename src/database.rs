//! Composition root
//!
//! A [`Database`] ties a backend, a retry policy and a change bus together and
//! hands out collection handles and value slots that share them.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use crate::collection::Collection;
use crate::config::StashConfig;
use crate::events::{ChangeBus, ChangeSubscription};
use crate::models::{FILES_STORE, MediaFile, OBJECTS_STORE, POSTS_STORE, Post};
use crate::record::{Document, Item};
use crate::retry::RetryPolicy;
use crate::slot::{SlotScope, ValueSlot};
use crate::storage::schema::DEFAULT_DATABASE_NAME;
use crate::storage::sqlite::StoreStats;
use crate::storage::{Backend, DbStats, SqliteBackend};
use crate::{Error, Result};

/// Values of session-scoped slots, shared by every slot of one database
pub(crate) type SessionValues = Arc<Mutex<HashMap<String, Value>>>;

pub struct Database {
    name: String,
    backend: Arc<dyn Backend>,
    retry: RetryPolicy,
    bus: ChangeBus,
    session_values: SessionValues,
}

impl Database {
    /// Database file at `path`, configured from `config`
    pub fn open(path: &Path, config: &StashConfig) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Self::with_backend(
            &config.database.name,
            Arc::new(SqliteBackend::file(path)),
            config.retry,
            ChangeBus::new(config.events.capacity),
        ))
    }

    /// Private in-memory database with default settings
    pub fn in_memory() -> Result<Self> {
        let backend = SqliteBackend::memory(DEFAULT_DATABASE_NAME)?;
        Ok(Self::with_backend(
            DEFAULT_DATABASE_NAME,
            Arc::new(backend),
            RetryPolicy::default(),
            ChangeBus::default(),
        ))
    }

    pub fn with_backend(
        name: &str,
        backend: Arc<dyn Backend>,
        retry: RetryPolicy,
        bus: ChangeBus,
    ) -> Self {
        Self {
            name: name.to_string(),
            backend,
            retry,
            bus,
            session_values: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> String {
        self.backend.describe()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// A new handle on `store`, with its own connection
    pub fn collection<T: Item>(&self, store: &str) -> Result<Collection<T>> {
        Collection::new(Arc::clone(&self.backend), store, self.retry, self.bus.clone())
    }

    pub fn documents(&self, store: &str) -> Result<Collection<Document>> {
        self.collection(store)
    }

    pub fn files(&self) -> Result<Collection<MediaFile>> {
        self.collection(FILES_STORE)
    }

    pub fn objects(&self) -> Result<Collection<Document>> {
        self.collection(OBJECTS_STORE)
    }

    pub fn posts(&self) -> Result<Collection<Post>> {
        self.collection(POSTS_STORE)
    }

    pub fn slot<V>(&self, key: &str, default: V, scope: SlotScope) -> Result<ValueSlot<V>>
    where
        V: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    {
        ValueSlot::new(self, key, default, scope)
    }

    pub fn bus(&self) -> &ChangeBus {
        &self.bus
    }

    pub fn subscribe(&self) -> ChangeSubscription {
        self.bus.subscribe()
    }

    pub(crate) fn session_values(&self) -> SessionValues {
        Arc::clone(&self.session_values)
    }

    /// Record counts per store, read through a short-lived session
    pub async fn stats(&self) -> Result<DbStats> {
        let backend = Arc::clone(&self.backend);

        tokio::task::spawn_blocking(move || -> Result<DbStats> {
            let mut session = backend.open()?;
            let mut stores = Vec::new();
            for name in session.store_names()? {
                let records = session.count(&name)?;
                stores.push(StoreStats { name, records });
            }
            let schema_version = session.schema_version()?;
            session.close()?;
            Ok(DbStats {
                location: backend.describe(),
                schema_version,
                stores,
            })
        })
        .await
        .map_err(|e| Error::Task(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handles_share_data_and_bus() {
        let db = Database::in_memory().unwrap();
        let writer = db.posts().unwrap();
        let reader = db.posts().unwrap();
        let mut sub = db.subscribe().only(POSTS_STORE);

        writer.save(&Post::new("1", "t", "b")).await.unwrap();

        assert_eq!(reader.get("1").await.unwrap().unwrap().title, "t");
        assert_eq!(sub.try_recv().unwrap().store_name, POSTS_STORE);
    }

    #[tokio::test]
    async fn test_stats_counts_per_store() {
        let db = Database::in_memory().unwrap();
        let posts = db.posts().unwrap();
        posts.save(&Post::new("1", "t", "b")).await.unwrap();
        posts.save(&Post::new("2", "t", "b")).await.unwrap();
        db.files().unwrap().get_all().await.unwrap();

        let stats = db.stats().await.unwrap();
        assert_eq!(stats.total_records(), 2);
        assert_eq!(stats.schema_version, 1);
        let names: Vec<_> = stats.stores.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec![FILES_STORE, POSTS_STORE]);
    }

    #[tokio::test]
    async fn test_file_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".stashdb").join("app_database.db");
        let config = StashConfig::default();

        {
            let db = Database::open(&path, &config).unwrap();
            let objects = db.objects().unwrap();
            objects.save(&Document::new("k").with("v", 1)).await.unwrap();
            objects.close().await.unwrap();
        }

        let db = Database::open(&path, &config).unwrap();
        let doc = db.objects().unwrap().get("k").await.unwrap().unwrap();
        assert_eq!(doc.get("v"), Some(&serde_json::json!(1)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_handles_on_memory_database() {
        let db = Database::in_memory().unwrap();
        let handles: Vec<_> = (0..4).map(|_| Arc::new(db.posts().unwrap())).collect();

        let mut tasks = Vec::new();
        for (h, posts) in handles.iter().enumerate() {
            for i in 0..50 {
                let posts = Arc::clone(posts);
                tasks.push(tokio::spawn(async move {
                    posts.save(&Post::new(&format!("{h}-{i}"), "t", "b")).await
                }));
            }
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(db.posts().unwrap().count().await.unwrap(), 200);
    }
}
