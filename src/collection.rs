//! Keyed object store accessor
//!
//! A [`Collection`] is the handle a long-lived context holds for one store. It
//! owns its own [`Connection`], retries stale-connection failures according to
//! its [`RetryPolicy`], and publishes a change event on the shared
//! [`ChangeBus`] after every mutation.
//!
//! Operations do not coordinate with each other: `update` reads, merges and
//! writes without excluding a concurrent `save` or `delete` issued through
//! another handle.

use std::marker::PhantomData;
use std::sync::Arc;
use crate::connection::{Connection, ConnectionState};
use crate::events::ChangeBus;
use crate::record::{Item, now_millis};
use crate::retry::RetryPolicy;
use crate::storage::Backend;
use crate::{Error, Result};

pub struct Collection<T: Item> {
    conn: Connection,
    retry: RetryPolicy,
    bus: ChangeBus,
    _record: PhantomData<fn() -> T>,
}

impl<T: Item> Collection<T> {
    pub fn new(
        backend: Arc<dyn Backend>,
        store: &str,
        retry: RetryPolicy,
        bus: ChangeBus,
    ) -> Result<Self> {
        if store.trim().is_empty() {
            return Err(Error::InvalidStoreName(store.to_string()));
        }
        Ok(Self {
            conn: Connection::new(backend, store),
            retry,
            bus,
            _record: PhantomData,
        })
    }

    pub fn name(&self) -> &str {
        self.conn.store()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.conn.state()
    }

    /// Insert or overwrite `item`, then announce the change.
    pub async fn save(&self, item: &T) -> Result<()> {
        let id = checked_key(item.id())?.to_string();
        let value = serde_json::to_string(item)?;

        self.retry
            .run("save", || {
                let id = id.clone();
                let value = value.clone();
                self.conn
                    .run(move |session, store| session.put(store, &id, &value))
            })
            .await?;

        self.bus.publish(self.name());
        Ok(())
    }

    /// The record stored under `id`, or `None`
    pub async fn get(&self, id: &str) -> Result<Option<T>> {
        let raw = self
            .retry
            .run("get", || {
                let id = id.to_string();
                self.conn.run(move |session, store| session.get(store, &id))
            })
            .await?;

        raw.map(|value| serde_json::from_str(&value).map_err(Error::from))
            .transpose()
    }

    /// Every record in the store, in key order
    pub async fn get_all(&self) -> Result<Vec<T>> {
        let raw = self
            .retry
            .run("get_all", || {
                self.conn.run(|session, store| session.get_all(store))
            })
            .await?;

        raw.iter()
            .map(|value| serde_json::from_str(value).map_err(Error::from))
            .collect()
    }

    /// Merge `patch` into the record under `id` and refresh its timestamp.
    ///
    /// A missing record is left alone: nothing is written, nothing is
    /// announced, and `Ok(false)` is returned.
    pub async fn update(&self, id: &str, patch: T::Patch) -> Result<bool> {
        let updated = self
            .retry
            .run("update", || {
                let id = id.to_string();
                let patch = patch.clone();
                self.conn.run(move |session, store| {
                    let Some(raw) = session.get(store, &id)? else {
                        return Ok(false);
                    };
                    let mut item: T = serde_json::from_str(&raw)?;
                    item.apply(patch);
                    item.touch(now_millis());
                    session.put(store, &id, &serde_json::to_string(&item)?)?;
                    Ok(true)
                })
            })
            .await?;

        if updated {
            self.bus.publish(self.name());
        } else {
            tracing::debug!("update skipped, '{}' not found in '{}'", id, self.name());
        }
        Ok(updated)
    }

    /// Remove the record under `id`. Always announces the change.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.retry
            .run("delete", || {
                let id = id.to_string();
                self.conn.run(move |session, store| session.delete(store, &id))
            })
            .await?;

        self.bus.publish(self.name());
        Ok(())
    }

    /// Number of records in the store
    pub async fn count(&self) -> Result<usize> {
        self.retry
            .run("count", || self.conn.run(|session, store| session.count(store)))
            .await
    }

    /// Tear down the connection. Later calls reopen it.
    pub async fn close(&self) -> Result<()> {
        self.conn.close().await
    }
}

fn checked_key(id: &str) -> Result<&str> {
    if id.is_empty() {
        return Err(Error::InvalidKey("record id must not be empty".to_string()));
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MediaFile, MediaFilePatch, MediaType, Post, PostPatch};
    use crate::record::{Document, DocumentPatch};
    use crate::storage::{Session, SqliteBackend};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1))
    }

    fn collection<T: Item>(store: &str) -> (Collection<T>, ChangeBus) {
        let backend = Arc::new(SqliteBackend::memory("collection").unwrap());
        let bus = ChangeBus::default();
        let coll = Collection::new(backend, store, fast_retry(), bus.clone()).unwrap();
        (coll, bus)
    }

    fn media(id: &str, timestamp: i64) -> MediaFile {
        MediaFile {
            id: id.into(),
            file_name: "a.txt".into(),
            file_type: MediaType::Jpeg,
            timestamp,
            data: vec![0xff, 0xd8, 0xff],
        }
    }

    #[tokio::test]
    async fn test_save_then_get_round_trips() {
        let (files, _) = collection::<MediaFile>("files");
        let file = media("1", 1000);

        files.save(&file).await.unwrap();
        assert_eq!(files.get("1").await.unwrap(), Some(file));
        assert_eq!(files.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_overwrites_and_notifies_once() {
        let (posts, bus) = collection::<Post>("posts");
        let mut sub = bus.subscribe();

        posts.save(&Post::new("1", "first", "a")).await.unwrap();
        posts.save(&Post::new("1", "second", "b")).await.unwrap();

        assert_eq!(posts.count().await.unwrap(), 1);
        assert_eq!(posts.get("1").await.unwrap().unwrap().title, "second");
        assert_eq!(sub.try_recv().unwrap().store_name, "posts");
        assert_eq!(sub.try_recv().unwrap().store_name, "posts");
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_empty_id_is_rejected() {
        let (posts, bus) = collection::<Post>("posts");
        let mut sub = bus.subscribe();

        let err = posts.save(&Post::new("", "t", "b")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidKey(_)));
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_empty_store_name_is_rejected() {
        let backend = Arc::new(SqliteBackend::memory("names").unwrap());
        let result = Collection::<Post>::new(backend, " ", fast_retry(), ChangeBus::default());
        assert!(matches!(result, Err(Error::InvalidStoreName(_))));
    }

    #[tokio::test]
    async fn test_update_missing_is_silent_noop() {
        let (posts, bus) = collection::<Post>("posts");
        posts.save(&Post::new("1", "t", "b")).await.unwrap();
        let mut sub = bus.subscribe();

        let patch = PostPatch {
            title: Some("x".into()),
            body: None,
        };
        assert!(!posts.update("2", patch).await.unwrap());

        assert_eq!(posts.get_all().await.unwrap(), vec![Post::new("1", "t", "b")]);
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_update_merges_and_refreshes_timestamp() {
        let (files, bus) = collection::<MediaFile>("files");
        files.save(&media("1", 1000)).await.unwrap();
        let mut sub = bus.subscribe();

        let patch = MediaFilePatch {
            file_name: Some("b.txt".into()),
            ..Default::default()
        };
        assert!(files.update("1", patch).await.unwrap());

        let updated = files.get("1").await.unwrap().unwrap();
        assert_eq!(updated.id, "1");
        assert_eq!(updated.file_name, "b.txt");
        assert_eq!(updated.file_type, MediaType::Jpeg);
        assert_eq!(updated.data, vec![0xff, 0xd8, 0xff]);
        assert!(updated.timestamp >= 1000);
        assert_eq!(sub.try_recv().unwrap().store_name, "files");
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_document_update_adds_timestamp() {
        let (objects, _) = collection::<Document>("objects");
        objects.save(&Document::new("1").with("title", "t")).await.unwrap();

        objects
            .update("1", DocumentPatch::new().set("title", "u"))
            .await
            .unwrap();

        let doc = objects.get("1").await.unwrap().unwrap();
        assert_eq!(doc.get("title"), Some(&serde_json::json!("u")));
        assert!(doc.timestamp().is_some());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent_and_always_notifies() {
        let (posts, bus) = collection::<Post>("posts");
        posts.save(&Post::new("1", "t", "b")).await.unwrap();
        let mut sub = bus.subscribe();

        posts.delete("1").await.unwrap();
        posts.delete("1").await.unwrap();

        assert!(posts.get("1").await.unwrap().is_none());
        assert_eq!(sub.try_recv().unwrap().store_name, "posts");
        assert_eq!(sub.try_recv().unwrap().store_name, "posts");
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_get_all_after_save_save_delete() {
        let (posts, _) = collection::<Post>("posts");
        let a = Post::new("a", "A", "");
        let b = Post::new("b", "B", "");

        posts.save(&a).await.unwrap();
        posts.save(&b).await.unwrap();
        posts.delete("a").await.unwrap();

        assert_eq!(posts.get_all().await.unwrap(), vec![b]);
    }

    #[tokio::test]
    async fn test_files_end_to_end() {
        let (files, bus) = collection::<MediaFile>("files");
        let mut listener = bus.subscribe();
        let file = media("1", 1000);

        files.save(&file).await.unwrap();
        assert_eq!(files.get_all().await.unwrap(), vec![file]);
        assert_eq!(listener.recv().await.unwrap().store_name, "files");

        files.delete("1").await.unwrap();
        assert!(files.get_all().await.unwrap().is_empty());
        assert_eq!(listener.recv().await.unwrap().store_name, "files");
    }

    #[tokio::test]
    async fn test_close_then_reuse() {
        let (posts, _) = collection::<Post>("posts");
        posts.save(&Post::new("1", "t", "b")).await.unwrap();

        posts.close().await.unwrap();
        assert_eq!(posts.connection_state(), ConnectionState::Closed);

        assert_eq!(posts.get_all().await.unwrap().len(), 1);
        assert_eq!(posts.connection_state(), ConnectionState::Open);
    }

    /// Backend whose sessions go stale for the first `failures` operations
    struct FlakyBackend {
        inner: SqliteBackend,
        failures: Arc<AtomicU32>,
        opens: Arc<AtomicU32>,
    }

    struct FlakySession {
        inner: Box<dyn Session>,
        failures: Arc<AtomicU32>,
    }

    impl FlakySession {
        fn trip(&self) -> Result<()> {
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                return Err(Error::InvalidState("database connection is closing".into()));
            }
            Ok(())
        }
    }

    impl Session for FlakySession {
        fn create_store(&mut self, store: &str) -> Result<()> {
            self.inner.create_store(store)
        }
        fn put(&mut self, store: &str, id: &str, value: &str) -> Result<()> {
            self.trip()?;
            self.inner.put(store, id, value)
        }
        fn get(&self, store: &str, id: &str) -> Result<Option<String>> {
            self.trip()?;
            self.inner.get(store, id)
        }
        fn get_all(&self, store: &str) -> Result<Vec<String>> {
            self.trip()?;
            self.inner.get_all(store)
        }
        fn delete(&mut self, store: &str, id: &str) -> Result<()> {
            self.trip()?;
            self.inner.delete(store, id)
        }
        fn count(&self, store: &str) -> Result<usize> {
            self.trip()?;
            self.inner.count(store)
        }
        fn store_names(&self) -> Result<Vec<String>> {
            self.inner.store_names()
        }
        fn schema_version(&self) -> Result<i64> {
            self.inner.schema_version()
        }
        fn close(&mut self) -> Result<()> {
            self.inner.close()
        }
        fn is_closed(&self) -> bool {
            self.inner.is_closed()
        }
    }

    impl Backend for FlakyBackend {
        fn open(&self) -> Result<Box<dyn Session>> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FlakySession {
                inner: self.inner.open()?,
                failures: Arc::clone(&self.failures),
            }))
        }

        fn describe(&self) -> String {
            "flaky".to_string()
        }
    }

    fn flaky(failures: u32) -> (Collection<Post>, ChangeBus, Arc<AtomicU32>) {
        let opens = Arc::new(AtomicU32::new(0));
        let backend = Arc::new(FlakyBackend {
            inner: SqliteBackend::memory("flaky").unwrap(),
            failures: Arc::new(AtomicU32::new(failures)),
            opens: Arc::clone(&opens),
        });
        let bus = ChangeBus::default();
        let coll = Collection::new(backend, "posts", fast_retry(), bus.clone()).unwrap();
        (coll, bus, opens)
    }

    #[tokio::test]
    async fn test_two_stale_failures_are_invisible() {
        let (posts, bus, opens) = flaky(2);
        let mut sub = bus.subscribe();

        posts.save(&Post::new("1", "t", "b")).await.unwrap();

        // every stale failure forces a fresh session
        assert_eq!(opens.load(Ordering::SeqCst), 3);
        assert_eq!(sub.try_recv().unwrap().store_name, "posts");
        assert!(sub.try_recv().is_none());
        assert_eq!(posts.get("1").await.unwrap().unwrap().title, "t");
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_the_error() {
        let (posts, bus, opens) = flaky(10);
        let mut sub = bus.subscribe();

        let err = posts.save(&Post::new("1", "t", "b")).await.unwrap_err();

        assert!(err.is_stale());
        assert_eq!(opens.load(Ordering::SeqCst), 4);
        assert!(sub.try_recv().is_none());
        assert_eq!(posts.connection_state(), ConnectionState::Closed);
    }
}
