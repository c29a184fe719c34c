use axum::{
    routing::get,
    Router,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use crate::{Collection, Database, Document};

pub mod routes;

/// Stores the server keeps an open handle on at once
pub const MAX_CACHED_COLLECTIONS: usize = 64;

struct CachedCollection {
    coll: Arc<Collection<Document>>,
    last_used: u64,
}

#[derive(Default)]
struct CollectionCache {
    entries: HashMap<String, CachedCollection>,
    tick: u64,
}

/// Server state
pub struct AppState {
    pub db: Database,
    capacity: usize,
    collections: Mutex<CollectionCache>,
}

impl AppState {
    pub fn new(db: Database) -> Self {
        Self::with_capacity(db, MAX_CACHED_COLLECTIONS)
    }

    pub fn with_capacity(db: Database, capacity: usize) -> Self {
        Self {
            db,
            capacity: capacity.max(1),
            collections: Mutex::new(CollectionCache::default()),
        }
    }

    /// Cached handle on `store`, so requests reuse one connection per store.
    /// The least recently used handle is dropped once the cache is full.
    pub async fn collection(&self, store: &str) -> crate::Result<Arc<Collection<Document>>> {
        let mut cache = self.collections.lock().await;
        cache.tick += 1;
        let tick = cache.tick;

        if let Some(entry) = cache.entries.get_mut(store) {
            entry.last_used = tick;
            return Ok(Arc::clone(&entry.coll));
        }

        let coll = Arc::new(self.db.documents(store)?);
        if cache.entries.len() >= self.capacity {
            let oldest = cache
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(name, _)| name.clone());
            if let Some(name) = oldest {
                // in-flight requests keep their Arc; the connection closes with the last one
                cache.entries.remove(&name);
                tracing::debug!("dropped cached handle on '{}'", name);
            }
        }
        cache.entries.insert(
            store.to_string(),
            CachedCollection {
                coll: Arc::clone(&coll),
                last_used: tick,
            },
        );
        Ok(coll)
    }

    /// Stores that currently have a cached handle, sorted
    pub async fn cached_stores(&self) -> Vec<String> {
        let cache = self.collections.lock().await;
        let mut names: Vec<String> = cache.entries.keys().cloned().collect();
        names.sort();
        names
    }
}

pub fn router(state: Arc<AppState>, static_dir: Option<PathBuf>) -> Router {
    let app = Router::new()
        .route("/stats", get(routes::get_stats))
        .route("/events", get(routes::stream_events))
        .route("/stores/{store}", get(routes::list_records))
        .route(
            "/stores/{store}/{id}",
            get(routes::get_record)
                .put(routes::put_record)
                .patch(routes::patch_record)
                .delete(routes::delete_record),
        );

    let app = match static_dir {
        Some(dir) => app.fallback_service(ServeDir::new(dir)),
        None => app,
    };

    app.layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(db: Database, port: u16, static_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let location = db.location();
    let state = Arc::new(AppState::new(db));
    let app = router(state, static_dir);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Starting server on {} for {}", addr, location);
    crate::ui::status(crate::ui::Icons::GLOBE, "Server running at", &format!("http://{}", addr));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
