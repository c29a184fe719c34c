//! Per-handle database connection
//!
//! A [`Connection`] owns at most one open [`Session`] for a single store. It
//! opens lazily, registers the store on open, and reopens after the session
//! was closed or reported stale.

use std::sync::{Arc, Mutex, MutexGuard};
use crate::storage::{Backend, Session};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Uninitialized,
    Opening,
    Open,
    Closed,
}

struct Shared {
    state: Mutex<ConnectionState>,
    session: Mutex<Option<Box<dyn Session>>>,
}

impl Shared {
    fn set_state(&self, state: ConnectionState) {
        if let Ok(mut guard) = self.state.lock() {
            *guard = state;
        }
    }

    fn lock_session(&self) -> Result<MutexGuard<'_, Option<Box<dyn Session>>>> {
        self.session
            .lock()
            .map_err(|_| Error::Task("connection lock poisoned".to_string()))
    }
}

/// Connection handle owned by one collection handle. Not pooled.
pub struct Connection {
    backend: Arc<dyn Backend>,
    store: String,
    shared: Arc<Shared>,
}

impl Connection {
    pub fn new(backend: Arc<dyn Backend>, store: impl Into<String>) -> Self {
        Self {
            backend,
            store: store.into(),
            shared: Arc::new(Shared {
                state: Mutex::new(ConnectionState::Uninitialized),
                session: Mutex::new(None),
            }),
        }
    }

    pub fn store(&self) -> &str {
        &self.store
    }

    pub fn state(&self) -> ConnectionState {
        self.shared
            .state
            .lock()
            .map(|state| *state)
            .unwrap_or(ConnectionState::Closed)
    }

    /// Run `op` against an open session on the blocking pool.
    ///
    /// A stale failure drops the session so the next call reopens it.
    pub async fn run<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&mut dyn Session, &str) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        let shared = Arc::clone(&self.shared);
        let store = self.store.clone();

        tokio::task::spawn_blocking(move || -> Result<T> {
            let mut guard = shared.lock_session()?;
            let result = ensure_open(&shared, &mut guard, backend.as_ref(), &store)
                .and_then(|session| op(session, &store));

            if let Err(err) = &result {
                if err.is_stale() {
                    tracing::debug!("dropping stale connection for store '{}'", store);
                    if let Some(mut session) = guard.take() {
                        let _ = session.close();
                    }
                    shared.set_state(ConnectionState::Closed);
                }
            }
            result
        })
        .await
        .map_err(|e| Error::Task(e.to_string()))?
    }

    /// Close the session. The handle stays usable and reopens on demand.
    pub async fn close(&self) -> Result<()> {
        let shared = Arc::clone(&self.shared);
        let store = self.store.clone();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut guard = shared.lock_session()?;
            let result = match guard.take() {
                Some(mut session) => session.close(),
                None => Ok(()),
            };
            if shared.state.lock().is_ok_and(|s| *s != ConnectionState::Uninitialized) {
                shared.set_state(ConnectionState::Closed);
            }
            tracing::debug!("closed connection for store '{}'", store);
            result
        })
        .await
        .map_err(|e| Error::Task(e.to_string()))?
    }
}

fn ensure_open<'a>(
    shared: &Shared,
    slot: &'a mut Option<Box<dyn Session>>,
    backend: &dyn Backend,
    store: &str,
) -> Result<&'a mut dyn Session> {
    let usable = slot.as_ref().is_some_and(|session| !session.is_closed());
    if !usable {
        shared.set_state(ConnectionState::Opening);
        tracing::debug!("opening {} for store '{}'", backend.describe(), store);

        let opened = backend.open().and_then(|mut session| {
            session.create_store(store)?;
            Ok(session)
        });
        match opened {
            Ok(session) => {
                *slot = Some(session);
                shared.set_state(ConnectionState::Open);
            }
            Err(err) => {
                *slot = None;
                shared.set_state(ConnectionState::Closed);
                return Err(err);
            }
        }
    }

    match slot.as_deref_mut() {
        Some(session) => Ok(session),
        None => Err(Error::InvalidState(format!("no session for store '{}'", store))),
    }
}
