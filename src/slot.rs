//! Single keyed values with a default
//!
//! A [`ValueSlot`] holds one JSON-serializable value under a key. `Local` slots
//! persist in the `local_storage` store; `Session` slots live in memory for as
//! long as the owning [`Database`]. Reads never fail: anything missing or
//! undecodable yields the default.

use std::marker::PhantomData;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::collection::Collection;
use crate::database::{Database, SessionValues};
use crate::events::ChangeBus;
use crate::record::Item;
use crate::{Error, Result};

pub const LOCAL_STORE: &str = "local_storage";
pub const SESSION_STORE: &str = "session_storage";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotScope {
    Local,
    Session,
}

impl SlotScope {
    pub fn store_name(&self) -> &'static str {
        match self {
            SlotScope::Local => LOCAL_STORE,
            SlotScope::Session => SESSION_STORE,
        }
    }
}

/// Row shape of a local slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotEntry {
    pub id: String,
    pub value: Value,
}

impl Item for SlotEntry {
    type Patch = Value;

    fn id(&self) -> &str {
        &self.id
    }

    fn apply(&mut self, patch: Value) {
        self.value = patch;
    }
}

enum Backing {
    Local(Collection<SlotEntry>),
    Session(SessionValues),
}

pub struct ValueSlot<V> {
    key: String,
    default: V,
    scope: SlotScope,
    backing: Backing,
    bus: ChangeBus,
    _value: PhantomData<fn() -> V>,
}

impl<V> ValueSlot<V>
where
    V: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub(crate) fn new(db: &Database, key: &str, default: V, scope: SlotScope) -> Result<Self> {
        if key.is_empty() {
            return Err(Error::InvalidKey("slot key must not be empty".to_string()));
        }
        let backing = match scope {
            SlotScope::Local => Backing::Local(db.collection(LOCAL_STORE)?),
            SlotScope::Session => Backing::Session(db.session_values()),
        };
        Ok(Self {
            key: key.to_string(),
            default,
            scope,
            backing,
            bus: db.bus().clone(),
            _value: PhantomData,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn scope(&self) -> SlotScope {
        self.scope
    }

    pub fn default_value(&self) -> &V {
        &self.default
    }

    /// The stored value, or the default when missing or unreadable
    pub async fn get(&self) -> V {
        match self.read().await {
            Ok(Some(value)) => value,
            Ok(None) => self.default.clone(),
            Err(err) => {
                tracing::warn!("error reading slot '{}': {}", self.key, err);
                self.default.clone()
            }
        }
    }

    async fn read(&self) -> Result<Option<V>> {
        let raw = match &self.backing {
            Backing::Local(coll) => coll.get(&self.key).await?.map(|entry| entry.value),
            Backing::Session(values) => session_map(values)?.get(&self.key).cloned(),
        };
        raw.map(|value| serde_json::from_value(value).map_err(Error::from))
            .transpose()
    }

    pub async fn set(&self, value: V) -> Result<()> {
        let value = serde_json::to_value(&value)?;
        match &self.backing {
            Backing::Local(coll) => {
                let entry = SlotEntry {
                    id: self.key.clone(),
                    value,
                };
                coll.save(&entry).await
            }
            Backing::Session(values) => {
                session_map(values)?.insert(self.key.clone(), value);
                self.bus.publish(SESSION_STORE);
                Ok(())
            }
        }
    }

    /// Compute the new value from the current one and store it
    pub async fn update<F>(&self, f: F) -> Result<V>
    where
        F: FnOnce(V) -> V,
    {
        let next = f(self.get().await);
        self.set(next.clone()).await?;
        Ok(next)
    }

    /// Remove the stored value; later reads return the default
    pub async fn clear(&self) -> Result<()> {
        match &self.backing {
            Backing::Local(coll) => coll.delete(&self.key).await,
            Backing::Session(values) => {
                session_map(values)?.remove(&self.key);
                self.bus.publish(SESSION_STORE);
                Ok(())
            }
        }
    }
}

fn session_map(
    values: &SessionValues,
) -> Result<std::sync::MutexGuard<'_, std::collections::HashMap<String, Value>>> {
    values
        .lock()
        .map_err(|_| Error::Task("session values lock poisoned".to_string()))
}
