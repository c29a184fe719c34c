//! In-process change notifications
//!
//! Every successful mutation publishes one [`ChangeEvent`] carrying the store
//! name. Listeners only see events published after they subscribed.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::{Stream, StreamExt};

/// Name of the change event, as exposed to front-end listeners
pub const CHANGE_EVENT: &str = "db-changed";

/// Default number of events a slow listener may fall behind by
pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub store_name: String,
}

/// Publish/subscribe channel for change events, owned by a [`crate::Database`]
#[derive(Debug, Clone)]
pub struct ChangeBus {
    tx: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ChangeBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Announce a change to `store`. Returns how many listeners were reached.
    pub fn publish(&self, store: &str) -> usize {
        let event = ChangeEvent {
            store_name: store.to_string(),
        };
        // No listeners is not an error
        let reached = self.tx.send(event).unwrap_or(0);
        tracing::debug!("{} -> {} ({} listeners)", CHANGE_EVENT, store, reached);
        reached
    }

    pub fn subscribe(&self) -> ChangeSubscription {
        ChangeSubscription {
            rx: self.tx.subscribe(),
            filter: None,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// A listener on a [`ChangeBus`]
#[derive(Debug)]
pub struct ChangeSubscription {
    rx: broadcast::Receiver<ChangeEvent>,
    filter: Option<String>,
}

impl ChangeSubscription {
    /// Only yield events for `store`
    pub fn only(mut self, store: impl Into<String>) -> Self {
        self.filter = Some(store.into());
        self
    }

    fn wants(&self, event: &ChangeEvent) -> bool {
        self.filter
            .as_deref()
            .is_none_or(|store| store == event.store_name)
    }

    /// Wait for the next matching event. `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.wants(&event) => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("change listener lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching event if one is already queued
    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if self.wants(&event) => return Some(event),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!("change listener lagged, skipped {} events", skipped);
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Matching events as a stream that ends with the bus. Lagged gaps are
    /// logged and skipped.
    pub fn into_stream(self) -> impl Stream<Item = ChangeEvent> + Send + 'static {
        let filter = self.filter;
        BroadcastStream::new(self.rx).filter_map(move |item| match item {
            Ok(event) if filter.as_deref().is_none_or(|store| store == event.store_name) => {
                Some(event)
            }
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!("event stream lagged, skipped {} events", skipped);
                None
            }
        })
    }
}
