//! Event bus implementation.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tracing::{debug, warn};

use crate::job::JobKey;
use crate::metrics::{LISTENERS_ACTIVE, RECORDS_PUBLISHED};
use crate::progress::ProgressRecord;

/// Errors a listener can report back to the bus.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The consumer is gone; the bus drops the listener.
    #[error("listener disconnected")]
    Disconnected,

    /// The listener could not handle this record; it stays subscribed.
    #[error("listener rejected record: {0}")]
    Rejected(String),
}

/// A callback receiving records for one job key.
///
/// Listeners run synchronously inside `publish` and must not block or call
/// back into the bus for the same key.
pub type Listener = Arc<dyn Fn(&ProgressRecord) -> Result<(), ListenerError> + Send + Sync>;

/// Wraps a closure into a [`Listener`].
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(&ProgressRecord) -> Result<(), ListenerError> + Send + Sync + 'static,
{
    Arc::new(f)
}

#[derive(Default)]
struct Topic {
    listeners: Vec<(u64, Listener)>,
    latest: Option<ProgressRecord>,
}

#[derive(Default)]
struct BusInner {
    topics: RwLock<HashMap<JobKey, Arc<Mutex<Topic>>>>,
    next_id: AtomicU64,
}

impl BusInner {
    fn topic(&self, key: &JobKey) -> Arc<Mutex<Topic>> {
        if let Some(topic) = self.topics.read().get(key) {
            return Arc::clone(topic);
        }
        Arc::clone(self.topics.write().entry(key.clone()).or_default())
    }

    fn existing_topic(&self, key: &JobKey) -> Option<Arc<Mutex<Topic>>> {
        self.topics.read().get(key).cloned()
    }

    fn remove_listener(&self, key: &JobKey, id: u64) -> bool {
        let Some(topic) = self.existing_topic(key) else {
            return false;
        };
        let mut topic = topic.lock();
        let before = topic.listeners.len();
        topic.listeners.retain(|(listener_id, _)| *listener_id != id);
        let removed = topic.listeners.len() != before;
        if removed {
            LISTENERS_ACTIVE.dec();
        }
        removed
    }
}

/// Per-key publish/subscribe table.
///
/// Cloning is cheap; clones share the same table.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("topics", &self.inner.topics.read().len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener for `key`. Dropping the returned handle unsubscribes.
    pub fn subscribe(&self, key: &JobKey, listener: Listener) -> Subscription {
        self.subscribe_with_snapshot(key, listener).1
    }

    /// Registers a listener and returns the latest record atomically with the
    /// registration: every record published afterwards reaches the listener,
    /// and the snapshot is never also delivered as a new event.
    pub fn subscribe_with_snapshot(
        &self,
        key: &JobKey,
        listener: Listener,
    ) -> (Option<ProgressRecord>, Subscription) {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let topic = self.inner.topic(key);
        let snapshot = {
            let mut topic = topic.lock();
            topic.listeners.push((id, listener));
            topic.latest.clone()
        };
        LISTENERS_ACTIVE.inc();
        debug!(key = %key, listener = id, "Listener subscribed");

        let subscription = Subscription {
            bus: Arc::downgrade(&self.inner),
            key: key.clone(),
            id,
            active: true,
        };
        (snapshot, subscription)
    }

    /// Delivers `record` to every listener of `key`, in subscription order.
    ///
    /// A listener that fails or panics never prevents delivery to the others.
    /// Listeners reporting [`ListenerError::Disconnected`] or panicking are
    /// removed.
    pub fn publish(&self, key: &JobKey, record: ProgressRecord) {
        RECORDS_PUBLISHED
            .with_label_values(&[record.kind.as_str()])
            .inc();

        let topic = self.inner.topic(key);
        let mut topic = topic.lock();

        let mut dead = Vec::new();
        for (id, listener) in &topic.listeners {
            match catch_unwind(AssertUnwindSafe(|| listener(&record))) {
                Ok(Ok(())) => {}
                Ok(Err(ListenerError::Disconnected)) => {
                    debug!(key = %key, listener = id, "Listener disconnected");
                    dead.push(*id);
                }
                Ok(Err(e)) => {
                    warn!(key = %key, listener = id, "Listener failed: {}", e);
                }
                Err(_) => {
                    warn!(key = %key, listener = id, "Listener panicked, dropping it");
                    dead.push(*id);
                }
            }
        }

        if !dead.is_empty() {
            topic.listeners.retain(|(id, _)| !dead.contains(id));
            LISTENERS_ACTIVE.sub(dead.len() as i64);
        }

        topic.latest = Some(record);
    }

    /// Latest record published for `key`, if any.
    pub fn latest(&self, key: &JobKey) -> Option<ProgressRecord> {
        self.inner
            .existing_topic(key)
            .and_then(|topic| topic.lock().latest.clone())
    }

    /// Number of listeners currently registered for `key`.
    pub fn listener_count(&self, key: &JobKey) -> usize {
        self.inner
            .existing_topic(key)
            .map(|topic| topic.lock().listeners.len())
            .unwrap_or(0)
    }
}

/// Registration handle returned by [`EventBus::subscribe`].
///
/// The listener is removed when the handle is dropped or
/// [`unsubscribe`](Subscription::unsubscribe) is called.
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    bus: Weak<BusInner>,
    key: JobKey,
    id: u64,
    active: bool,
}

impl Subscription {
    pub fn key(&self) -> &JobKey {
        &self.key
    }

    /// Removes the listener now.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        if let Some(bus) = self.bus.upgrade() {
            if bus.remove_listener(&self.key, self.id) {
                debug!(key = %self.key, listener = self.id, "Listener unsubscribed");
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("id", &self.id)
            .field("active", &self.active)
            .finish()
    }
}
