// Ref-counted subscription registry
//
// One registry per event class. At most one upstream channel per key; the
// latest decoded value lives in a watch cell that consumers observe. The
// check-and-increment in `acquire` happens under the map's entry lock, before
// the channel is opened, so concurrent acquires for one key open one channel.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info};

use crate::error::ClassifiedError;
use crate::subscription::ChannelHandle;

/// What a consumer currently sees for one key
#[derive(Debug)]
pub enum ChannelState<R> {
    /// Channel requested, nothing received yet
    Pending,
    /// Latest decoded record
    Value(Arc<R>),
    /// Last inbound frame was an error; the previous value is gone
    Failed(ClassifiedError),
    /// Channel torn down by the registry
    Closed,
}

impl<R> Clone for ChannelState<R> {
    fn clone(&self) -> Self {
        match self {
            ChannelState::Pending => ChannelState::Pending,
            ChannelState::Value(v) => ChannelState::Value(Arc::clone(v)),
            ChannelState::Failed(e) => ChannelState::Failed(e.clone()),
            ChannelState::Closed => ChannelState::Closed,
        }
    }
}

impl<R> ChannelState<R> {
    pub fn value(&self) -> Option<&Arc<R>> {
        match self {
            ChannelState::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ClassifiedError> {
        match self {
            ChannelState::Failed(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ChannelState::Pending)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, ChannelState::Closed)
    }
}

/// Registry statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    pub active_channels: usize,
    pub total_opened: u64,
    pub total_closed: u64,
    pub events_received: u64,
    pub errors_received: u64,
    pub dropped_after_release: u64,
}

#[derive(Debug, Default)]
struct Counters {
    opened: AtomicU64,
    closed: AtomicU64,
    events: AtomicU64,
    errors: AtomicU64,
    dropped: AtomicU64,
}

/// Callbacks handed to the open function; they write into the entry's cell
pub struct ChannelSink<R> {
    state: Arc<watch::Sender<ChannelState<R>>>,
    live: Arc<AtomicBool>,
    counters: Arc<Counters>,
}

impl<R> Clone for ChannelSink<R> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            live: Arc::clone(&self.live),
            counters: Arc::clone(&self.counters),
        }
    }
}

impl<R> ChannelSink<R> {
    /// Write `next` unless the entry is torn down. The check runs under the
    /// cell's write lock, the same lock `Closed` is published under, so no
    /// value can land after `Closed`.
    fn publish(&self, next: ChannelState<R>) -> bool {
        let live = &self.live;
        let written = self.state.send_if_modified(|state| {
            if !live.load(Ordering::SeqCst) || state.is_closed() {
                return false;
            }
            *state = next;
            true
        });
        if !written {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
        }
        written
    }

    /// Overwrite the latest value
    pub fn on_event(&self, record: R) {
        if self.publish(ChannelState::Value(Arc::new(record))) {
            self.counters.events.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Clear the latest value and publish the error
    pub fn on_error(&self, error: ClassifiedError) {
        if self.publish(ChannelState::Failed(error)) {
            self.counters.errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

struct RegistryEntry<R> {
    id: u64,
    ref_count: usize,
    handle: Box<dyn ChannelHandle>,
    state: Arc<watch::Sender<ChannelState<R>>>,
    live: Arc<AtomicBool>,
}

impl<R> RegistryEntry<R> {
    // Drop in-flight frames first, then close the transport
    fn shutdown(self) {
        self.live.store(false, Ordering::SeqCst);
        self.handle.cancel();
        self.state.send_replace(ChannelState::Closed);
    }
}

struct RegistryInner<R> {
    name: &'static str,
    entries: DashMap<String, RegistryEntry<R>>,
    next_id: AtomicU64,
    counters: Arc<Counters>,
}

impl<R> RegistryInner<R> {
    /// Decrement `key`; when `entry_id` is given only that entry is touched
    fn release(&self, key: &str, entry_id: Option<u64>) -> bool {
        let removed = match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if entry_id.is_some_and(|id| occupied.get().id != id) {
                    return false;
                }
                let entry = occupied.get_mut();
                entry.ref_count = entry.ref_count.saturating_sub(1);
                debug!(
                    target: "registry",
                    registry = self.name,
                    key = %key,
                    ref_count = entry.ref_count,
                    "Released subscription"
                );
                if entry.ref_count == 0 {
                    Some(occupied.remove())
                } else {
                    None
                }
            }
            Entry::Vacant(_) => return false,
        };

        if let Some(entry) = removed {
            entry.shutdown();
            self.counters.closed.fetch_add(1, Ordering::Relaxed);
            info!(target: "registry", registry = self.name, key = %key, "Channel closed");
        }
        true
    }
}

/// Keyed, ref-counted registry of live channels for one event class
pub struct SubscriptionRegistry<R> {
    inner: Arc<RegistryInner<R>>,
}

impl<R> Clone for SubscriptionRegistry<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R> SubscriptionRegistry<R>
where
    R: Send + Sync + 'static,
{
    pub fn new(name: &'static str) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                name,
                entries: DashMap::new(),
                next_id: AtomicU64::new(1),
                counters: Arc::new(Counters::default()),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Join the channel for `key`, opening it with `open_fn` if this is the
    /// first subscriber. `open_fn` must not call back into this registry.
    pub fn acquire<F, H>(&self, key: &str, open_fn: F) -> SubscriptionGuard<R>
    where
        F: FnOnce(ChannelSink<R>) -> H,
        H: ChannelHandle + 'static,
    {
        let inner = &self.inner;
        let (entry_id, receiver) = match inner.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                entry.ref_count += 1;
                debug!(
                    target: "registry",
                    registry = inner.name,
                    key = %key,
                    ref_count = entry.ref_count,
                    "Reusing channel"
                );
                (entry.id, entry.state.subscribe())
            }
            Entry::Vacant(vacant) => {
                let id = inner.next_id.fetch_add(1, Ordering::Relaxed);
                let (tx, rx) = watch::channel(ChannelState::Pending);
                let state = Arc::new(tx);
                let live = Arc::new(AtomicBool::new(true));
                let sink = ChannelSink {
                    state: Arc::clone(&state),
                    live: Arc::clone(&live),
                    counters: Arc::clone(&inner.counters),
                };

                let handle = open_fn(sink);
                vacant.insert(RegistryEntry {
                    id,
                    ref_count: 1,
                    handle: Box::new(handle),
                    state,
                    live,
                });
                inner.counters.opened.fetch_add(1, Ordering::Relaxed);
                info!(target: "registry", registry = inner.name, key = %key, "Channel opened");
                (id, rx)
            }
        };

        SubscriptionGuard {
            registry: Arc::clone(inner),
            key: key.to_string(),
            entry_id,
            receiver,
            released: false,
        }
    }

    /// Drop one reference to `key`. Returns false if no entry exists.
    pub fn release(&self, key: &str) -> bool {
        self.inner.release(key, None)
    }

    /// Latest value for `key`, without touching the ref count
    pub fn peek(&self, key: &str) -> Option<Arc<R>> {
        self.inner
            .entries
            .get(key)
            .and_then(|entry| entry.state.borrow().value().cloned())
    }

    pub fn state(&self, key: &str) -> Option<ChannelState<R>> {
        self.inner
            .entries
            .get(key)
            .map(|entry| entry.state.borrow().clone())
    }

    pub fn ref_count(&self, key: &str) -> usize {
        self.inner
            .entries
            .get(key)
            .map(|entry| entry.ref_count)
            .unwrap_or(0)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.entries.iter().map(|e| e.key().clone()).collect()
    }

    /// Cancel every channel and empty the registry
    pub fn clear_all(&self) {
        let keys = self.keys();
        let mut closed = 0;
        for key in keys {
            if let Some((_, entry)) = self.inner.entries.remove(&key) {
                entry.shutdown();
                closed += 1;
            }
        }
        self.inner.counters.closed.fetch_add(closed, Ordering::Relaxed);
        if closed > 0 {
            info!(target: "registry", registry = self.inner.name, closed, "Cleared all channels");
        }
    }

    pub fn stats(&self) -> RegistryStats {
        let c = &self.inner.counters;
        RegistryStats {
            active_channels: self.inner.entries.len(),
            total_opened: c.opened.load(Ordering::Relaxed),
            total_closed: c.closed.load(Ordering::Relaxed),
            events_received: c.events.load(Ordering::Relaxed),
            errors_received: c.errors.load(Ordering::Relaxed),
            dropped_after_release: c.dropped.load(Ordering::Relaxed),
        }
    }
}

/// One consumer's share of a channel. Releases exactly once, on drop or on
/// an explicit `release()`.
pub struct SubscriptionGuard<R> {
    registry: Arc<RegistryInner<R>>,
    key: String,
    entry_id: u64,
    receiver: watch::Receiver<ChannelState<R>>,
    released: bool,
}

impl<R> SubscriptionGuard<R>
where
    R: Send + Sync + 'static,
{
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn current(&self) -> ChannelState<R> {
        self.receiver.borrow().clone()
    }

    pub fn latest(&self) -> Option<Arc<R>> {
        self.receiver.borrow().value().cloned()
    }

    /// Independent receiver for the same cell
    pub fn watch(&self) -> watch::Receiver<ChannelState<R>> {
        self.receiver.clone()
    }

    /// Stream of states, starting with the current one
    pub fn updates(&self) -> WatchStream<ChannelState<R>> {
        WatchStream::new(self.receiver.clone())
    }

    /// Wait for the next state change. `None` once the cell is gone.
    pub async fn changed(&mut self) -> Option<ChannelState<R>> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    pub fn release(mut self) {
        self.release_once();
    }
}

impl<R> SubscriptionGuard<R> {
    fn release_once(&mut self) {
        if !self.released {
            self.released = true;
            self.registry.release(&self.key, Some(self.entry_id));
        }
    }
}

impl<R> Drop for SubscriptionGuard<R> {
    fn drop(&mut self) {
        self.release_once();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;
    use std::sync::Mutex;

    mock! {
        Handle {}
        impl ChannelHandle for Handle {
            fn cancel(&self);
        }
    }

    fn cancel_once() -> MockHandle {
        let mut handle = MockHandle::new();
        handle.expect_cancel().times(1).return_const(());
        handle
    }

    #[test]
    fn two_acquires_open_one_channel() {
        let registry: SubscriptionRegistry<String> = SubscriptionRegistry::new("test");
        let mut opens = 0;

        let a = registry.acquire("c1", |_| {
            opens += 1;
            cancel_once()
        });
        let b = registry.acquire("c1", |_| {
            opens += 1;
            cancel_once()
        });

        assert_eq!(opens, 1);
        assert_eq!(registry.ref_count("c1"), 2);
        drop(a);
        drop(b);
    }

    #[test]
    fn release_to_zero_cancels_once_and_removes_entry() {
        let registry: SubscriptionRegistry<String> = SubscriptionRegistry::new("test");
        let guard = registry.acquire("c1", |_| cancel_once());

        guard.release();

        assert!(!registry.contains("c1"));
        assert_eq!(registry.ref_count("c1"), 0);
        assert!(registry.peek("c1").is_none());
        assert_eq!(registry.stats().total_closed, 1);
    }

    #[test]
    fn events_overwrite_and_errors_clear() {
        let registry: SubscriptionRegistry<String> = SubscriptionRegistry::new("test");
        let slot: Arc<Mutex<Option<ChannelSink<String>>>> = Arc::new(Mutex::new(None));
        let captured = Arc::clone(&slot);
        let guard = registry.acquire("c1", move |sink| {
            *captured.lock().unwrap() = Some(sink);
            cancel_once()
        });
        let sink = slot.lock().unwrap().clone().unwrap();

        assert!(guard.current().is_pending());
        sink.on_event("first".to_string());
        sink.on_event("second".to_string());
        assert_eq!(registry.peek("c1").as_deref(), Some(&"second".to_string()));

        sink.on_error(ClassifiedError::websocket("gone"));
        assert!(registry.peek("c1").is_none());
        assert!(guard.current().error().is_some_and(|e| e.is_retryable()));

        drop(guard);
        sink.on_event("late".to_string());
        assert_eq!(registry.stats().dropped_after_release, 1);
        assert!(registry.peek("c1").is_none());
    }

    #[test]
    fn sink_racing_teardown_cannot_overwrite_closed() {
        // Sink already past the liveness check when the entry closes
        let (tx, rx) = watch::channel(ChannelState::Pending);
        let sink: ChannelSink<String> = ChannelSink {
            state: Arc::new(tx),
            live: Arc::new(AtomicBool::new(true)),
            counters: Arc::new(Counters::default()),
        };
        sink.state.send_replace(ChannelState::Closed);

        sink.on_event("late".to_string());
        sink.on_error(ClassifiedError::websocket("late"));

        assert!(rx.borrow().is_closed());
        assert_eq!(sink.counters.dropped.load(Ordering::Relaxed), 2);
        assert_eq!(sink.counters.events.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn stale_guard_does_not_release_a_newer_entry() {
        let registry: SubscriptionRegistry<String> = SubscriptionRegistry::new("test");
        let old = registry.acquire("c1", |_| cancel_once());
        registry.clear_all();

        let fresh = registry.acquire("c1", |_| cancel_once());
        drop(old);
        assert_eq!(registry.ref_count("c1"), 1);
        drop(fresh);
        assert!(registry.is_empty());
    }
}
