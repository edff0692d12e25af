// Consumer lifecycle binding
//
// A KeyedSubscription holds at most one registry guard. Changing the key
// releases the old guard before acquiring the new one; an empty key holds
// nothing. Dropping the binding releases whatever it holds.

use std::sync::Arc;

use super::registry::{ChannelState, SubscriptionGuard};

type AcquireFn<R> = Box<dyn Fn(&str) -> SubscriptionGuard<R> + Send + Sync>;

pub struct KeyedSubscription<R> {
    acquire: AcquireFn<R>,
    guard: Option<SubscriptionGuard<R>>,
}

impl<R> KeyedSubscription<R>
where
    R: Send + Sync + 'static,
{
    /// Unbound subscription; nothing is acquired until `set_key`
    pub fn new<F>(acquire: F) -> Self
    where
        F: Fn(&str) -> SubscriptionGuard<R> + Send + Sync + 'static,
    {
        Self {
            acquire: Box::new(acquire),
            guard: None,
        }
    }

    pub fn with_key<F>(acquire: F, key: Option<&str>) -> Self
    where
        F: Fn(&str) -> SubscriptionGuard<R> + Send + Sync + 'static,
    {
        let mut sub = Self::new(acquire);
        sub.set_key(key);
        sub
    }

    /// Point the binding at `key`. Returns true if a release/acquire happened.
    pub fn set_key(&mut self, key: Option<&str>) -> bool {
        let key = key.filter(|k| !k.trim().is_empty());
        if self.key() == key {
            return false;
        }
        // Release before acquiring so a key round-trip never holds two refs
        self.guard = None;
        self.guard = key.map(|k| (self.acquire)(k));
        true
    }

    pub fn clear(&mut self) -> bool {
        self.set_key(None)
    }

    pub fn key(&self) -> Option<&str> {
        self.guard.as_ref().map(|g| g.key())
    }

    pub fn is_bound(&self) -> bool {
        self.guard.is_some()
    }

    pub fn guard(&self) -> Option<&SubscriptionGuard<R>> {
        self.guard.as_ref()
    }

    pub fn current(&self) -> Option<ChannelState<R>> {
        self.guard.as_ref().map(|g| g.current())
    }

    pub fn latest(&self) -> Option<Arc<R>> {
        self.guard.as_ref().and_then(|g| g.latest())
    }

    /// Wait for the next state of the bound channel. Never resolves while
    /// unbound, so it can sit in a `select!` loop next to other branches.
    /// `None` once the bound cell is gone.
    pub async fn changed(&mut self) -> Option<ChannelState<R>> {
        match self.guard.as_mut() {
            Some(guard) => guard.changed().await,
            None => std::future::pending().await,
        }
    }
}
