use super::state::{apply, NarrationState, StateUpdate};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

/// Callback receiving a snapshot after every state change
pub type Observer = Arc<dyn Fn(&NarrationState) + Send + Sync>;

struct StoreInner {
    state: Mutex<NarrationState>,
    observers: Mutex<HashMap<u64, Observer>>,
    next_observer_id: AtomicU64,
    closed: AtomicBool,
}

/// Canonical narration state plus the observers watching it.
///
/// Observers are called synchronously, outside any internal lock, with a
/// copy of the state; they may call back into the store.
#[derive(Clone)]
pub struct StateStore {
    inner: Arc<StoreInner>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new(NarrationState::default())
    }
}

impl StateStore {
    pub fn new(initial: NarrationState) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                state: Mutex::new(initial),
                observers: Mutex::new(HashMap::new()),
                next_observer_id: AtomicU64::new(1),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn snapshot(&self) -> NarrationState {
        lock(&self.inner.state).clone()
    }

    /// Merge an update and notify every observer with the result
    pub fn update(&self, update: StateUpdate) -> NarrationState {
        self.stage(update);
        self.notify()
    }

    /// Merge an update without notifying; pair with [`StateStore::notify`].
    ///
    /// Lets callers change state while holding their own locks and notify
    /// once those are released.
    pub fn stage(&self, update: StateUpdate) -> NarrationState {
        let mut state = lock(&self.inner.state);
        let next = apply(&state, update);
        *state = next.clone();
        next
    }

    /// Deliver the latest snapshot to every observer
    pub fn notify(&self) -> NarrationState {
        let snapshot = self.snapshot();
        if !self.is_closed() {
            for observer in self.observers() {
                observer(&snapshot);
            }
        }
        snapshot
    }

    /// Register an observer; it immediately receives the current snapshot.
    ///
    /// The observer stays registered until the returned handle is dropped.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&NarrationState) + Send + Sync + 'static,
    {
        let id = self.inner.next_observer_id.fetch_add(1, Ordering::Relaxed);
        let observer: Observer = Arc::new(callback);

        if !self.is_closed() {
            lock(&self.inner.observers).insert(id, Arc::clone(&observer));
            observer(&self.snapshot());
        }

        Subscription {
            id,
            store: Arc::downgrade(&self.inner),
        }
    }

    pub fn observer_count(&self) -> usize {
        lock(&self.inner.observers).len()
    }

    /// Stop all notifications for good and forget every observer
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        lock(&self.inner.observers).clear();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    fn observers(&self) -> Vec<Observer> {
        lock(&self.inner.observers).values().cloned().collect()
    }
}

/// Unsubscribes its observer when dropped
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    store: Weak<StoreInner>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.store.upgrade() {
            lock(&inner.observers).remove(&self.id);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
