//! In-process memoization for expensive lookups.
//!
//! [`SingleFlight`] collapses concurrent calls for the same key into one
//! execution whose result is handed to every waiter. [`TtlCache`] layers
//! expiring entries on top of it. Both are plain values owned by whoever
//! needs them; nothing here is process-global.

use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex, MutexGuard},
    time::{Duration, Instant},
};
use tokio::sync::broadcast;

type Pending<T> = Arc<Mutex<HashMap<String, broadcast::Sender<T>>>>;

pub struct SingleFlight<T> {
    pending: Pending<T>,
}

impl<T> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

enum Role<T> {
    Leader,
    Follower(broadcast::Receiver<T>),
}

/// Removes the pending entry when the flight finishes or is dropped, so
/// waiters on an abandoned flight wake up and re-join.
struct LeaderGuard<T> {
    pending: Pending<T>,
    key: String,
}

impl<T> LeaderGuard<T> {
    fn take_sender(&self) -> Option<broadcast::Sender<T>> {
        lock(&self.pending).remove(&self.key)
    }
}

impl<T> Drop for LeaderGuard<T> {
    fn drop(&mut self) {
        let _ = self.take_sender();
    }
}

fn lock<T>(pending: &Pending<T>) -> MutexGuard<'_, HashMap<String, broadcast::Sender<T>>> {
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<T: Clone> SingleFlight<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `make` unless a call for `key` is already in flight, in which case
    /// the in-flight result is awaited and returned instead. A waiter whose
    /// leader is dropped before finishing re-joins rather than giving up.
    pub async fn run<F, Fut>(&self, key: &str, make: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        loop {
            match self.join(key) {
                Role::Follower(mut rx) => {
                    if let Ok(value) = rx.recv().await {
                        return value;
                    }
                }
                Role::Leader => {
                    let guard = LeaderGuard {
                        pending: Arc::clone(&self.pending),
                        key: key.to_string(),
                    };
                    let value = make().await;
                    if let Some(tx) = guard.take_sender() {
                        let _ = tx.send(value.clone());
                    }
                    return value;
                }
            }
        }
    }

    fn join(&self, key: &str) -> Role<T> {
        let mut pending = lock(&self.pending);
        if let Some(tx) = pending.get(key) {
            return Role::Follower(tx.subscribe());
        }
        let (tx, _) = broadcast::channel(1);
        pending.insert(key.to_string(), tx);
        Role::Leader
    }
}

impl<T: Clone + Send + 'static> SingleFlight<T> {
    /// Like [`SingleFlight::run`], but the work runs on its own task. It
    /// finishes even when every caller stops waiting, and callers that
    /// arrive meanwhile join it instead of starting another.
    pub async fn run_detached<F, Fut>(&self, key: &str, make: F) -> T
    where
        F: Fn() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        loop {
            let mut rx = self.subscribe_or_spawn(key, &make);
            if let Ok(value) = rx.recv().await {
                return value;
            }
        }
    }

    fn subscribe_or_spawn<F, Fut>(&self, key: &str, make: &F) -> broadcast::Receiver<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let mut pending = lock(&self.pending);
        if let Some(tx) = pending.get(key) {
            return tx.subscribe();
        }
        let (tx, rx) = broadcast::channel(1);
        pending.insert(key.to_string(), tx);
        let guard = LeaderGuard {
            pending: Arc::clone(&self.pending),
            key: key.to_string(),
        };
        let work = make();
        tokio::spawn(async move {
            let value = work.await;
            if let Some(tx) = guard.take_sender() {
                let _ = tx.send(value);
            }
        });
        rx
    }
}

/// Expiring key/value cache whose misses are loaded through a
/// [`SingleFlight`], so at most one load per key runs at a time.
pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, (V, Instant)>>,
    loads: SingleFlight<V>,
    ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            loads: SingleFlight::new(),
            ttl,
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let entries = self.entries.lock().ok()?;
        entries
            .get(key)
            .filter(|(_, expires_at)| *expires_at > Instant::now())
            .map(|(value, _)| value.clone())
    }

    pub fn insert(&self, key: &str, value: V) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), (value, Instant::now() + self.ttl));
        }
    }

    pub async fn get_or_load<F, Fut>(&self, key: &str, load: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        if let Some(hit) = self.get(key) {
            return hit;
        }
        self.loads
            .run(key, move || async move {
                let value = load().await;
                self.insert(key, value.clone());
                value
            })
            .await
    }
}
