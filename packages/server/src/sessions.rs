//! Per-session state keyed by client-chosen ids.
//!
//! The map holds at most `capacity` sessions. Admitting a new session
//! into a full map evicts the least recently used one.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;

struct Entry<T> {
    value: Arc<T>,
    last_used: AtomicU64,
}

/// Bounded map of session id to shared session state.
pub struct SessionMap<T> {
    capacity: usize,
    clock: AtomicU64,
    entries: RwLock<BTreeMap<String, Entry<T>>>,
}

impl<T> SessionMap<T> {
    /// Creates an empty map holding at most `capacity` sessions (at least 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            clock: AtomicU64::new(0),
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// The state of `id`, if present. Marks the session as used.
    pub async fn get(&self, id: &str) -> Option<Arc<T>> {
        let entries = self.entries.read().await;
        let entry = entries.get(id)?;
        entry.last_used.store(self.tick(), Ordering::Relaxed);
        Some(entry.value.clone())
    }

    /// The state of `id`, created with `create` on first use.
    pub async fn get_or_insert_with(&self, id: &str, create: impl FnOnce() -> T) -> Arc<T> {
        if let Some(value) = self.get(id).await {
            return value;
        }

        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get(id) {
            entry.last_used.store(self.tick(), Ordering::Relaxed);
            return entry.value.clone();
        }

        if entries.len() >= self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used.load(Ordering::Relaxed))
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                log::debug!("Evicting least recently used session '{oldest}'");
                entries.remove(&oldest);
            }
        }

        let value = Arc::new(create());
        entries.insert(
            id.to_string(),
            Entry {
                value: value.clone(),
                last_used: AtomicU64::new(self.tick()),
            },
        );
        value
    }

    /// Removes `id`, returning its state if it was present.
    pub async fn remove(&self, id: &str) -> Option<Arc<T>> {
        self.entries.write().await.remove(id).map(|entry| entry.value)
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
