use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

struct Entry<T> {
    value: Arc<T>,
    stored_at: Instant,
}

/// Single-slot cache with a fixed time-to-live.
///
/// Stale entries are not evicted, the next `put` overwrites them. Concurrent
/// misses are not coordinated; the last writer wins.
pub struct Cache<T> {
    ttl: Duration,
    slot: Mutex<Option<Entry<T>>>,
}

impl<T> Cache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(None),
        }
    }

    /// The cached value, if one was stored less than `ttl` ago.
    pub fn get(&self) -> Option<Arc<T>> {
        let slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        slot.as_ref()
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| Arc::clone(&entry.value))
    }

    pub fn put(&self, value: T) -> Arc<T> {
        let value = Arc::new(value);
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(Entry {
            value: Arc::clone(&value),
            stored_at: Instant::now(),
        });
        value
    }
}
