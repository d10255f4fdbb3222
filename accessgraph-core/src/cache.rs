//! Bounded LRU cache for loaded snapshot graphs, with single-flight loading.
//!
//! The resolver layer treats cached graphs as effectively immutable: a graph
//! enters the cache only after it is fully built, and the only sanctioned
//! in-place mutation (`mark_sensitive`) is a per-cache-entry annotation, not
//! a storage write.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::error::{AccessGraphError, AgResult};

#[derive(Default)]
struct Flight {
    done: Mutex<bool>,
    cv: Condvar,
}

struct Entries<T> {
    map: HashMap<String, Arc<T>>,
    /// Recency order, least-recently-used first. Capacity is small (default
    /// 16), so linear recency updates are cheaper than a linked structure.
    order: Vec<String>,
}

/// Fixed-capacity LRU keyed by snapshot id.
pub struct SnapshotCache<T> {
    capacity: usize,
    entries: Mutex<Entries<T>>,
    in_flight: Mutex<HashMap<String, Arc<Flight>>>,
}

impl<T> SnapshotCache<T> {
    /// `capacity == 0` falls back to the default of 16 entries.
    pub fn new(capacity: usize) -> Self {
        let capacity = if capacity == 0 {
            crate::DEFAULT_CACHE_CAPACITY
        } else {
            capacity
        };
        Self {
            capacity,
            entries: Mutex::new(Entries {
                map: HashMap::new(),
                order: Vec::new(),
            }),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Returns a shared reference to the cached value, marking it
    /// most-recently-used, or `None` on a miss.
    pub fn get(&self, id: &str) -> Option<Arc<T>> {
        let mut entries = self.entries.lock();
        let value = entries.map.get(id).cloned()?;
        touch(&mut entries.order, id);
        Some(value)
    }

    /// Inserts a value, evicting the least-recently-used entry at capacity.
    pub fn insert(&self, id: impl Into<String>, value: Arc<T>) {
        let id = id.into();
        let mut entries = self.entries.lock();
        if !entries.map.contains_key(&id) && entries.map.len() >= self.capacity {
            if !entries.order.is_empty() {
                let evicted = entries.order.remove(0);
                entries.map.remove(&evicted);
                tracing::debug!(snapshot = %evicted, "evicted least-recently-used graph");
            }
        }
        entries.map.insert(id.clone(), value);
        touch(&mut entries.order, &id);
    }

    /// Returns the cached value for `id`, or runs `load` to produce it.
    ///
    /// Concurrent misses for the same id are single-flighted: one caller runs
    /// its loader while the rest block and receive the published value. If
    /// the leading load fails, waiters fall back to their own loaders.
    pub fn get_or_load<F>(&self, id: &str, load: F) -> AgResult<Arc<T>>
    where
        F: FnOnce() -> AgResult<T>,
    {
        if let Some(value) = self.get(id) {
            return Ok(value);
        }

        let (flight, leader) = {
            let mut in_flight = self.in_flight.lock();
            match in_flight.get(id) {
                Some(flight) => (Arc::clone(flight), false),
                None => {
                    let flight = Arc::new(Flight::default());
                    in_flight.insert(id.to_string(), Arc::clone(&flight));
                    (Arc::clone(&flight), true)
                }
            }
        };

        if leader {
            let result = match load() {
                Ok(value) => {
                    let value = Arc::new(value);
                    self.insert(id, Arc::clone(&value));
                    Ok(value)
                }
                Err(e) => Err(e),
            };
            self.in_flight.lock().remove(id);
            *flight.done.lock() = true;
            flight.cv.notify_all();
            result
        } else {
            {
                let mut done = flight.done.lock();
                while !*done {
                    flight.cv.wait(&mut done);
                }
            }
            match self.get(id) {
                Some(value) => Ok(value),
                // The leader failed; load independently rather than surface
                // someone else's error.
                None => {
                    let value = Arc::new(load()?);
                    self.insert(id, Arc::clone(&value));
                    Ok(value)
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        entries.map.clear();
        entries.order.clear();
    }
}

/// Moves `id` to the most-recently-used position.
fn touch(order: &mut Vec<String>, id: &str) {
    if let Some(pos) = order.iter().position(|k| k == id) {
        order.remove(pos);
    }
    order.push(id.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_get_miss_then_hit() {
        let cache: SnapshotCache<u32> = SnapshotCache::new(4);
        assert!(cache.get("snap-1").is_none());
        cache.insert("snap-1", Arc::new(7));
        assert_eq!(*cache.get("snap-1").unwrap(), 7);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let cache: SnapshotCache<u32> = SnapshotCache::new(2);
        cache.insert("a", Arc::new(1));
        cache.insert("b", Arc::new(2));
        // Touch "a" so "b" is the eviction candidate.
        cache.get("a");
        cache.insert("c", Arc::new(3));

        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_zero_capacity_uses_default() {
        let cache: SnapshotCache<u32> = SnapshotCache::new(0);
        for i in 0..20 {
            cache.insert(format!("snap-{i}"), Arc::new(i));
        }
        assert_eq!(cache.len(), 16);
    }

    #[test]
    fn test_get_or_load_loads_once() {
        let cache: SnapshotCache<u32> = SnapshotCache::new(4);
        let calls = AtomicUsize::new(0);

        let v = cache
            .get_or_load("snap-1", || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(11)
            })
            .unwrap();
        assert_eq!(*v, 11);

        let v = cache
            .get_or_load("snap-1", || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(99)
            })
            .unwrap();
        assert_eq!(*v, 11);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_get_or_load_propagates_loader_error() {
        let cache: SnapshotCache<u32> = SnapshotCache::new(4);
        let err = cache
            .get_or_load("snap-x", || {
                Err(AccessGraphError::NotFound("snap-x".into()))
            })
            .unwrap_err();
        assert!(matches!(err, AccessGraphError::NotFound(_)));
        assert!(cache.get("snap-x").is_none());
    }

    #[test]
    fn test_concurrent_misses_single_flight() {
        let cache: Arc<SnapshotCache<u32>> = Arc::new(SnapshotCache::new(4));
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                std::thread::spawn(move || {
                    let v = cache
                        .get_or_load("snap-1", || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            // Hold the flight open long enough for others to join.
                            std::thread::sleep(std::time::Duration::from_millis(20));
                            Ok(42)
                        })
                        .unwrap();
                    assert_eq!(*v, 42);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        // Every thread that joined the in-flight load shares one result; at
        // most a few stragglers can race past the flight window.
        assert!(calls.load(Ordering::SeqCst) <= 2);
    }
}
