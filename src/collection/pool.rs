//! `CollectionPool` (spec §4.8): multi-reader / single-writer lease of
//! `Collection` objects by name, grounded on the teacher's `parking_lot`
//! usage in `core::result_handle` for cheap uncontended locking, and on
//! the bounded-pool-with-lazy-open shape of the teacher's
//! `reader::reader_pool::ReaderPool` for the `max_open` eviction policy
//! (spec §3: a collection "lives until the pool evicts it").

use crate::collection::Collection;
use crate::core::error::{Error, ErrorKind, Result};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

struct Entry {
    collection: Arc<Mutex<Collection>>,
    has_writer: bool,
    /// Monotonic tick set on every access, used to pick an eviction
    /// candidate (least-recently-used) when the pool is over capacity.
    last_used: u64,
}

/// Keyed by collection name. Readers get unlimited concurrency (the
/// backend itself provides MVCC); at most one writable handle per name may
/// be outstanding at a time. Bounded by `max_open`: once that many
/// collections are resident, the next previously-unseen name evicts the
/// least-recently-used entry that currently has no writer and no handle
/// held outside the pool (`Arc::strong_count == 1`). A collection that
/// can't be evicted (in use, or being written) is kept; the pool may
/// therefore briefly exceed `max_open` under load rather than break the
/// single-writer guarantee.
pub struct CollectionPool {
    entries: Mutex<BTreeMap<String, Entry>>,
    max_open: usize,
    tick: std::sync::atomic::AtomicU64,
}

impl CollectionPool {
    pub fn new() -> Self {
        CollectionPool::with_capacity(usize::MAX)
    }

    pub fn with_capacity(max_open: usize) -> Self {
        CollectionPool {
            entries: Mutex::new(BTreeMap::new()),
            max_open: max_open.max(1),
            tick: std::sync::atomic::AtomicU64::new(0),
        }
    }

    pub fn list_names(&self) -> Vec<String> {
        self.entries.lock().keys().cloned().collect()
    }

    fn next_tick(&self) -> u64 {
        self.tick.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
    }

    /// If the pool holds more than `max_open` entries, evict the
    /// least-recently-used one that isn't currently written to or held by
    /// a caller. Called with `entries` already locked, after inserting a
    /// previously-unseen name (so it never evicts the entry just opened).
    fn evict_if_over_capacity(&self, entries: &mut BTreeMap<String, Entry>) {
        if entries.len() <= self.max_open {
            return;
        }
        let victim = entries
            .iter()
            .filter(|(_, e)| !e.has_writer && Arc::strong_count(&e.collection) == 1)
            .min_by_key(|(_, e)| e.last_used)
            .map(|(name, _)| name.clone());
        if let Some(name) = victim {
            entries.remove(&name);
        }
    }

    /// Open (creating if necessary) a readonly handle. Always succeeds;
    /// concurrent readers never block each other.
    pub fn get_readonly(&self, name: &str) -> Arc<Mutex<Collection>> {
        let tick = self.next_tick();
        let mut entries = self.entries.lock();
        if !entries.contains_key(name) {
            self.evict_if_over_capacity(&mut entries);
        }
        let entry = entries.entry(name.to_string()).or_insert_with(|| Entry {
            collection: Arc::new(Mutex::new(Collection::new(name))),
            has_writer: false,
            last_used: tick,
        });
        entry.last_used = tick;
        entry.collection.clone()
    }

    /// Open a writable handle, failing if another writer already holds
    /// this name (callers queue/retry at a higher layer; the pool itself
    /// never blocks).
    pub fn get_writable(&self, name: &str) -> Result<Arc<Mutex<Collection>>> {
        let tick = self.next_tick();
        let mut entries = self.entries.lock();
        if !entries.contains_key(name) {
            self.evict_if_over_capacity(&mut entries);
        }
        let entry = entries.entry(name.to_string()).or_insert_with(|| Entry {
            collection: Arc::new(Mutex::new(Collection::new(name))),
            has_writer: false,
            last_used: tick,
        });
        if entry.has_writer {
            return Err(Error::new(ErrorKind::QueueFull, format!("collection {name:?} already has a writer")));
        }
        entry.has_writer = true;
        entry.last_used = tick;
        Ok(entry.collection.clone())
    }

    /// Return a writable handle. `discard` (set when the caller's use of
    /// the collection raised an error) is accepted for symmetry with the
    /// spec's "discard rather than pool" contract; since collections are
    /// identified by name rather than pooled instances here, discarding
    /// only clears the writer flag - a fresh `get_writable` reopens it.
    pub fn release_writable(&self, name: &str, _discard: bool) {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(name) {
            entry.has_writer = false;
        }
    }
}

impl Default for CollectionPool {
    fn default() -> Self {
        CollectionPool::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrent_readers_share_the_same_collection() {
        let pool = CollectionPool::new();
        let a = pool.get_readonly("blog");
        let b = pool.get_readonly("blog");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn second_writer_is_rejected_until_released() {
        let pool = CollectionPool::new();
        let _first = pool.get_writable("blog").unwrap();
        assert!(pool.get_writable("blog").is_err());
        pool.release_writable("blog", false);
        assert!(pool.get_writable("blog").is_ok());
    }

    #[test]
    fn list_names_reflects_opened_collections() {
        let pool = CollectionPool::new();
        pool.get_readonly("a");
        pool.get_readonly("b");
        assert_eq!(pool.list_names(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn opening_past_capacity_evicts_the_least_recently_used_idle_entry() {
        let pool = CollectionPool::with_capacity(2);
        pool.get_readonly("a");
        pool.get_readonly("b");
        // "a" is now the least-recently-used of the two.
        pool.get_readonly("c");
        assert_eq!(pool.list_names(), vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn a_collection_held_by_the_caller_is_never_evicted() {
        let pool = CollectionPool::with_capacity(1);
        let held = pool.get_readonly("a");
        pool.get_readonly("b");
        // "a" is still reachable through `held`, so "b" couldn't evict it;
        // the pool exceeds capacity rather than evict an in-use entry.
        assert!(pool.list_names().contains(&"a".to_string()));
        drop(held);
    }
}
