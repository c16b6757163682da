//! Bounded in-process cache store.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU32, AtomicU64, Ordering},
    },
};

use parking_lot::RwLock;
use tracing::debug;

use kiln_core::application::{
    ApplicationError,
    ports::{CacheEntry, CacheStore},
};
use kiln_core::error::KilnResult;

/// Default number of entries kept before the oldest is evicted.
pub const DEFAULT_CAPACITY: usize = 256;

/// Thread-safe in-memory cache.
///
/// When full, inserting a new key evicts the entry inserted longest ago.
/// Clones share the same storage.
#[derive(Debug, Clone)]
pub struct MemoryCacheStore {
    inner: Arc<RwLock<Inner>>,
    capacity: usize,
    failing_puts: Arc<AtomicU32>,
    gets: Arc<AtomicU64>,
    puts: Arc<AtomicU64>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, (u64, CacheEntry)>,
    next_seq: u64,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a store holding at most `capacity` entries (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            capacity: capacity.max(1),
            failing_puts: Arc::new(AtomicU32::new(0)),
            gets: Arc::new(AtomicU64::new(0)),
            puts: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, fingerprint: &str) -> bool {
        self.inner.read().entries.contains_key(fingerprint)
    }

    /// Number of `get` calls served, hit or miss.
    pub fn get_count(&self) -> u64 {
        self.gets.load(Ordering::Relaxed)
    }

    /// Number of successful `put` calls.
    pub fn put_count(&self) -> u64 {
        self.puts.load(Ordering::Relaxed)
    }

    /// Make the next `n` puts fail with a transient error.
    pub fn fail_next_puts(&self, n: u32) {
        self.failing_puts.store(n, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.inner.write().entries.clear();
    }

    fn take_failure(&self) -> bool {
        self.failing_puts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, fingerprint: &str) -> KilnResult<Option<CacheEntry>> {
        self.gets.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .inner
            .read()
            .entries
            .get(fingerprint)
            .map(|(_, entry)| entry.clone()))
    }

    fn put(&self, entry: CacheEntry) -> KilnResult<()> {
        if self.take_failure() {
            return Err(ApplicationError::TransientIo {
                path: format!("memory://{}", entry.fingerprint).into(),
                reason: "injected cache write failure".into(),
            }
            .into());
        }

        let mut inner = self.inner.write();
        if !inner.entries.contains_key(&entry.fingerprint) && inner.entries.len() >= self.capacity
        {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, (seq, _))| *seq)
                .map(|(key, _)| key.clone());
            if let Some(key) = oldest {
                debug!(fingerprint = %key, "evicting oldest cache entry");
                inner.entries.remove(&key);
            }
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner
            .entries
            .insert(entry.fingerprint.clone(), (seq, entry));
        self.puts.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn remove(&self, fingerprint: &str) -> KilnResult<()> {
        self.inner.write().entries.remove(fingerprint);
        Ok(())
    }
}
