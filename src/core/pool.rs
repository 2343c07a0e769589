//! Sharded object pool
//!
//! Each thread is pinned to one shard, so concurrent acquire/release from
//! different threads mostly touches different mutexes. Objects are reset
//! before they go back on a free list. Free lists are capped, and objects
//! that grew past a size limit are dropped instead of kept, so idle memory
//! stays bounded.

use super::entry::Entry;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Default pre-reserved encode buffer size for pooled entries
pub const DEFAULT_ENTRY_BUF_BYTES: usize = 1024;

/// Default pre-reserved field slots for pooled entries
pub const DEFAULT_ENTRY_FIELDS: usize = 16;

const MAX_IDLE_PER_SHARD: usize = 64;

/// Objects holding more than this many bytes are not pooled again
pub const DEFAULT_MAX_RETAINED_BYTES: usize = 64 * 1024;

static NEXT_SHARD: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static SHARD_HINT: usize = NEXT_SHARD.fetch_add(1, Ordering::Relaxed);
}

/// An object that can be recycled through a [`Pool`]
pub trait Poolable: Send + 'static {
    /// Return to a logically empty state, keeping allocated capacity
    fn reset(&mut self);

    /// Heap bytes the object keeps reserved while idle
    fn retained_bytes(&self) -> usize {
        0
    }
}

impl Poolable for Entry {
    fn reset(&mut self) {
        Entry::reset(self);
    }

    fn retained_bytes(&self) -> usize {
        Entry::retained_bytes(self)
    }
}

type Factory<T> = Box<dyn Fn() -> T + Send + Sync>;

pub struct Pool<T: Poolable> {
    shards: Box<[Mutex<Vec<Box<T>>>]>,
    factory: Factory<T>,
    max_idle_per_shard: usize,
    max_retained_bytes: usize,
}

impl<T: Poolable> Pool<T> {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let shard_count = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
            .next_power_of_two();
        Self::with_shards(shard_count, factory)
    }

    pub fn with_shards<F>(shard_count: usize, factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let shards = (0..shard_count.max(1))
            .map(|_| Mutex::new(Vec::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            shards,
            factory: Box::new(factory),
            max_idle_per_shard: MAX_IDLE_PER_SHARD,
            max_retained_bytes: DEFAULT_MAX_RETAINED_BYTES,
        }
    }

    /// Cap the number of idle objects kept per shard
    #[must_use]
    pub fn with_max_idle(mut self, max_idle_per_shard: usize) -> Self {
        self.max_idle_per_shard = max_idle_per_shard;
        self
    }

    /// Drop released objects whose reserved memory exceeds `bytes`
    #[must_use]
    pub fn with_max_retained_bytes(mut self, bytes: usize) -> Self {
        self.max_retained_bytes = bytes;
        self
    }

    #[inline]
    fn shard(&self) -> &Mutex<Vec<Box<T>>> {
        let hint = SHARD_HINT.with(|h| *h);
        &self.shards[hint % self.shards.len()]
    }

    /// Take an object from this thread's shard, or build a fresh one
    pub fn acquire(&self) -> Pooled<'_, T> {
        let item = self
            .shard()
            .lock()
            .pop()
            .unwrap_or_else(|| Box::new((self.factory)()));
        Pooled {
            pool: self,
            item: Some(item),
        }
    }

    fn put(&self, mut item: Box<T>) {
        if item.retained_bytes() > self.max_retained_bytes {
            return;
        }
        item.reset();
        let mut shard = self.shard().lock();
        if shard.len() < self.max_idle_per_shard {
            shard.push(item);
        }
    }

    /// Number of idle objects across all shards
    pub fn idle(&self) -> usize {
        self.shards.iter().map(|s| s.lock().len()).sum()
    }
}

impl<T: Poolable> std::fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("shards", &self.shards.len())
            .field("max_idle_per_shard", &self.max_idle_per_shard)
            .field("max_retained_bytes", &self.max_retained_bytes)
            .finish()
    }
}

/// A pooled object, returned to its pool when dropped
pub struct Pooled<'p, T: Poolable> {
    pool: &'p Pool<T>,
    item: Option<Box<T>>,
}

impl<T: Poolable> Pooled<'_, T> {
    /// Reset the object and hand it back to the pool
    pub fn release(self) {
        drop(self);
    }
}

impl<T: Poolable> Deref for Pooled<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // Only `Drop` takes the item out.
        self.item.as_deref().unwrap_or_else(|| unreachable!())
    }
}

impl<T: Poolable> DerefMut for Pooled<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.item.as_deref_mut().unwrap_or_else(|| unreachable!())
    }
}

impl<T: Poolable> Drop for Pooled<'_, T> {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            self.pool.put(item);
        }
    }
}

pub type EntryPool = Pool<Entry>;

impl Pool<Entry> {
    /// Entry pool whose entries come pre-reserved with the given capacities
    pub fn with_capacity(buf_bytes: usize, fields: usize) -> Self {
        Pool::new(move || Entry::with_capacity(buf_bytes, fields))
    }
}

impl Default for Pool<Entry> {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_ENTRY_BUF_BYTES, DEFAULT_ENTRY_FIELDS)
    }
}

static DEFAULT_ENTRY_POOL: Lazy<Arc<EntryPool>> = Lazy::new(|| Arc::new(EntryPool::default()));

/// The process-wide entry pool shared by loggers that do not bring their own
pub fn default_entry_pool() -> Arc<EntryPool> {
    Arc::clone(&DEFAULT_ENTRY_POOL)
}
