//! Process-wide replay guards.

use dashmap::DashSet;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

/// Bounded memory of transaction ids the mempool rejected.
///
/// Entries are inserted once and never refreshed, so eviction is strictly
/// oldest-first.
pub struct AntiReplayCache {
    entries: Mutex<LruCache<String, ()>>,
}

impl AntiReplayCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        // `contains` does not touch recency.
        self.entries.lock().contains(id)
    }

    pub fn insert(&self, id: &str) {
        let mut entries = self.entries.lock();
        if !entries.contains(id) {
            entries.push(id.to_string(), ());
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Hashes of every bridge message this process has accepted. Never shrinks.
#[derive(Default)]
pub struct MessageDedupSet {
    seen: DashSet<String>,
}

impl MessageDedupSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `hash`; returns false when it had already been seen.
    pub fn mark_seen(&self, hash: &str) -> bool {
        self.seen.insert(hash.to_string())
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.seen.contains(hash)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
