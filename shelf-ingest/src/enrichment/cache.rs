//! Process-lifetime memo of successful lookups
//!
//! Only found results are stored; misses are retried on the next upload.
//! Entries are keyed by source plus two strings: title and author for
//! per-book lookups, listing kind and term for catalogue listings.

use super::BookMetadata;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

type CacheKey = (&'static str, String, String);

pub struct LookupCache<V = BookMetadata> {
    ttl: Duration,
    entries: RwLock<HashMap<CacheKey, (Instant, V)>>,
}

impl<V: Clone> LookupCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Fresh entry for `(source, first, second)`, if any
    pub fn get(&self, source: &'static str, first: &str, second: &str) -> Option<V> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let (stored_at, value) = entries.get(&(source, first.to_string(), second.to_string()))?;
        (stored_at.elapsed() < self.ttl).then(|| value.clone())
    }

    pub fn insert(&self, source: &'static str, first: &str, second: &str, value: V) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert((source, first.to_string(), second.to_string()), (Instant::now(), value));
    }

    /// Drop expired entries; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, (stored_at, _)| stored_at.elapsed() < self.ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
