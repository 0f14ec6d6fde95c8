use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

type CacheKey = (i64, String);

/// Located preview paths keyed by `(record_id, base_name)`.
///
/// Owned by one locator; cleared wholesale, never per entry.
#[derive(Debug, Default)]
pub struct LocationCache {
    entries: Mutex<HashMap<CacheKey, PathBuf>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl LocationCache {
    pub fn new() -> Self {
        Self::default()
    }

    // Non-reentrant on purpose: each method takes the guard once and drops it
    // before returning, so no call path locks twice.
    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, PathBuf>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, record_id: i64, base_name: &str) -> Option<PathBuf> {
        let found = self.lock().get(&(record_id, base_name.to_string())).cloned();
        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    pub fn insert(&self, record_id: i64, base_name: &str, path: PathBuf) {
        self.lock().insert((record_id, base_name.to_string()), path);
    }

    /// Drops every entry and returns how many were removed.
    pub fn clear(&self) -> usize {
        let mut entries = self.lock();
        let removed = entries.len();
        entries.clear();
        entries.shrink_to_fit();
        removed
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        CacheStats {
            size: self.len(),
            hits,
            misses,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
        }
    }
}
