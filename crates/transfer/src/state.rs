use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::StoreFuture;

/// Key-value store for in-progress upload state.
///
/// Holds the `file_id` mapping (target name -> upload identifier) and the
/// byte counters. No cross-key atomicity is assumed; callers serialize
/// access per logical upload themselves.
pub trait UploadStateStore: Send + Sync + 'static {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

    fn set<'a>(&'a self, key: &'a str, value: String) -> StoreFuture<'a, ()>;

    /// Removes `key`. Removing a missing key succeeds.
    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()>;
}

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Process-local state store with an optional per-entry time-to-live.
///
/// Expired entries read as absent, like an evicted cache entry.
pub struct MemoryStateStore {
    entries: RwLock<HashMap<String, Entry>>,
    ttl: Option<Duration>,
}

impl MemoryStateStore {
    /// Creates a store. `None` keeps entries until deleted.
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Number of live (unexpired) entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.read().await;
        entries.values().filter(|e| !e.is_expired(now)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self::new(None)
    }
}

impl UploadStateStore for MemoryStateStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
        Box::pin(async move {
            let now = Instant::now();
            {
                let entries = self.entries.read().await;
                match entries.get(key) {
                    None => return Ok(None),
                    Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
                    Some(_) => {}
                }
            }
            // Expired: evict lazily.
            let mut entries = self.entries.write().await;
            if entries.get(key).is_some_and(|e| e.is_expired(now)) {
                entries.remove(key);
            }
            Ok(None)
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: String) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let expires_at = self.ttl.map(|ttl| Instant::now() + ttl);
            self.entries
                .write()
                .await
                .insert(key.to_string(), Entry { value, expires_at });
            Ok(())
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.entries.write().await.remove(key);
            Ok(())
        })
    }
}
