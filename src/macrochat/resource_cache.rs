//! TTL-based resource cache.
//!
//! A small key→value cache used to avoid re-fetching tool and resource
//! catalogs from the external tool process on every round. Entries expire
//! lazily: an expired entry is deleted and reported absent the next time it
//! is read, so no background sweeper is needed. [`ResourceCache::cleanup_expired`]
//! offers an explicit sweep for diagnostics and memory bounding.
//!
//! The cache never fails; a miss is a normal outcome. There is no per-key
//! TTL and no LRU bound because the key space in this system is a small,
//! fixed set of catalog keys.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use macrochat::resource_cache::ResourceCache;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let cache: ResourceCache<String> = ResourceCache::new(Duration::from_secs(300));
//! cache.set("mcp:tools", "catalog".to_string()).await;
//! assert_eq!(cache.get("mcp:tools").await.as_deref(), Some("catalog"));
//! # }
//! ```

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Default entry lifetime: five minutes.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries currently stored, expired ones included.
    pub total_entries: usize,
    /// Entries a `get` would still return.
    pub valid_entries: usize,
    /// Entries past their TTL but not yet swept.
    pub expired_entries: usize,
    /// The TTL in force when the snapshot was taken.
    pub ttl: Duration,
}

/// Generic TTL cache over string keys.
///
/// Values are cloned out on read, so catalog types kept here should be cheap
/// to clone or wrapped in `Arc` by the caller.
pub struct ResourceCache<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    ttl: RwLock<Duration>,
}

impl<V: Clone + Send + Sync> ResourceCache<V> {
    /// Create a cache whose entries live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        ResourceCache {
            entries: RwLock::new(HashMap::new()),
            ttl: RwLock::new(ttl),
        }
    }

    /// Look up a key, deleting and missing on an expired entry.
    pub async fn get(&self, key: &str) -> Option<V> {
        let ttl = *self.ttl.read().await;
        let mut entries = self.entries.write().await;

        match entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < ttl => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Insert or overwrite a key, resetting its insertion timestamp.
    pub async fn set(&self, key: impl Into<String>, value: V) {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.into(),
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Delete a key. Returns whether an entry (expired or not) was present.
    pub async fn invalidate(&self, key: &str) -> bool {
        self.entries.write().await.remove(key).is_some()
    }

    /// Drop every entry.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Sweep out expired entries and report how many were removed.
    pub async fn cleanup_expired(&self) -> usize {
        let ttl = *self.ttl.read().await;
        let mut entries = self.entries.write().await;

        let before = entries.len();
        entries.retain(|_, entry| entry.inserted_at.elapsed() < ttl);
        before - entries.len()
    }

    /// True when the key exists and has not expired.
    pub async fn has(&self, key: &str) -> bool {
        self.get(key).await.is_some()
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Snapshot the cache state without mutating it.
    pub async fn stats(&self) -> CacheStats {
        let ttl = *self.ttl.read().await;
        let entries = self.entries.read().await;

        let valid_entries = entries
            .values()
            .filter(|entry| entry.inserted_at.elapsed() < ttl)
            .count();

        CacheStats {
            total_entries: entries.len(),
            valid_entries,
            expired_entries: entries.len() - valid_entries,
            ttl,
        }
    }

    /// Change the TTL applied by subsequent reads and sweeps. Existing
    /// entries keep their insertion timestamps, so shortening the TTL can
    /// expire them retroactively.
    pub async fn set_ttl(&self, ttl: Duration) {
        *self.ttl.write().await = ttl;
    }

    pub async fn ttl(&self) -> Duration {
        *self.ttl.read().await
    }
}

impl<V: Clone + Send + Sync> Default for ResourceCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
