//! In-memory TTL cache used by every remote client.
//!
//! Entries are only visible while `now < expiry` and are purged lazily when a
//! lookup finds them expired. Time comes from `tokio::time::Instant`, so tests
//! can drive expiry with a paused clock.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Default time-to-live for remote lookups (5 minutes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires: Instant,
}

/// Simple key/value store with per-entry expiry.
#[derive(Debug)]
pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Get a value if present and not expired. Expired entries are evicted.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let expired = match entries.get(key) {
            None => return None,
            Some(entry) => Instant::now() >= entry.expires,
        };
        if expired {
            entries.remove(key);
            return None;
        }
        entries.get(key).map(|entry| entry.value.clone())
    }

    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            key.into(),
            CacheEntry {
                value,
                expires: Instant::now() + ttl,
            },
        );
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Number of stored entries, expired ones included until they are looked up.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache key derived from an operation name and its argument values.
///
/// Positional arguments keep their order; named arguments are sorted by name
/// so `named("a", 1).named("b", 2)` and `named("b", 2).named("a", 1)` collide.
#[derive(Debug, Clone)]
pub struct CacheKey {
    operation: &'static str,
    positional: Vec<String>,
    named: BTreeMap<&'static str, String>,
}

impl CacheKey {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            positional: Vec::new(),
            named: BTreeMap::new(),
        }
    }

    pub fn arg(mut self, value: impl Display) -> Self {
        self.positional.push(value.to_string());
        self
    }

    pub fn named(mut self, name: &'static str, value: impl Display) -> Self {
        self.named.insert(name, value.to_string());
        self
    }

    pub fn render(&self) -> String {
        let mut parts = vec![self.operation.to_string()];
        parts.extend(self.positional.iter().cloned());
        parts.extend(self.named.iter().map(|(k, v)| format!("{}={}", k, v)));
        parts.join(":")
    }
}

/// A TTL cache bound to one fetch operation.
///
/// `get_or_fetch` short-circuits to the cached value while it is fresh and
/// otherwise awaits the supplied future, caching only successful results.
/// The fetch future is lazy, so anything it wraps (such as a rate limiter)
/// only runs on a miss.
#[derive(Debug)]
pub struct Cached<V> {
    name: &'static str,
    ttl: Duration,
    cache: TtlCache<V>,
}

impl<V: Clone> Cached<V> {
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            ttl,
            cache: TtlCache::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get_or_fetch<E, Fut>(&self, key: &CacheKey, fetch: Fut) -> Result<V, E>
    where
        Fut: Future<Output = Result<V, E>>,
    {
        let key = key.render();
        if let Some(hit) = self.cache.get(&key) {
            debug!(cache = self.name, key = %key, "cache hit");
            return Ok(hit);
        }
        debug!(cache = self.name, key = %key, "cache miss");

        let value = fetch.await?;
        self.cache.set(key, value.clone(), self.ttl);
        Ok(value)
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}
