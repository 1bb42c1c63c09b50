//! In-process TTL cache.
//!
//! Entries expire lazily: an expired entry is removed the first time it is
//! looked up. [`MemoryCache::spawn_janitor`] adds a periodic sweep so
//! entries nobody reads again do not pile up.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

use super::{Cache, Ttl};

#[derive(Debug)]
struct Entry<V> {
    value: V,
    expires_at: Option<Instant>,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Thread-safe in-memory [`Cache`].
#[derive(Debug)]
pub struct MemoryCache<V> {
    default_ttl: Option<Duration>,
    entries: Mutex<HashMap<String, Entry<V>>>,
}

impl<V> MemoryCache<V> {
    /// Creates a cache whose [`Ttl::Default`] entries live for
    /// `default_ttl`. A zero default means they never expire.
    #[must_use]
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            default_ttl: (!default_ttl.is_zero()).then_some(default_ttl),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Removes every expired entry and returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(entries.len())
    }

    /// Returns the number of stored entries, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn expires_at(&self, ttl: Ttl) -> Option<Instant> {
        let lifetime = match ttl {
            Ttl::Default => self.default_ttl,
            Ttl::Never => None,
            Ttl::For(duration) => Some(duration),
        };
        // A lifetime past the clock's range never expires.
        lifetime.and_then(|d| Instant::now().checked_add(d))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<V: Send + 'static> MemoryCache<V> {
    /// Spawns a task that purges expired entries every `interval`.
    ///
    /// The task holds only a weak reference and ends on its own once the
    /// cache is dropped.
    #[must_use]
    pub fn spawn_janitor(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(self);
        let period = interval.max(Duration::from_millis(10));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                let purged = cache.purge_expired();
                if purged > 0 {
                    tracing::debug!(purged, "cache janitor removed expired entries");
                }
            }
        })
    }
}

impl<V> Cache<V> for MemoryCache<V>
where
    V: Clone + Send + Sync + std::fmt::Debug,
{
    fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    fn set(&self, key: &str, value: V, ttl: Ttl) {
        let expires_at = self.expires_at(ttl);
        self.lock()
            .insert(key.to_string(), Entry { value, expires_at });
    }

    fn delete(&self, key: &str) {
        self.lock().remove(key);
    }
}
