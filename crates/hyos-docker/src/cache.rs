//! Short-lived memo for runtime answers that rarely change
//!
//! Inspecting a container and pinging the daemon cost a round trip each; the
//! log endpoint is polled every few seconds, so answers are kept for a short
//! TTL and dropped explicitly whenever a call against the runtime fails.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Cached value with its expiry
#[derive(Debug, Clone)]
struct CachedValue<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CachedValue<V> {
    fn is_valid(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Thread-safe map whose entries expire after a fixed TTL
#[derive(Debug)]
pub struct TtlCache<K, V> {
    entries: Mutex<HashMap<K, CachedValue<V>>>,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Get a cached value if it has not expired
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        self.entries
            .lock()
            .get(key)
            .filter(|cached| cached.is_valid(now))
            .map(|cached| cached.value.clone())
    }

    /// Store a value, replacing any previous one
    pub fn set(&self, key: K, value: V) {
        let expires_at = Instant::now() + self.ttl;
        let mut entries = self.entries.lock();
        entries.retain(|_, cached| cached.is_valid(Instant::now()));
        entries.insert(key, CachedValue { value, expires_at });
    }

    /// Forget everything
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
