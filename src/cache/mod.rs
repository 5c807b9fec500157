use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Dashboard counters; dropped whenever devices change
pub const DASHBOARD_STATS_KEY: &str = "dashboard_stats";

/// Cache for expensive dashboard aggregates.
///
/// Each server process owns its own [`MemoryStatsCache`], so several processes
/// behind one load balancer may serve slightly different numbers until their
/// entries expire. A shared implementation (Redis, memcached) can be dropped
/// in behind this trait.
pub trait StatsCache: Send + Sync {
    /// Unexpired value for `key`
    fn get(&self, key: &str) -> Option<Value>;
    fn put(&self, key: &str, value: Value, ttl: Duration);
    fn invalidate(&self, key: &str);
}

/// Return the cached value or run `compute`, caching its result for `ttl`.
/// Failed computations are not cached.
pub async fn get_or_compute<F, Fut, E>(
    cache: &dyn StatsCache,
    key: &str,
    ttl: Duration,
    compute: F,
) -> Result<Value, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Value, E>>,
{
    if let Some(hit) = cache.get(key) {
        return Ok(hit);
    }
    let value = compute().await?;
    cache.put(key, value.clone(), ttl);
    Ok(value)
}

struct Entry {
    value: Value,
    expires_at: Instant,
}

/// Per-process cache
#[derive(Default)]
pub struct MemoryStatsCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStatsCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatsCache for MemoryStatsCache {
    fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn put(&self, key: &str, value: Value, ttl: Duration) {
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), entry);
    }

    fn invalidate(&self, key: &str) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn computes_once_within_ttl() {
        let cache = MemoryStatsCache::new();
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            let v: Result<Value, ()> = get_or_compute(&cache, "stats", Duration::from_secs(30), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(json!({ "n": 1 }))
            })
            .await;
            assert_eq!(v.unwrap(), json!({ "n": 1 }));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_and_invalidated_entries_recompute() {
        let cache = MemoryStatsCache::new();
        cache.put("stats", json!(1), Duration::ZERO);
        assert_eq!(cache.get("stats"), None);

        cache.put("stats", json!(2), Duration::from_secs(30));
        assert_eq!(cache.get("stats"), Some(json!(2)));
        cache.invalidate("stats");

        let v: Result<Value, ()> =
            get_or_compute(&cache, "stats", Duration::from_secs(30), || async { Ok(json!(3)) }).await;
        assert_eq!(v.unwrap(), json!(3));
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let cache = MemoryStatsCache::new();
        let v: Result<Value, &str> =
            get_or_compute(&cache, "stats", Duration::from_secs(30), || async { Err("db down") }).await;
        assert!(v.is_err());
        assert_eq!(cache.get("stats"), None);
    }
}
