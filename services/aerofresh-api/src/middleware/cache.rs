//! In-memory response cache with per-entry TTL.
//!
//! Keyed by method, path and query string. When full, the entry closest
//! to expiry is evicted to make room.

use actix_web::{
    http::{
        header::{HeaderName, HeaderValue},
        StatusCode,
    },
    web::Bytes,
};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::debug;

use crate::clock::SharedClock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl: Duration,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::milliseconds(300_000),
            max_entries: 1000,
        }
    }
}

/// Stored response payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    /// Handler headers replayed on a hit
    pub headers: Vec<(HeaderName, HeaderValue)>,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    response: CachedResponse,
    expires_at: DateTime<Utc>,
}

pub struct ResponseCache {
    config: CacheConfig,
    clock: SharedClock,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl ResponseCache {
    pub fn new(config: CacheConfig, clock: SharedClock) -> Self {
        Self {
            config,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn key(method: &str, path: &str, query: &str) -> String {
        format!("{}:{}?{}", method, path, query)
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    /// Fresh entry for `key`. Expired entries are removed and reported as misses.
    pub fn get(&self, key: &str) -> Option<CachedResponse> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > now => return Some(entry.response.clone()),
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.remove(key);
            debug!("Cache entry expired: {}", key);
        }

        None
    }

    /// Store a response for one TTL. Returns the key evicted to make room, if any.
    pub fn insert(&self, key: String, response: CachedResponse) -> Option<String> {
        if self.config.max_entries == 0 {
            return None;
        }

        let expires_at = self.clock.now() + self.config.ttl;
        let mut entries = self.entries.lock();

        let mut evicted = None;
        if !entries.contains_key(&key) && entries.len() >= self.config.max_entries {
            evicted = entries
                .iter()
                .min_by_key(|(_, entry)| entry.expires_at)
                .map(|(k, _)| k.clone());

            if let Some(victim) = &evicted {
                entries.remove(victim);
                debug!("Cache full, evicted {}", victim);
            }
        }

        entries.insert(
            key,
            CacheEntry {
                response,
                expires_at,
            },
        );

        evicted
    }

    pub fn expires_at(&self, key: &str) -> Option<DateTime<Utc>> {
        self.entries.lock().get(key).map(|entry| entry.expires_at)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use std::sync::Arc;

    fn cache(max_entries: usize) -> (ResponseCache, ManualClock) {
        let clock = ManualClock::default();
        let config = CacheConfig {
            enabled: true,
            ttl: Duration::seconds(300),
            max_entries,
        };
        (ResponseCache::new(config, Arc::new(clock.clone())), clock)
    }

    fn json(body: &'static str) -> CachedResponse {
        CachedResponse {
            status: StatusCode::OK,
            content_type: Some("application/json".to_string()),
            headers: Vec::new(),
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    #[test]
    fn test_hit_within_ttl() {
        let (cache, clock) = cache(10);
        let key = ResponseCache::key("GET", "/api/v1/aircraft/N1", "");

        cache.insert(key.clone(), json("{\"a\":1}"));
        clock.advance(Duration::seconds(299));

        assert_eq!(cache.get(&key), Some(json("{\"a\":1}")));
    }

    #[test]
    fn test_expired_entry_is_removed() {
        let (cache, clock) = cache(10);
        let key = ResponseCache::key("GET", "/x", "");

        cache.insert(key.clone(), json("{}"));
        clock.advance(Duration::seconds(300));

        assert!(cache.get(&key).is_none());
        assert!(!cache.contains(&key));
    }

    #[test]
    fn test_eviction_picks_nearest_expiry() {
        let (cache, clock) = cache(3);

        cache.insert("a".to_string(), json("1"));
        clock.advance(Duration::seconds(1));
        cache.insert("b".to_string(), json("2"));
        clock.advance(Duration::seconds(1));
        cache.insert("c".to_string(), json("3"));
        clock.advance(Duration::seconds(1));

        let evicted = cache.insert("d".to_string(), json("4"));

        assert_eq!(evicted.as_deref(), Some("a"));
        assert_eq!(cache.len(), 3);
        assert!(cache.contains("d"));
        assert!(cache.contains("b"));
        assert!(cache.contains("c"));
    }

    #[test]
    fn test_replacing_key_does_not_evict() {
        let (cache, clock) = cache(2);

        cache.insert("a".to_string(), json("1"));
        cache.insert("b".to_string(), json("2"));
        clock.advance(Duration::seconds(10));

        assert!(cache.insert("a".to_string(), json("3")).is_none());
        assert_eq!(cache.len(), 2);
        assert_eq!(
            cache.expires_at("a"),
            Some(clock.now() + Duration::seconds(300))
        );
    }

    #[test]
    fn test_key_includes_method_and_query() {
        assert_ne!(
            ResponseCache::key("GET", "/p", "a=1"),
            ResponseCache::key("GET", "/p", "a=2")
        );
        assert_ne!(
            ResponseCache::key("GET", "/p", ""),
            ResponseCache::key("HEAD", "/p", "")
        );
    }
}
