//! Endpoint cache: raw peer address to a shared endpoint handle.
//!
//! The receiver loop resolves every inbound datagram's source through the
//! cache, so datagrams from one peer share a single [`Endpoint`] and can be
//! grouped by handle identity.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use crate::core::{DEFAULT_ENDPOINT_CACHE_CAPACITY, DEFAULT_ENDPOINT_IDLE_TIMEOUT};

/// A resolved network peer.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Endpoint {
    addr: SocketAddr,
    first_seen: Instant,
}

impl Endpoint {
    /// Peer address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// When the first datagram from this peer was resolved.
    pub fn first_seen(&self) -> Instant {
        self.first_seen
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.addr.fmt(f)
    }
}

#[derive(Debug)]
struct CacheEntry {
    endpoint: Arc<Endpoint>,
    last_used: Instant,
}

/// Bounded cache of resolved endpoints.
///
/// When full, entries idle longer than the idle timeout are evicted first,
/// then the least recently used one.
#[derive(Debug)]
pub struct EndpointCache {
    entries: DashMap<SocketAddr, CacheEntry>,
    capacity: usize,
    idle_timeout: Duration,
}

impl Default for EndpointCache {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT_CACHE_CAPACITY, DEFAULT_ENDPOINT_IDLE_TIMEOUT)
    }
}

impl EndpointCache {
    /// Create a cache holding at most `capacity` endpoints.
    pub fn new(capacity: usize, idle_timeout: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
            idle_timeout,
        }
    }

    /// Resolve `addr` to its cached endpoint, creating it on first sight.
    pub fn resolve(&self, addr: SocketAddr) -> Arc<Endpoint> {
        self.resolve_at(addr, Instant::now())
    }

    /// [`resolve`](Self::resolve) with an explicit clock reading.
    pub fn resolve_at(&self, addr: SocketAddr, now: Instant) -> Arc<Endpoint> {
        if let Some(mut entry) = self.entries.get_mut(&addr) {
            entry.last_used = now;
            return Arc::clone(&entry.endpoint);
        }

        if self.entries.len() >= self.capacity {
            self.evict(now);
        }

        // Another thread may have inserted the same peer since the lookup.
        let mut entry = self.entries.entry(addr).or_insert_with(|| CacheEntry {
            endpoint: Arc::new(Endpoint {
                addr,
                first_seen: now,
            }),
            last_used: now,
        });
        entry.last_used = now;
        Arc::clone(&entry.endpoint)
    }

    /// Last time `addr` was resolved.
    pub fn last_used(&self, addr: &SocketAddr) -> Option<Instant> {
        self.entries.get(addr).map(|entry| entry.last_used)
    }

    /// Check whether `addr` is cached.
    pub fn contains(&self, addr: &SocketAddr) -> bool {
        self.entries.contains_key(addr)
    }

    /// Number of cached endpoints.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every cached endpoint.
    pub fn clear(&self) {
        self.entries.clear();
    }

    fn evict(&self, now: Instant) {
        let idle_timeout = self.idle_timeout;
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.last_used) < idle_timeout);

        if self.entries.len() < self.capacity {
            return;
        }

        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().last_used)
            .map(|entry| *entry.key());
        if let Some(addr) = oldest {
            self.entries.remove(&addr);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[tokio::test]
    async fn test_same_address_same_handle() {
        let cache = EndpointCache::default();
        let first = cache.resolve(addr(4000));
        let second = cache.resolve(addr(4000));

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_distinct_addresses() {
        let cache = EndpointCache::default();
        let a = cache.resolve(addr(4000));
        let b = cache.resolve(addr(4001));

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(b.addr(), addr(4001));
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_hit_refreshes_last_used() {
        let cache = EndpointCache::default();
        let start = Instant::now();

        let endpoint = cache.resolve_at(addr(4000), start);
        let miss_time = cache.last_used(&addr(4000)).unwrap();
        assert_eq!(miss_time, start);

        let later = start + Duration::from_millis(5);
        let again = cache.resolve_at(addr(4000), later);
        let hit_time = cache.last_used(&addr(4000)).unwrap();

        assert!(hit_time > miss_time);
        assert!(Arc::ptr_eq(&endpoint, &again));
        assert_eq!(again.first_seen(), start);
    }

    #[tokio::test]
    async fn test_hit_refreshes_last_used_wall_clock() {
        let cache = EndpointCache::default();
        cache.resolve(addr(4000));
        let miss_time = cache.last_used(&addr(4000)).unwrap();

        tokio::time::sleep(Duration::from_millis(2)).await;
        cache.resolve(addr(4000));
        assert!(cache.last_used(&addr(4000)).unwrap() > miss_time);
    }

    #[tokio::test]
    async fn test_evicts_idle_entries_when_full() {
        let cache = EndpointCache::new(2, Duration::from_secs(10));
        let start = Instant::now();

        cache.resolve_at(addr(1), start);
        cache.resolve_at(addr(2), start + Duration::from_secs(20));

        // addr(1) has been idle for 30s, addr(2) for 10s: both past the timeout.
        cache.resolve_at(addr(3), start + Duration::from_secs(30));
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&addr(3)));
    }

    #[tokio::test]
    async fn test_evicts_lru_when_nothing_idle() {
        let cache = EndpointCache::new(2, Duration::from_secs(60));
        let start = Instant::now();

        cache.resolve_at(addr(1), start);
        cache.resolve_at(addr(2), start + Duration::from_secs(1));
        cache.resolve_at(addr(1), start + Duration::from_secs(2));

        cache.resolve_at(addr(3), start + Duration::from_secs(3));
        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&addr(1)));
        assert!(!cache.contains(&addr(2)));
        assert!(cache.contains(&addr(3)));
    }
}
