// src/cache.rs
//! Bounded, TTL-aware in-memory cache shared by every refresh job.
//!
//! Each instance holds at most `capacity` entries. Inserting a new key at capacity evicts the
//! oldest-inserted entry in the same write (strict FIFO by insertion; re-putting a key counts as
//! a fresh insertion). Entries past `expires_at` are never returned by [`BoundedCache::get`] or
//! [`BoundedCache::snapshot_all`], only by the `allow_stale` variants.
//!
//! Readers take an `Arc` of the current version under a momentary read lock and then work on
//! that immutable copy, so a snapshot is internally consistent and never holds a lock while the
//! caller uses it. Writers are serialized by a per-instance gate and publish a new version.
//!
//! Every write clones the current version, so a put costs O(capacity). Capacities here are in
//! the hundreds; readers in exchange never wait on a writer.

use crate::clock::SharedClock;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use log::{debug, info};
use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::{Mutex, RwLock};

/// Cache entry storing a value with its freshness window
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<V> {
    pub key: String,
    pub value: V,
    pub fetched_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
    fn new(key: String, value: V, fetched_at: DateTime<Utc>, ttl: Duration) -> Self {
        let ttl = ChronoDuration::from_std(ttl)
            .unwrap_or_else(|_| ChronoDuration::days(365 * 100))
            .max(ChronoDuration::milliseconds(1));
        Self {
            key,
            value,
            fetched_at,
            expires_at: fetched_at + ttl,
        }
    }

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn age(&self, now: DateTime<Utc>) -> ChronoDuration {
        now - self.fetched_at
    }
}

/// Cache metrics for monitoring
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub stale_hits: u64,
    pub evictions: u64,
    pub expired_purged: u64,
    pub total_entries: usize,
}

impl CacheMetrics {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    stale_hits: AtomicU64,
    evictions: AtomicU64,
    expired_purged: AtomicU64,
}

/// One immutable version of the cache contents
#[derive(Debug, Clone)]
struct CacheStorage<V> {
    entries: HashMap<String, CacheEntry<V>>,
    insertion_order: VecDeque<String>,
}

impl<V> Default for CacheStorage<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            insertion_order: VecDeque::new(),
        }
    }
}

impl<V> CacheStorage<V> {
    fn ordered_entries(&self) -> impl Iterator<Item = &CacheEntry<V>> {
        self.insertion_order
            .iter()
            .filter_map(move |key| self.entries.get(key))
    }
}

pub struct BoundedCache<V> {
    name: String,
    capacity: usize,
    clock: SharedClock,
    current: RwLock<Arc<CacheStorage<V>>>,
    write_gate: Mutex<()>,
    counters: Counters,
}

impl<V> BoundedCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(name: &str, capacity: usize, clock: SharedClock) -> Self {
        let capacity = capacity.max(1);
        info!("Initializing cache '{}' (capacity: {})", name, capacity);

        Self {
            name: name.to_string(),
            capacity,
            clock,
            current: RwLock::new(Arc::new(CacheStorage::default())),
            write_gate: Mutex::new(()),
            counters: Counters::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    async fn read_version(&self) -> Arc<CacheStorage<V>> {
        self.current.read().await.clone()
    }

    /// Insert or replace `key`. Evicts the oldest entry first when a new key would exceed
    /// capacity. Never fails.
    pub async fn put(&self, key: &str, value: V, ttl: Duration) {
        let _gate = self.write_gate.lock().await;
        let now = self.clock.now();
        let mut next = (*self.read_version().await).clone();

        if next.entries.contains_key(key) {
            next.insertion_order.retain(|k| k != key);
        } else {
            while next.entries.len() >= self.capacity {
                match next.insertion_order.pop_front() {
                    Some(oldest) => {
                        next.entries.remove(&oldest);
                        self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                        debug!("[{}] Evicted oldest entry: {}", self.name, oldest);
                    }
                    None => break,
                }
            }
        }

        next.entries
            .insert(key.to_string(), CacheEntry::new(key.to_string(), value, now, ttl));
        next.insertion_order.push_back(key.to_string());

        debug!(
            "[{}] Cached {} (size: {}/{})",
            self.name,
            key,
            next.entries.len(),
            self.capacity
        );
        *self.current.write().await = Arc::new(next);
    }

    /// Fresh value for `key`, or `None` if absent or stale
    pub async fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let version = self.read_version().await;
        match version.entries.get(key) {
            Some(entry) if !entry.is_stale(now) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            }
            Some(_) => {
                debug!("[{}] Entry expired for {}", self.name, key);
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Value for `key` even if its TTL has elapsed. For data where availability beats
    /// freshness (market, social).
    pub async fn get_allow_stale(&self, key: &str) -> Option<V> {
        self.get_entry_allow_stale(key).await.map(|entry| entry.value)
    }

    pub async fn get_entry_allow_stale(&self, key: &str) -> Option<CacheEntry<V>> {
        let now = self.clock.now();
        let version = self.read_version().await;
        match version.entries.get(key) {
            Some(entry) => {
                if entry.is_stale(now) {
                    self.counters.stale_hits.fetch_add(1, Ordering::Relaxed);
                } else {
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                }
                Some(entry.clone())
            }
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Non-stale entries, oldest insertion first, from one consistent version
    pub async fn snapshot_entries(&self) -> Vec<CacheEntry<V>> {
        let now = self.clock.now();
        let version = self.read_version().await;
        version
            .ordered_entries()
            .filter(|entry| !entry.is_stale(now))
            .cloned()
            .collect()
    }

    pub async fn snapshot_all(&self) -> Vec<V> {
        self.snapshot_entries()
            .await
            .into_iter()
            .map(|entry| entry.value)
            .collect()
    }

    pub async fn snapshot_all_allow_stale(&self) -> Vec<V> {
        let version = self.read_version().await;
        version
            .ordered_entries()
            .map(|entry| entry.value.clone())
            .collect()
    }

    pub async fn contains_key(&self, key: &str) -> bool {
        self.read_version().await.entries.contains_key(key)
    }

    /// Drops every stale entry. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let _gate = self.write_gate.lock().await;
        let now = self.clock.now();
        let current = self.read_version().await;

        let expired: Vec<String> = current
            .ordered_entries()
            .filter(|entry| entry.is_stale(now))
            .map(|entry| entry.key.clone())
            .collect();
        if expired.is_empty() {
            return 0;
        }

        let mut next = (*current).clone();
        for key in &expired {
            next.entries.remove(key);
        }
        next.insertion_order.retain(|k| next.entries.contains_key(k));
        *self.current.write().await = Arc::new(next);

        self.counters
            .expired_purged
            .fetch_add(expired.len() as u64, Ordering::Relaxed);
        debug!("[{}] Purged {} expired entries", self.name, expired.len());
        expired.len()
    }

    pub async fn len(&self) -> usize {
        self.read_version().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn metrics(&self) -> CacheMetrics {
        CacheMetrics {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            stale_hits: self.counters.stale_hits.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            expired_purged: self.counters.expired_purged.load(Ordering::Relaxed),
            total_entries: self.len().await,
        }
    }

    pub async fn summary(&self) -> String {
        let metrics = self.metrics().await;
        format!(
            "Cache '{}': {}/{} entries, {:.1}% hit rate, {} evictions",
            self.name,
            metrics.total_entries,
            self.capacity,
            metrics.hit_rate() * 100.0,
            metrics.evictions
        )
    }
}
