//! In-memory TTL cache with an injectable clock.

use log::debug;
use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Time source of the cache.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        self.origin + *offset
    }
}

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) <= self.ttl
    }
}

type Slot<V> = Arc<tokio::sync::Mutex<Option<CacheEntry<V>>>>;

/// Memoizes values per key until their TTL runs out.
///
/// Each key has its own slot lock, held for the whole of a producer run:
/// concurrent callers of one key never run two producers, while other keys
/// stay readable during a slow fetch.
pub struct TtlCache<K, V> {
    slots: Mutex<HashMap<K, Slot<V>>>,
    clock: Arc<dyn Clock>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn slot(&self, key: &K) -> Slot<V> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.entry(key.clone()).or_default().clone()
    }

    fn all_slots(&self) -> Vec<Slot<V>> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.values().cloned().collect()
    }

    /// Fresh cached value for `key`, if any.
    pub async fn get(&self, key: &K) -> Option<V> {
        let slot = self.slots.lock().unwrap_or_else(|e| e.into_inner()).get(key).cloned()?;
        let entry = slot.lock().await;
        let now = self.clock.now();
        entry
            .as_ref()
            .filter(|entry| entry.is_fresh(now))
            .map(|entry| entry.value.clone())
    }

    pub async fn insert(&self, key: K, value: V, ttl: Duration) {
        let slot = self.slot(&key);
        let mut entry = slot.lock().await;
        let inserted_at = self.clock.now();
        *entry = Some(CacheEntry { value, inserted_at, ttl });
    }

    pub async fn get_or_compute<F, Fut>(&self, key: K, ttl: Duration, producer: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        self.get_or_compute_by(key, producer, |_| ttl).await
    }

    /// Like [`get_or_compute`](Self::get_or_compute), with the TTL picked from
    /// the produced value. A zero TTL leaves the value uncached.
    pub async fn get_or_compute_by<F, Fut, T>(&self, key: K, producer: F, ttl_of: T) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
        T: FnOnce(&V) -> Duration,
    {
        let slot = self.slot(&key);
        let mut entry = slot.lock().await;

        if let Some(cached) = entry.as_ref() {
            if cached.is_fresh(self.clock.now()) {
                debug!("Cache hit for {:?}", key);
                return cached.value.clone();
            }
            debug!("Cache entry for {:?} expired", key);
        }

        let value = producer().await;
        let ttl = ttl_of(&value);
        if ttl.is_zero() {
            *entry = None;
        } else {
            *entry = Some(CacheEntry {
                value: value.clone(),
                inserted_at: self.clock.now(),
                ttl,
            });
        }
        value
    }

    pub async fn invalidate(&self, key: &K) -> bool {
        let removed = self.slots.lock().unwrap_or_else(|e| e.into_inner()).remove(key);
        match removed {
            Some(slot) => slot.lock().await.take().is_some(),
            None => false,
        }
    }

    /// 清理过期条目，返回清理数量。正在计算的键跳过
    pub async fn purge_expired(&self) -> usize {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        let now = self.clock.now();
        let mut purged = 0;
        slots.retain(|_, slot| {
            let mut entry = match slot.try_lock() {
                Ok(entry) => entry,
                Err(_) => return true,
            };
            if entry.as_ref().map_or(false, |e| !e.is_fresh(now)) {
                *entry = None;
                purged += 1;
            }
            // 只有本表持有的空槽才能移除，否则等待者会拿到孤立的槽
            entry.is_some() || Arc::strong_count(slot) > 1
        });
        purged
    }

    /// Number of stored entries, expired ones included until purged.
    pub async fn len(&self) -> usize {
        let mut count = 0;
        for slot in self.all_slots() {
            if slot.lock().await.is_some() {
                count += 1;
            }
        }
        count
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
