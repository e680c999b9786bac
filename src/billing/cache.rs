use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::models::BillingStatus;

pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Key under which a tenant's status is cached. Invalidation callers build
/// the same string, so the format is part of the public contract.
pub fn cache_key(tenant_id: &str) -> String {
    format!("billing:{tenant_id}")
}

#[derive(Debug, Clone)]
struct CacheEntry {
    data: BillingStatus,
    timestamp: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.timestamp) > self.ttl
    }
}

/// key: billing-status-cache -> per-tenant memoized evaluator output
///
/// Entries expire lazily on `get` and eagerly through `cleanup`, which
/// [`spawn_sweeper`] runs on an interval. Concurrent writers to the same key
/// resolve last-write-wins.
///
/// Every key also carries a generation that `invalidate` and `clear` bump.
/// A reader that computed a value from data loaded before an invalidation
/// stores it through [`BillingStatusCache::set_if_generation`], which drops
/// the write instead of resurrecting the stale status.
#[derive(Debug)]
pub struct BillingStatusCache {
    entries: DashMap<String, CacheEntry>,
    generations: DashMap<String, u64>,
    epoch: AtomicU64,
    default_ttl: Duration,
}

impl Default for BillingStatusCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl BillingStatusCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            generations: DashMap::new(),
            epoch: AtomicU64::new(0),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn get(&self, key: &str) -> Option<BillingStatus> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&self, key: &str, now: Instant) -> Option<BillingStatus> {
        match self.entries.get(key) {
            None => return None,
            Some(entry) if !entry.is_expired(now) => return Some(entry.data.clone()),
            Some(_) => {}
        }

        // Only drop the entry if it is still the stale one; a writer may have
        // refreshed it between the read guard and this call.
        if self
            .entries
            .remove_if(key, |_, entry| entry.is_expired(now))
            .is_some()
        {
            debug!(key, "evicted expired billing status on read");
        }
        None
    }

    pub fn set(&self, key: impl Into<String>, value: BillingStatus) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    pub fn set_with_ttl(&self, key: impl Into<String>, value: BillingStatus, ttl: Duration) {
        self.set_at(key.into(), value, ttl, Instant::now());
    }

    fn set_at(&self, key: String, value: BillingStatus, ttl: Duration, now: Instant) {
        self.entries.insert(
            key,
            CacheEntry {
                data: value,
                timestamp: now,
                ttl,
            },
        );
    }

    /// Current generation of `key`; capture it before loading the data a
    /// later [`set_if_generation`](Self::set_if_generation) will store.
    pub fn generation(&self, key: &str) -> u64 {
        let per_key = self.generations.get(key).map(|g| *g).unwrap_or(0);
        self.epoch.load(AtomicOrdering::SeqCst).wrapping_add(per_key)
    }

    /// Stores `value` only if `key` has not been invalidated since
    /// `generation` was read. Returns whether the value was stored.
    pub fn set_if_generation(
        &self,
        key: impl Into<String>,
        value: BillingStatus,
        generation: u64,
    ) -> bool {
        let key = key.into();
        // Lock order is generations then entries, same as `invalidate`.
        let per_key = self.generations.entry(key.clone()).or_insert(0);
        let current = self.epoch.load(AtomicOrdering::SeqCst).wrapping_add(*per_key);
        if current != generation {
            debug!(
                key = key.as_str(),
                generation,
                current,
                "dropped billing status computed before invalidation"
            );
            return false;
        }
        self.set_at(key, value, self.default_ttl, Instant::now());
        true
    }

    pub fn invalidate(&self, key: &str) {
        let mut generation = self.generations.entry(key.to_string()).or_insert(0);
        *generation = generation.wrapping_add(1);
        let removed = self.entries.remove(key).is_some();
        drop(generation);
        if removed {
            debug!(key, "billing status invalidated");
        }
    }

    pub fn clear(&self) {
        self.epoch.fetch_add(1, AtomicOrdering::SeqCst);
        self.entries.clear();
    }

    /// Removes every expired entry and returns how many were dropped.
    pub fn cleanup(&self) -> usize {
        self.cleanup_at(Instant::now())
    }

    fn cleanup_at(&self, now: Instant) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let fresh = !entry.is_expired(now);
            if !fresh {
                removed += 1;
            }
            fresh
        });
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Handle to the background sweep task. Dropping it also ends the sweep, but
/// [`CacheSweeper::shutdown`] waits for the task to finish.
pub struct CacheSweeper {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl CacheSweeper {
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        if let Err(err) = self.handle.await {
            warn!(?err, "billing cache sweeper exited abnormally");
        }
    }
}

/// key: billing-cache-sweeper -> periodic eager expiry
pub fn spawn_sweeper(cache: Arc<BillingStatusCache>, interval: Duration) -> CacheSweeper {
    let (stop, mut stopped) = watch::channel(false);
    let handle = tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; nothing can be stale yet.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = cache.cleanup();
                    if removed > 0 {
                        debug!(removed, remaining = cache.len(), "billing cache sweep");
                    }
                }
                changed = stopped.changed() => {
                    if changed.is_err() || *stopped.borrow() {
                        break;
                    }
                }
            }
        }
        info!("billing cache sweeper stopped");
    });

    CacheSweeper { stop, handle }
}
