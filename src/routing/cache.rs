// src/routing/cache.rs
//! TTL route cache with per-key single-flight computation.
//!
//! Every key owns a slot behind its own async mutex. The first caller for an
//! absent or expired key computes while holding the slot lock; concurrent
//! callers for the same key wait on that lock and then read the fresh value.
//! Failed computations leave the slot empty so the next caller retries.

use super::context::RequestContext;
use crate::error::RouterError;
use dashmap::DashMap;
use log::debug;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteCacheKey {
    pub base: String,
    pub quote: String,
    pub config_fingerprint: u64,
}

impl RouteCacheKey {
    pub fn new(base: &str, quote: &str, config_fingerprint: u64) -> Self {
        Self {
            base: base.to_string(),
            quote: quote.to_string(),
            config_fingerprint,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    Hit,
    Computed,
}

#[derive(Debug)]
enum Slot<V> {
    Empty,
    Ready { value: V, expires_at: Instant },
}

impl<V> Slot<V> {
    fn fresh(&self, now: Instant) -> bool {
        matches!(self, Slot::Ready { expires_at, .. } if *expires_at > now)
    }
}

pub struct RouteCache<V> {
    name: &'static str,
    ttl: Duration,
    enabled: bool,
    slots: DashMap<RouteCacheKey, Arc<Mutex<Slot<V>>>>,
}

impl<V> RouteCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str, ttl: Duration, enabled: bool) -> Self {
        Self {
            name,
            ttl,
            enabled,
            slots: DashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the cached value for `key`, computing it at most once across
    /// concurrent callers when absent or expired. A caller waiting on another
    /// caller's computation gives up when its own `ctx` is done.
    pub async fn get_or_compute<F, Fut>(
        &self,
        ctx: &RequestContext,
        key: &RouteCacheKey,
        compute: F,
    ) -> Result<(V, CacheOutcome), RouterError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, RouterError>>,
    {
        if !self.enabled {
            return compute().await.map(|v| (v, CacheOutcome::Computed));
        }

        // clone the slot handle so no map shard lock is held across the await
        let slot = self
            .slots
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(Slot::Empty)))
            .clone();

        let mut guard = tokio::select! {
            guard = slot.lock() => guard,
            reason = ctx.done() => {
                debug!("{} cache wait for {}->{} abandoned: {}", self.name, key.base, key.quote, reason);
                return Err(reason);
            }
        };
        if let Slot::Ready { value, expires_at } = &*guard {
            if *expires_at > Instant::now() {
                return Ok((value.clone(), CacheOutcome::Hit));
            }
        }

        debug!("{} cache miss for {}->{}", self.name, key.base, key.quote);
        match compute().await {
            Ok(value) => {
                *guard = Slot::Ready {
                    value: value.clone(),
                    expires_at: Instant::now() + self.ttl,
                };
                Ok((value, CacheOutcome::Computed))
            }
            Err(e) => {
                *guard = Slot::Empty;
                Err(e)
            }
        }
    }

    /// Fresh value for `key` without computing anything. Skips slots that are
    /// being computed right now.
    pub fn peek(&self, key: &RouteCacheKey) -> Option<V> {
        let slot = self.slots.get(key)?.clone();
        let guard = slot.try_lock().ok()?;
        match &*guard {
            Slot::Ready { value, expires_at } if *expires_at > Instant::now() => Some(value.clone()),
            _ => None,
        }
    }

    /// Number of fresh entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.slots
            .iter()
            .filter(|entry| entry.value().try_lock().map(|g| g.fresh(now)).unwrap_or(false))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops empty and expired slots nobody holds. A slot handed out to a
    /// caller that has not locked it yet is kept.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.slots.len();
        self.slots.retain(|_, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.try_lock() {
                Ok(guard) => guard.fresh(now),
                Err(_) => true,
            }
        });
        let removed = before.saturating_sub(self.slots.len());
        if removed > 0 {
            debug!("{} cache purged {} stale slots", self.name, removed);
        }
        removed
    }

    pub fn clear(&self) {
        self.slots.clear();
    }

    /// Periodically purges stale slots until the cache is dropped.
    pub fn spawn_cleanup_task(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match weak.upgrade() {
                    Some(cache) => {
                        cache.purge_expired();
                    }
                    None => break,
                }
            }
        })
    }
}
