use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

use crate::{
    cache::{CacheKey, Clock, SystemClock},
    executor::TabularResult,
};

pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct CachedEntry {
    result: Arc<TabularResult>,
    expires_at: DateTime<Utc>,
}

type Slot = Arc<tokio::sync::Mutex<Option<CachedEntry>>>;

/// Time-bounded memo of query results.
///
/// Each key owns an async slot. Whoever holds the slot is the only caller
/// allowed to compute, so concurrent requests for the same key wait and then
/// read the fresh entry instead of executing again. Failed computations store
/// nothing, and every fill sweeps out expired slots so the map stays bounded
/// by the keys that are still live.
pub struct ResultCache {
    clock: Arc<dyn Clock>,
    slots: Mutex<HashMap<CacheKey, Slot>>,
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl ResultCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock, slots: Mutex::new(HashMap::new()) }
    }

    pub async fn get_or_compute<F, Fut, E>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        compute: F,
    ) -> Result<Arc<TabularResult>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<TabularResult, E>>,
    {
        let slot = self.slot(key);
        let mut entry = slot.lock().await;

        if let Some(cached) = entry.as_ref() {
            if cached.expires_at > self.clock.now() {
                debug!(key = %key, "cache hit");
                return Ok(cached.result.clone());
            }
        }

        let result = match compute().await {
            Ok(result) => Arc::new(result),
            Err(error) => {
                drop(entry);
                self.release_if_unused(key, &slot);
                return Err(error);
            }
        };
        let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
        let expires_at = self.clock.now().checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);
        *entry = Some(CachedEntry { result: result.clone(), expires_at });
        debug!(key = %key, %expires_at, "cache filled");

        let purged = self.purge_expired();
        if purged > 0 {
            debug!(purged, "expired cache slots dropped");
        }
        Ok(result)
    }

    /// Drops an empty slot after a failed computation unless another caller
    /// already holds it.
    fn release_if_unused(&self, key: &CacheKey, slot: &Slot) {
        let mut slots = self.lock_slots();
        let unused = slots.get(key).is_some_and(|current| {
            Arc::ptr_eq(current, slot)
                && Arc::strong_count(slot) == 2
                && current.try_lock().is_ok_and(|entry| entry.is_none())
        });
        if unused {
            slots.remove(key);
        }
    }

    /// Drops every entry. Computations already running finish normally but
    /// their results are not visible to later callers.
    pub fn invalidate_all(&self) {
        self.lock_slots().clear();
    }

    /// Removes expired and empty slots that no caller is holding. Returns how
    /// many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut slots = self.lock_slots();
        let before = slots.len();
        slots.retain(|_, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.try_lock() {
                Ok(entry) => entry.as_ref().is_some_and(|e| e.expires_at > now),
                Err(_) => true,
            }
        });
        before - slots.len()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.lock_slots()
            .values()
            .filter(|slot| {
                slot.try_lock()
                    .map(|entry| entry.as_ref().is_some_and(|e| e.expires_at > now))
                    .unwrap_or(false)
            })
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, key: &CacheKey) -> Slot {
        self.lock_slots().entry(key.clone()).or_default().clone()
    }

    fn lock_slots(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, Slot>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }
}
