/*!
 * Flat Store
 * Single DashMap for low-contention workloads
 */

use super::LockStore;
use crate::locks::entry::{Probe, ReclaimPolicy, TimedMutex};
use crate::locks::stats::SweepStats;
use ahash::RandomState;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

pub(crate) struct FlatStore {
    items: DashMap<String, Arc<TimedMutex>, RandomState>,
}

impl FlatStore {
    pub(crate) fn new() -> Self {
        Self {
            items: DashMap::with_hasher(RandomState::new()),
        }
    }
}

impl LockStore for FlatStore {
    #[inline]
    fn get(&self, name: &str) -> Option<Arc<TimedMutex>> {
        self.items.get(name).map(|entry| Arc::clone(entry.value()))
    }

    fn get_or_create(&self, name: &str, now: Duration) -> Arc<TimedMutex> {
        if let Some(existing) = self.get(name) {
            return existing;
        }
        Arc::clone(
            self.items
                .entry(name.to_owned())
                .or_insert_with(|| Arc::new(TimedMutex::new(now)))
                .value(),
        )
    }

    fn sweep(&self, now: Duration, policy: &ReclaimPolicy) -> SweepStats {
        let mut stats = SweepStats::new();
        let mut candidates = Vec::new();

        for item in self.items.iter() {
            stats.scanned += 1;
            match item.value().probe(now, policy) {
                Probe::Reclaimable => candidates.push(item.key().clone()),
                Probe::Fresh => stats.fresh += 1,
                Probe::Held => stats.held += 1,
            }
        }

        // Re-checked under the map's write lock so a concurrent acquire wins
        for name in candidates {
            let mut outcome = None;
            self.items.remove_if(&name, |_, entry| {
                let retired = entry.try_retire(now, policy);
                outcome = Some(retired);
                retired == Probe::Reclaimable
            });
            if let Some(outcome) = outcome {
                stats.record_retire(outcome);
            }
        }

        stats
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: ReclaimPolicy = ReclaimPolicy {
        idle_threshold: Duration::from_secs(1),
        min_lifetime: Duration::from_secs(1),
    };

    #[test]
    fn test_get_or_create_is_idempotent() {
        let store = FlatStore::new();
        let a = store.get_or_create("alpha", Duration::ZERO);
        let b = store.get_or_create("alpha", Duration::from_secs(9));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.created_at(), Duration::ZERO);
        assert_eq!(store.len(), 1);
        assert!(store.get("alpha").is_some());
        assert!(store.get("beta").is_none());
    }

    #[test]
    fn test_sweep_removes_only_stale_unheld() {
        let store = FlatStore::new();
        let held = store.get_or_create("held", Duration::ZERO);
        assert!(held.acquire(|| Duration::ZERO));
        store.get_or_create("stale", Duration::ZERO);
        store.get_or_create("young", Duration::from_secs(9));

        let stats = store.sweep(Duration::from_secs(10), &POLICY);

        assert_eq!(stats.scanned, 3);
        assert_eq!(stats.reclaimed, 1);
        assert_eq!(stats.held, 1);
        assert_eq!(stats.fresh, 1);
        assert!(store.get("stale").is_none());
        assert!(store.get("held").is_some());
        assert!(store.get("young").is_some());
    }

    #[test]
    fn test_concurrent_first_access_creates_one_entry() {
        let store = Arc::new(FlatStore::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || store.get_or_create("shared", Duration::ZERO))
            })
            .collect();

        let entries: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(entries.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(store.len(), 1);
    }
}
