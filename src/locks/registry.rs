/*!
 * Named Lock Registry
 *
 * Maps arbitrary string keys to per-key mutexes, created on first use and
 * reclaimed by the cleanup sweep after a period of disuse.
 *
 * # Adaptive Storage
 *
 * Entries live in one of two stores:
 * - **Flat**: a single `DashMap`, cheapest for modest fan-out
 * - **Sharded**: independent `RwLock<HashMap>` stripes selected by hash
 *
 * The live-lock counter (outstanding `lock` calls not yet unlocked) drives the
 * choice. Above `high_water` the registry flips to sharded; below `low_water`,
 * after at least `min_shard_dwell` in sharded mode, it flips back. Both flips
 * are a single compare-and-set on the mode flag.
 *
 * A switch only affects where *new* entries are created. Lookups consult the
 * active store first and then the other one, so entries created before a
 * switch stay addressable until the sweep reclaims them.
 *
 * # Uniqueness
 *
 * A name must never resolve to two live entries. Two mechanisms guarantee it:
 * - Creation (the miss path) is serialized per hash bucket by a striped latch
 *   and re-checks both stores before inserting.
 * - The sweep marks an entry retired under the entry's own lock at the moment
 *   it is removed. Anyone still holding a stale `Arc` sees the flag on acquire
 *   and resolves the name again.
 */

use super::entry::{ReclaimPolicy, TimedMutex};
use super::guard::NamedLockGuard;
use super::stats::{RegistryStats, StoreMode, SweepStats};
use super::store::{FlatStore, LockStore, ShardedStore};
use crate::clock::{Clock, SystemClock};
use crate::config::LockConfig;
use crate::errors::ConfigResult;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// Process-wide registry of named mutexes
pub struct NamedLockRegistry {
    flat: FlatStore,
    sharded: ShardedStore,
    /// Striped latch serializing entry creation per hash bucket
    creation: Box<[Mutex<()>]>,
    sharded_mode: AtomicBool,
    live: AtomicI64,
    /// Clock reading (nanos) of the last switch to sharded mode
    mode_since: AtomicU64,
    mode_switches: AtomicU64,
    sweeps: AtomicU64,
    reclaimed_total: AtomicU64,
    policy: ReclaimPolicy,
    config: LockConfig,
    clock: Arc<dyn Clock>,
}

impl NamedLockRegistry {
    /// Create a registry using the system clock
    pub fn new(config: LockConfig) -> ConfigResult<Self> {
        Self::with_clock(config, Arc::new(SystemClock::new()))
    }

    /// Create a registry reading time from `clock`
    pub fn with_clock(config: LockConfig, clock: Arc<dyn Clock>) -> ConfigResult<Self> {
        config.validate()?;

        let creation = (0..config.shard_count)
            .map(|_| Mutex::new(()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        debug!(
            shards = config.shard_count,
            high_water = config.high_water,
            low_water = config.low_water,
            adaptive = config.adaptive,
            "Named lock registry initialized"
        );

        Ok(Self {
            flat: FlatStore::new(),
            sharded: ShardedStore::new(config.shard_count),
            creation,
            sharded_mode: AtomicBool::new(false),
            live: AtomicI64::new(0),
            mode_since: AtomicU64::new(0),
            mode_switches: AtomicU64::new(0),
            sweeps: AtomicU64::new(0),
            reclaimed_total: AtomicU64::new(0),
            policy: ReclaimPolicy {
                idle_threshold: config.idle_threshold,
                min_lifetime: config.min_lifetime,
            },
            config,
            clock,
        })
    }

    /// Acquire the lock for `name`, blocking until it is free
    ///
    /// Creates the entry on first use. There is no timeout; the lock is not
    /// reentrant, so locking a name twice from one thread without unlocking
    /// deadlocks.
    pub fn lock(&self, name: &str) {
        let live = self.live.fetch_add(1, Ordering::AcqRel) + 1;
        self.maybe_shard(live);

        loop {
            let entry = self.resolve_or_create(name);
            if entry.acquire(|| self.clock.now()) {
                trace!(lock_name = name, live, "Named lock acquired");
                return;
            }
            trace!(lock_name = name, "Entry retired before acquisition, resolving again");
        }
    }

    /// Release the lock for `name`
    ///
    /// Unknown names and unheld entries are ignored. Returns whether a held
    /// entry was released.
    pub fn unlock(&self, name: &str) -> bool {
        let Some(entry) = self.resolve(name) else {
            trace!(lock_name = name, "Unlock of unknown name ignored");
            return false;
        };
        if !entry.release() {
            trace!(lock_name = name, "Unlock of unheld name ignored");
            return false;
        }

        let live = self.live.fetch_sub(1, Ordering::AcqRel) - 1;
        self.maybe_unshard(live);
        true
    }

    /// Acquire `name` and release it when the guard drops
    pub fn guard(&self, name: &str) -> NamedLockGuard<'_> {
        self.lock(name);
        NamedLockGuard::new(self, name)
    }

    /// Run one cleanup pass over both stores
    ///
    /// Uses only non-blocking probes; held entries are never removed.
    pub fn sweep(&self) -> SweepStats {
        let started = Instant::now();
        let now = self.clock.now();

        let (active, other) = self.stores();
        let mut stats = active.sweep(now, &self.policy);
        stats += other.sweep(now, &self.policy);

        self.sweeps.fetch_add(1, Ordering::Relaxed);
        self.reclaimed_total
            .fetch_add(stats.reclaimed as u64, Ordering::Relaxed);

        debug!(
            mode = %self.mode(),
            scanned = stats.scanned,
            reclaimed = stats.reclaimed,
            held = stats.held,
            fresh = stats.fresh,
            elapsed_us = started.elapsed().as_micros() as u64,
            "Named lock sweep complete"
        );
        if stats.reclaimed_any() {
            info!(reclaimed = stats.reclaimed, "Reclaimed idle named locks");
        }

        stats
    }

    /// Outstanding `lock` calls (holders plus waiters)
    #[inline]
    pub fn active_lock_count(&self) -> i64 {
        self.live.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_shard_mode(&self) -> bool {
        self.sharded_mode.load(Ordering::Acquire)
    }

    #[inline]
    pub fn mode(&self) -> StoreMode {
        if self.is_shard_mode() {
            StoreMode::Sharded
        } else {
            StoreMode::Flat
        }
    }

    /// Entries currently stored, across both stores
    pub fn entry_count(&self) -> usize {
        self.flat.len() + self.sharded.len()
    }

    /// Check whether an entry exists for `name`
    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// Check whether `name` is currently held
    pub fn is_locked(&self, name: &str) -> bool {
        self.resolve(name).is_some_and(|entry| entry.is_held())
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Thresholds the sweep applies
    pub fn reclaim_policy(&self) -> ReclaimPolicy {
        self.policy
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            mode: self.mode(),
            active_locks: self.active_lock_count(),
            flat_entries: self.flat.len(),
            sharded_entries: self.sharded.len(),
            mode_switches: self.mode_switches.load(Ordering::Relaxed),
            sweeps: self.sweeps.load(Ordering::Relaxed),
            reclaimed_total: self.reclaimed_total.load(Ordering::Relaxed),
        }
    }

    /// Active store first, then the other one
    #[inline]
    fn stores(&self) -> (&dyn LockStore, &dyn LockStore) {
        let flat: &dyn LockStore = &self.flat;
        let sharded: &dyn LockStore = &self.sharded;
        if self.is_shard_mode() {
            (sharded, flat)
        } else {
            (flat, sharded)
        }
    }

    #[inline]
    fn resolve(&self, name: &str) -> Option<Arc<TimedMutex>> {
        let (active, other) = self.stores();
        active.get(name).or_else(|| other.get(name))
    }

    fn resolve_or_create(&self, name: &str) -> Arc<TimedMutex> {
        if let Some(entry) = self.resolve(name) {
            return entry;
        }

        let _latch = self.creation[self.sharded.shard_index(name)].lock();
        if let Some(entry) = self.resolve(name) {
            return entry;
        }
        let (active, _) = self.stores();
        active.get_or_create(name, self.clock.now())
    }

    fn maybe_shard(&self, live: i64) {
        if !self.config.adaptive || live <= self.config.high_water || self.is_shard_mode() {
            return;
        }
        // Stamped before the flip so unlockers never see sharded mode with a
        // stale dwell origin. Only sharded mode reads it.
        let now = u64::try_from(self.clock.now().as_nanos()).unwrap_or(u64::MAX);
        self.mode_since.store(now, Ordering::Release);
        if self
            .sharded_mode
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.mode_switches.fetch_add(1, Ordering::Relaxed);
            debug!(live, high_water = self.config.high_water, "Switched named locks to sharded storage");
        }
    }

    fn maybe_unshard(&self, live: i64) {
        if live >= self.config.low_water || !self.is_shard_mode() {
            return;
        }
        let since = Duration::from_nanos(self.mode_since.load(Ordering::Acquire));
        if self.clock.now().saturating_sub(since) < self.config.min_shard_dwell {
            return;
        }
        if self
            .sharded_mode
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.mode_switches.fetch_add(1, Ordering::Relaxed);
            debug!(live, low_water = self.config.low_water, "Switched named locks to flat storage");
        }
    }
}

impl std::fmt::Debug for NamedLockRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedLockRegistry")
            .field("mode", &self.mode())
            .field("active_locks", &self.active_lock_count())
            .field("entries", &self.entry_count())
            .finish()
    }
}
