/*!
 * Timed Mutex
 * Per-name exclusive primitive with usage tracking and retirement
 */

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Reclamation thresholds applied by the sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReclaimPolicy {
    pub idle_threshold: Duration,
    pub min_lifetime: Duration,
}

/// Outcome of a non-blocking sweep probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Probe {
    /// Unheld and past both thresholds
    Reclaimable,
    /// Unheld but used or created too recently
    Fresh,
    /// Held, or the state lock was busy
    Held,
}

#[derive(Debug, Default)]
struct EntryState {
    held: bool,
    /// Set once, when the sweep removes the entry from its store
    retired: bool,
}

/// One named lock
///
/// Ownership is tracked by a `held` flag rather than a guard so that `lock`
/// and `unlock` can be separate calls. Waiters park on `released`.
#[derive(Debug)]
pub(crate) struct TimedMutex {
    state: Mutex<EntryState>,
    released: Condvar,
    last_used: AtomicU64,
    created_at: Duration,
}

impl TimedMutex {
    pub(crate) fn new(now: Duration) -> Self {
        Self {
            state: Mutex::new(EntryState::default()),
            released: Condvar::new(),
            last_used: AtomicU64::new(as_nanos(now)),
            created_at: now,
        }
    }

    /// Block until the entry is acquired
    ///
    /// Returns `false` if the entry was retired before or while waiting; the
    /// caller must resolve the name again.
    pub(crate) fn acquire<F>(&self, now: F) -> bool
    where
        F: FnOnce() -> Duration,
    {
        let mut state = self.state.lock();
        while state.held && !state.retired {
            self.released.wait(&mut state);
        }
        if state.retired {
            return false;
        }
        state.held = true;
        self.last_used.store(as_nanos(now()), Ordering::Release);
        true
    }

    /// Release the entry; `false` if it was not held
    pub(crate) fn release(&self) -> bool {
        let mut state = self.state.lock();
        if !state.held {
            return false;
        }
        state.held = false;
        drop(state);
        self.released.notify_one();
        true
    }

    /// Non-blocking eligibility check
    pub(crate) fn probe(&self, now: Duration, policy: &ReclaimPolicy) -> Probe {
        let Some(state) = self.state.try_lock() else {
            return Probe::Held;
        };
        if state.held || state.retired {
            return Probe::Held;
        }
        if self.is_stale(now, policy) {
            Probe::Reclaimable
        } else {
            Probe::Fresh
        }
    }

    /// Retire the entry if it is still reclaimable
    ///
    /// Never blocks. Returns `Probe::Reclaimable` when the entry was retired;
    /// every current and future `acquire` on it then returns `false`.
    /// Otherwise reports what the entry turned into since it was probed.
    pub(crate) fn try_retire(&self, now: Duration, policy: &ReclaimPolicy) -> Probe {
        let Some(mut state) = self.state.try_lock() else {
            return Probe::Held;
        };
        if state.held || state.retired {
            return Probe::Held;
        }
        if !self.is_stale(now, policy) {
            return Probe::Fresh;
        }
        state.retired = true;
        drop(state);
        self.released.notify_all();
        Probe::Reclaimable
    }

    #[inline]
    fn is_stale(&self, now: Duration, policy: &ReclaimPolicy) -> bool {
        let idle = now.saturating_sub(self.last_used());
        let age = now.saturating_sub(self.created_at());
        idle > policy.idle_threshold && age > policy.min_lifetime
    }

    #[inline]
    pub(crate) fn last_used(&self) -> Duration {
        Duration::from_nanos(self.last_used.load(Ordering::Acquire))
    }

    #[inline]
    pub(crate) fn created_at(&self) -> Duration {
        self.created_at
    }

    pub(crate) fn is_held(&self) -> bool {
        self.state.lock().held
    }
}

#[inline]
fn as_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}
