/*!
 * Entry Stores
 * Strongly typed name -> entry maps behind one interface
 */

mod flat;
mod sharded;

pub(crate) use flat::FlatStore;
pub(crate) use sharded::ShardedStore;

use super::entry::{ReclaimPolicy, TimedMutex};
use super::stats::SweepStats;
use std::sync::Arc;
use std::time::Duration;

/// Concurrent map of named lock entries
///
/// Implementations must never hold internal map locks while a caller waits
/// on an entry; only `Arc` clones leave the store.
pub(crate) trait LockStore: Send + Sync {
    /// Look up an existing entry
    fn get(&self, name: &str) -> Option<Arc<TimedMutex>>;

    /// Fetch the entry or atomically insert a fresh one created at `now`
    fn get_or_create(&self, name: &str, now: Duration) -> Arc<TimedMutex>;

    /// Remove stale unheld entries
    fn sweep(&self, now: Duration, policy: &ReclaimPolicy) -> SweepStats;

    /// Number of entries
    fn len(&self) -> usize;
}
