/*!
 * Registry Statistics
 * Sweep results and point-in-time registry snapshots
 */

use super::entry::Probe;
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

/// Storage strategy currently in use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreMode {
    /// One concurrent map for all names
    Flat,
    /// Names partitioned across independent shards
    Sharded,
}

impl std::fmt::Display for StoreMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreMode::Flat => f.write_str("flat"),
            StoreMode::Sharded => f.write_str("sharded"),
        }
    }
}

/// Result of one cleanup sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SweepStats {
    /// Entries probed
    pub scanned: usize,
    /// Entries removed
    pub reclaimed: usize,
    /// Entries skipped because they were held
    pub held: usize,
    /// Entries skipped because they were used or created recently
    pub fresh: usize,
}

impl SweepStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if anything was removed
    pub fn reclaimed_any(&self) -> bool {
        self.reclaimed > 0
    }

    /// Count the outcome of a retire attempt
    pub(crate) fn record_retire(&mut self, outcome: Probe) {
        match outcome {
            Probe::Reclaimable => self.reclaimed += 1,
            Probe::Fresh => self.fresh += 1,
            Probe::Held => self.held += 1,
        }
    }
}

impl AddAssign for SweepStats {
    fn add_assign(&mut self, rhs: Self) {
        self.scanned += rhs.scanned;
        self.reclaimed += rhs.reclaimed;
        self.held += rhs.held;
        self.fresh += rhs.fresh;
    }
}

/// Point-in-time registry snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RegistryStats {
    pub mode: StoreMode,
    /// Outstanding lock calls (holders plus waiters)
    pub active_locks: i64,
    /// Entries in the flat store
    pub flat_entries: usize,
    /// Entries across all shards
    pub sharded_entries: usize,
    pub mode_switches: u64,
    pub sweeps: u64,
    pub reclaimed_total: u64,
}

impl RegistryStats {
    /// Total entries across both stores
    pub fn entries(&self) -> usize {
        self.flat_entries + self.sharded_entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_stats_accumulate() {
        let mut total = SweepStats::new();
        total += SweepStats {
            scanned: 4,
            reclaimed: 1,
            held: 2,
            fresh: 1,
        };
        total += SweepStats {
            scanned: 3,
            reclaimed: 3,
            held: 0,
            fresh: 0,
        };
        assert_eq!(total.scanned, 7);
        assert_eq!(total.reclaimed, 4);
        assert!(total.reclaimed_any());
    }

    #[test]
    fn test_failed_retire_is_counted_by_cause() {
        let mut stats = SweepStats::new();
        stats.record_retire(Probe::Reclaimable);
        stats.record_retire(Probe::Fresh);
        stats.record_retire(Probe::Held);
        assert_eq!(
            stats,
            SweepStats {
                scanned: 0,
                reclaimed: 1,
                held: 1,
                fresh: 1,
            }
        );
    }

    #[test]
    fn test_mode_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&StoreMode::Sharded).unwrap(),
            "\"sharded\""
        );
        assert_eq!(StoreMode::Flat.to_string(), "flat");
    }
}
