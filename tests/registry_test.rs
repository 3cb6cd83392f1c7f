/*!
 * Named Lock Registry Integration Tests
 *
 * Mutual exclusion, independence, misuse tolerance and reclamation
 */

use named_lock::{LockConfig, LockManager, ManualClock, NamedLockRegistry};
use pretty_assertions::assert_eq;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

/// Deliberately unsynchronized counter; only the named lock protects it
struct RacyCounter(UnsafeCell<u64>);

// SAFETY: every access in these tests happens under a named lock
unsafe impl Sync for RacyCounter {}

impl RacyCounter {
    fn new() -> Self {
        Self(UnsafeCell::new(0))
    }

    fn increment(&self) {
        // SAFETY: caller holds the named lock
        unsafe {
            let value = std::ptr::read_volatile(self.0.get());
            thread::yield_now();
            std::ptr::write_volatile(self.0.get(), value + 1);
        }
    }

    fn get(&self) -> u64 {
        unsafe { *self.0.get() }
    }
}

fn manual_registry(config: LockConfig) -> (Arc<NamedLockRegistry>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let registry = NamedLockRegistry::with_clock(config, clock.clone()).unwrap();
    (Arc::new(registry), clock)
}

#[test]
fn test_hundred_callers_no_lost_updates() {
    let registry = Arc::new(NamedLockRegistry::new(LockConfig::default()).unwrap());
    let counter = Arc::new(RacyCounter::new());
    let barrier = Arc::new(Barrier::new(100));

    let handles: Vec<_> = (0..100)
        .map(|_| {
            let registry = registry.clone();
            let counter = counter.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                registry.lock("resource-A");
                counter.increment();
                registry.unlock("resource-A");
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(counter.get(), 100);
    assert_eq!(registry.active_lock_count(), 0);
}

#[test]
fn test_unrelated_names_do_not_block() {
    let registry = Arc::new(NamedLockRegistry::new(LockConfig::default()).unwrap());
    registry.lock("held-forever");

    let other = registry.clone();
    let handle = thread::spawn(move || {
        let started = Instant::now();
        for i in 0..100 {
            let name = format!("free-{i}");
            other.lock(&name);
            other.unlock(&name);
        }
        started.elapsed()
    });

    let elapsed = handle.join().unwrap();
    assert!(elapsed < Duration::from_secs(5));
    assert!(registry.is_locked("held-forever"));
    assert!(registry.unlock("held-forever"));
}

#[test]
fn test_waiter_blocks_until_unlock() {
    let registry = Arc::new(NamedLockRegistry::new(LockConfig::default()).unwrap());
    let acquired = Arc::new(AtomicBool::new(false));
    registry.lock("door");

    let handle = {
        let registry = registry.clone();
        let acquired = acquired.clone();
        thread::spawn(move || {
            registry.lock("door");
            acquired.store(true, Ordering::SeqCst);
            registry.unlock("door");
        })
    };

    thread::sleep(Duration::from_millis(50));
    assert!(!acquired.load(Ordering::SeqCst), "waiter entered while held");

    registry.unlock("door");
    handle.join().unwrap();
    assert!(acquired.load(Ordering::SeqCst));
}

#[test]
fn test_sequential_relock() {
    let registry = NamedLockRegistry::new(LockConfig::default()).unwrap();
    for _ in 0..100 {
        registry.lock("again");
        assert!(registry.unlock("again"));
    }
    assert_eq!(registry.entry_count(), 1);
}

#[test]
fn test_mismatched_unlock_is_harmless() {
    let registry = NamedLockRegistry::new(LockConfig::default()).unwrap();
    registry.lock("x");
    assert!(!registry.unlock("y"));
    assert!(registry.is_locked("x"));
    assert_eq!(registry.active_lock_count(), 1);

    assert!(registry.unlock("x"));
    registry.lock("x");
    assert!(registry.unlock("x"));
    assert_eq!(registry.active_lock_count(), 0);
}

#[test]
fn test_empty_name_is_an_ordinary_key() {
    let registry = NamedLockRegistry::new(LockConfig::default()).unwrap();
    registry.lock("");
    assert!(registry.is_locked(""));
    assert!(registry.unlock(""));
}

#[test]
fn test_idle_entry_is_reclaimed() {
    let config = LockConfig {
        idle_threshold: Duration::from_secs(30),
        min_lifetime: Duration::from_secs(60),
        ..Default::default()
    };
    let (registry, clock) = manual_registry(config);

    registry.lock("ephemeral");
    registry.unlock("ephemeral");
    assert_eq!(registry.entry_count(), 1);

    clock.advance(Duration::from_secs(45));
    registry.sweep();
    assert!(registry.contains("ephemeral"), "lifetime not exceeded yet");

    clock.advance(Duration::from_secs(30));
    let stats = registry.sweep();
    assert_eq!(stats.reclaimed, 1);
    assert_eq!(registry.entry_count(), 0);
}

#[test]
fn test_recent_use_postpones_reclamation() {
    let config = LockConfig {
        idle_threshold: Duration::from_secs(30),
        min_lifetime: Duration::from_secs(10),
        ..Default::default()
    };
    let (registry, clock) = manual_registry(config);

    registry.lock("busy");
    registry.unlock("busy");
    clock.advance(Duration::from_secs(25));
    registry.lock("busy");
    registry.unlock("busy");
    clock.advance(Duration::from_secs(25));

    // 50s old, but used 25s ago
    assert_eq!(registry.sweep().reclaimed, 0);
    clock.advance(Duration::from_secs(10));
    assert_eq!(registry.sweep().reclaimed, 1);
}

fn switching_config(high_water: i64) -> LockConfig {
    LockConfig {
        idle_threshold: Duration::from_secs(10),
        min_lifetime: Duration::from_secs(10),
        min_shard_dwell: Duration::from_secs(1),
        shard_count: 8,
        ..LockConfig::new().with_high_water(high_water)
    }
}

#[test]
fn test_sweep_in_sharded_mode_reclaims_both_stores() {
    // Low-water 0: the registry never reverts once sharded
    let (registry, clock) = manual_registry(switching_config(1));

    registry.lock("a");
    assert!(!registry.is_shard_mode());
    registry.lock("b");
    assert!(registry.is_shard_mode());

    let stats = registry.stats();
    assert_eq!(stats.flat_entries, 1);
    assert_eq!(stats.sharded_entries, 1);

    assert!(registry.unlock("a"));
    assert!(registry.unlock("b"));
    clock.advance(Duration::from_secs(60));

    let swept = registry.sweep();
    assert!(registry.is_shard_mode());
    assert_eq!(swept.scanned, 2);
    assert_eq!(swept.reclaimed, 2);
    assert_eq!(registry.entry_count(), 0);
    assert!(!registry.contains("a"));
    assert!(!registry.contains("b"));
}

#[test]
fn test_sweep_after_reverting_to_flat_reclaims_both_stores() {
    let (registry, clock) = manual_registry(switching_config(2));

    registry.lock("x");
    registry.lock("y");
    registry.lock("b");
    assert!(registry.is_shard_mode());

    assert!(registry.unlock("x"));
    assert!(registry.unlock("y"));
    clock.advance(Duration::from_secs(2));
    assert!(registry.unlock("b"));
    assert!(!registry.is_shard_mode());

    registry.lock("c");
    assert!(registry.unlock("c"));

    let stats = registry.stats();
    assert_eq!(stats.flat_entries, 3);
    assert_eq!(stats.sharded_entries, 1);

    clock.advance(Duration::from_secs(60));
    let swept = registry.sweep();
    assert!(!registry.is_shard_mode());
    assert_eq!(swept.reclaimed, 4);
    assert_eq!(registry.entry_count(), 0);
    assert!(!registry.contains("b"));
}

#[test]
fn test_held_entry_survives_sweeps() {
    let config = LockConfig {
        idle_threshold: Duration::from_secs(1),
        min_lifetime: Duration::from_secs(1),
        ..Default::default()
    };
    let (registry, clock) = manual_registry(config);

    registry.lock("long-job");
    for _ in 0..5 {
        clock.advance(Duration::from_secs(3600));
        let stats = registry.sweep();
        assert_eq!(stats.reclaimed, 0);
        assert_eq!(stats.held, 1);
    }

    assert!(registry.unlock("long-job"));
    registry.lock("long-job");
    assert!(registry.unlock("long-job"));
}

#[test]
fn test_waiter_survives_concurrent_sweep() {
    let config = LockConfig {
        idle_threshold: Duration::from_millis(1),
        min_lifetime: Duration::from_millis(1),
        ..Default::default()
    };
    let (registry, clock) = manual_registry(config);
    let counter = Arc::new(RacyCounter::new());
    let stop = Arc::new(AtomicBool::new(false));

    let sweeper = {
        let registry = registry.clone();
        let clock = clock.clone();
        let stop = stop.clone();
        thread::spawn(move || {
            while !stop.load(Ordering::SeqCst) {
                clock.advance(Duration::from_millis(10));
                registry.sweep();
            }
        })
    };

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let registry = registry.clone();
            let counter = counter.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    registry.lock("churn");
                    counter.increment();
                    registry.unlock("churn");
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
    stop.store(true, Ordering::SeqCst);
    sweeper.join().unwrap();

    assert_eq!(counter.get(), 1600);
    assert_eq!(registry.active_lock_count(), 0);
}

#[test]
fn test_manager_background_sweep_reclaims() {
    let config = LockConfig {
        cleanup_interval: Duration::from_millis(10),
        idle_threshold: Duration::from_millis(20),
        min_lifetime: Duration::from_millis(20),
        ..Default::default()
    };
    let manager = LockManager::start(config).unwrap();
    manager.lock("temp");
    manager.unlock("temp");

    let deadline = Instant::now() + Duration::from_secs(5);
    while manager.contains("temp") && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }

    assert!(!manager.contains("temp"));
    assert!(manager.stats().reclaimed_total >= 1);
    manager.shutdown();
}
