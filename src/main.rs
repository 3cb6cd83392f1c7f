/*!
 * lockstress - Named Lock Load Generator
 *
 * Hammers a registry with a mix of hot and cold names and prints a JSON
 * stats snapshot. Registry settings come from NAMED_LOCK_* variables.
 *
 * Workload variables:
 * - LOCKSTRESS_THREADS (default: 64)
 * - LOCKSTRESS_ITERATIONS per thread (default: 10000)
 * - LOCKSTRESS_HOT_NAMES (default: 4)
 * - LOCKSTRESS_COLD_NAMES (default: 50000)
 */

use named_lock::{init_tracing, LockConfig, LockManager};
use std::error::Error;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::info;

fn env_or(key: &str, default: usize) -> Result<usize, Box<dyn Error>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| format!("Invalid {}={:?}: {}", key, raw, e).into()),
        Err(_) => Ok(default),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    let threads = env_or("LOCKSTRESS_THREADS", 64)?;
    let iterations = env_or("LOCKSTRESS_ITERATIONS", 10_000)?;
    let hot = env_or("LOCKSTRESS_HOT_NAMES", 4)?.max(1);
    let cold = env_or("LOCKSTRESS_COLD_NAMES", 50_000)?.max(1);

    let config = LockConfig::from_env()?;
    info!(threads, iterations, hot, cold, ?config, "Starting named lock stress run");

    let manager = LockManager::start(config)?;
    let registry = manager.registry().clone();
    let peak_live = Arc::new(AtomicU64::new(0));
    let started = Instant::now();

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let registry = registry.clone();
            let peak_live = peak_live.clone();
            thread::spawn(move || {
                for i in 0..iterations {
                    // Every fourth call targets a hot name
                    let name = if i % 4 == 0 {
                        format!("hot-{}", (t + i) % hot)
                    } else {
                        format!("cold-{}", (t * iterations + i) % cold)
                    };
                    registry.lock(&name);
                    let live = registry.active_lock_count().max(0) as u64;
                    peak_live.fetch_max(live, Ordering::Relaxed);
                    registry.unlock(&name);
                }
            })
        })
        .collect();

    for handle in handles {
        handle
            .join()
            .map_err(|_| "stress worker panicked")?;
    }

    let elapsed = started.elapsed();
    let total = (threads * iterations) as f64;
    info!(
        elapsed_ms = elapsed.as_millis() as u64,
        ops_per_sec = (total / elapsed.as_secs_f64()) as u64,
        peak_live = peak_live.load(Ordering::Relaxed),
        "Stress run complete"
    );

    let sweep = manager.trigger_sweep();
    println!("{}", serde_json::to_string_pretty(&manager.stats())?);
    if let Some(sweep) = sweep {
        println!("{}", serde_json::to_string_pretty(&sweep)?);
    }

    manager.shutdown();
    Ok(())
}
