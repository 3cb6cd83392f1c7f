/*!
 * Lock Manager
 *
 * Owns one named lock registry and its sweep thread. Construct it once at
 * application start, hand out the registry, and call `shutdown()` on exit.
 */

use crate::cleanup::SweepTask;
use crate::clock::{Clock, SystemClock};
use crate::config::LockConfig;
use crate::errors::StartError;
use crate::locks::{NamedLockRegistry, SweepStats};
use std::ops::Deref;
use std::sync::Arc;
use tracing::info;

/// Registry plus its background cleanup
///
/// # Example
///
/// ```
/// use named_lock::{LockConfig, LockManager};
///
/// let manager = LockManager::start(LockConfig::default()).unwrap();
/// manager.lock("order-7");
/// manager.unlock("order-7");
/// manager.shutdown();
/// ```
pub struct LockManager {
    registry: Arc<NamedLockRegistry>,
    sweeper: SweepTask,
}

impl LockManager {
    /// Validate `config`, build the registry and start sweeping
    pub fn start(config: LockConfig) -> Result<Self, StartError> {
        Self::with_clock(config, Arc::new(SystemClock::new()))
    }

    /// Same as [`start`](Self::start) with an injected time source
    pub fn with_clock(config: LockConfig, clock: Arc<dyn Clock>) -> Result<Self, StartError> {
        let interval = config.cleanup_interval;
        let registry = Arc::new(NamedLockRegistry::with_clock(config, clock)?);
        let sweeper = SweepTask::spawn(registry.clone(), interval)?;

        info!(
            interval_secs = interval.as_secs_f64(),
            idle_secs = registry.config().idle_threshold.as_secs_f64(),
            min_lifetime_secs = registry.config().min_lifetime.as_secs_f64(),
            "Lock manager started"
        );

        Ok(Self { registry, sweeper })
    }

    /// Shared registry handle for injection into consumers
    pub fn registry(&self) -> &Arc<NamedLockRegistry> {
        &self.registry
    }

    /// Ask the sweep thread for an immediate pass and wait for it
    pub fn trigger_sweep(&self) -> Option<SweepStats> {
        self.sweeper.run_now()
    }

    pub fn pause_sweeps(&self) {
        self.sweeper.pause();
    }

    pub fn resume_sweeps(&self) {
        self.sweeper.resume();
    }

    /// Stop the sweep thread
    ///
    /// Registry handles obtained from [`registry`](Self::registry) stay usable;
    /// they just stop being cleaned.
    pub fn shutdown(self) {
        self.sweeper.shutdown();
        info!("Lock manager stopped");
    }
}

impl Deref for LockManager {
    type Target = NamedLockRegistry;

    fn deref(&self) -> &Self::Target {
        &self.registry
    }
}
