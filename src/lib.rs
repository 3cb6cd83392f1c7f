/*!
 * Named Lock Library
 *
 * Process-wide registry of named mutexes with lazy creation, usage tracking,
 * background reclamation of idle entries, and adaptive flat/sharded storage.
 *
 * # Example
 *
 * ```
 * use named_lock::{LockConfig, LockManager};
 *
 * let manager = LockManager::start(LockConfig::default()).unwrap();
 * {
 *     let _guard = manager.guard("user:1001");
 *     // critical section for user 1001
 * }
 * manager.shutdown();
 * ```
 */

pub mod cleanup;
pub mod clock;
pub mod config;
pub mod errors;
pub mod locks;
pub mod manager;
pub mod tracer;

// Re-exports
pub use cleanup::{SweepCommand, SweepTask};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::LockConfig;
pub use errors::{ConfigError, ConfigResult, StartError};
pub use locks::{NamedLockGuard, NamedLockRegistry, RegistryStats, StoreMode, SweepStats};
pub use manager::LockManager;
pub use tracer::init_tracing;
