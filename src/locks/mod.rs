/*!
 * Named Locks
 *
 * Mutual exclusion scoped to arbitrary string keys:
 * - Lazy per-name entry creation
 * - Adaptive flat/sharded storage driven by live lock count
 * - Non-blocking reclamation of idle entries
 */

mod entry;
mod guard;
mod registry;
mod stats;
mod store;

// Re-export public API
pub use entry::ReclaimPolicy;
pub use guard::NamedLockGuard;
pub use registry::NamedLockRegistry;
pub use stats::{RegistryStats, StoreMode, SweepStats};
