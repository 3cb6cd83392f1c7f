/*!
 * Named Lock Guard
 * RAII release for registry locks
 */

use super::registry::NamedLockRegistry;

/// Holds a named lock until dropped
///
/// # Example
///
/// ```
/// use named_lock::{LockConfig, NamedLockRegistry};
///
/// let registry = NamedLockRegistry::new(LockConfig::default()).unwrap();
/// {
///     let _guard = registry.guard("invoice-42");
///     assert!(registry.is_locked("invoice-42"));
/// }
/// assert!(!registry.is_locked("invoice-42"));
/// ```
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct NamedLockGuard<'a> {
    registry: &'a NamedLockRegistry,
    name: String,
}

impl<'a> NamedLockGuard<'a> {
    /// Wrap a lock the caller has already acquired
    pub(crate) fn new(registry: &'a NamedLockRegistry, name: &str) -> Self {
        Self {
            registry,
            name: name.to_owned(),
        }
    }

    /// Name of the held lock
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for NamedLockGuard<'_> {
    fn drop(&mut self) {
        self.registry.unlock(&self.name);
    }
}

impl std::fmt::Debug for NamedLockGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedLockGuard")
            .field("name", &self.name)
            .finish()
    }
}
