/*!
 * Cleanup
 * Background reclamation of idle named locks
 */

pub mod task;

pub use task::{SweepCommand, SweepTask};
