/*!
 * Sweep Task - Periodic Named Lock Reclamation
 *
 * Background thread that runs the registry sweep on a fixed interval.
 * A dedicated OS thread is used because the registry API is blocking and
 * must not require an async runtime.
 *
 * # Graceful-with-Fallback Shutdown
 *
 * 1. **Preferred:** `shutdown()` sends `Shutdown` and joins the thread.
 *    Consumes self, so it cannot run twice.
 * 2. **Fallback:** `Drop` sends `Shutdown` without joining and logs a
 *    warning. The thread exits on its next wakeup.
 *
 * # Example
 *
 * ```
 * # use std::sync::Arc;
 * # use std::time::Duration;
 * # use named_lock::{LockConfig, NamedLockRegistry, SweepTask};
 * let registry = Arc::new(NamedLockRegistry::new(LockConfig::default()).unwrap());
 * let task = SweepTask::spawn(registry, Duration::from_secs(180)).unwrap();
 *
 * let stats = task.run_now();
 * assert!(stats.is_some());
 *
 * task.shutdown();
 * ```
 */

use crate::locks::{NamedLockRegistry, SweepStats};
use flume::{Receiver, RecvTimeoutError, Sender};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const THREAD_NAME: &str = "named-lock-sweep";
/// Shortest period the loop will schedule
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Control messages for the sweep thread
#[derive(Debug, Clone)]
pub enum SweepCommand {
    /// Sweep immediately, optionally reporting the result
    Trigger(Option<Sender<SweepStats>>),
    /// Change the sweep period; the next sweep is rescheduled from now
    UpdateInterval(Duration),
    /// Skip scheduled sweeps (triggers still run)
    Pause,
    /// Resume scheduled sweeps
    Resume,
    /// Stop the thread
    Shutdown,
}

/// Handle to the sweep thread
pub struct SweepTask {
    command_tx: Sender<SweepCommand>,
    handle: Option<JoinHandle<()>>,
}

impl SweepTask {
    /// Spawn the sweep thread for `registry`
    pub fn spawn(registry: Arc<NamedLockRegistry>, interval: Duration) -> io::Result<Self> {
        let (command_tx, command_rx) = flume::unbounded();

        let handle = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || run_sweep_loop(registry, interval, command_rx))?;

        info!(interval_secs = interval.as_secs_f64(), "Named lock sweep task spawned");

        Ok(Self {
            command_tx,
            handle: Some(handle),
        })
    }

    /// Request a sweep without waiting for it
    pub fn trigger(&self) {
        let _ = self.command_tx.send(SweepCommand::Trigger(None));
    }

    /// Run a sweep on the task thread and wait for its result
    ///
    /// Returns `None` if the thread has already stopped.
    pub fn run_now(&self) -> Option<SweepStats> {
        let (reply_tx, reply_rx) = flume::bounded(1);
        self.command_tx
            .send(SweepCommand::Trigger(Some(reply_tx)))
            .ok()?;
        reply_rx.recv().ok()
    }

    /// Change the sweep period
    ///
    /// Periods below one millisecond are raised to it. Periods too long to
    /// schedule leave only triggered sweeps running.
    pub fn update_interval(&self, interval: Duration) {
        let _ = self.command_tx.send(SweepCommand::UpdateInterval(interval));
    }

    /// Pause scheduled sweeps
    pub fn pause(&self) {
        let _ = self.command_tx.send(SweepCommand::Pause);
    }

    /// Resume scheduled sweeps
    pub fn resume(&self) {
        let _ = self.command_tx.send(SweepCommand::Resume);
    }

    /// Stop the thread and wait for it to exit
    pub fn shutdown(mut self) {
        let _ = self.command_tx.send(SweepCommand::Shutdown);

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Sweep task panicked before shutdown");
            } else {
                info!("Sweep task shutdown complete");
            }
        }
    }
}

fn run_sweep_loop(
    registry: Arc<NamedLockRegistry>,
    interval: Duration,
    command_rx: Receiver<SweepCommand>,
) {
    let mut active = true;
    let mut interval = clamp_interval(interval);
    let mut next_sweep = deadline_after(interval);

    debug!(interval_secs = interval.as_secs_f64(), "Sweep loop started");

    loop {
        let received = match next_sweep {
            Some(deadline) => command_rx.recv_deadline(deadline),
            None => command_rx
                .recv()
                .map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Err(RecvTimeoutError::Timeout) => {
                if active {
                    registry.sweep();
                }
                next_sweep = deadline_after(interval);
            }

            Err(RecvTimeoutError::Disconnected) => {
                debug!("Sweep task handle dropped, exiting");
                break;
            }

            Ok(SweepCommand::Trigger(reply)) => {
                let stats = registry.sweep();
                if let Some(reply) = reply {
                    let _ = reply.send(stats);
                }
            }

            Ok(SweepCommand::UpdateInterval(new_interval)) => {
                interval = clamp_interval(new_interval);
                next_sweep = deadline_after(interval);
                info!(interval_secs = interval.as_secs_f64(), "Sweep interval updated");
            }

            Ok(SweepCommand::Pause) => {
                info!("Sweep task paused");
                active = false;
            }

            Ok(SweepCommand::Resume) => {
                info!("Sweep task resumed");
                active = true;
            }

            Ok(SweepCommand::Shutdown) => {
                debug!("Sweep task shutting down");
                break;
            }
        }
    }
}

fn clamp_interval(interval: Duration) -> Duration {
    if interval < MIN_INTERVAL {
        warn!(
            requested_us = interval.as_micros() as u64,
            "Sweep interval below minimum, using 1ms"
        );
        MIN_INTERVAL
    } else {
        interval
    }
}

/// Next scheduled sweep; `None` when the period overflows the clock
fn deadline_after(interval: Duration) -> Option<Instant> {
    let deadline = Instant::now().checked_add(interval);
    if deadline.is_none() {
        warn!(
            interval_secs = interval.as_secs_f64(),
            "Sweep interval unrepresentable, only triggered sweeps will run"
        );
    }
    deadline
}

impl Drop for SweepTask {
    fn drop(&mut self) {
        // Graceful shutdown already joined the thread
        if self.handle.take().is_some() {
            warn!(
                "SweepTask dropped without calling shutdown() - detaching thread. \
                 Use `task.shutdown()` for graceful cleanup."
            );
            let _ = self.command_tx.send(SweepCommand::Shutdown);
        }
    }
}
