//! Frame Scheduling
//!
//! The digest scheduler defers propagation to the next host frame/tick
//! boundary. The host facility is abstracted behind [`FrameScheduler`] so
//! the engine itself never blocks and tests can drive ticks by hand.
//!
//! Two implementations are provided:
//!
//! - [`TimerFrameScheduler`]: a minimal-delay timer on a spawned thread,
//!   the fallback used when no animation-frame facility exists in the host.
//! - [`ManualFrameScheduler`]: queues callbacks until [`fire`] is called,
//!   for deterministic tests of debouncing behavior.
//!
//! [`fire`]: ManualFrameScheduler::fire

use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

/// A deferred callback handed to the host scheduler.
pub type FrameCallback = Box<dyn FnOnce() + Send>;

/// Host-provided scheduling of a callback onto the next frame/tick
/// boundary.
pub trait FrameScheduler: Send + Sync {
    /// Run `callback` once, on the next boundary.
    fn schedule(&self, callback: FrameCallback);
}

/// Timer-based fallback scheduler.
///
/// Spawns a short-lived thread per callback and fires after a fixed delay.
/// The default delay approximates one display frame.
pub struct TimerFrameScheduler {
    delay: Duration,
}

impl TimerFrameScheduler {
    /// Scheduler with the default one-frame delay (16 ms).
    pub fn new() -> Self {
        Self::with_delay(Duration::from_millis(16))
    }

    /// Scheduler with an explicit delay. `Duration::ZERO` gives the
    /// minimal-delay "next tick" behavior.
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for TimerFrameScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameScheduler for TimerFrameScheduler {
    fn schedule(&self, callback: FrameCallback) {
        let delay = self.delay;
        thread::spawn(move || {
            if !delay.is_zero() {
                thread::sleep(delay);
            }
            callback();
        });
    }
}

/// Test scheduler that holds callbacks until told to tick.
pub struct ManualFrameScheduler {
    queue: Mutex<Vec<FrameCallback>>,
}

impl ManualFrameScheduler {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(Vec::new()),
        }
    }

    /// Number of callbacks waiting for the next tick.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Simulate a frame boundary: run every queued callback, in the order
    /// scheduled. Returns how many ran. Callbacks queued while firing wait
    /// for the next tick.
    pub fn fire(&self) -> usize {
        let drained: Vec<FrameCallback> = std::mem::take(&mut *self.queue.lock());
        let count = drained.len();
        for callback in drained {
            callback();
        }
        count
    }
}

impl Default for ManualFrameScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameScheduler for ManualFrameScheduler {
    fn schedule(&self, callback: FrameCallback) {
        self.queue.lock().push(callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc, Arc};

    #[test]
    fn manual_scheduler_holds_until_fired() {
        let scheduler = ManualFrameScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let count = count.clone();
            scheduler.schedule(Box::new(move || {
                count.fetch_add(1, Ordering::SeqCst);
            }));
        }

        assert_eq!(scheduler.pending(), 3);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        assert_eq!(scheduler.fire(), 3);
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn manual_scheduler_defers_reentrant_schedules() {
        let scheduler = Arc::new(ManualFrameScheduler::new());

        let inner = scheduler.clone();
        scheduler.schedule(Box::new(move || {
            inner.schedule(Box::new(|| {}));
        }));

        assert_eq!(scheduler.fire(), 1);
        // The callback scheduled during the tick waits for the next one.
        assert_eq!(scheduler.pending(), 1);
        assert_eq!(scheduler.fire(), 1);
    }

    #[test]
    fn timer_scheduler_runs_callback() {
        let scheduler = TimerFrameScheduler::with_delay(Duration::ZERO);
        let (tx, rx) = mpsc::channel();

        scheduler.schedule(Box::new(move || {
            let _ = tx.send(());
        }));

        rx.recv_timeout(Duration::from_secs(5))
            .expect("timer callback fired");
    }
}
