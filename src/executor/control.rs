use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Flags {
    paused: bool,
    stopped: bool,
}

#[derive(Debug, Default)]
struct Inner {
    flags: Mutex<Flags>,
    changed: Condvar,
}

/// Pause/stop flags shared between an executing task and its controllers.
///
/// Cloning yields another handle onto the same flags. Waiters block on a
/// condition variable and wake as soon as a flag changes, so cancellation takes
/// effect at the next iteration boundary (or ends an in-progress wait early).
#[derive(Debug, Clone, Default)]
pub struct ExecutionControl {
    inner: Arc<Inner>,
}

impl ExecutionControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        self.inner.flags.lock().paused = true;
        self.inner.changed.notify_all();
    }

    pub fn resume(&self) {
        self.inner.flags.lock().paused = false;
        self.inner.changed.notify_all();
    }

    /// Request cancellation. Also clears `paused` so paused waiters exit.
    pub fn stop(&self) {
        {
            let mut flags = self.inner.flags.lock();
            flags.stopped = true;
            flags.paused = false;
        }
        self.inner.changed.notify_all();
    }

    /// Clear both flags so the owner can run again.
    pub fn reset(&self) {
        {
            let mut flags = self.inner.flags.lock();
            flags.stopped = false;
            flags.paused = false;
        }
        self.inner.changed.notify_all();
    }

    pub fn is_paused(&self) -> bool {
        self.inner.flags.lock().paused
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.flags.lock().stopped
    }

    /// Block while paused and not stopped. Returns `true` when stopped.
    pub fn wait_while_paused(&self) -> bool {
        let mut flags = self.inner.flags.lock();
        while flags.paused && !flags.stopped {
            self.inner.changed.wait(&mut flags);
        }
        flags.stopped
    }

    /// Sleep for `duration` unless stopped first. Returns `true` when the sleep
    /// was cut short by a stop request. A duration past the representable
    /// `Instant` range sleeps until stopped.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now().checked_add(duration);
        let mut flags = self.inner.flags.lock();
        loop {
            if flags.stopped {
                return true;
            }
            match deadline {
                Some(deadline) if Instant::now() >= deadline => return false,
                Some(deadline) => {
                    self.inner.changed.wait_until(&mut flags, deadline);
                }
                None => self.inner.changed.wait(&mut flags),
            }
        }
    }
}
