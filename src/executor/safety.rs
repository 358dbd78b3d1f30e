use parking_lot::Mutex;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, warn};

use super::control::ExecutionControl;

type StopHandler = Arc<dyn Fn() + Send + Sync>;

/// Emergency stop fan-out: every registered handler runs on [`trigger`].
///
/// [`trigger`]: SafetyController::trigger
#[derive(Default)]
pub struct SafetyController {
    handlers: Mutex<Vec<StopHandler>>,
    triggered: AtomicBool,
}

impl SafetyController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_handler<F>(&self, handler: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.handlers.lock().push(Arc::new(handler));
    }

    /// Stop `control` on emergency stop.
    pub fn register_control(&self, control: ExecutionControl) {
        self.register_handler(move || control.stop());
    }

    /// Run every handler once. A panicking handler is logged and skipped.
    /// Handlers run outside the lock, so they may register further handlers;
    /// those run on the next trigger.
    pub fn trigger(&self) {
        self.triggered.store(true, Ordering::SeqCst);
        warn!(target: "autotool::engine", "Emergency stop triggered");
        let handlers = self.handlers.lock().clone();
        for handler in &handlers {
            if catch_unwind(AssertUnwindSafe(|| handler())).is_err() {
                error!(target: "autotool::engine", "Emergency stop handler panicked");
            }
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.triggered.store(false, Ordering::SeqCst);
    }
}
