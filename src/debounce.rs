use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

type Callback = Arc<dyn Fn() + Send + Sync>;

/// Trailing-edge timer: each `reset()` restarts the window, and the callback
/// runs once the window elapses without another reset.
///
/// Must be driven from within a tokio runtime. Dropping the timer cancels a
/// pending run.
pub struct Debouncer {
    window: Duration,
    callback: Callback,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("window", &self.window)
            .field("pending", &self.is_pending())
            .finish()
    }
}

impl Debouncer {
    pub fn new(window: Duration, callback: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            window,
            callback: Arc::new(callback),
            pending: Mutex::new(None),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn reset(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = pending.take() {
            previous.abort();
        }
        let window = self.window;
        let callback = Arc::clone(&self.callback);
        *pending = Some(tokio::spawn(async move {
            sleep(window).await;
            callback();
        }));
    }

    pub fn cancel(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = pending.take() {
            previous.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Collapses bursts of interaction into one activity signal per window.
///
/// `notify()` runs the immediate hook synchronously on every call and
/// schedules the debounced hook.
pub struct ActivityDebouncer {
    immediate: Callback,
    timer: Debouncer,
}

impl std::fmt::Debug for ActivityDebouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityDebouncer")
            .field("timer", &self.timer)
            .finish()
    }
}

impl ActivityDebouncer {
    pub fn new(
        window: Duration,
        immediate: impl Fn() + Send + Sync + 'static,
        on_activity: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        Self {
            immediate: Arc::new(immediate),
            timer: Debouncer::new(window, on_activity),
        }
    }

    pub fn notify(&self) {
        (self.immediate)();
        self.timer.reset();
    }

    pub fn cancel(&self) {
        self.timer.cancel();
    }

    pub fn is_pending(&self) -> bool {
        self.timer.is_pending()
    }
}
