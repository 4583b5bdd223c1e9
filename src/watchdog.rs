//! Idle-timeout watchdog: a single rearmable timer per driver instance.
//!
//! The watchdog holds at most one live timer task. Arming always clears
//! the previous timer first, so duplicate timers cannot accumulate. The
//! action to run on expiry is supplied by the caller as a future, which
//! keeps this module free of any knowledge about session teardown.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

/// Timer state is private per instance; distinct driver instances never
/// share a watchdog.
#[derive(Clone)]
pub struct IdleTimeoutWatchdog {
    timer: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl IdleTimeoutWatchdog {
    pub fn new() -> Self {
        Self {
            timer: Arc::new(Mutex::new(None)),
        }
    }

    /// Arm the timer: after `timeout` of inactivity, run `on_fire`.
    ///
    /// Any previously armed timer is cleared first. Callers disable the
    /// watchdog by simply not arming it (a configured timeout of zero
    /// means "never arm").
    pub fn arm<F>(&self, timeout: Duration, on_fire: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            on_fire.await;
        });
        let previous = self.timer.lock().replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Cancel the armed timer, if any. Safe to call when nothing is armed.
    pub fn clear(&self) {
        if let Some(handle) = self.timer.lock().take() {
            handle.abort();
        }
    }

    /// True while a timer is pending (armed and not yet fired).
    pub fn is_armed(&self) -> bool {
        self.timer
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Default for IdleTimeoutWatchdog {
    fn default() -> Self {
        Self::new()
    }
}
