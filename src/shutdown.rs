//! One-shot shutdown signal shared by all in-flight commands.
//!
//! Every executing command subscribes to the coordinator and races its own
//! body against the signal; whichever settles first wins. Receivers are
//! plain `broadcast` subscriptions, so dropping one at the end of a race is
//! all the deregistration that is needed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::error::DriverError;

const SIGNAL_CAPACITY: usize = 16;

/// Propagates fatal termination to in-flight work and gates new commands
/// while teardown is running.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    tx: broadcast::Sender<DriverError>,
    latched: Arc<AtomicBool>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self {
            tx,
            latched: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Register interest in the shutdown signal. Drop the receiver once the
    /// race settles.
    pub fn subscribe(&self) -> broadcast::Receiver<DriverError> {
        self.tx.subscribe()
    }

    /// Emit the shutdown error to every currently-racing listener.
    pub fn notify(&self, err: DriverError) {
        // No receivers just means no command was in flight.
        let _ = self.tx.send(err);
    }

    /// True while teardown is in progress; commands entering the runtime
    /// during this window fail fast.
    pub fn is_latched(&self) -> bool {
        self.latched.load(Ordering::Acquire)
    }

    /// Set the latch for the duration of a teardown. The returned guard
    /// clears it on drop, so a failed teardown can never leave the driver
    /// permanently stuck.
    pub fn latch(&self) -> LatchGuard {
        self.latched.store(true, Ordering::Release);
        LatchGuard {
            latched: Arc::clone(&self.latched),
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard that clears the shutdown latch on drop.
pub struct LatchGuard {
    latched: Arc<AtomicBool>,
}

impl Drop for LatchGuard {
    fn drop(&mut self) {
        self.latched.store(false, Ordering::Release);
    }
}
