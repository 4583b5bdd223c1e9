//! Exclusive FIFO execution gate for driver commands.
//!
//! At most one command body runs per driver instance; concurrent callers
//! queue in arrival order and are released only once the previous call has
//! settled. Built on `tokio::sync::Mutex`, whose waiters are woken in FIFO
//! order, which gives the strict arrival-order guarantee without any
//! bookkeeping of our own.

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// The serializer itself. Cheap to clone; clones share the same gate.
#[derive(Clone)]
pub struct CommandSerializer {
    gate: Arc<Mutex<()>>,
}

/// Held for the duration of one command execution. Dropping it releases
/// the next queued command.
pub struct CommandSlot {
    _guard: OwnedMutexGuard<()>,
}

impl CommandSerializer {
    pub fn new() -> Self {
        Self {
            gate: Arc::new(Mutex::new(())),
        }
    }

    /// Wait for the exclusive slot. Callers are served strictly in the
    /// order they arrive here.
    pub async fn acquire(&self) -> CommandSlot {
        CommandSlot {
            _guard: Arc::clone(&self.gate).lock_owned().await,
        }
    }

    /// True if a command currently holds the slot.
    pub fn is_busy(&self) -> bool {
        self.gate.try_lock().is_err()
    }
}

impl Default for CommandSerializer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn slot_is_exclusive() {
        let serializer = CommandSerializer::new();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let serializer = serializer.clone();
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                let _slot = serializer.acquire().await;
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(1)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1, "two commands overlapped");
    }

    #[tokio::test]
    async fn queued_callers_run_in_arrival_order() {
        let serializer = CommandSerializer::new();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        // Hold the slot so every spawned task queues behind it.
        let blocker = serializer.acquire().await;

        let mut handles = Vec::new();
        for i in 0..10 {
            let serializer = serializer.clone();
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                let _slot = serializer.acquire().await;
                order.lock().push(i);
            }));
            // Let the task reach the queue before spawning the next one.
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        drop(blocker);
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(*order.lock(), (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn is_busy_reflects_slot_state() {
        let serializer = CommandSerializer::new();
        assert!(!serializer.is_busy());
        let slot = serializer.acquire().await;
        assert!(serializer.is_busy());
        drop(slot);
        assert!(!serializer.is_busy());
    }

    #[tokio::test]
    async fn release_happens_on_failure_paths_too() {
        let serializer = CommandSerializer::new();
        {
            let _slot = serializer.acquire().await;
            // A failing command just drops the slot with `?`.
        }
        // Next caller must not hang.
        let _slot = tokio::time::timeout(Duration::from_millis(100), serializer.acquire())
            .await
            .expect("slot was never released");
    }
}
