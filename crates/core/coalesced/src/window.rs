use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

/// Schedules delayed eviction of settled entries.
///
/// Every timer is tied to one cancellation token; cancelling the scheduler
/// drops all pending evictions and makes further schedules run immediately.
#[derive(Debug)]
pub struct WindowScheduler {
    window: Duration,
    token: CancellationToken,
    pending: Arc<AtomicUsize>,
}

/// Decrements the pending counter however the timer task ends
struct PendingGuard(Arc<AtomicUsize>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl WindowScheduler {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            token: CancellationToken::new(),
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Whether eviction happens at settlement
    pub fn is_immediate(&self) -> bool {
        self.window.is_zero() || self.token.is_cancelled()
    }

    /// Number of timers that have not fired yet
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Run `evict` once the window has elapsed.
    ///
    /// Runs it inline when the window is zero or the scheduler was cancelled.
    /// Hands `evict` back if there is no runtime to drive the timer.
    pub fn schedule<F>(&self, evict: F) -> Result<(), F>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_immediate() {
            evict();
            return Ok(());
        }

        let Ok(handle) = Handle::try_current() else {
            return Err(evict);
        };

        let window = self.window;
        let token = self.token.clone();
        self.pending.fetch_add(1, Ordering::AcqRel);
        let guard = PendingGuard(self.pending.clone());

        handle.spawn(async move {
            let _guard = guard;

            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(window) => evict(),
            }
        });

        Ok(())
    }

    /// Cancel all pending timers
    pub fn cancel(&self) {
        self.token.cancel();
    }
}

impl Drop for WindowScheduler {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
