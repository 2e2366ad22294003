use std::future::pending;
use std::time::Duration;

use tokio::time::Instant;
use tokio::time::sleep_until;

/// Last-write-wins publish throttle.
///
/// Every `submit` replaces the pending value and restarts the window, so at
/// most one publish happens per quiet window and it always carries the newest
/// value; intermediates are dropped, never merged. The owner polls [`ready`]
/// as one arm of its `select!` loop and calls [`flush`] when it fires, or
/// deterministically on a terminal transition so the final displayed text is
/// never a stale debounced one.
pub(crate) struct Coalescer<T> {
    window: Duration,
    pending_value: Option<T>,
    deadline: Option<Instant>,
}

impl<T> Coalescer<T> {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            window,
            pending_value: None,
            deadline: None,
        }
    }

    /// Schedule `value` for publication one window from now, superseding any
    /// value already waiting.
    pub(crate) fn submit(&mut self, value: T) {
        self.pending_value = Some(value);
        self.deadline = Some(Instant::now() + self.window);
    }

    /// Resolves when the scheduled publish is due. Never resolves while
    /// nothing is pending, which makes it a safe permanent `select!` arm.
    pub(crate) async fn ready(&self) {
        match self.deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => pending().await,
        }
    }

    /// Take the pending value and disarm the timer.
    pub(crate) fn flush(&mut self) -> Option<T> {
        self.deadline = None;
        self.pending_value.take()
    }

    /// Drop the pending value without publishing it. Used on cancellation,
    /// where already-published text stays but nothing further may go out.
    pub(crate) fn discard(&mut self) {
        self.deadline = None;
        self.pending_value = None;
    }
}
