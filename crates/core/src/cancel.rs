use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Cooperative cancellation with an optional deadline.
///
/// Clones share the same flag, so a Ctrl-C handler can hold one clone while
/// a scan or watch loop polls another. A token counts as cancelled once
/// [`cancel`](Self::cancel) was called on any clone *or* its deadline has
/// passed.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that expires `timeout` from now. A zero timeout means no deadline.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().child_with_timeout(timeout)
    }

    /// A clone sharing this token's flag, with the deadline tightened to
    /// at most `timeout` from now. A zero timeout leaves the deadline as is.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let mut child = self.clone();
        if !timeout.is_zero() {
            let candidate = Instant::now() + timeout;
            child.deadline = Some(match self.deadline {
                Some(existing) => existing.min(candidate),
                None => candidate,
            });
        }
        child
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}
