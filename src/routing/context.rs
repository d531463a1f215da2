// src/routing/context.rs
//! Per-request deadline and cancellation.

use crate::error::RouterError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Cloned into every task working on a request. Cancelling any clone cancels
/// all of them.
#[derive(Debug, Clone)]
pub struct RequestContext {
    deadline: Option<(Instant, Duration)>,
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::background()
    }
}

impl RequestContext {
    /// No deadline, never cancelled unless asked to.
    pub fn background() -> Self {
        Self {
            deadline: None,
            cancelled: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some((Instant::now() + timeout, timeout)),
            ..Self::background()
        }
    }

    /// Same cancellation signal, deadline tightened to `timeout` from now if
    /// that is sooner than the current one.
    pub fn child_with_timeout(&self, timeout: Option<Duration>) -> Self {
        let mut child = self.clone();
        if let Some(timeout) = timeout {
            let candidate = Instant::now() + timeout;
            match self.deadline {
                Some((existing, _)) if existing <= candidate => {}
                _ => child.deadline = Some((candidate, timeout)),
            }
        }
        child
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn deadline_error(timeout: Duration) -> RouterError {
        RouterError::DeadlineExceeded(timeout.as_millis() as u64)
    }

    /// Fails fast when the request is already cancelled or past its deadline.
    pub fn check(&self) -> Result<(), RouterError> {
        if self.is_cancelled() {
            return Err(RouterError::Cancelled);
        }
        if let Some((deadline, timeout)) = self.deadline {
            if Instant::now() >= deadline {
                return Err(Self::deadline_error(timeout));
            }
        }
        Ok(())
    }

    /// Resolves with the reason once the request is cancelled or times out.
    pub async fn done(&self) -> RouterError {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        // register before checking the flag so a concurrent cancel is not missed
        notified.as_mut().enable();

        if self.is_cancelled() {
            return RouterError::Cancelled;
        }
        match self.deadline {
            Some((deadline, timeout)) => {
                tokio::select! {
                    _ = &mut notified => RouterError::Cancelled,
                    _ = tokio::time::sleep_until(deadline) => Self::deadline_error(timeout),
                }
            }
            None => {
                notified.await;
                RouterError::Cancelled
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_wakes_done() {
        let ctx = RequestContext::background();
        let waiter = ctx.clone();
        let handle = tokio::spawn(async move { waiter.done().await });
        tokio::task::yield_now().await;
        ctx.cancel();
        let reason = handle.await.unwrap();
        assert_eq!(reason, RouterError::Cancelled);
        assert!(matches!(ctx.check(), Err(RouterError::Cancelled)));
    }

    #[tokio::test]
    async fn test_done_after_cancel_returns_immediately() {
        let ctx = RequestContext::background();
        ctx.cancel();
        assert_eq!(ctx.done().await, RouterError::Cancelled);
    }

    #[tokio::test]
    async fn test_deadline_elapses() {
        let ctx = RequestContext::with_timeout(Duration::from_millis(50));
        assert!(ctx.check().is_ok());
        assert_eq!(ctx.done().await, RouterError::DeadlineExceeded(50));
        assert!(matches!(ctx.check(), Err(RouterError::DeadlineExceeded(50))));
    }

    #[tokio::test]
    async fn test_child_keeps_the_sooner_deadline() {
        let parent = RequestContext::with_timeout(Duration::from_millis(10));
        let child = parent.child_with_timeout(Some(Duration::from_secs(5)));
        assert_eq!(child.done().await, RouterError::DeadlineExceeded(10));

        let unbounded = RequestContext::background();
        let child = unbounded.child_with_timeout(Some(Duration::from_millis(20)));
        assert_eq!(child.done().await, RouterError::DeadlineExceeded(20));

        child.cancel();
        assert!(unbounded.is_cancelled());
    }
}
