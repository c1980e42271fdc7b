//! Context implementation for cancellation and deadlines
//!
//! A `Context` carries a cancellation signal and an optional deadline across
//! async boundaries. Waiters derive a child context per wait with
//! `with_timeout`, so a timeout only ever applies to the wait that asked for
//! it while cancelling the parent still stops every child.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tokio::time::{self, Instant};

use crate::error::ContextError;

/// Cancellation handle passed as the first parameter to every lifecycle operation
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    deadline: Option<Instant>,
    done: Arc<watch::Sender<Option<ContextError>>>,
    timer: Option<AbortHandle>,
}

impl Drop for ContextInner {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl Context {
    pub fn new() -> Self {
        let (done, _) = watch::channel(None);

        Self {
            inner: Arc::new(ContextInner {
                deadline: None,
                done: Arc::new(done),
                timer: None,
            }),
        }
    }

    /// Derives a child context that is cancelled together with `self`, or with
    /// `ContextError::DeadlineExceeded` once `timeout` has elapsed.
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let own_deadline = Instant::now() + timeout;
        let deadline = match self.inner.deadline {
            Some(parent) if parent < own_deadline => parent,
            _ => own_deadline,
        };

        let (done, _) = watch::channel(self.err());
        let done = Arc::new(done);

        let timer = if self.is_cancelled() {
            None
        } else {
            let parent = self.clone();
            let done = done.clone();
            let task = tokio::spawn(async move {
                let reason = tokio::select! {
                    reason = parent.cancelled() => reason,
                    _ = time::sleep_until(deadline) => ContextError::DeadlineExceeded,
                };
                done.send_if_modified(|current| {
                    if current.is_none() {
                        *current = Some(reason);
                        true
                    } else {
                        false
                    }
                });
            });
            Some(task.abort_handle())
        };

        Self {
            inner: Arc::new(ContextInner {
                deadline: Some(deadline),
                done,
                timer,
            }),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.done.borrow().is_some()
    }

    /// Why the context was cancelled, or `None` while it is still live
    pub fn err(&self) -> Option<ContextError> {
        *self.inner.done.borrow()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Returns a channel that flips to `Some(reason)` when work done on behalf
    /// of this context should stop
    pub fn done(&self) -> watch::Receiver<Option<ContextError>> {
        self.inner.done.subscribe()
    }

    /// Resolves once the context is cancelled, yielding the reason.
    pub async fn cancelled(&self) -> ContextError {
        let mut done = self.inner.done.subscribe();
        loop {
            let current = *done.borrow_and_update();
            if let Some(reason) = current {
                return reason;
            }
            if done.changed().await.is_err() {
                // sender lives as long as `self`
                return std::future::pending().await;
            }
        }
    }

    /// Sleeps for `duration` unless the context is cancelled first.
    pub async fn sleep(&self, duration: Duration) -> Result<(), ContextError> {
        tokio::select! {
            biased;
            reason = self.cancelled() => Err(reason),
            _ = time::sleep(duration) => Ok(()),
        }
    }

    pub fn cancel(&self) {
        self.inner.done.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(ContextError::Canceled);
                true
            } else {
                false
            }
        });
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
