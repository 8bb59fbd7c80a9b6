//! Cancellable delayed tasks
//!
//! The only cancellable operations in the flow are timers: the debounce
//! window before a preview-quote refresh and the success-screen auto-dismiss
//! countdown. Both are modeled as explicit tasks with an abort handle
//! instead of ad hoc timer bookkeeping.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

/// A single delayed action that can be cancelled before it fires
pub struct DelayedTask {
    handle: JoinHandle<()>,
}

impl DelayedTask {
    /// Run `fut` after `delay`, unless cancelled first
    pub fn spawn<F>(delay: Duration, fut: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            fut.await;
        });
        Self { handle }
    }

    /// Cancel the task; a no-op if it already fired
    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for DelayedTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Debouncer: scheduling a new task supersedes the previous one
#[derive(Default)]
pub struct Debouncer {
    slot: Option<DelayedTask>,
}

impl Debouncer {
    pub fn new() -> Self {
        Self { slot: None }
    }

    /// Schedule `fut` after `delay`, cancelling any task still waiting
    pub fn schedule<F>(&mut self, delay: Duration, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Some(previous) = self.slot.take() {
            previous.cancel();
        }
        self.slot = Some(DelayedTask::spawn(delay, fut));
    }

    /// Cancel whatever is pending
    pub fn cancel(&mut self) {
        if let Some(task) = self.slot.take() {
            task.cancel();
        }
    }
}
