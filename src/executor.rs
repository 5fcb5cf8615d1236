//! # Single-worker dispatch loop over the priority queue.
//!
//! The [`Executor`] owns the task queue, a wakeup [`Notify`] and the stop
//! token. Exactly one task may drive [`Executor::run`] at a time; `post`
//! and `stop` are callable from any thread. Work items run to completion
//! between suspension points; the loop never preempts an action.
//!
//! Stopping is split in two so quit semantics compose: [`Executor::drain`]
//! discards pending items, [`Executor::stop`] makes `run` return at the
//! next boundary. Work posted after the stop token fires (including posts
//! made by shutdown hooks) is silently discarded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::{AppError, TaskError};
use crate::queue::{Priority, TaskQueue};

pub(crate) struct Executor {
    queue: TaskQueue,
    wakeup: Notify,
    stopping: CancellationToken,
    running: AtomicBool,
}

impl Executor {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            queue: TaskQueue::new(),
            wakeup: Notify::new(),
            stopping: CancellationToken::new(),
            running: AtomicBool::new(false),
        })
    }

    /// Enqueues an action and wakes the worker. Discards the action once
    /// the executor is stopping.
    pub(crate) fn post<F>(&self, priority: Priority, action: F)
    where
        F: FnOnce() -> Result<(), TaskError> + Send + 'static,
    {
        if self.stopping.is_cancelled() {
            trace!("discarding work posted after stop");
            return;
        }
        self.queue.push(priority, Box::new(action));
        self.wakeup.notify_one();
    }

    /// Posts an action after `delay`. The sleeper is cancelled by `stop`,
    /// so deferred work never outlives the run.
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) fn post_after<F>(self: &Arc<Self>, delay: Duration, priority: Priority, action: F)
    where
        F: FnOnce() -> Result<(), TaskError> + Send + 'static,
    {
        let executor = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = executor.stopping.cancelled() => {}
                _ = tokio::time::sleep(delay) => executor.post(priority, action),
            }
        });
    }

    /// Drives the dispatch loop until stopped or until an action fails.
    ///
    /// At most one concurrent runner is allowed; a second caller gets
    /// [`AppError::AlreadyRunning`] without touching the queue.
    pub(crate) async fn run(&self) -> Result<(), AppError> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(AppError::AlreadyRunning);
        }
        let result = self.dispatch().await;
        self.running.store(false, Ordering::Release);
        result.map_err(AppError::from)
    }

    async fn dispatch(&self) -> Result<(), TaskError> {
        loop {
            if self.stopping.is_cancelled() {
                return Ok(());
            }
            // execute_highest reports false both for "ran the last item"
            // and "nothing to run"; either way we wait for the next post.
            if !self.queue.execute_highest()? {
                tokio::select! {
                    _ = self.stopping.cancelled() => return Ok(()),
                    _ = self.wakeup.notified() => {}
                }
            }
        }
    }

    /// Makes `run` return at the next scheduling boundary. Thread-safe,
    /// idempotent.
    pub(crate) fn stop(&self) {
        self.stopping.cancel();
        self.wakeup.notify_one();
    }

    /// Discards every pending item without invoking it.
    pub(crate) fn drain(&self) {
        self.queue.clear();
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}
