//! # Work Queue
//!
//! Deduplicating, rate-limited work queue shared by the event router, the worker
//! pool and the retry policy.
//!
//! Every item is in exactly one of three states:
//!
//! - **absent**: unknown to the queue
//! - **queued**: waiting in the FIFO to be handed to a worker
//! - **in-flight**: handed out by [`WorkQueue::get`] and not yet released by
//!   [`WorkQueue::done`]
//!
//! Adding an item that is already queued is a no-op. Adding an item that is in-flight
//! marks it dirty; it is put back on the FIFO when the worker calls `done`, so a
//! single item is never processed by two workers at once and no update is lost.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::controller::backoff::RateLimiter;
use crate::observability::metrics;

/// Observable state of one item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Absent,
    Queued,
    /// Being processed. `requeue_pending` is set when an add arrived meanwhile.
    InFlight { requeue_pending: bool },
}

struct QueueState<T> {
    /// FIFO of items ready to be handed out
    queue: VecDeque<T>,
    /// Items that need processing: queued ones plus in-flight ones re-added meanwhile
    dirty: HashSet<T>,
    /// Items currently held by a worker
    processing: HashSet<T>,
    shutting_down: bool,
    limiter: Box<dyn RateLimiter<T>>,
}

struct Inner<T> {
    state: Mutex<QueueState<T>>,
    notify: Notify,
    /// Cancels delayed adds still sleeping when the queue shuts down
    shutdown: CancellationToken,
}

/// Cloneable handle to a shared work queue
pub struct WorkQueue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for WorkQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for WorkQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("WorkQueue")
            .field("queued", &state.queue.len())
            .field("processing", &state.processing.len())
            .field("shutting_down", &state.shutting_down)
            .finish_non_exhaustive()
    }
}

impl<T> Inner<T> {
    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        // No invariant spans a panic point inside the critical sections
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> WorkQueue<T>
where
    T: Eq + Hash + Clone + fmt::Display + Send + Sync + 'static,
{
    pub fn new(limiter: impl RateLimiter<T> + 'static) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState {
                    queue: VecDeque::new(),
                    dirty: HashSet::new(),
                    processing: HashSet::new(),
                    shutting_down: false,
                    limiter: Box::new(limiter),
                }),
                notify: Notify::new(),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Mark `item` as needing processing
    ///
    /// Idempotent while the item is queued. If the item is in-flight it is deferred
    /// and re-queued by [`WorkQueue::done`]. Ignored once the queue is shutting down.
    pub fn add(&self, item: T) {
        let mut state = self.inner.lock();
        if state.shutting_down {
            return;
        }
        if state.dirty.contains(&item) {
            return;
        }
        metrics::increment_queue_adds();
        state.dirty.insert(item.clone());
        if state.processing.contains(&item) {
            debug!(key = %item, "work queue deferred add of in-flight item");
            return;
        }
        state.queue.push_back(item);
        metrics::set_queue_depth(state.queue.len());
        drop(state);
        self.inner.notify.notify_one();
    }

    /// Add `item` once `delay` has elapsed
    pub fn add_after(&self, item: T, delay: Duration) {
        if self.is_shutting_down() {
            return;
        }
        if delay.is_zero() {
            self.add(item);
            return;
        }
        let queue = self.clone();
        let shutdown = self.inner.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = shutdown.cancelled() => {}
                () = tokio::time::sleep(delay) => queue.add(item),
            }
        });
    }

    /// Re-admit `item` after the rate limiter's delay, which is returned
    pub fn add_rate_limited(&self, item: T) -> Duration {
        let delay = self.inner.lock().limiter.when(&item);
        debug!(key = %item, delay_ms = delay.as_millis(), "work queue rate-limited add");
        self.add_after(item, delay);
        delay
    }

    /// Number of rate-limited re-admissions of `item` since it was last forgotten
    pub fn num_requeues(&self, item: &T) -> u32 {
        self.inner.lock().limiter.num_requeues(item)
    }

    /// Clear the retry history of `item`
    pub fn forget(&self, item: &T) {
        self.inner.lock().limiter.forget(item);
    }

    /// Wait for the next item and mark it in-flight
    ///
    /// Returns `None` once the queue is shutting down and has been drained.
    pub async fn get(&self) -> Option<T> {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register interest before inspecting state so a concurrent add cannot be missed
            notified.as_mut().enable();

            {
                let mut state = self.inner.lock();
                if let Some(item) = state.queue.pop_front() {
                    state.dirty.remove(&item);
                    state.processing.insert(item.clone());
                    metrics::set_queue_depth(state.queue.len());
                    return Some(item);
                }
                if state.shutting_down {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Release an item obtained from [`WorkQueue::get`]
    ///
    /// Must be called exactly once per item handed out, whatever the outcome of its
    /// processing. An add that arrived while the item was in-flight is applied now.
    pub fn done(&self, item: &T) {
        let mut state = self.inner.lock();
        state.processing.remove(item);
        if state.dirty.contains(item) {
            state.queue.push_back(item.clone());
            metrics::set_queue_depth(state.queue.len());
            drop(state);
            self.inner.notify.notify_one();
        }
    }

    /// Stop accepting new items and wake every waiting worker
    ///
    /// Items already queued are still handed out; `get` returns `None` once they are gone.
    pub fn shut_down(&self) {
        self.inner.lock().shutting_down = true;
        self.inner.shutdown.cancel();
        self.inner.notify.notify_waiters();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.lock().shutting_down
    }

    /// Number of queued items (in-flight items are not counted)
    pub fn len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn state_of(&self, item: &T) -> ItemState {
        let state = self.inner.lock();
        if state.processing.contains(item) {
            ItemState::InFlight {
                requeue_pending: state.dirty.contains(item),
            }
        } else if state.dirty.contains(item) {
            ItemState::Queued
        } else {
            ItemState::Absent
        }
    }
}
