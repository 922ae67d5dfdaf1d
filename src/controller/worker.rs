//! # Worker Pool
//!
//! A fixed number of tasks draining the shared work queue.
//!
//! Each worker loops on `get -> sync -> retry policy -> done`. `done` is called for
//! every key handed out, including when the sync panics, so a key can never get stuck
//! in-flight. One key is never processed by two workers at once; that guarantee comes
//! from the queue, not from any lock here.
//!
//! Cancelling the token shuts the queue down. Workers waiting for work exit at once,
//! workers in the middle of a sync finish it first.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, Instrument};

use crate::controller::key::ObjectKey;
use crate::controller::queue::WorkQueue;
use crate::controller::reconciler::KeyReconciler;
use crate::controller::retry::RetryPolicy;

pub struct WorkerPool<R: ?Sized> {
    queue: WorkQueue<ObjectKey>,
    reconciler: Arc<R>,
    retry: RetryPolicy,
    workers: usize,
}

impl<R: ?Sized> std::fmt::Debug for WorkerPool<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

impl<R> WorkerPool<R>
where
    R: KeyReconciler + ?Sized + 'static,
{
    pub fn new(
        queue: WorkQueue<ObjectKey>,
        reconciler: Arc<R>,
        retry: RetryPolicy,
        workers: usize,
    ) -> Self {
        Self {
            queue,
            reconciler,
            retry,
            workers: workers.max(1),
        }
    }

    /// Run until `token` is cancelled and every worker has exited
    pub async fn run(self, token: CancellationToken) {
        let supervisor = {
            let queue = self.queue.clone();
            let token = token.clone();
            tokio::spawn(async move {
                token.cancelled().await;
                info!("Shutdown requested, closing work queue");
                queue.shut_down();
            })
        };

        info!(workers = self.workers, "Starting workers");
        let mut tasks = JoinSet::new();
        for id in 0..self.workers {
            let worker = Worker {
                id,
                queue: self.queue.clone(),
                reconciler: Arc::clone(&self.reconciler),
                retry: self.retry.clone(),
            };
            tasks.spawn(worker.run(token.clone()));
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "worker task failed");
            }
        }
        supervisor.abort();
        info!("All workers stopped");
    }
}

struct Worker<R: ?Sized> {
    id: usize,
    queue: WorkQueue<ObjectKey>,
    reconciler: Arc<R>,
    retry: RetryPolicy,
}

impl<R> Worker<R>
where
    R: KeyReconciler + ?Sized + 'static,
{
    async fn run(self, token: CancellationToken) {
        loop {
            let next = tokio::select! {
                biased;
                () = token.cancelled() => None,
                key = self.queue.get() => key,
            };
            let Some(key) = next else {
                debug!(worker = self.id, "worker exiting");
                return;
            };

            let span = tracing::span!(
                tracing::Level::INFO,
                "controller.worker.process",
                worker = self.id,
                key = %key
            );
            self.process(&key).instrument(span).await;
            self.queue.done(&key);
        }
    }

    async fn process(&self, key: &ObjectKey) {
        let outcome = AssertUnwindSafe(self.reconciler.sync(key))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(action)) => {
                debug!(action = action.as_str(), "sync succeeded");
                self.retry.handle_success(key);
            }
            Ok(Err(e)) => {
                self.retry.handle_error(key, &e);
            }
            Err(_) => {
                error!("sync panicked, key released without retry");
                self.queue.forget(key);
            }
        }
    }
}
