//! # Retry Policy
//!
//! Decides what happens to a key after a failed sync.
//!
//! While the key's requeue count is at most `max_retries` it is re-admitted through
//! the rate limiter, so each retry waits longer than the previous one. Past that
//! bound the error is handed to the process-wide [`ErrorReporter`] and the key's
//! history is forgotten. The key comes back only when a new watch event enqueues it.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::controller::key::ObjectKey;
use crate::controller::queue::WorkQueue;
use crate::controller::reconciler::ReconcilerError;
use crate::observability::metrics;

/// Outcome of [`RetryPolicy::handle_error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-admitted with backoff
    Requeued,
    /// Retries exhausted; reported and forgotten
    Dropped,
}

/// Sink for keys that ran out of retries
pub trait ErrorReporter: Send + Sync + fmt::Debug {
    fn report(&self, key: &ObjectKey, error: &ReconcilerError);
}

/// Logs the error and counts the dropped key
#[derive(Debug, Default, Clone, Copy)]
pub struct LogErrorReporter;

impl ErrorReporter for LogErrorReporter {
    fn report(&self, key: &ObjectKey, error: &ReconcilerError) {
        metrics::increment_dropped_keys();
        error!(
            key = %key,
            operation = error.operation(),
            error = %error,
            "dropping key out of the work queue after exhausting retries"
        );
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    queue: WorkQueue<ObjectKey>,
    max_retries: u32,
    reporter: Arc<dyn ErrorReporter>,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(queue: WorkQueue<ObjectKey>, max_retries: u32) -> Self {
        Self::with_reporter(queue, max_retries, Arc::new(LogErrorReporter))
    }

    #[must_use]
    pub fn with_reporter(
        queue: WorkQueue<ObjectKey>,
        max_retries: u32,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        Self {
            queue,
            max_retries,
            reporter,
        }
    }

    /// Handle a failed sync of `key`
    pub fn handle_error(&self, key: &ObjectKey, err: &ReconcilerError) -> RetryDecision {
        let requeues = self.queue.num_requeues(key);
        if requeues <= self.max_retries {
            warn!(
                key = %key,
                attempt = requeues + 1,
                max_retries = self.max_retries,
                error = %err,
                "sync failed, requeueing with backoff"
            );
            metrics::increment_requeues();
            let delay = self.queue.add_rate_limited(key.clone());
            if let Some(next_retry) = chrono::Duration::from_std(delay)
                .ok()
                .and_then(|delay| chrono::Utc::now().checked_add_signed(delay))
            {
                debug!(
                    key = %key,
                    "Next retry scheduled: {} (in {}ms)",
                    next_retry.to_rfc3339(),
                    delay.as_millis()
                );
            }
            return RetryDecision::Requeued;
        }

        self.reporter.report(key, err);
        self.queue.forget(key);
        RetryDecision::Dropped
    }

    /// Clear the retry history of `key` after a successful sync
    pub fn handle_success(&self, key: &ObjectKey) {
        self.queue.forget(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ClusterError;
    use crate::controller::backoff::ItemExponentialRateLimiter;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug, Default)]
    struct RecordingReporter {
        reports: Mutex<Vec<ObjectKey>>,
    }

    impl ErrorReporter for RecordingReporter {
        fn report(&self, key: &ObjectKey, _error: &ReconcilerError) {
            self.reports.lock().expect("lock").push(key.clone());
        }
    }

    fn create_error() -> ReconcilerError {
        ReconcilerError::Create {
            namespace: "ns1".to_string(),
            name: "web".to_string(),
            source: ClusterError::Rejected {
                code: 500,
                message: "internal error".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_requeues_until_bound_then_drops() {
        let queue = WorkQueue::new(ItemExponentialRateLimiter::new(Duration::ZERO, Duration::ZERO));
        let reporter = Arc::new(RecordingReporter::default());
        let policy = RetryPolicy::with_reporter(queue.clone(), 2, Arc::clone(&reporter) as _);
        let key = ObjectKey::new("ns1", "web");
        let err = create_error();

        // Counts 0, 1 and 2 are all within the bound
        for expected in 1..=3 {
            assert_eq!(policy.handle_error(&key, &err), RetryDecision::Requeued);
            assert_eq!(queue.num_requeues(&key), expected);
        }

        assert_eq!(policy.handle_error(&key, &err), RetryDecision::Dropped);
        assert_eq!(queue.num_requeues(&key), 0);
        assert_eq!(reporter.reports.lock().expect("lock").len(), 1);
    }

    #[tokio::test]
    async fn test_success_forgets_history() {
        let queue = WorkQueue::new(ItemExponentialRateLimiter::new(Duration::ZERO, Duration::ZERO));
        let policy = RetryPolicy::new(queue.clone(), 10);
        let key = ObjectKey::new("ns1", "web");

        policy.handle_error(&key, &create_error());
        assert_eq!(queue.num_requeues(&key), 1);

        policy.handle_success(&key);
        assert_eq!(queue.num_requeues(&key), 0);
    }
}
