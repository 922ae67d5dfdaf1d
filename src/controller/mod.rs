//! # Controller
//!
//! Reconciliation core of the ingress operator.
//!
//! - `key`: `namespace/name` identifiers
//! - `events`: routes watch notifications to the work queue
//! - `queue`: deduplicating, rate-limited work queue
//! - `backoff`: rate limiters deciding retry delays
//! - `worker`: worker pool draining the queue
//! - `reconciler`: per-key Service to Ingress synchronization
//! - `retry`: bounded retry policy for failed syncs
//! - `server`: HTTP server for metrics and health checks

pub mod backoff;
pub mod events;
pub mod key;
pub mod queue;
pub mod reconciler;
pub mod retry;
pub mod server;
pub mod worker;
