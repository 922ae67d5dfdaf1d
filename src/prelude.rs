//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ```rust
//! use ingress_operator::prelude::*;
//! ```

// Reconciliation core
pub use crate::controller::events::{EventRouter, Notification, OwnerRef, WatchEvent};
pub use crate::controller::key::{KeyError, ObjectKey};
pub use crate::controller::queue::{ItemState, WorkQueue};
pub use crate::controller::reconciler::{
    IngressTemplate, KeyReconciler, Reconciler, ReconcilerError, SyncAction,
};
pub use crate::controller::retry::{ErrorReporter, LogErrorReporter, RetryDecision, RetryPolicy};
pub use crate::controller::worker::WorkerPool;

// Rate limiting
pub use crate::controller::backoff::{
    BucketRateLimiter, ControllerRateLimiter, ExponentialBackoff, ItemExponentialRateLimiter,
    RateLimiter,
};

// Cluster access
pub use crate::cluster::{CacheError, ClusterError, IngressClient, ObjectCache};

// Config types
pub use crate::config::{ControllerConfig, ServerConfig};
