//! # Runtime
//!
//! Process-level plumbing around the reconciliation core.
//!
//! - `initialization`: rustls, tracing, metrics, HTTP server and client setup
//! - `informer`: watch streams feeding the caches and the event router
//! - `watch_loop`: runs informers and workers until shutdown
//! - `error_policy`: watch stream error reporting

pub mod error_policy;
pub mod informer;
pub mod initialization;
pub mod watch_loop;
