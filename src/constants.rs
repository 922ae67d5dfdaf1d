//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Annotation that opts a Service into having an Ingress
pub const DEFAULT_TRIGGER_ANNOTATION: &str = "ingress/http";

/// Kind an Ingress owner reference must carry for the controller to care about it
pub const PRIMARY_KIND: &str = "Service";

/// Ingress class assigned to every generated Ingress
pub const DEFAULT_INGRESS_CLASS_NAME: &str = "nginx";

/// Host of the single generated rule
pub const DEFAULT_INGRESS_HOST: &str = "ingressx.com";

/// Path of the single generated rule
pub const DEFAULT_INGRESS_PATH: &str = "/";

/// Path type of the single generated rule
pub const DEFAULT_INGRESS_PATH_TYPE: &str = "Prefix";

/// Backend port of the generated rule
pub const DEFAULT_INGRESS_BACKEND_PORT: i32 = 80;

/// Number of concurrent reconciliation workers
pub const DEFAULT_WORKERS: usize = 5;

/// Backoff re-admissions allowed before a failing key is dropped
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// Per-item exponential backoff base delay (milliseconds)
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 5;

/// Per-item exponential backoff ceiling (seconds)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 1000;

/// Overall token bucket refill rate (tokens per second)
pub const DEFAULT_RATE_LIMIT_QPS: u32 = 10;

/// Overall token bucket size
pub const DEFAULT_RATE_LIMIT_BURST: u32 = 100;

/// How long to wait for the Service and Ingress caches to sync at startup (seconds)
pub const DEFAULT_CACHE_SYNC_TIMEOUT_SECS: u64 = 60;

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;
