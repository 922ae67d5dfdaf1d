//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use std::time::Duration;

use tracing::warn;

use crate::constants::{
    DEFAULT_BACKOFF_BASE_MS, DEFAULT_BACKOFF_MAX_SECS, DEFAULT_CACHE_SYNC_TIMEOUT_SECS,
    DEFAULT_INGRESS_BACKEND_PORT, DEFAULT_INGRESS_CLASS_NAME, DEFAULT_INGRESS_HOST,
    DEFAULT_MAX_RETRIES, DEFAULT_RATE_LIMIT_BURST, DEFAULT_RATE_LIMIT_QPS,
    DEFAULT_TRIGGER_ANNOTATION, DEFAULT_WORKERS,
};

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Environment variables are populated from a ConfigMap using `envFrom` in the deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Number of concurrent reconciliation workers
    pub workers: usize,
    /// Backoff re-admissions allowed before a failing key is dropped
    pub max_retries: u32,
    /// Per-item exponential backoff base delay (milliseconds)
    pub backoff_base_ms: u64,
    /// Per-item exponential backoff ceiling (seconds)
    pub backoff_max_secs: u64,
    /// Overall token bucket refill rate (tokens per second)
    pub rate_limit_qps: u32,
    /// Overall token bucket size
    pub rate_limit_burst: u32,
    /// Annotation whose presence on a Service requests an Ingress
    pub trigger_annotation: String,
    /// Ingress class assigned to generated Ingresses
    pub ingress_class_name: String,
    /// Host of the generated rule
    pub ingress_host: String,
    /// Backend port of the generated rule
    pub ingress_backend_port: i32,
    /// Namespace to watch. `None` watches every namespace.
    pub watch_namespace: Option<String>,
    /// How long to wait for the caches to sync at startup (seconds)
    pub cache_sync_timeout_secs: u64,
    /// Log format (json, text)
    pub log_format: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
            rate_limit_qps: DEFAULT_RATE_LIMIT_QPS,
            rate_limit_burst: DEFAULT_RATE_LIMIT_BURST,
            trigger_annotation: DEFAULT_TRIGGER_ANNOTATION.to_string(),
            ingress_class_name: DEFAULT_INGRESS_CLASS_NAME.to_string(),
            ingress_host: DEFAULT_INGRESS_HOST.to_string(),
            ingress_backend_port: DEFAULT_INGRESS_BACKEND_PORT,
            watch_namespace: None,
            cache_sync_timeout_secs: DEFAULT_CACHE_SYNC_TIMEOUT_SECS,
            log_format: "text".to_string(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            workers: env_var_or_default("WORKERS", DEFAULT_WORKERS).max(1),
            max_retries: env_var_or_default("MAX_RETRIES", DEFAULT_MAX_RETRIES),
            backoff_base_ms: env_var_or_default("BACKOFF_BASE_MS", DEFAULT_BACKOFF_BASE_MS),
            backoff_max_secs: env_var_or_default("BACKOFF_MAX_SECS", DEFAULT_BACKOFF_MAX_SECS),
            rate_limit_qps: env_var_or_default("RATE_LIMIT_QPS", DEFAULT_RATE_LIMIT_QPS),
            rate_limit_burst: env_var_or_default("RATE_LIMIT_BURST", DEFAULT_RATE_LIMIT_BURST),
            trigger_annotation: env_var_or_default_str(
                "TRIGGER_ANNOTATION",
                DEFAULT_TRIGGER_ANNOTATION,
            ),
            ingress_class_name: env_var_or_default_str(
                "INGRESS_CLASS_NAME",
                DEFAULT_INGRESS_CLASS_NAME,
            ),
            ingress_host: env_var_or_default_str("INGRESS_HOST", DEFAULT_INGRESS_HOST),
            ingress_backend_port: env_var_or_default(
                "INGRESS_BACKEND_PORT",
                DEFAULT_INGRESS_BACKEND_PORT,
            ),
            watch_namespace: std::env::var("WATCH_NAMESPACE")
                .ok()
                .filter(|ns| !ns.is_empty()),
            cache_sync_timeout_secs: env_var_or_default(
                "CACHE_SYNC_TIMEOUT_SECS",
                DEFAULT_CACHE_SYNC_TIMEOUT_SECS,
            ),
            log_format: env_var_or_default_str("LOG_FORMAT", "text"),
        }
    }

    /// Get per-item backoff base duration
    #[must_use]
    pub fn backoff_base_duration(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    /// Get per-item backoff ceiling duration
    #[must_use]
    pub fn backoff_max_duration(&self) -> Duration {
        Duration::from_secs(self.backoff_max_secs)
    }

    /// Get cache sync timeout duration
    #[must_use]
    pub fn cache_sync_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.cache_sync_timeout_secs)
    }
}

/// Read environment variable or return default value
pub(crate) fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    match std::env::var(key) {
        Ok(value) => match value.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(
                    "Invalid value '{}' for {}: {:?}, using default",
                    value, key, e
                );
                default
            }
        },
        Err(_) => default,
    }
}

/// Read environment variable as string or return default
pub(crate) fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.workers, 5);
        assert_eq!(config.max_retries, 10);
        assert_eq!(config.trigger_annotation, "ingress/http");
        assert_eq!(config.ingress_class_name, "nginx");
        assert_eq!(config.ingress_host, "ingressx.com");
        assert_eq!(config.ingress_backend_port, 80);
        assert!(config.watch_namespace.is_none());
    }

    #[test]
    fn test_unparsable_env_value_falls_back_to_default() {
        std::env::set_var("INGRESS_OPERATOR_TEST_WORKERS", "many");
        assert_eq!(env_var_or_default("INGRESS_OPERATOR_TEST_WORKERS", 7_usize), 7);
        std::env::set_var("INGRESS_OPERATOR_TEST_WORKERS", "3");
        assert_eq!(env_var_or_default("INGRESS_OPERATOR_TEST_WORKERS", 7_usize), 3);
        std::env::remove_var("INGRESS_OPERATOR_TEST_WORKERS");
    }

    #[test]
    fn test_durations() {
        let config = ControllerConfig::default();
        assert_eq!(config.backoff_base_duration(), Duration::from_millis(5));
        assert_eq!(config.backoff_max_duration(), Duration::from_secs(1000));
        assert_eq!(config.cache_sync_timeout_duration(), Duration::from_secs(60));
    }

    #[test]
    fn test_env_var_or_default_falls_back_on_garbage() {
        // Key is unique to this test so parallel tests do not interfere
        std::env::set_var("INGRESS_OPERATOR_TEST_GARBAGE_U32", "not-a-number");
        assert_eq!(env_var_or_default("INGRESS_OPERATOR_TEST_GARBAGE_U32", 7u32), 7);
        std::env::remove_var("INGRESS_OPERATOR_TEST_GARBAGE_U32");
    }
}
