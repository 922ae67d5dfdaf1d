//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `ingress_operator_reconciliations_total` - Total number of reconciliations
//! - `ingress_operator_reconciliation_errors_total` - Total number of failed reconciliations
//! - `ingress_operator_reconciliation_duration_seconds` - Duration of reconciliations
//! - `ingress_operator_ingress_operations_total` - Ingress create/delete calls by operation and outcome
//! - `ingress_operator_events_total` - Watch notifications routed, by kind and event
//! - `ingress_operator_event_key_errors_total` - Notifications dropped because no key could be built
//! - `ingress_operator_queue_adds_total` - Items admitted to the work queue
//! - `ingress_operator_queue_depth` - Items currently waiting in the work queue
//! - `ingress_operator_requeues_total` - Rate-limited re-admissions after failures
//! - `ingress_operator_dropped_keys_total` - Keys dropped after exhausting their retries

use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec, IntGauge, Registry};
use std::sync::LazyLock;

// Metrics
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "ingress_operator_reconciliations_total",
        "Total number of reconciliations",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "ingress_operator_reconciliation_errors_total",
        "Total number of failed reconciliations",
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "ingress_operator_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static INGRESS_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "ingress_operator_ingress_operations_total",
            "Total number of Ingress API operations by operation and outcome",
        ),
        &["operation", "outcome"],
    )
    .expect("Failed to create INGRESS_OPERATIONS_TOTAL metric - this should never happen")
});

static EVENTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "ingress_operator_events_total",
            "Total number of watch notifications routed by kind and event",
        ),
        &["kind", "event"],
    )
    .expect("Failed to create EVENTS_TOTAL metric - this should never happen")
});

static EVENT_KEY_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "ingress_operator_event_key_errors_total",
        "Total number of notifications dropped because no key could be extracted",
    )
    .expect("Failed to create EVENT_KEY_ERRORS_TOTAL metric - this should never happen")
});

static QUEUE_ADDS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "ingress_operator_queue_adds_total",
        "Total number of items admitted to the work queue",
    )
    .expect("Failed to create QUEUE_ADDS_TOTAL metric - this should never happen")
});

static QUEUE_DEPTH: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "ingress_operator_queue_depth",
        "Current number of items waiting in the work queue",
    )
    .expect("Failed to create QUEUE_DEPTH metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "ingress_operator_requeues_total",
        "Total number of rate-limited re-admissions after failed reconciliations",
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

static DROPPED_KEYS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "ingress_operator_dropped_keys_total",
        "Total number of keys dropped after exhausting their retries",
    )
    .expect("Failed to create DROPPED_KEYS_TOTAL metric - this should never happen")
});

/// Register every metric with the process registry
///
/// # Errors
///
/// Fails if called twice (duplicate registration).
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(INGRESS_OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(EVENTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(EVENT_KEY_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(QUEUE_ADDS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(QUEUE_DEPTH.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DROPPED_KEYS_TOTAL.clone()))?;
    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors() {
    RECONCILIATION_ERRORS_TOTAL.inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

/// Record one Ingress API call. `outcome` is `success`, `not_found` or `error`.
pub fn record_ingress_operation(operation: &str, outcome: &str) {
    INGRESS_OPERATIONS_TOTAL
        .with_label_values(&[operation, outcome])
        .inc();
}

pub fn increment_events(kind: &str, event: &str) {
    EVENTS_TOTAL.with_label_values(&[kind, event]).inc();
}

pub fn increment_event_key_errors() {
    EVENT_KEY_ERRORS_TOTAL.inc();
}

pub fn increment_queue_adds() {
    QUEUE_ADDS_TOTAL.inc();
}

pub fn set_queue_depth(depth: usize) {
    QUEUE_DEPTH.set(i64::try_from(depth).unwrap_or(i64::MAX));
}

pub fn increment_requeues() {
    REQUEUES_TOTAL.inc();
}

pub fn increment_dropped_keys() {
    DROPPED_KEYS_TOTAL.inc();
}
