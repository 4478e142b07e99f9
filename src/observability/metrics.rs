//! # Metrics
//!
//! Prometheus metrics for monitoring the provider.
//!
//! ## Metrics Exposed
//!
//! - `litellm_reconciliations_total{kind}` - Reconcile invocations
//! - `litellm_reconciliation_errors_total{kind,reason}` - Failed reconciles by error kind
//! - `litellm_reconciliation_duration_seconds{kind}` - Reconcile duration
//! - `litellm_external_operations_total{kind,operation,outcome}` - Calls to the LiteLLM proxy
//! - `litellm_requeues_total{kind,reason}` - Scheduling decisions after a reconcile
//! - `litellm_queue_depth{kind}` - Keys waiting in a work queue

use anyhow::Result;
use prometheus::{HistogramVec, IntCounterVec, IntGaugeVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "litellm_reconciliations_total",
            "Total number of reconciliations by kind",
        ),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "litellm_reconciliation_errors_total",
            "Total number of reconciliation errors by kind and error kind",
        ),
        &["kind", "reason"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "litellm_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static EXTERNAL_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "litellm_external_operations_total",
            "Total number of LiteLLM proxy operations by kind, operation and outcome",
        ),
        &["kind", "operation", "outcome"],
    )
    .expect("Failed to create EXTERNAL_OPERATIONS_TOTAL metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "litellm_requeues_total",
            "Total number of requeue decisions by kind and reason",
        ),
        &["kind", "reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

static QUEUE_DEPTH: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    IntGaugeVec::new(
        prometheus::Opts::new("litellm_queue_depth", "Keys waiting in the work queue"),
        &["kind"],
    )
    .expect("Failed to create QUEUE_DEPTH metric - this should never happen")
});

pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(EXTERNAL_OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(QUEUE_DEPTH.clone()))?;

    Ok(())
}

pub fn increment_reconciliations(kind: &str) {
    RECONCILIATIONS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_reconciliation_errors(kind: &str, reason: &str) {
    RECONCILIATION_ERRORS_TOTAL
        .with_label_values(&[kind, reason])
        .inc();
}

pub fn observe_reconciliation_duration(kind: &str, duration: f64) {
    RECONCILIATION_DURATION
        .with_label_values(&[kind])
        .observe(duration);
}

pub fn record_external_operation(kind: &str, operation: &str, success: bool) {
    let outcome = if success { "success" } else { "error" };
    EXTERNAL_OPERATIONS_TOTAL
        .with_label_values(&[kind, operation, outcome])
        .inc();
}

pub fn increment_requeues_total(kind: &str, reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[kind, reason]).inc();
}

pub fn set_queue_depth(kind: &str, depth: usize) {
    QUEUE_DEPTH
        .with_label_values(&[kind])
        .set(i64::try_from(depth).unwrap_or(i64::MAX));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_reconciliations() {
        let before = RECONCILIATIONS_TOTAL.with_label_values(&["Key"]).get();
        increment_reconciliations("Key");
        let after = RECONCILIATIONS_TOTAL.with_label_values(&["Key"]).get();
        assert_eq!(after, before + 1u64);
    }

    #[test]
    fn test_reconciliation_errors_are_labelled_by_reason() {
        let before = RECONCILIATION_ERRORS_TOTAL
            .with_label_values(&["Team", "ConfigurationError"])
            .get();
        increment_reconciliation_errors("Team", "ConfigurationError");
        let after = RECONCILIATION_ERRORS_TOTAL
            .with_label_values(&["Team", "ConfigurationError"])
            .get();
        assert_eq!(after, before + 1u64);
    }

    #[test]
    fn test_external_operation_outcome() {
        let ok = || {
            EXTERNAL_OPERATIONS_TOTAL
                .with_label_values(&["Key", "create", "success"])
                .get()
        };
        let failed = || {
            EXTERNAL_OPERATIONS_TOTAL
                .with_label_values(&["Key", "create", "error"])
                .get()
        };
        let (ok_before, failed_before) = (ok(), failed());

        record_external_operation("Key", "create", true);
        record_external_operation("Key", "create", false);
        record_external_operation("Key", "create", false);

        assert_eq!(ok(), ok_before + 1u64);
        assert_eq!(failed(), failed_before + 2u64);
    }

    #[test]
    fn test_queue_depth() {
        set_queue_depth("ProviderConfig", 7);
        assert_eq!(QUEUE_DEPTH.with_label_values(&["ProviderConfig"]).get(), 7);
    }

    #[test]
    fn test_observe_reconciliation_duration() {
        observe_reconciliation_duration("Key", 1.5);
        // Histogram observation doesn't return a value
    }
}
