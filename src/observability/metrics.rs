//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `cert_uploader_reconciliations_total{controller}` - Reconciliations started
//! - `cert_uploader_reconciliation_errors_total{controller}` - Reconciliations that returned a retryable error
//! - `cert_uploader_reconciliation_duration_seconds` - Duration of reconciliations
//! - `cert_uploader_outcomes_total{category}` - Terminal outcomes by category
//! - `cert_uploader_provider_requests_total{operation}` - Requests sent to Cloudflare
//! - `cert_uploader_provider_request_duration_seconds{operation}` - Duration of Cloudflare requests
//! - `cert_uploader_provider_errors_total{kind}` - Retryable Cloudflare failures
//! - `cert_uploader_fanout_triggers_total` - CertificateUploads re-triggered by Secret changes
//! - `cert_uploader_secret_index_entries` - CertificateUploads currently indexed
//! - `cert_uploader_requeues_total{reason}` - Requeues scheduled by the error policy

use anyhow::Result;
use prometheus::{Histogram, HistogramVec, IntCounter, IntCounterVec, IntGauge, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "cert_uploader_reconciliations_total",
            "Total number of reconciliations by controller",
        ),
        &["controller"],
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "cert_uploader_reconciliation_errors_total",
            "Total number of reconciliations that returned a retryable error",
        ),
        &["controller"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "cert_uploader_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static OUTCOMES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "cert_uploader_outcomes_total",
            "Total number of terminal reconciliation outcomes by category",
        ),
        &["category"],
    )
    .expect("Failed to create OUTCOMES_TOTAL metric - this should never happen")
});

static PROVIDER_REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "cert_uploader_provider_requests_total",
            "Total number of Cloudflare custom certificate requests by operation",
        ),
        &["operation"],
    )
    .expect("Failed to create PROVIDER_REQUESTS_TOTAL metric - this should never happen")
});

static PROVIDER_REQUEST_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "cert_uploader_provider_request_duration_seconds",
            "Duration of Cloudflare requests in seconds by operation",
        )
        .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["operation"],
    )
    .expect("Failed to create PROVIDER_REQUEST_DURATION metric - this should never happen")
});

static PROVIDER_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "cert_uploader_provider_errors_total",
            "Total number of retryable Cloudflare failures by kind",
        ),
        &["kind"],
    )
    .expect("Failed to create PROVIDER_ERRORS_TOTAL metric - this should never happen")
});

static FANOUT_TRIGGERS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "cert_uploader_fanout_triggers_total",
        "Total number of CertificateUpload reconciliations triggered by Secret changes",
    )
    .expect("Failed to create FANOUT_TRIGGERS_TOTAL metric - this should never happen")
});

static SECRET_INDEX_ENTRIES: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "cert_uploader_secret_index_entries",
        "Current number of CertificateUploads in the Secret index",
    )
    .expect("Failed to create SECRET_INDEX_ENTRIES metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "cert_uploader_requeues_total",
            "Total number of requeues scheduled by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

/// Register all metrics with the registry served on `/metrics`
///
/// # Errors
///
/// Returns an error if a metric is registered twice.
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(OUTCOMES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PROVIDER_REQUESTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PROVIDER_REQUEST_DURATION.clone()))?;
    REGISTRY.register(Box::new(PROVIDER_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(FANOUT_TRIGGERS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SECRET_INDEX_ENTRIES.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_reconciliations(controller: &str) {
    RECONCILIATIONS_TOTAL.with_label_values(&[controller]).inc();
}

pub fn increment_reconciliation_errors(controller: &str) {
    RECONCILIATION_ERRORS_TOTAL
        .with_label_values(&[controller])
        .inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_outcome(category: &str) {
    OUTCOMES_TOTAL.with_label_values(&[category]).inc();
}

/// Record one Cloudflare request and its duration
pub fn record_provider_request(operation: &str, duration: f64) {
    PROVIDER_REQUESTS_TOTAL.with_label_values(&[operation]).inc();
    PROVIDER_REQUEST_DURATION
        .with_label_values(&[operation])
        .observe(duration);
}

pub fn increment_provider_errors(kind: &str) {
    PROVIDER_ERRORS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_fanout_triggers(count: usize) {
    FANOUT_TRIGGERS_TOTAL.inc_by(u64::try_from(count).unwrap_or(u64::MAX));
}

pub fn set_secret_index_entries(count: usize) {
    SECRET_INDEX_ENTRIES.set(i64::try_from(count).unwrap_or(i64::MAX));
}

pub fn increment_requeues_total(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}
