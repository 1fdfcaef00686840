//! # Tracing Export
//!
//! Optional Datadog APM export through `datadog-opentelemetry`.
//!
//! Export is enabled only when `DD_API_KEY` is present. `DD_SERVICE`,
//! `DD_VERSION`, `DD_ENV`, `DD_SITE` and `DD_TRACE_AGENT_URL` are honoured when
//! set and defaulted otherwise. Without `DD_API_KEY` the controller only logs.

use anyhow::Result;
use std::time::Duration;
use tracing::{info, warn};

/// Tracer provider handle kept for graceful shutdown
#[derive(Debug)]
pub struct TracerProviderHandle(opentelemetry_sdk::trace::SdkTracerProvider);

/// Initialize Datadog tracing if `DD_API_KEY` is configured
///
/// Returns `Ok(None)` when no Datadog configuration is present.
///
/// # Errors
///
/// Reserved for initialization failures of the exporter.
pub fn init_otel() -> Result<Option<TracerProviderHandle>> {
    if std::env::var("DD_API_KEY").is_err() {
        info!("DD_API_KEY not set, skipping Datadog tracing");
        return Ok(None);
    }

    set_default_env("DD_SERVICE", || env!("CARGO_PKG_NAME").to_string());
    set_default_env("DD_VERSION", || {
        format!("{}-{}", env!("CARGO_PKG_VERSION"), env!("BUILD_GIT_HASH"))
    });
    set_default_env("DD_SITE", || "datadoghq.com".to_string());
    set_default_env("DD_TRACE_AGENT_URL", || "http://localhost:8126".to_string());

    info!(
        "Initializing Datadog tracing: service={}, version={}, env={:?}, site={}",
        std::env::var("DD_SERVICE").unwrap_or_default(),
        std::env::var("DD_VERSION").unwrap_or_default(),
        std::env::var("DD_ENV").ok(),
        std::env::var("DD_SITE").unwrap_or_default()
    );

    let tracer_provider = datadog_opentelemetry::tracing().init();

    info!(
        "Datadog tracing initialized, traces go to {}",
        std::env::var("DD_TRACE_AGENT_URL").unwrap_or_default()
    );

    Ok(Some(TracerProviderHandle(tracer_provider)))
}

fn set_default_env(name: &str, default: impl FnOnce() -> String) {
    if std::env::var(name).is_err() {
        std::env::set_var(name, default());
    }
}

/// Flush pending spans and shut the tracer provider down
pub fn shutdown_otel(tracer_provider: Option<TracerProviderHandle>) {
    let Some(TracerProviderHandle(provider)) = tracer_provider else {
        return;
    };
    info!("Shutting down Datadog tracer provider...");
    if let Err(e) = provider.shutdown_with_timeout(Duration::from_secs(5)) {
        warn!("Error shutting down Datadog tracer provider: {}", e);
    } else {
        info!("Datadog tracer provider shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_default_env_keeps_existing_value() {
        std::env::set_var("CERT_UPLOADER_TEST_OTEL_EXISTING", "kept");
        set_default_env("CERT_UPLOADER_TEST_OTEL_EXISTING", || "replaced".to_string());
        assert_eq!(
            std::env::var("CERT_UPLOADER_TEST_OTEL_EXISTING").unwrap(),
            "kept"
        );
        std::env::remove_var("CERT_UPLOADER_TEST_OTEL_EXISTING");
    }

    #[test]
    fn test_set_default_env_fills_missing_value() {
        std::env::remove_var("CERT_UPLOADER_TEST_OTEL_MISSING");
        set_default_env("CERT_UPLOADER_TEST_OTEL_MISSING", || "filled".to_string());
        assert_eq!(
            std::env::var("CERT_UPLOADER_TEST_OTEL_MISSING").unwrap(),
            "filled"
        );
        std::env::remove_var("CERT_UPLOADER_TEST_OTEL_MISSING");
    }

    #[test]
    fn test_shutdown_without_provider_is_noop() {
        shutdown_otel(None);
    }
}
