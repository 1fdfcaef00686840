//! # cert-uploader
//!
//! Kubernetes controller that mirrors `kubernetes.io/tls` Secrets to
//! Cloudflare custom certificates.
//!
//! ## Overview
//!
//! 1. **Watching CertificateUploads** - each resource names a TLS Secret and a Cloudflare zone
//! 2. **Watching TLS Secrets** - a changed Secret re-triggers every CertificateUpload that references it
//! 3. **Uploading** - creates the custom certificate once, then updates it in place
//! 4. **Recording** - the uploaded Secret version and certificate id land in the status
//!
//! With several replicas only the holder of the `cert-uploader-controller-lock`
//! Lease runs the controllers.
//!
//! Metrics and health probes are served on `METRICS_PORT` (default 5000).

use anyhow::Result;
use cert_uploader::observability;
use cert_uploader::runtime::initialization::initialize;
use cert_uploader::runtime::watch_loop::run_watch_loop;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let init_result = initialize().await?;

    let result = run_watch_loop(
        init_result.uploads,
        init_result.secrets,
        init_result.reconciler,
        init_result.server_state,
        init_result.shutdown,
        init_result.controller_config,
        init_result.leader,
    )
    .await;

    observability::otel::shutdown_otel(init_result.otel_tracer_provider);
    info!("cert-uploader stopped");

    result
}
