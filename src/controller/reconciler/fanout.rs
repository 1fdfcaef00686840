//! # Secret Fan-out
//!
//! Re-runs every `CertificateUpload` that mirrors a changed Secret.

use super::outcome::Outcome;
use super::reconcile::reconcile_upload;
use super::types::{Reconciler, ReconcilerError};
use crate::observability::metrics;
use tracing::{debug, info};

/// Reconcile, in order, every upload referencing `namespace/secret_name`
///
/// Stops at the first retryable failure and returns it, so the whole Secret
/// event is retried. Returns the number of uploads reconciled otherwise.
///
/// # Errors
///
/// Returns the first retryable [`ReconcilerError`].
pub async fn fan_out_secret(
    ctx: &Reconciler,
    namespace: &str,
    secret_name: &str,
) -> Result<usize, ReconcilerError> {
    let owners = ctx.index.lookup(namespace, secret_name);
    if owners.is_empty() {
        debug!(
            secret.namespace = namespace,
            secret.name = secret_name,
            "No CertificateUpload references this Secret"
        );
        return Ok(0);
    }

    info!(
        secret.namespace = namespace,
        secret.name = secret_name,
        count = owners.len(),
        "Secret changed, reconciling referencing CertificateUploads"
    );
    metrics::increment_fanout_triggers(owners.len());

    for owner in &owners {
        if let Outcome::Retry(e) = reconcile_upload(ctx, &owner.namespace, &owner.name).await {
            return Err(e);
        }
    }
    Ok(owners.len())
}
