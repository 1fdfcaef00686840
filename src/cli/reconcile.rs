//! # Reconcile Command

use anyhow::{Context, Result};
use cert_uploader::constants::RECONCILE_ANNOTATION;
use cert_uploader::crd::CertificateUpload;
use kube::{
    api::{Api, Patch, PatchParams},
    Client,
};
use serde_json::json;

/// Trigger reconciliation by stamping the reconcile annotation
///
/// The controller treats a changed annotation value like a spec change. An
/// upload only happens if the Secret version differs from the recorded one.
pub async fn reconcile_command(
    client: Client,
    name: String,
    namespace: Option<String>,
) -> Result<()> {
    let ns = namespace.as_deref().unwrap_or("default");
    let api: Api<CertificateUpload> = Api::namespaced(client, ns);

    println!("Triggering reconciliation for CertificateUpload '{ns}/{name}'...");

    let upload = api
        .get(&name)
        .await
        .with_context(|| format!("Failed to get CertificateUpload '{ns}/{name}'"))?;
    if upload.spec.cloudflare.is_none() {
        println!("   Warning: no Cloudflare target configured, nothing will be uploaded.");
    }

    let timestamp = chrono::Utc::now().to_rfc3339();
    let patch = json!({
        "metadata": {
            "annotations": {
                RECONCILE_ANNOTATION: timestamp
            }
        }
    });

    api.patch(&name, &PatchParams::default(), &Patch::Merge(patch))
        .await
        .with_context(|| {
            format!("Failed to trigger reconciliation for CertificateUpload '{ns}/{name}'")
        })?;

    println!("Reconciliation triggered");
    println!("   Resource: {ns}/{name}");
    println!("   Annotation: {RECONCILE_ANNOTATION}={timestamp}");

    Ok(())
}
