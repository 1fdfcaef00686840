//! # Status Command
//!
//! Detailed view of one CertificateUpload and the Secret it mirrors.

use anyhow::{Context, Result};
use cert_uploader::crd::CertificateUpload;
use k8s_openapi::api::core::v1::Secret;
use kube::{api::Api, Client};

/// Show detailed status of a CertificateUpload resource
pub async fn status_command(client: Client, name: String, namespace: Option<String>) -> Result<()> {
    let ns = namespace.as_deref().unwrap_or("default");

    println!("Status for CertificateUpload '{ns}/{name}'");
    println!();

    let api: Api<CertificateUpload> = Api::namespaced(client.clone(), ns);
    let upload = api
        .get(&name)
        .await
        .with_context(|| format!("Failed to get CertificateUpload '{ns}/{name}'"))?;

    println!("Resource Information:");
    println!(
        "  Name: {}",
        upload.metadata.name.as_deref().unwrap_or("<unknown>")
    );
    println!("  Namespace: {ns}");
    if let Some(generation) = upload.metadata.generation {
        println!("  Generation: {generation}");
    }

    println!();
    println!("Spec:");
    println!("  Secret: {}", upload.spec.secret_name);
    match &upload.spec.cloudflare {
        Some(target) => {
            println!("  Cloudflare Zone: {}", target.zone_id);
            let credential = if target.api_token_secret_ref.is_some() {
                "API token"
            } else if target.api_key_secret_ref.is_some() {
                "API key"
            } else {
                "none"
            };
            println!("  Credential: {credential}");
            if let Some(bundle_method) = &target.bundle_method {
                println!("  Bundle Method: {bundle_method}");
            }
            if let Some(certificate_type) = &target.certificate_type {
                println!("  Type: {certificate_type}");
            }
        }
        None => println!("  Cloudflare: not configured (nothing is uploaded)"),
    }

    // Secret version drift tells whether an upload is pending
    let secrets: Api<Secret> = Api::namespaced(client, ns);
    let current_version = match secrets.get_opt(&upload.spec.secret_name).await {
        Ok(secret) => secret.and_then(|s| s.metadata.resource_version),
        Err(e) => {
            println!();
            println!("  Warning: could not read Secret '{}': {e}", upload.spec.secret_name);
            None
        }
    };

    println!();
    match &upload.status {
        Some(status) => {
            println!("Status:");
            if let Some(id) = status.certificate_id() {
                println!("  Certificate ID: {id}");
            }
            if let Some(version) = &status.secret_resource_version {
                println!("  Synced Secret Version: {version}");
            }
            if let Some(current) = &current_version {
                let in_sync = status.secret_resource_version.as_ref() == Some(current);
                println!("  Current Secret Version: {current} (in sync: {in_sync})");
            }
            if let Some(observed_generation) = status.observed_generation {
                println!("  Observed Generation: {observed_generation}");
            }
            if let Some(upload_time) = &status.upload_time {
                println!("  Uploaded: {upload_time}");
            }
            if let Some(update_time) = &status.update_time {
                println!("  Updated: {update_time}");
            }
            if let Some(expire_time) = &status.expire_time {
                println!("  Expires: {expire_time}");
            }
        }
        None => {
            println!("Status: No status available (nothing has been uploaded yet)");
        }
    }

    Ok(())
}
