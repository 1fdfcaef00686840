//! # List Command

use anyhow::{Context, Result};
use cert_uploader::crd::CertificateUpload;
use kube::{api::Api, api::ListParams, Client};

/// List CertificateUpload resources, in one namespace or across the cluster
pub async fn list_command(client: Client, namespace: Option<String>) -> Result<()> {
    let api: Api<CertificateUpload> = if let Some(ns) = &namespace {
        println!("Listing CertificateUpload resources in namespace '{ns}'...");
        Api::namespaced(client, ns)
    } else {
        println!("Listing CertificateUpload resources in all namespaces...");
        Api::all(client)
    };

    let uploads = api
        .list(&ListParams::default())
        .await
        .context("Failed to list CertificateUpload resources")?;

    if uploads.items.is_empty() {
        println!("No CertificateUpload resources found.");
        return Ok(());
    }

    println!(
        "\n{:<30} {:<20} {:<30} {:<34} {:<10} {:<22}",
        "NAME", "NAMESPACE", "SECRET", "CERTIFICATE", "SYNCED", "EXPIRES"
    );
    println!("{}", "-".repeat(151));

    for upload in uploads.items {
        let name = upload.metadata.name.as_deref().unwrap_or("<unknown>");
        let ns = upload.metadata.namespace.as_deref().unwrap_or("<unknown>");
        let secret = upload.spec.secret_name.as_str();

        let certificate = upload
            .status
            .as_ref()
            .and_then(|s| s.certificate_id())
            .unwrap_or("-");
        let synced = upload
            .status
            .as_ref()
            .and_then(|s| s.secret_resource_version.as_deref())
            .unwrap_or("-");
        let expires = upload
            .status
            .as_ref()
            .and_then(|s| s.expire_time.as_deref())
            .unwrap_or("-");

        println!("{name:<30} {ns:<20} {secret:<30} {certificate:<34} {synced:<10} {expires:<22}");
    }

    Ok(())
}
