//! # Upload Engine
//!
//! Decides between skip, create and update, talks to the certificate store and
//! writes the resulting status.

use super::credentials::{resolve_credential, CredentialError};
use super::outcome::{Category, Outcome};
use super::secret::CertificateMaterial;
use super::status::{synced_status, UploadKind};
use super::types::{Reconciler, ReconcilerError};
use crate::controller::events::{actions, publish_for, reasons};
use crate::crd::{CertificateUpload, CloudflareTarget};
use crate::provider::cloudflare::{render_errors, CustomCertificateRequest, UploadResponse};
use crate::provider::ProviderError;
use k8s_openapi::api::core::v1::Secret;
use kube::runtime::events::EventType;
use tracing::{debug, info, warn};

/// Mirror `secret` to the Cloudflare `target` of `upload`
pub(crate) async fn sync_to_cloudflare(
    ctx: &Reconciler,
    namespace: &str,
    upload: &CertificateUpload,
    secret: &Secret,
    target: &CloudflareTarget,
) -> Outcome {
    let events = ctx.events.as_ref();
    let secret_version = secret.metadata.resource_version.as_deref();
    let previous = upload.status.clone().unwrap_or_default();

    if let Some(version) = secret_version {
        if previous.secret_resource_version.as_deref() == Some(version) {
            let note = format!(
                "Secret {} unchanged at version {version}",
                upload.spec.secret_name
            );
            debug!(secret.version = version, "Skipping upload, secret unchanged");
            publish_for(
                events,
                upload,
                EventType::Normal,
                reasons::CERTIFICATE_UNCHANGED,
                actions::RECONCILE,
                note.clone(),
            )
            .await;
            return Outcome::terminal(Category::Unchanged, note);
        }
    }

    let material = match CertificateMaterial::from_secret(secret) {
        Ok(material) => material,
        Err(e) => {
            let note = format!("Secret {}: {e}", upload.spec.secret_name);
            publish_for(
                events,
                upload,
                EventType::Warning,
                reasons::INVALID_SECRET,
                actions::RECONCILE,
                note.clone(),
            )
            .await;
            return Outcome::terminal(Category::InvalidInput, note);
        }
    };

    let credential = match resolve_credential(ctx.store.as_ref(), namespace, target).await {
        Ok(credential) => credential,
        Err(CredentialError::Read {
            namespace,
            name,
            source,
        }) => {
            return Outcome::Retry(ReconcilerError::Read {
                what: format!("credential Secret {namespace}/{name}"),
                source,
            });
        }
        Err(e) => {
            let category = e.category().unwrap_or(Category::InvalidInput);
            let reason = if category == Category::AbsentDependency {
                reasons::CREDENTIAL_NOT_FOUND
            } else {
                reasons::CREDENTIAL_MISCONFIGURED
            };
            let note = e.to_string();
            publish_for(
                events,
                upload,
                EventType::Warning,
                reason,
                actions::RECONCILE,
                note.clone(),
            )
            .await;
            return Outcome::terminal(category, note);
        }
    };

    let stored_id = previous.certificate_id().map(ToString::to_string);
    let (kind, request) = match &stored_id {
        None => (
            UploadKind::Created,
            CustomCertificateRequest::create(&material.certificate, &material.private_key, target),
        ),
        Some(_) => (
            UploadKind::Updated,
            CustomCertificateRequest::update(&material.certificate, &material.private_key, target),
        ),
    };

    info!(
        zone.id = target.zone_id.as_str(),
        certificate.id = stored_id.as_deref().unwrap_or(""),
        auth.mode = credential.mode(),
        "Uploading certificate to Cloudflare"
    );

    let call = async {
        match &stored_id {
            None => {
                ctx.certificates
                    .create_certificate(&target.zone_id, &credential, &request)
                    .await
            }
            Some(id) => {
                ctx.certificates
                    .update_certificate(&target.zone_id, id, &credential, &request)
                    .await
            }
        }
    };
    let response = tokio::select! {
        response = call => response,
        () = ctx.shutdown.triggered() => Err(ProviderError::Cancelled),
    };

    let certificate = match response {
        Ok(UploadResponse::Accepted(certificate)) => certificate,
        Ok(UploadResponse::Rejected(errors)) => {
            let note = format!("Cloudflare rejected the certificate: {}", render_errors(&errors));
            warn!(zone.id = target.zone_id.as_str(), "{}", note);
            publish_for(
                events,
                upload,
                EventType::Warning,
                reasons::UPLOAD_FAILED,
                actions::UPLOAD,
                note.clone(),
            )
            .await;
            return Outcome::terminal(Category::ApplicationRejected, note);
        }
        Err(e) => {
            publish_for(
                events,
                upload,
                EventType::Warning,
                reasons::UPLOAD_FAILED,
                actions::UPLOAD,
                format!("Cloudflare request failed: {e}"),
            )
            .await;
            return Outcome::Retry(e.into());
        }
    };

    let status = synced_status(
        &previous,
        &certificate,
        kind,
        secret_version,
        upload.metadata.generation,
    );
    if let Err(source) = ctx
        .store
        .update_certificate_upload_status(upload, &status)
        .await
    {
        publish_for(
            events,
            upload,
            EventType::Warning,
            reasons::STATUS_UPDATE_FAILED,
            actions::UPDATE_STATUS,
            format!("Failed to record upload of certificate {}: {source}", certificate.id),
        )
        .await;
        return Outcome::Retry(ReconcilerError::StatusWrite {
            resource: upload.key(),
            source,
        });
    }

    let (reason, note) = match kind {
        UploadKind::Created => (
            reasons::CERTIFICATE_UPLOADED,
            format!(
                "Uploaded Secret {} as certificate {} in zone {}",
                upload.spec.secret_name, certificate.id, target.zone_id
            ),
        ),
        UploadKind::Updated => (
            reasons::CERTIFICATE_UPDATED,
            format!(
                "Updated certificate {} in zone {} from Secret {}",
                stored_id.as_deref().unwrap_or(&certificate.id),
                target.zone_id,
                upload.spec.secret_name
            ),
        ),
    };
    publish_for(
        events,
        upload,
        EventType::Normal,
        reason,
        actions::UPLOAD,
        note.clone(),
    )
    .await;
    Outcome::terminal(Category::Synced, note)
}
