//! # Reconcile
//!
//! One reconciliation pass for a `CertificateUpload`, shared by the primary
//! controller and Secret fan-out.

use super::outcome::{Category, Outcome};
use super::types::{Reconciler, ReconcilerError};
use super::upload::sync_to_cloudflare;
use crate::constants::TLS_SECRET_TYPE;
use crate::controller::events::{actions, publish_for, reasons};
use crate::observability::metrics;
use kube::runtime::events::EventType;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Reconcile the `CertificateUpload` `namespace/name`
///
/// Performs at most one upload and one status write, holding the resource's
/// upload lock throughout. Terminal outcomes have already been reported
/// through an event when this returns.
pub async fn reconcile_upload(ctx: &Reconciler, namespace: &str, name: &str) -> Outcome {
    let span = info_span!(
        "reconciler.certificate_upload",
        resource.namespace = namespace,
        resource.name = name
    );
    async {
        let _guard = ctx.lock_upload(namespace, name).await;
        let started = Instant::now();
        let outcome = run(ctx, namespace, name).await;
        metrics::observe_reconciliation_duration(started.elapsed().as_secs_f64());

        match &outcome {
            Outcome::Terminal(category, detail) => {
                metrics::increment_outcome(category.as_str());
                match category {
                    Category::Synced => info!(outcome = %category, "{}", detail),
                    Category::Unchanged | Category::NoOp => {
                        debug!(outcome = %category, "{}", detail);
                    }
                    Category::AbsentDependency
                    | Category::InvalidInput
                    | Category::ApplicationRejected => warn!(outcome = %category, "{}", detail),
                }
            }
            Outcome::Retry(e) => error!(error = %e, "Reconciliation failed, will retry"),
        }
        outcome
    }
    .instrument(span)
    .await
}

async fn run(ctx: &Reconciler, namespace: &str, name: &str) -> Outcome {
    let upload = match ctx.store.get_certificate_upload(namespace, name).await {
        Ok(Some(upload)) => upload,
        Ok(None) => {
            return Outcome::terminal(
                Category::NoOp,
                format!("CertificateUpload {namespace}/{name} no longer exists"),
            );
        }
        Err(source) => {
            return Outcome::Retry(ReconcilerError::Read {
                what: format!("CertificateUpload {namespace}/{name}"),
                source,
            });
        }
    };

    let secret_name = upload.spec.secret_name.as_str();
    let secret = match ctx.store.get_secret(namespace, secret_name).await {
        Ok(Some(secret)) => secret,
        Ok(None) => {
            let note = format!("Secret {namespace}/{secret_name} not found");
            publish_for(
                ctx.events.as_ref(),
                &upload,
                EventType::Warning,
                reasons::CERTIFICATE_NOT_FOUND,
                actions::RECONCILE,
                note.clone(),
            )
            .await;
            return Outcome::terminal(Category::AbsentDependency, note);
        }
        Err(source) => {
            return Outcome::Retry(ReconcilerError::Read {
                what: format!("Secret {namespace}/{secret_name}"),
                source,
            });
        }
    };

    let secret_type = secret.type_.as_deref().unwrap_or("Opaque");
    if secret_type != TLS_SECRET_TYPE {
        let note = format!(
            "Secret {namespace}/{secret_name} has type {secret_type}, expected {TLS_SECRET_TYPE}"
        );
        publish_for(
            ctx.events.as_ref(),
            &upload,
            EventType::Warning,
            reasons::INVALID_SECRET,
            actions::RECONCILE,
            note.clone(),
        )
        .await;
        return Outcome::terminal(Category::InvalidInput, note);
    }

    let Some(target) = upload.spec.cloudflare.as_ref() else {
        let note = "No upload target configured".to_string();
        publish_for(
            ctx.events.as_ref(),
            &upload,
            EventType::Normal,
            reasons::NO_UPLOAD_TARGET,
            actions::RECONCILE,
            note.clone(),
        )
        .await;
        return Outcome::terminal(Category::NoOp, note);
    };

    sync_to_cloudflare(ctx, namespace, &upload, &secret, target).await
}
