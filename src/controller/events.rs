//! # Events
//!
//! Kubernetes Events attached to `CertificateUpload` resources, visible via
//! `kubectl describe cu <name>`.
//!
//! Publishing is fire-and-forget: a failure is logged as a warning and never
//! changes the outcome of a reconciliation.

use crate::crd::CertificateUpload;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Client, Resource};
use tracing::warn;

/// Sink for Kubernetes Events
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an Event about `resource_ref`
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    );
}

/// Publishes through `kube::runtime::events::Recorder`
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl std::fmt::Debug for KubeEventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeEventPublisher").finish_non_exhaustive()
    }
}

impl KubeEventPublisher {
    /// `controller_name` becomes the reporting component of every Event
    #[must_use]
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let event = Event {
            type_,
            reason: reason.to_string(),
            note,
            action: action.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, resource_ref).await {
            warn!(reason, action, error = %e, "Failed to publish Kubernetes event");
        }
    }
}

/// Discards every Event
#[derive(Debug, Default)]
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish(
        &self,
        _resource_ref: &ObjectReference,
        _type_: EventType,
        _reason: &str,
        _action: &str,
        _note: Option<String>,
    ) {
    }
}

/// Event reasons, shown in the REASON column of `kubectl get events`
pub mod reasons {
    pub const CERTIFICATE_UPLOADED: &str = "CertificateUploaded";
    pub const CERTIFICATE_UPDATED: &str = "CertificateUpdated";
    pub const CERTIFICATE_UNCHANGED: &str = "CertificateUnchanged";
    pub const NO_UPLOAD_TARGET: &str = "NoUploadTarget";
    pub const CERTIFICATE_NOT_FOUND: &str = "CertificateNotFound";
    pub const INVALID_SECRET: &str = "InvalidSecret";
    pub const CREDENTIAL_NOT_FOUND: &str = "CredentialNotFound";
    pub const CREDENTIAL_MISCONFIGURED: &str = "CredentialMisconfigured";
    pub const UPLOAD_FAILED: &str = "UploadFailed";
    pub const STATUS_UPDATE_FAILED: &str = "StatusUpdateFailed";
}

/// Event actions, shown in the ACTION column of `kubectl get events`
pub mod actions {
    pub const RECONCILE: &str = "Reconcile";
    pub const UPLOAD: &str = "Upload";
    pub const UPDATE_STATUS: &str = "UpdateStatus";
}

/// Publish an Event about a `CertificateUpload`
pub async fn publish_for(
    events: &dyn EventPublisher,
    upload: &CertificateUpload,
    type_: EventType,
    reason: &str,
    action: &str,
    note: impl Into<String>,
) {
    let resource_ref = upload.object_ref(&());
    events
        .publish(&resource_ref, type_, reason, action, Some(note.into()))
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::CertificateUploadSpec;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Capture(Mutex<Vec<(ObjectReference, String, Option<String>)>>);

    #[async_trait]
    impl EventPublisher for Capture {
        async fn publish(
            &self,
            resource_ref: &ObjectReference,
            _type_: EventType,
            reason: &str,
            _action: &str,
            note: Option<String>,
        ) {
            self.0
                .lock()
                .unwrap()
                .push((resource_ref.clone(), reason.to_string(), note));
        }
    }

    #[test]
    fn test_reasons_are_pascal_case() {
        for reason in [
            reasons::CERTIFICATE_UPLOADED,
            reasons::CERTIFICATE_UPDATED,
            reasons::CERTIFICATE_UNCHANGED,
            reasons::NO_UPLOAD_TARGET,
            reasons::CERTIFICATE_NOT_FOUND,
            reasons::INVALID_SECRET,
            reasons::CREDENTIAL_NOT_FOUND,
            reasons::CREDENTIAL_MISCONFIGURED,
            reasons::UPLOAD_FAILED,
            reasons::STATUS_UPDATE_FAILED,
        ] {
            assert!(reason.chars().next().unwrap().is_ascii_uppercase());
            assert!(!reason.contains(' '));
        }
    }

    #[tokio::test]
    async fn test_publish_for_targets_the_upload() {
        let mut upload = CertificateUpload::new(
            "cert-a",
            CertificateUploadSpec {
                secret_name: "tls-a".to_string(),
                cloudflare: None,
            },
        );
        upload.metadata.namespace = Some("web".to_string());

        let capture = Capture::default();
        publish_for(
            &capture,
            &upload,
            EventType::Normal,
            reasons::NO_UPLOAD_TARGET,
            actions::RECONCILE,
            "nothing to do",
        )
        .await;

        let recorded = capture.0.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        let (reference, reason, note) = &recorded[0];
        assert_eq!(reference.kind.as_deref(), Some("CertificateUpload"));
        assert_eq!(reference.name.as_deref(), Some("cert-a"));
        assert_eq!(reference.namespace.as_deref(), Some("web"));
        assert_eq!(reason, "NoUploadTarget");
        assert_eq!(note.as_deref(), Some("nothing to do"));
    }

    #[tokio::test]
    async fn test_noop_publisher_does_not_panic() {
        NoopEventPublisher
            .publish(
                &ObjectReference::default(),
                EventType::Warning,
                reasons::UPLOAD_FAILED,
                actions::UPLOAD,
                None,
            )
            .await;
    }
}
