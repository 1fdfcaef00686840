//! # Resource Store
//!
//! Kubernetes reads and status writes used by the reconciler, behind a trait so
//! integration tests can run against an in-memory store.

use crate::crd::{CertificateUpload, CertificateUploadStatus};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, Patch, PatchParams};
use kube::Client;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The object changed since it was read; the write was rejected
    #[error("Conflicting write to {0}")]
    Conflict(String),
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),
}

impl StoreError {
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

/// Reads and conditional writes against the cluster
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetch a `CertificateUpload`; `Ok(None)` when it does not exist
    async fn get_certificate_upload(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<CertificateUpload>, StoreError>;

    /// Fetch a `Secret`; `Ok(None)` when it does not exist
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, StoreError>;

    /// Replace the status of `upload`
    ///
    /// The write is conditional on `upload.metadata.resourceVersion`; a stale
    /// write fails with [`StoreError::Conflict`].
    async fn update_certificate_upload_status(
        &self,
        upload: &CertificateUpload,
        status: &CertificateUploadStatus,
    ) -> Result<(), StoreError>;
}

/// [`ResourceStore`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
    field_manager: String,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore")
            .field("field_manager", &self.field_manager)
            .finish_non_exhaustive()
    }
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn get_certificate_upload(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<CertificateUpload>, StoreError> {
        let api: Api<CertificateUpload> = Api::namespaced(self.client.clone(), namespace);
        match api.get(name).await {
            Ok(upload) => Ok(Some(upload)),
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, StoreError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        match api.get(name).await {
            Ok(secret) => Ok(Some(secret)),
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_certificate_upload_status(
        &self,
        upload: &CertificateUpload,
        status: &CertificateUploadStatus,
    ) -> Result<(), StoreError> {
        let namespace = upload.metadata.namespace.as_deref().unwrap_or("default");
        let name = upload.metadata.name.as_deref().unwrap_or("unknown");
        let api: Api<CertificateUpload> = Api::namespaced(self.client.clone(), namespace);

        let patch = status_patch(upload, status);
        debug!(
            resource.namespace = namespace,
            resource.name = name,
            "Patching CertificateUpload status"
        );
        match api
            .patch_status(
                name,
                &PatchParams::apply(&self.field_manager),
                &Patch::Merge(patch),
            )
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(e)) if e.code == 409 => {
                Err(StoreError::Conflict(format!("{namespace}/{name}")))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Merge patch carrying the resourceVersion precondition
fn status_patch(
    upload: &CertificateUpload,
    status: &CertificateUploadStatus,
) -> serde_json::Value {
    serde_json::json!({
        "metadata": {
            "resourceVersion": upload.metadata.resource_version,
        },
        "status": status,
    })
}
