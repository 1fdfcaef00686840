//! # CertificateUpload Spec
//!
//! Desired state: which TLS Secret to mirror and where to upload it.

use serde::{Deserialize, Serialize};

/// CertificateUpload Custom Resource Definition
///
/// Mirrors a namespace-local `kubernetes.io/tls` Secret to a Cloudflare zone
/// as a custom certificate. Every change to the Secret is re-uploaded.
///
/// # Example
///
/// ```yaml
/// apiVersion: cert-uploader.dev/v1alpha1
/// kind: CertificateUpload
/// metadata:
///   name: cert-a
///   namespace: default
/// spec:
///   secretName: tls-a
///   cloudflare:
///     zoneId: 023e105f4ecef8ad9ca31a8372d0c353
///     apiTokenSecretRef:
///       name: cloudflare-token
///       key: api-token
///     bundleMethod: ubiquitous
/// ```
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "CertificateUpload",
    group = "cert-uploader.dev",
    version = "v1alpha1",
    namespaced,
    status = "crate::crd::CertificateUploadStatus",
    shortname = "cu",
    printcolumn = r#"{"name":"Secret", "type":"string", "jsonPath":".spec.secretName"}, {"name":"Certificate", "type":"string", "jsonPath":".status.cloudflare.certificateId"}, {"name":"Synced", "type":"string", "jsonPath":".status.secretResourceVersion"}, {"name":"Expires", "type":"string", "jsonPath":".status.expireTime"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct CertificateUploadSpec {
    /// Name of the `kubernetes.io/tls` Secret in the same namespace
    pub secret_name: String,
    /// Cloudflare upload target
    /// When absent the resource is accepted but nothing is uploaded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloudflare: Option<CloudflareTarget>,
}

/// Cloudflare custom certificate target
///
/// Exactly one credential is used. `apiTokenSecretRef` takes precedence;
/// otherwise `apiKeySecretRef` together with `email` is required.
#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CloudflareTarget {
    /// Zone the certificate is uploaded to
    pub zone_id: String,
    /// Account email, paired with `apiKeySecretRef`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Secret key holding a scoped API token (sent as a bearer token)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token_secret_ref: Option<SecretKeyRef>,
    /// Secret key holding a global API key (sent with `email`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_secret_ref: Option<SecretKeyRef>,
    /// Chain bundling strategy: ubiquitous, optimal or force
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_method: Option<String>,
    /// Certificate type hint, e.g. `sni_custom` or `legacy_custom`
    /// Only sent when the certificate is first created
    #[serde(
        default,
        rename = "type",
        skip_serializing_if = "Option::is_none"
    )]
    pub certificate_type: Option<String>,
}

/// Reference to one key of a Secret in the resource's namespace
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub struct SecretKeyRef {
    /// Secret name
    pub name: String,
    /// Key within the Secret's data
    pub key: String,
}

impl CertificateUpload {
    /// `namespace/name` of this resource, for logs and index keys
    #[must_use]
    pub fn key(&self) -> String {
        format!(
            "{}/{}",
            self.metadata.namespace.as_deref().unwrap_or("default"),
            self.metadata.name.as_deref().unwrap_or("unknown")
        )
    }
}
