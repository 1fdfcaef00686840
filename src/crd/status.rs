//! # CertificateUpload Status
//!
//! System-owned record of the last successful upload.

use serde::{Deserialize, Serialize};

/// Status of the CertificateUpload resource
///
/// Only written after a successful upload. Timestamps are RFC 3339 strings
/// taken from the provider's response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CertificateUploadStatus {
    /// `metadata.resourceVersion` of the Secret that was last uploaded
    /// Opaque, compared for equality only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_resource_version: Option<String>,
    /// When the provider first received the certificate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_time: Option<String>,
    /// When the provider last modified the certificate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
    /// When the uploaded certificate expires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_time: Option<String>,
    /// Generation of the spec that produced this status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    /// Cloudflare-specific state, present once an upload has succeeded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloudflare: Option<CloudflareUploadStatus>,
}

/// Cloudflare upload state
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CloudflareUploadStatus {
    /// Custom certificate identifier assigned by Cloudflare
    pub certificate_id: String,
}

impl CertificateUploadStatus {
    /// Identifier of the uploaded certificate, if one was ever created
    #[must_use]
    pub fn certificate_id(&self) -> Option<&str> {
        self.cloudflare
            .as_ref()
            .map(|c| c.certificate_id.as_str())
            .filter(|id| !id.is_empty())
    }
}
