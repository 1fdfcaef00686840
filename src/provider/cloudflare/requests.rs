//! # Request Types
//!
//! Cloudflare custom certificate request bodies.
//!
//! API Reference: https://developers.cloudflare.com/api/resources/custom_certificates/

use crate::crd::CloudflareTarget;
use serde::{Serialize, Serializer};
use zeroize::Zeroizing;

/// Body of `POST /zones/{zone}/custom_certificates` and
/// `PATCH /zones/{zone}/custom_certificates/{id}`
///
/// The `type` hint is only accepted on create; update requests never carry it.
#[derive(Clone, Serialize)]
pub struct CustomCertificateRequest {
    /// Certificate chain PEM, verbatim from the Secret
    pub certificate: String,
    /// Private key PEM, verbatim from the Secret
    #[serde(serialize_with = "expose")]
    pub private_key: Zeroizing<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle_method: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub certificate_type: Option<String>,
}

impl std::fmt::Debug for CustomCertificateRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomCertificateRequest")
            .field("certificate_len", &self.certificate.len())
            .field("private_key", &"***")
            .field("bundle_method", &self.bundle_method)
            .field("certificate_type", &self.certificate_type)
            .finish()
    }
}

impl CustomCertificateRequest {
    /// Request for a first upload, including the certificate type hint
    #[must_use]
    pub fn create(certificate: &str, private_key: &str, target: &CloudflareTarget) -> Self {
        Self {
            certificate: certificate.to_string(),
            private_key: Zeroizing::new(private_key.to_string()),
            bundle_method: non_empty(target.bundle_method.as_deref()),
            certificate_type: non_empty(target.certificate_type.as_deref()),
        }
    }

    /// Request replacing an existing certificate; `type` is omitted
    #[must_use]
    pub fn update(certificate: &str, private_key: &str, target: &CloudflareTarget) -> Self {
        Self {
            certificate_type: None,
            ..Self::create(certificate, private_key, target)
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

fn expose<S: Serializer>(value: &Zeroizing<String>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(value.as_str())
}
