//! # Status Delta
//!
//! Status written after a successful upload.

use crate::crd::{CertificateUploadStatus, CloudflareUploadStatus};
use crate::provider::cloudflare::CustomCertificate;
use chrono::{DateTime, SecondsFormat, Utc};

/// Whether the upload created a new certificate or replaced an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Created,
    Updated,
}

/// Status after `certificate` was accepted for the Secret at `secret_version`
///
/// A create records the new certificate id; an update keeps the stored one.
/// Timestamps missing from the response keep their previous value.
#[must_use]
pub fn synced_status(
    previous: &CertificateUploadStatus,
    certificate: &CustomCertificate,
    kind: UploadKind,
    secret_version: Option<&str>,
    generation: Option<i64>,
) -> CertificateUploadStatus {
    let certificate_id = match kind {
        UploadKind::Created => Some(certificate.id.clone()),
        UploadKind::Updated => previous
            .certificate_id()
            .map(ToString::to_string)
            .or_else(|| Some(certificate.id.clone())),
    };

    CertificateUploadStatus {
        secret_resource_version: secret_version.map(ToString::to_string),
        upload_time: timestamp(certificate.uploaded_on.as_deref())
            .or_else(|| previous.upload_time.clone()),
        update_time: timestamp(certificate.modified_on.as_deref())
            .or_else(|| previous.update_time.clone()),
        expire_time: timestamp(certificate.expires_on.as_deref())
            .or_else(|| previous.expire_time.clone()),
        observed_generation: generation.or(previous.observed_generation),
        cloudflare: certificate_id.map(|certificate_id| CloudflareUploadStatus { certificate_id }),
    }
}

/// RFC 3339 in UTC with second precision; unparseable values are kept as sent
fn timestamp(raw: Option<&str>) -> Option<String> {
    let raw = raw.map(str::trim).filter(|raw| !raw.is_empty())?;
    Some(match DateTime::parse_from_rfc3339(raw) {
        Ok(parsed) => parsed
            .with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::Secs, true),
        Err(_) => raw.to_string(),
    })
}
