//! # Provider Modules
//!
//! External certificate stores the controller uploads to.
//!
//! Each store implements [`CertificateStore`]. The reconciler only sees the
//! trait, so tests substitute an in-memory store.

use async_trait::async_trait;
use thiserror::Error;

pub mod cloudflare;

use cloudflare::{Credential, CustomCertificateRequest, UploadResponse};

/// Failure to obtain a usable answer from the certificate store
///
/// Every variant is transient from the reconciler's point of view. A response
/// that carries an application error list is not an error here; it is
/// [`UploadResponse::Rejected`].
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Connection, TLS or body read failure
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// Non-2xx answer without an application error list
    #[error("Provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    /// Body could not be understood
    #[error("Failed to decode provider response: {0}")]
    Decode(String),
    /// Shutdown interrupted the request before it completed
    #[error("Request cancelled by shutdown")]
    Cancelled,
}

impl ProviderError {
    /// Short label used for metrics
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::Transport(_) => "transport",
            ProviderError::Status { .. } => "status",
            ProviderError::Decode(_) => "decode",
            ProviderError::Cancelled => "cancelled",
        }
    }
}

/// Custom certificate store consumed by the upload engine
#[async_trait]
pub trait CertificateStore: Send + Sync {
    /// Upload a new certificate to `zone_id`
    async fn create_certificate(
        &self,
        zone_id: &str,
        credential: &Credential,
        request: &CustomCertificateRequest,
    ) -> Result<UploadResponse, ProviderError>;

    /// Replace the certificate and key of an existing custom certificate
    async fn update_certificate(
        &self,
        zone_id: &str,
        certificate_id: &str,
        credential: &Credential,
        request: &CustomCertificateRequest,
    ) -> Result<UploadResponse, ProviderError>;
}
