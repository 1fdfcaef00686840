//! # Certificate Operations
//!
//! Implementation of [`CertificateStore`] for the Cloudflare REST API.

use super::{interpret, CloudflareClient, Credential, CustomCertificateRequest, UploadResponse};
use crate::observability::metrics;
use crate::provider::{CertificateStore, ProviderError};
use async_trait::async_trait;
use reqwest::Method;
use std::time::Instant;
use tracing::{debug, info_span, warn, Instrument};

impl CloudflareClient {
    async fn send(
        &self,
        operation: &'static str,
        method: Method,
        path: String,
        credential: &Credential,
        request: &CustomCertificateRequest,
    ) -> Result<UploadResponse, ProviderError> {
        let started = Instant::now();
        debug!(
            http.method = %method,
            auth.mode = credential.mode(),
            "Sending request to Cloudflare"
        );

        let result: Result<UploadResponse, ProviderError> = async {
            let response = self
                .make_request(method, &path, credential, request)
                .send()
                .await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            debug!(http.status = status, "Cloudflare responded");
            interpret(status, &body)
        }
        .await;

        metrics::record_provider_request(operation, started.elapsed().as_secs_f64());
        if let Err(e) = &result {
            warn!(error = %e, "Cloudflare request failed");
            metrics::increment_provider_errors(e.kind());
        }
        result
    }
}

#[async_trait]
impl CertificateStore for CloudflareClient {
    async fn create_certificate(
        &self,
        zone_id: &str,
        credential: &Credential,
        request: &CustomCertificateRequest,
    ) -> Result<UploadResponse, ProviderError> {
        let span = info_span!("cloudflare.certificate.create", zone.id = zone_id);
        self.send(
            "create",
            Method::POST,
            format!("zones/{zone_id}/custom_certificates"),
            credential,
            request,
        )
        .instrument(span)
        .await
    }

    async fn update_certificate(
        &self,
        zone_id: &str,
        certificate_id: &str,
        credential: &Credential,
        request: &CustomCertificateRequest,
    ) -> Result<UploadResponse, ProviderError> {
        let span = info_span!(
            "cloudflare.certificate.update",
            zone.id = zone_id,
            certificate.id = certificate_id
        );
        self.send(
            "update",
            Method::PATCH,
            format!("zones/{zone_id}/custom_certificates/{certificate_id}"),
            credential,
            request,
        )
        .instrument(span)
        .await
    }
}
