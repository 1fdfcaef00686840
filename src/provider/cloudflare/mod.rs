//! Cloudflare Custom Certificate Client
//!
//! REST client for the zone-level custom certificate API (`/zones/{zone}/custom_certificates`).
//! Uses reqwest with rustls, so the base URL can point at a Pact mock server in tests.
//!
//! References:
//! - [Custom certificates API](https://developers.cloudflare.com/api/resources/custom_certificates/)

mod auth;
mod operations;
mod requests;
mod responses;

pub use auth::Credential;
pub use requests::CustomCertificateRequest;
pub use responses::{
    interpret, render_errors, ApiError, CustomCertificate, CustomCertificateResponse,
    UploadResponse,
};

use crate::provider::ProviderError;
use reqwest::{Client, Method};
use tracing::info;

/// Cloudflare API v4 client
#[derive(Clone)]
pub struct CloudflareClient {
    http_client: Client,
    base_url: String,
}

impl std::fmt::Debug for CloudflareClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl CloudflareClient {
    /// Create a client for the given API base URL
    /// (`https://api.cloudflare.com/client/v4` in production)
    ///
    /// The client sets no request timeout. Requests are bounded by shutdown
    /// cancellation in the upload engine.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ProviderError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http_client = Client::builder()
            .user_agent(concat!("cert-uploader/", env!("CARGO_PKG_VERSION")))
            .build()?;

        info!("Initialized Cloudflare client for endpoint: {}", base_url);

        Ok(Self {
            http_client,
            base_url,
        })
    }

    /// Get the base URL
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build an authenticated JSON request
    pub(crate) fn make_request(
        &self,
        method: Method,
        path: &str,
        credential: &Credential,
        body: &CustomCertificateRequest,
    ) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        credential.apply(self.http_client.request(method, url)).json(body)
    }
}
