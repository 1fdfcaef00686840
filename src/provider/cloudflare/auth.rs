//! # Cloudflare Credentials
//!
//! API token or global API key, applied as request headers.

use reqwest::RequestBuilder;
use zeroize::Zeroizing;

/// Resolved Cloudflare credential
///
/// Secret values are zeroed on drop and never printed.
#[derive(Clone)]
pub enum Credential {
    /// Scoped API token, sent as `Authorization: Bearer`
    ApiToken(Zeroizing<String>),
    /// Global API key, sent as `X-Auth-Email` + `X-Auth-Key`
    ApiKey {
        email: String,
        key: Zeroizing<String>,
    },
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::ApiToken(_) => f.debug_tuple("ApiToken").field(&"***").finish(),
            Credential::ApiKey { email, .. } => f
                .debug_struct("ApiKey")
                .field("email", email)
                .field("key", &"***")
                .finish(),
        }
    }
}

impl Credential {
    #[must_use]
    pub fn api_token(token: impl Into<String>) -> Self {
        Credential::ApiToken(Zeroizing::new(token.into()))
    }

    #[must_use]
    pub fn api_key(email: impl Into<String>, key: impl Into<String>) -> Self {
        Credential::ApiKey {
            email: email.into(),
            key: Zeroizing::new(key.into()),
        }
    }

    /// Label for logs
    #[must_use]
    pub fn mode(&self) -> &'static str {
        match self {
            Credential::ApiToken(_) => "api-token",
            Credential::ApiKey { .. } => "api-key",
        }
    }

    pub(crate) fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Credential::ApiToken(token) => request.bearer_auth(token.as_str()),
            Credential::ApiKey { email, key } => request
                .header("X-Auth-Email", email)
                .header("X-Auth-Key", key.as_str()),
        }
    }
}
