//! # Response Types
//!
//! Cloudflare API v4 response envelope for custom certificate operations.
//!
//! ```json
//! {
//!   "success": true,
//!   "errors": [],
//!   "messages": [],
//!   "result": { "id": "...", "uploaded_on": "...", "modified_on": "...", "expires_on": "..." }
//! }
//! ```

use crate::provider::ProviderError;
use serde::Deserialize;

/// Longest response body excerpt kept in an error message
const BODY_EXCERPT_LEN: usize = 512;

/// API v4 envelope
#[derive(Debug, Deserialize)]
pub struct CustomCertificateResponse {
    #[serde(default)]
    pub success: bool,
    /// Cloudflare sends `null` or omits the field when there are no errors
    #[serde(default)]
    pub errors: Option<Vec<ApiError>>,
    #[serde(default)]
    pub result: Option<CustomCertificate>,
}

/// One entry of the envelope's `errors` list
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiError {
    pub code: i64,
    pub message: String,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Custom certificate as returned by create and update
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CustomCertificate {
    pub id: String,
    #[serde(default)]
    pub hosts: Vec<String>,
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub bundle_method: Option<String>,
    #[serde(default)]
    pub zone_id: Option<String>,
    #[serde(default)]
    pub uploaded_on: Option<String>,
    #[serde(default)]
    pub modified_on: Option<String>,
    #[serde(default)]
    pub expires_on: Option<String>,
    #[serde(default)]
    pub priority: Option<i64>,
}

/// Interpreted answer to an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadResponse {
    /// The provider stored the certificate
    Accepted(CustomCertificate),
    /// The provider understood the request and refused it
    Rejected(Vec<ApiError>),
}

/// Render an error list for events and logs
#[must_use]
pub fn render_errors(errors: &[ApiError]) -> String {
    if errors.is_empty() {
        return "no error details".to_string();
    }
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Classify an HTTP answer
///
/// - 5xx and 429 are always retryable, whatever the body says
/// - a decodable body with a non-empty `errors` list is a rejection
/// - any other non-2xx answer is retryable
/// - a 2xx answer must carry a `result`
///
/// # Errors
///
/// Returns [`ProviderError::Status`] or [`ProviderError::Decode`] for answers
/// that should be retried.
pub fn interpret(status: u16, body: &str) -> Result<UploadResponse, ProviderError> {
    let success_status = (200..300).contains(&status);
    if status >= 500 || status == 429 {
        return Err(ProviderError::Status {
            status,
            body: excerpt(body),
        });
    }

    let parsed: CustomCertificateResponse = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(_) if !success_status => {
            return Err(ProviderError::Status {
                status,
                body: excerpt(body),
            });
        }
        Err(e) => return Err(ProviderError::Decode(e.to_string())),
    };

    let errors = parsed.errors.unwrap_or_default();
    if !errors.is_empty() {
        return Ok(UploadResponse::Rejected(errors));
    }
    if !success_status {
        return Err(ProviderError::Status {
            status,
            body: excerpt(body),
        });
    }

    match parsed.result {
        Some(result) if parsed.success && !result.id.is_empty() => {
            Ok(UploadResponse::Accepted(result))
        }
        Some(_) => Err(ProviderError::Decode(
            "response reported failure without an error list".to_string(),
        )),
        None => Err(ProviderError::Decode(
            "response carried no result".to_string(),
        )),
    }
}

fn excerpt(body: &str) -> String {
    match body.char_indices().nth(BODY_EXCERPT_LEN) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
