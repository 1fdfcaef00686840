//! # Certificate Material
//!
//! Reads `tls.crt` and `tls.key` out of a TLS Secret.

use crate::constants::{TLS_CERT_KEY, TLS_PRIVATE_KEY_KEY};
use k8s_openapi::api::core::v1::Secret;
use thiserror::Error;
use zeroize::Zeroizing;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MaterialError {
    #[error("Secret has no {0} key")]
    MissingKey(&'static str),
    #[error("Secret key {0} is not valid UTF-8")]
    NotUtf8(&'static str),
}

/// Certificate chain and private key, verbatim from the Secret
pub struct CertificateMaterial {
    pub certificate: String,
    pub private_key: Zeroizing<String>,
}

impl std::fmt::Debug for CertificateMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateMaterial")
            .field("certificate_len", &self.certificate.len())
            .field("private_key", &"***")
            .finish()
    }
}

impl CertificateMaterial {
    /// # Errors
    ///
    /// Fails when either key is missing or holds non-UTF-8 bytes.
    pub fn from_secret(secret: &Secret) -> Result<Self, MaterialError> {
        let certificate = read_key(secret, TLS_CERT_KEY)?;
        let private_key = Zeroizing::new(read_key(secret, TLS_PRIVATE_KEY_KEY)?);
        Ok(Self {
            certificate,
            private_key,
        })
    }
}

fn read_key(secret: &Secret, key: &'static str) -> Result<String, MaterialError> {
    let bytes = secret
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .ok_or(MaterialError::MissingKey(key))?;
    String::from_utf8(bytes.0.clone()).map_err(|_| MaterialError::NotUtf8(key))
}
