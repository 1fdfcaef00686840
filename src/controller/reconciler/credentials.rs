//! # Credential Resolution
//!
//! Turns a [`CloudflareTarget`]'s Secret references into a [`Credential`].
//! An API token takes precedence; otherwise an API key plus email is required.

use super::outcome::Category;
use crate::controller::store::{ResourceStore, StoreError};
use crate::crd::{CloudflareTarget, SecretKeyRef};
use crate::provider::cloudflare::Credential;
use thiserror::Error;
use zeroize::Zeroizing;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Credential Secret {namespace}/{name} not found")]
    SecretNotFound { namespace: String, name: String },
    #[error("Key {key} not found in credential Secret {namespace}/{name}")]
    KeyNotFound {
        namespace: String,
        name: String,
        key: String,
    },
    #[error("{0}")]
    Misconfigured(String),
    #[error("Failed to read credential Secret {namespace}/{name}: {source}")]
    Read {
        namespace: String,
        name: String,
        #[source]
        source: StoreError,
    },
}

impl CredentialError {
    /// Terminal category, or `None` when the failure is retryable
    #[must_use]
    pub fn category(&self) -> Option<Category> {
        match self {
            CredentialError::SecretNotFound { .. } | CredentialError::KeyNotFound { .. } => {
                Some(Category::AbsentDependency)
            }
            CredentialError::Misconfigured(_) => Some(Category::InvalidInput),
            CredentialError::Read { .. } => None,
        }
    }
}

/// Resolve the credential configured on `target`
///
/// # Errors
///
/// See [`CredentialError`].
pub async fn resolve_credential(
    store: &dyn ResourceStore,
    namespace: &str,
    target: &CloudflareTarget,
) -> Result<Credential, CredentialError> {
    if let Some(token_ref) = &target.api_token_secret_ref {
        let token = read_value(store, namespace, token_ref).await?;
        return Ok(Credential::ApiToken(token));
    }

    if let Some(key_ref) = &target.api_key_secret_ref {
        let email = target
            .email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
            .ok_or_else(|| {
                CredentialError::Misconfigured("apiKeySecretRef requires email".to_string())
            })?;
        let key = read_value(store, namespace, key_ref).await?;
        return Ok(Credential::ApiKey {
            email: email.to_string(),
            key,
        });
    }

    Err(CredentialError::Misconfigured(
        "neither apiTokenSecretRef nor apiKeySecretRef is set".to_string(),
    ))
}

async fn read_value(
    store: &dyn ResourceStore,
    namespace: &str,
    reference: &SecretKeyRef,
) -> Result<Zeroizing<String>, CredentialError> {
    let secret = store
        .get_secret(namespace, &reference.name)
        .await
        .map_err(|source| CredentialError::Read {
            namespace: namespace.to_string(),
            name: reference.name.clone(),
            source,
        })?
        .ok_or_else(|| CredentialError::SecretNotFound {
            namespace: namespace.to_string(),
            name: reference.name.clone(),
        })?;

    let bytes = secret
        .data
        .as_ref()
        .and_then(|data| data.get(&reference.key))
        .ok_or_else(|| CredentialError::KeyNotFound {
            namespace: namespace.to_string(),
            name: reference.name.clone(),
            key: reference.key.clone(),
        })?;

    let raw = Zeroizing::new(String::from_utf8(bytes.0.clone()).map_err(|_| {
        CredentialError::Misconfigured(format!(
            "key {} in Secret {}/{} is not valid UTF-8",
            reference.key, namespace, reference.name
        ))
    })?);
    let value = raw.trim();
    if value.is_empty() {
        return Err(CredentialError::Misconfigured(format!(
            "key {} in Secret {}/{} is empty",
            reference.key, namespace, reference.name
        )));
    }
    Ok(Zeroizing::new(value.to_string()))
}
