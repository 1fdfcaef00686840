//! # Controller Configuration
//!
//! Controller-level configuration loaded from environment variables.
//!
//! All configuration has sensible defaults and can be overridden via environment variables.
//! Environment variables are populated from a ConfigMap using `envFrom` in the deployment.

mod controller;
mod server;

pub use controller::ControllerConfig;
pub use server::ServerConfig;

use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared controller configuration
pub type SharedControllerConfig = Arc<RwLock<ControllerConfig>>;

/// Shared server configuration
pub type SharedServerConfig = Arc<RwLock<ServerConfig>>;

/// Load configuration from environment variables with defaults
#[must_use]
pub fn load_config() -> (ControllerConfig, ServerConfig) {
    (ControllerConfig::from_env(), ServerConfig::from_env())
}

/// Create shared configuration instances
#[must_use]
pub fn create_shared_config() -> (SharedControllerConfig, SharedServerConfig) {
    let (controller_config, server_config) = load_config();
    (
        Arc::new(RwLock::new(controller_config)),
        Arc::new(RwLock::new(server_config)),
    )
}

/// Read environment variable or return default value
///
/// Unparseable values fall back to the default.
pub(crate) fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as string or return default
pub(crate) fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read an optional environment variable, treating empty values as unset
pub(crate) fn env_var_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_or_default_parses_value() {
        std::env::set_var("CERT_UPLOADER_TEST_PARSE", " 42 ");
        assert_eq!(env_var_or_default("CERT_UPLOADER_TEST_PARSE", 7u64), 42);
    }

    #[test]
    fn test_env_var_or_default_falls_back_on_garbage() {
        std::env::set_var("CERT_UPLOADER_TEST_GARBAGE", "forty-two");
        assert_eq!(env_var_or_default("CERT_UPLOADER_TEST_GARBAGE", 7u64), 7);
    }

    #[test]
    fn test_env_var_or_default_missing() {
        assert_eq!(
            env_var_or_default("CERT_UPLOADER_TEST_DOES_NOT_EXIST", 5000u16),
            5000
        );
    }

    #[test]
    fn test_env_var_opt_empty_is_none() {
        std::env::set_var("CERT_UPLOADER_TEST_EMPTY", "   ");
        assert_eq!(env_var_opt("CERT_UPLOADER_TEST_EMPTY"), None);
        std::env::set_var("CERT_UPLOADER_TEST_SET", "certs");
        assert_eq!(
            env_var_opt("CERT_UPLOADER_TEST_SET").as_deref(),
            Some("certs")
        );
    }
}
