//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use super::{env_var_opt, env_var_or_default, env_var_or_default_str};
use crate::constants::{
    DEFAULT_BACKOFF_MAX_MS, DEFAULT_BACKOFF_START_MS, DEFAULT_CLOUDFLARE_API_ENDPOINT,
    DEFAULT_CONTROLLER_NAME, DEFAULT_LEADER_ELECTION_ID, DEFAULT_LEASE_DURATION_SECS,
    DEFAULT_LEASE_RENEW_INTERVAL_SECS, DEFAULT_LEASE_RETRY_INTERVAL_SECS,
    DEFAULT_RECONCILE_BACKOFF_MAX_SECS,
    DEFAULT_RECONCILE_BACKOFF_MIN_SECS, DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS,
    DEFAULT_WATCH_RESTART_DELAY_SECS, DEFAULT_WATCH_TIMEOUT_SECS,
};
use std::time::Duration;

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Reporting component on Kubernetes Events and field manager for status patches
    pub controller_name: String,
    /// Restrict watches to a single namespace (`None` watches the whole cluster)
    pub watch_namespace: Option<String>,
    /// Cloudflare API base URL, overridden in contract tests
    pub cloudflare_api_endpoint: String,
    /// First retry delay after a retryable reconciliation error (seconds)
    pub reconcile_backoff_min_secs: u64,
    /// Retry delay cap for a resource that keeps failing (seconds)
    pub reconcile_backoff_max_secs: u64,
    /// Server-side watch timeout (seconds)
    pub watch_timeout_secs: u32,
    /// Watch-stream backoff starting value (milliseconds)
    /// Applied when the API server answers 429 while its storage reinitializes
    pub backoff_start_ms: u64,
    /// Watch-stream backoff maximum value (milliseconds)
    pub backoff_max_ms: u64,
    /// Watch stream restart delay after unknown errors (seconds)
    pub watch_restart_delay_secs: u64,
    /// Watch stream restart delay after the stream ends normally (seconds)
    pub watch_restart_delay_after_end_secs: u64,
    /// Run the controllers only while holding the leader Lease
    pub leader_election: bool,
    /// Name of the leader Lease
    pub leader_election_id: String,
    /// Namespace of the leader Lease (`None` uses the client's default namespace)
    pub leader_election_namespace: Option<String>,
    /// Holder identity written to the Lease, normally the pod name
    pub leader_identity: Option<String>,
    pub lease_duration_secs: u64,
    pub lease_renew_interval_secs: u64,
    pub lease_retry_interval_secs: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            controller_name: DEFAULT_CONTROLLER_NAME.to_string(),
            watch_namespace: None,
            cloudflare_api_endpoint: DEFAULT_CLOUDFLARE_API_ENDPOINT.to_string(),
            reconcile_backoff_min_secs: DEFAULT_RECONCILE_BACKOFF_MIN_SECS,
            reconcile_backoff_max_secs: DEFAULT_RECONCILE_BACKOFF_MAX_SECS,
            watch_timeout_secs: DEFAULT_WATCH_TIMEOUT_SECS,
            backoff_start_ms: DEFAULT_BACKOFF_START_MS,
            backoff_max_ms: DEFAULT_BACKOFF_MAX_MS,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            watch_restart_delay_after_end_secs: DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS,
            leader_election: true,
            leader_election_id: DEFAULT_LEADER_ELECTION_ID.to_string(),
            leader_election_namespace: None,
            leader_identity: None,
            lease_duration_secs: DEFAULT_LEASE_DURATION_SECS,
            lease_renew_interval_secs: DEFAULT_LEASE_RENEW_INTERVAL_SECS,
            lease_retry_interval_secs: DEFAULT_LEASE_RETRY_INTERVAL_SECS,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            controller_name: env_var_or_default_str("CONTROLLER_NAME", DEFAULT_CONTROLLER_NAME),
            watch_namespace: env_var_opt("WATCH_NAMESPACE"),
            cloudflare_api_endpoint: env_var_or_default_str(
                "CLOUDFLARE_API_ENDPOINT",
                DEFAULT_CLOUDFLARE_API_ENDPOINT,
            )
            .trim_end_matches('/')
            .to_string(),
            reconcile_backoff_min_secs: env_var_or_default(
                "RECONCILE_BACKOFF_MIN_SECS",
                DEFAULT_RECONCILE_BACKOFF_MIN_SECS,
            ),
            reconcile_backoff_max_secs: env_var_or_default(
                "RECONCILE_BACKOFF_MAX_SECS",
                DEFAULT_RECONCILE_BACKOFF_MAX_SECS,
            ),
            watch_timeout_secs: env_var_or_default(
                "WATCH_TIMEOUT_SECS",
                DEFAULT_WATCH_TIMEOUT_SECS,
            ),
            backoff_start_ms: env_var_or_default("BACKOFF_START_MS", DEFAULT_BACKOFF_START_MS),
            backoff_max_ms: env_var_or_default("BACKOFF_MAX_MS", DEFAULT_BACKOFF_MAX_MS),
            watch_restart_delay_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_SECS",
                DEFAULT_WATCH_RESTART_DELAY_SECS,
            ),
            watch_restart_delay_after_end_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_AFTER_END_SECS",
                DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS,
            ),
            leader_election: env_var_or_default("LEADER_ELECTION", true),
            leader_election_id: env_var_or_default_str(
                "LEADER_ELECTION_ID",
                DEFAULT_LEADER_ELECTION_ID,
            ),
            leader_election_namespace: env_var_opt("LEADER_ELECTION_NAMESPACE")
                .or_else(|| env_var_opt("POD_NAMESPACE")),
            leader_identity: env_var_opt("POD_NAME").or_else(|| env_var_opt("HOSTNAME")),
            lease_duration_secs: env_var_or_default(
                "LEASE_DURATION_SECS",
                DEFAULT_LEASE_DURATION_SECS,
            ),
            lease_renew_interval_secs: env_var_or_default(
                "LEASE_RENEW_INTERVAL_SECS",
                DEFAULT_LEASE_RENEW_INTERVAL_SECS,
            ),
            lease_retry_interval_secs: env_var_or_default(
                "LEASE_RETRY_INTERVAL_SECS",
                DEFAULT_LEASE_RETRY_INTERVAL_SECS,
            ),
        }
    }

    /// Identity written to the leader Lease
    ///
    /// Falls back to the controller name and process id outside a pod.
    #[must_use]
    pub fn leader_identity(&self) -> String {
        self.leader_identity
            .clone()
            .unwrap_or_else(|| format!("{}-{}", self.controller_name, std::process::id()))
    }

    /// Get watch restart delay duration
    #[must_use]
    pub fn watch_restart_delay_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }

    /// Get watch restart delay after end duration
    #[must_use]
    pub fn watch_restart_delay_after_end_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_after_end_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.controller_name, "cert-uploader");
        assert_eq!(
            config.cloudflare_api_endpoint,
            "https://api.cloudflare.com/client/v4"
        );
        assert!(config.watch_namespace.is_none());
        assert!(config.reconcile_backoff_min_secs <= config.reconcile_backoff_max_secs);
        assert!(config.watch_timeout_secs < 295);
        assert!(config.leader_election);
        assert_eq!(config.leader_election_id, "cert-uploader-controller-lock");
        assert!(config.lease_renew_interval_secs < config.lease_duration_secs);
    }

    #[test]
    fn test_leader_identity_prefers_pod_name() {
        let config = ControllerConfig {
            leader_identity: Some("cert-uploader-7d9f-abcde".to_string()),
            ..ControllerConfig::default()
        };
        assert_eq!(config.leader_identity(), "cert-uploader-7d9f-abcde");

        let fallback = ControllerConfig::default().leader_identity();
        assert!(fallback.starts_with("cert-uploader-"));
    }

    #[test]
    fn test_restart_delays_as_durations() {
        let config = ControllerConfig {
            watch_restart_delay_secs: 3,
            watch_restart_delay_after_end_secs: 2,
            ..ControllerConfig::default()
        };
        assert_eq!(config.watch_restart_delay_duration(), Duration::from_secs(3));
        assert_eq!(
            config.watch_restart_delay_after_end_duration(),
            Duration::from_secs(2)
        );
    }
}
