//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! environment variables where applicable (see [`crate::config`]).

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Default name used as the event reporting component and status field manager
pub const DEFAULT_CONTROLLER_NAME: &str = "cert-uploader";

/// Default Cloudflare API base URL
pub const DEFAULT_CLOUDFLARE_API_ENDPOINT: &str = "https://api.cloudflare.com/client/v4";

/// First retry delay after a retryable reconciliation error (seconds)
pub const DEFAULT_RECONCILE_BACKOFF_MIN_SECS: u64 = 5;

/// Cap on the retry delay after repeated reconciliation errors (seconds)
pub const DEFAULT_RECONCILE_BACKOFF_MAX_SECS: u64 = 300;

/// Server-side watch timeout (seconds). Must stay below the API server's 295s limit.
pub const DEFAULT_WATCH_TIMEOUT_SECS: u32 = 290;

/// Default watch-stream backoff starting value (milliseconds)
pub const DEFAULT_BACKOFF_START_MS: u64 = 1000;

/// Default watch-stream backoff maximum value (milliseconds)
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 30_000;

/// Default delay before restarting watch stream after unknown errors (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Default delay before restarting watch stream after it ends (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS: u64 = 1;

/// Annotation stamped by `cuctl reconcile` to request a re-upload without a spec change
pub const RECONCILE_ANNOTATION: &str = "cert-uploader.dev/reconcile";

/// Secret type of a Kubernetes TLS secret
pub const TLS_SECRET_TYPE: &str = "kubernetes.io/tls";

/// Data key holding the certificate chain PEM in a TLS secret
pub const TLS_CERT_KEY: &str = "tls.crt";

/// Data key holding the private key PEM in a TLS secret
pub const TLS_PRIVATE_KEY_KEY: &str = "tls.key";

/// Default name of the Lease replicas compete for
pub const DEFAULT_LEADER_ELECTION_ID: &str = "cert-uploader-controller-lock";

/// Default lease duration (seconds)
pub const DEFAULT_LEASE_DURATION_SECS: u64 = 15;

/// Default interval between lease renewals by the leader (seconds)
pub const DEFAULT_LEASE_RENEW_INTERVAL_SECS: u64 = 5;

/// Default interval between acquisition attempts by a standby (seconds)
pub const DEFAULT_LEASE_RETRY_INTERVAL_SECS: u64 = 2;
