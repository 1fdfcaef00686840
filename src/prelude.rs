//! # Prelude
//!
//! Re-exports commonly used types and traits.
//!
//! ```rust
//! use cert_uploader::prelude::*;
//! ```

// CRD types
pub use crate::crd::*;

// Provider seam and the Cloudflare implementation
pub use crate::provider::cloudflare::{CloudflareClient, Credential};
pub use crate::provider::{CertificateStore, ProviderError};

// Reconciler types
pub use crate::controller::reconciler::{
    fan_out_secret, reconcile_upload, Category, Outcome, Reconciler, ReconcilerError,
};

// Kubernetes seams
pub use crate::controller::events::{EventPublisher, KubeEventPublisher};
pub use crate::controller::store::{KubeStore, ResourceStore, StoreError};

// Config types
pub use crate::config::{
    ControllerConfig, ServerConfig, SharedControllerConfig, SharedServerConfig,
};
