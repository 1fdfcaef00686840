//! cert-uploader library
//!
//! Keeps Cloudflare custom certificates in sync with Kubernetes TLS Secrets.
//! A `CertificateUpload` resource names the Secret to mirror and the zone to
//! upload it to; the controller uploads on creation, and re-uploads every time
//! the Secret changes.
//!
//! ## Quick Start
//!
//! ```rust
//! use cert_uploader::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod provider;
pub mod runtime;
