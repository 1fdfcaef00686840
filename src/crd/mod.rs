//! # Custom Resource Definitions
//!
//! CRD types for the certificate uploader.
//!
//! ## Module Structure
//!
//! - `spec.rs` - `CertificateUpload` specification and upload target configuration
//! - `status.rs` - Status recording the last synchronized Secret version

mod spec;
mod status;

pub use spec::{CertificateUpload, CertificateUploadSpec, CloudflareTarget, SecretKeyRef};
pub use status::{CertificateUploadStatus, CloudflareUploadStatus};
