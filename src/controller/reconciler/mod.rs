//! # Reconciler
//!
//! Turns a `CertificateUpload` plus its TLS Secret into a Cloudflare custom
//! certificate.
//!
//! - `reconcile`: one pass for one resource (load, validate, delegate)
//! - `upload`: idempotency check, create-or-update, status write
//! - `fanout`: re-runs every resource referencing a changed Secret
//! - `filter`: skips passes triggered only by status writes
//! - `credentials`, `secret`, `status`: inputs and outputs of an upload

mod credentials;
mod fanout;
mod filter;
mod outcome;
mod reconcile;
mod secret;
mod status;
mod types;
mod upload;

pub use credentials::{resolve_credential, CredentialError};
pub use fanout::fan_out_secret;
pub use filter::{ChangeFilter, ChangeMark};
pub use outcome::{Category, Outcome};
pub use reconcile::reconcile_upload;
pub use secret::{CertificateMaterial, MaterialError};
pub use status::{synced_status, UploadKind};
pub use types::{BackoffState, Reconciler, ReconcilerError, UploadGuard};
