//! # Controller
//!
//! - `backoff`: Fibonacci backoff for retries
//! - `events`: Kubernetes Events on `CertificateUpload` resources
//! - `index`: Secret to `CertificateUpload` reverse index
//! - `leader_election`: Lease-based leader election between replicas
//! - `reconciler`: reconciliation and upload logic
//! - `server`: HTTP server for metrics and health checks
//! - `shutdown`: shutdown broadcast for in-flight uploads
//! - `store`: Kubernetes reads and status writes

pub mod backoff;
pub mod events;
pub mod index;
pub mod leader_election;
pub mod reconciler;
pub mod server;
pub mod shutdown;
pub mod store;
