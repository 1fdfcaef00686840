//! # CRD Generator
//!
//! Prints the `CertificateUpload` CustomResourceDefinition as YAML.
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/certificateupload.yaml
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use anyhow::{Context, Result};
use cert_uploader::crd::CertificateUpload;
use kube::core::CustomResourceExt;

fn main() -> Result<()> {
    let crd = serde_yaml::to_string(&CertificateUpload::crd())
        .context("Failed to serialize CertificateUpload CRD")?;
    print!("{crd}");
    Ok(())
}
