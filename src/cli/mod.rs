//! # cuctl
//!
//! Command-line companion for the cert-uploader controller.
//!
//! ```bash
//! # List CertificateUploads in the current namespace or everywhere
//! cuctl list
//! cuctl list --all-namespaces
//!
//! # Show the synchronized state of one resource
//! cuctl status cert-a --namespace default
//!
//! # Ask the controller to re-evaluate one resource
//! cuctl reconcile cert-a
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kube::Client;

mod list;
mod reconcile;
mod status;

/// cert-uploader CLI
#[derive(Parser)]
#[command(name = "cuctl")]
#[command(
    about = "Inspect and trigger CertificateUpload resources",
    long_about = None,
    after_help = "\
Examples:
  cuctl list -A
  cuctl status cert-a --namespace default
  cuctl reconcile cert-a
"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Kubernetes namespace (defaults to \"default\")
    #[arg(short, long, global = true)]
    namespace: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List CertificateUpload resources
    List {
        /// List across all namespaces
        #[arg(short = 'A', long)]
        all_namespaces: bool,
    },
    /// Show status of a CertificateUpload resource
    Status {
        /// Name of the CertificateUpload resource
        #[arg(value_name = "NAME")]
        name: String,
    },
    /// Trigger reconciliation for a CertificateUpload resource
    ///
    /// Stamps the reconcile annotation so the controller re-evaluates the
    /// resource outside of Secret or spec changes.
    Reconcile {
        /// Name of the CertificateUpload resource
        #[arg(value_name = "NAME")]
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Must happen before the Kubernetes client opens a TLS connection
    let _ = rustls::crypto::ring::default_provider().install_default();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cuctl=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client. Ensure kubeconfig is configured.")?;

    match cli.command {
        Commands::List { all_namespaces } => {
            let namespace = if all_namespaces {
                None
            } else {
                Some(cli.namespace.unwrap_or_else(|| "default".to_string()))
            };
            list::list_command(client, namespace).await
        }
        Commands::Status { name } => status::status_command(client, name, cli.namespace).await,
        Commands::Reconcile { name } => {
            reconcile::reconcile_command(client, name, cli.namespace).await
        }
    }
}
