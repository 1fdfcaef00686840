//! # Initialization
//!
//! Controller startup: rustls, tracing, metrics, HTTP server, Kubernetes
//! client, reconciler context, leader elector and the initial Secret index.

use crate::config::{
    create_shared_config, ControllerConfig, SharedControllerConfig, SharedServerConfig,
};
use crate::controller::events::KubeEventPublisher;
use crate::controller::leader_election::LeaderElector;
use crate::controller::reconciler::Reconciler;
use crate::controller::server::{start_server, ServerState};
use crate::controller::shutdown::{ShutdownSignal, ShutdownTrigger};
use crate::controller::store::KubeStore;
use crate::crd::CertificateUpload;
use crate::observability;
use crate::provider::cloudflare::CloudflareClient;
use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::Secret;
use kube::{api::Api, api::ListParams, Client};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, info_span, warn, Instrument};

/// Everything the watch loop needs
pub struct InitializationResult {
    pub uploads: Api<CertificateUpload>,
    pub secrets: Api<Secret>,
    pub reconciler: Arc<Reconciler>,
    pub server_state: Arc<ServerState>,
    pub shutdown: ShutdownTrigger,
    pub otel_tracer_provider: Option<observability::otel::TracerProviderHandle>,
    pub controller_config: SharedControllerConfig,
    /// `None` when leader election is disabled
    pub leader: Option<Arc<LeaderElector>>,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.is_ready())
            .field("reconciler", &self.reconciler)
            .field("leader", &self.leader)
            .finish_non_exhaustive()
    }
}

/// Initialize the controller runtime
///
/// # Errors
///
/// Fails if the HTTP server does not come up, the Kubernetes client cannot be
/// created or the Cloudflare client cannot be built.
pub async fn initialize() -> Result<InitializationResult> {
    // Must run before anything opens a TLS connection; an already installed provider is fine
    let _ = rustls::crypto::ring::default_provider().install_default();

    let otel_tracer_provider =
        observability::otel::init_otel().context("Failed to initialize OpenTelemetry")?;

    if let Err(e) = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cert_uploader=info".into()),
        )
        .try_init()
    {
        // datadog-opentelemetry may already have installed a subscriber
        warn!("Tracing subscriber init returned error: {}", e);
    }

    info!("Starting cert-uploader v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    observability::metrics::register_metrics()?;

    let (controller_config, server_config) = create_shared_config();
    let server_state = Arc::new(ServerState::new());

    let server_port = server_config.read().await.metrics_port;
    let server_state_clone = server_state.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });
    wait_for_server_ready(&server_state, &server_handle, server_config).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let config = controller_config.read().await.clone();
    info!(
        controller = config.controller_name.as_str(),
        namespace = config.watch_namespace.as_deref().unwrap_or("<all>"),
        endpoint = config.cloudflare_api_endpoint.as_str(),
        "Controller configuration loaded"
    );

    let (uploads, secrets): (Api<CertificateUpload>, Api<Secret>) = match &config.watch_namespace
    {
        Some(namespace) => (
            Api::namespaced(client.clone(), namespace),
            Api::namespaced(client.clone(), namespace),
        ),
        None => (Api::all(client.clone()), Api::all(client.clone())),
    };

    let cloudflare = CloudflareClient::new(config.cloudflare_api_endpoint.as_str())
        .context("Failed to build Cloudflare client")?;
    let (shutdown, shutdown_signal) = ShutdownSignal::channel();
    let reconciler = Reconciler::new(
        Arc::new(KubeStore::new(client.clone(), config.controller_name.as_str())),
        Arc::new(cloudflare),
        Arc::new(KubeEventPublisher::new(client.clone(), &config.controller_name)),
    )
    .with_shutdown(shutdown_signal)
    .with_backoff(
        config.reconcile_backoff_min_secs,
        config.reconcile_backoff_max_secs,
    );
    let reconciler = Arc::new(reconciler);
    let leader = leader_elector(&client, &config);

    build_initial_index(&uploads, &reconciler)
        .instrument(info_span!(
            "controller.startup.build_index",
            operation = "build_initial_index"
        ))
        .await;

    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        uploads,
        secrets,
        reconciler,
        server_state,
        shutdown,
        otel_tracer_provider,
        controller_config,
        leader,
    })
}

/// Build the leader elector unless leader election is disabled
///
/// The Lease lives in `LEADER_ELECTION_NAMESPACE`, else the pod's namespace.
fn leader_elector(client: &Client, config: &ControllerConfig) -> Option<Arc<LeaderElector>> {
    if !config.leader_election {
        warn!("Leader election disabled, run a single replica only");
        return None;
    }
    let namespace = config
        .leader_election_namespace
        .clone()
        .unwrap_or_else(|| client.default_namespace().to_string());
    let identity = config.leader_identity();
    info!(
        lease = config.leader_election_id.as_str(),
        namespace = namespace.as_str(),
        identity = identity.as_str(),
        "Leader election enabled"
    );
    let elector = LeaderElector::new(
        client.clone(),
        &config.leader_election_id,
        &namespace,
        &identity,
    )
    .with_timing(
        Duration::from_secs(config.lease_duration_secs),
        Duration::from_secs(config.lease_renew_interval_secs),
        Duration::from_secs(config.lease_retry_interval_secs),
    );
    Some(Arc::new(elector))
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
    server_config: SharedServerConfig,
) -> Result<()> {
    let config = server_config.read().await;
    let startup_timeout = config.startup_timeout();
    let poll_interval = config.poll_interval();
    drop(config);
    let start_time = std::time::Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }
        if server_state.is_ready() {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }
        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }
        tokio::time::sleep(poll_interval).await;
    }
}

/// List existing uploads, seed the Secret index and log a startup summary
async fn build_initial_index(uploads: &Api<CertificateUpload>, reconciler: &Arc<Reconciler>) {
    let list = match uploads.list(&ListParams::default()).await {
        Ok(list) => list,
        Err(e) => {
            error!("CRD is not queryable; {:?}. Is the CRD installed?", e);
            error!("Installation: crdgen | kubectl apply -f -");
            warn!("Continuing with an empty Secret index, the index watch will fill it");
            return;
        }
    };

    reconciler.index.replace_all(list.items.iter());
    observability::metrics::set_secret_index_entries(reconciler.index.len());

    if list.items.is_empty() {
        info!("No existing CertificateUpload resources found, watch will pick up new resources");
        return;
    }

    let mut by_namespace: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for item in &list.items {
        by_namespace
            .entry(item.metadata.namespace.as_deref().unwrap_or("default"))
            .or_default()
            .push(item.metadata.name.as_deref().unwrap_or("unknown"));
    }

    info!("cert-uploader - Startup Resource Summary");
    info!("Resource Kind: CertificateUpload");
    info!("Total Resources: {}", list.items.len());
    info!("Namespaces: {}", by_namespace.len());
    for (namespace, names) in &mut by_namespace {
        names.sort_unstable();
        let shown = if names.len() <= 3 {
            names.join(", ")
        } else {
            format!("{}, ... ({} total)", names[..3].join(", "), names.len())
        };
        info!("Namespace: {}", namespace);
        info!("  Resources ({}): {}", names.len(), shown);
    }
}
