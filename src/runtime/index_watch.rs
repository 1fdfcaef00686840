//! # Index Watch
//!
//! Keeps the Secret index current from a `CertificateUpload` watch.

use crate::controller::index::ObjectKey;
use crate::controller::reconciler::Reconciler;
use crate::crd::CertificateUpload;
use crate::observability::metrics;
use futures::StreamExt;
use kube::api::Api;
use kube_runtime::watcher::{self, Event};
use kube_runtime::WatchStreamExt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Apply one watch event to the index
///
/// Initial-list items are buffered in `relist` and swapped in wholesale on
/// `InitDone`, so uploads deleted while the watch was down disappear.
pub fn apply_event(
    ctx: &Reconciler,
    relist: &mut Vec<CertificateUpload>,
    event: Event<CertificateUpload>,
) {
    match event {
        Event::Apply(upload) => {
            debug!(resource = %upload.key(), secret.name = %upload.spec.secret_name, "Indexing CertificateUpload");
            ctx.index.upsert(&upload);
        }
        Event::Delete(upload) => {
            if let Some(key) = ObjectKey::of_upload(&upload) {
                debug!(resource = %key, "Removing CertificateUpload from index");
                ctx.index.remove(&key);
                ctx.change_filter.forget(&key);
                ctx.reset_backoff(&Reconciler::backoff_key(
                    "CertificateUpload",
                    &key.namespace,
                    &key.name,
                ));
            }
        }
        Event::Init => relist.clear(),
        Event::InitApply(upload) => relist.push(upload),
        Event::InitDone => {
            ctx.index.replace_all(relist.iter());
            info!(entries = ctx.index.len(), "Secret index rebuilt from watch relist");
            relist.clear();
        }
    }
    metrics::set_secret_index_entries(ctx.index.len());
}

/// Run the index watch until shutdown
pub async fn run_index_watch(
    api: Api<CertificateUpload>,
    ctx: Arc<Reconciler>,
    watcher_config: watcher::Config,
) {
    info!("Starting Secret index watch...");
    let mut stream = watcher::watcher(api, watcher_config).default_backoff().boxed();
    let mut relist = Vec::new();

    loop {
        tokio::select! {
            () = ctx.shutdown.triggered() => {
                info!("Shutdown requested, stopping Secret index watch");
                break;
            }
            next = stream.next() => match next {
                Some(Ok(event)) => apply_event(&ctx, &mut relist, event),
                Some(Err(e)) => warn!(error = %e, "Secret index watch error, retrying with backoff"),
                None => {
                    warn!("Secret index watch stream ended");
                    break;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::events::NoopEventPublisher;
    use crate::controller::store::{ResourceStore, StoreError};
    use crate::crd::{CertificateUploadSpec, CertificateUploadStatus};
    use crate::provider::cloudflare::{CustomCertificateRequest, Credential, UploadResponse};
    use crate::provider::{CertificateStore, ProviderError};
    use async_trait::async_trait;
    use k8s_openapi::api::core::v1::Secret;

    struct Unused;

    #[async_trait]
    impl ResourceStore for Unused {
        async fn get_certificate_upload(
            &self,
            _namespace: &str,
            _name: &str,
        ) -> Result<Option<CertificateUpload>, StoreError> {
            Ok(None)
        }

        async fn get_secret(
            &self,
            _namespace: &str,
            _name: &str,
        ) -> Result<Option<Secret>, StoreError> {
            Ok(None)
        }

        async fn update_certificate_upload_status(
            &self,
            _upload: &CertificateUpload,
            _status: &CertificateUploadStatus,
        ) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[async_trait]
    impl CertificateStore for Unused {
        async fn create_certificate(
            &self,
            _zone_id: &str,
            _credential: &Credential,
            _request: &CustomCertificateRequest,
        ) -> Result<UploadResponse, ProviderError> {
            Err(ProviderError::Cancelled)
        }

        async fn update_certificate(
            &self,
            _zone_id: &str,
            _certificate_id: &str,
            _credential: &Credential,
            _request: &CustomCertificateRequest,
        ) -> Result<UploadResponse, ProviderError> {
            Err(ProviderError::Cancelled)
        }
    }

    fn ctx() -> Reconciler {
        Reconciler::new(Arc::new(Unused), Arc::new(Unused), Arc::new(NoopEventPublisher))
    }

    fn upload(name: &str, secret: &str) -> CertificateUpload {
        let mut upload = CertificateUpload::new(
            name,
            CertificateUploadSpec {
                secret_name: secret.to_string(),
                cloudflare: None,
            },
        );
        upload.metadata.namespace = Some("web".to_string());
        upload
    }

    #[test]
    fn test_apply_and_delete() {
        let ctx = ctx();
        let mut relist = Vec::new();

        apply_event(&ctx, &mut relist, Event::Apply(upload("cert-a", "tls-a")));
        assert_eq!(ctx.index.lookup("web", "tls-a").len(), 1);

        apply_event(&ctx, &mut relist, Event::Delete(upload("cert-a", "tls-a")));
        assert!(ctx.index.lookup("web", "tls-a").is_empty());
    }

    #[test]
    fn test_relist_replaces_index() {
        let ctx = ctx();
        let mut relist = Vec::new();
        apply_event(&ctx, &mut relist, Event::Apply(upload("stale", "tls-old")));

        apply_event(&ctx, &mut relist, Event::Init);
        apply_event(&ctx, &mut relist, Event::InitApply(upload("cert-a", "tls-a")));
        // Until InitDone the old view is still served
        assert_eq!(ctx.index.lookup("web", "tls-old").len(), 1);
        apply_event(&ctx, &mut relist, Event::InitDone);

        assert!(ctx.index.lookup("web", "tls-old").is_empty());
        assert_eq!(ctx.index.lookup("web", "tls-a").len(), 1);
        assert!(relist.is_empty());
    }
}
