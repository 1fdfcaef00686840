//! Secret fan-out tests
//!
//! A Secret change re-reconciles exactly the CertificateUploads that
//! reference it, in namespace/name order.

#[cfg(test)]
mod common;

use cert_uploader::controller::index::SecretIndex;
use cert_uploader::controller::reconciler::{fan_out_secret, Reconciler, ReconcilerError};
use cert_uploader::provider::ProviderError;
use common::{
    synced, tls_secret, token_secret, token_target, upload, InMemoryStore,
    RecordingCertificateStore, RecordingEvents,
};
use std::sync::Arc;

struct Harness {
    store: Arc<InMemoryStore>,
    cloudflare: Arc<RecordingCertificateStore>,
    reconciler: Reconciler,
}

/// cert-a and cert-b mirror default/tls-a, cert-c mirrors default/tls-b and
/// other/cert-d mirrors other/tls-a
fn harness() -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let cloudflare = Arc::new(RecordingCertificateStore::new());
    let index = SecretIndex::new();

    let mut uploads = Vec::new();
    for (ns, name, secret_name, id) in [
        ("default", "cert-a", "tls-a", "cf123"),
        ("default", "cert-b", "tls-a", "cf456"),
        ("default", "cert-c", "tls-b", "cf789"),
        ("other", "cert-d", "tls-a", "cf000"),
    ] {
        let mut cu = upload(ns, name, secret_name, Some(token_target()));
        cu.status = Some(synced("5", id));
        uploads.push(cu);
    }
    index.replace_all(&uploads);
    for cu in uploads {
        store.put_upload(cu);
    }

    store.put_secret(tls_secret("default", "tls-a", "6"));
    store.put_secret(tls_secret("default", "tls-b", "5"));
    store.put_secret(tls_secret("other", "tls-a", "5"));
    store.put_secret(token_secret("default"));
    store.put_secret(token_secret("other"));

    let reconciler = Reconciler::new(
        Arc::clone(&store) as _,
        Arc::clone(&cloudflare) as _,
        Arc::new(RecordingEvents::new()),
    )
    .with_index(index);

    Harness {
        store,
        cloudflare,
        reconciler,
    }
}

#[tokio::test]
async fn test_secret_change_updates_every_referencing_upload() {
    let h = harness();

    let reconciled = fan_out_secret(&h.reconciler, "default", "tls-a")
        .await
        .expect("fan-out succeeds");
    assert_eq!(reconciled, 2);

    let calls = h.cloudflare.calls();
    let updated: Vec<_> = calls
        .iter()
        .map(|c| (c.operation, c.certificate_id.as_deref().unwrap_or_default()))
        .collect();
    assert_eq!(updated, vec![("update", "cf123"), ("update", "cf456")]);

    for name in ["cert-a", "cert-b"] {
        let status = h.store.status("default", name).expect("status");
        assert_eq!(status.secret_resource_version.as_deref(), Some("6"));
    }
    // Untouched: different Secret, and same Secret name in another namespace
    assert_eq!(
        h.store
            .status("default", "cert-c")
            .and_then(|s| s.secret_resource_version),
        Some("5".to_string())
    );
    assert_eq!(
        h.store
            .status("other", "cert-d")
            .and_then(|s| s.secret_resource_version),
        Some("5".to_string())
    );
}

#[tokio::test]
async fn test_unchanged_secret_fans_out_without_uploads() {
    let h = harness();

    let reconciled = fan_out_secret(&h.reconciler, "default", "tls-b")
        .await
        .expect("fan-out succeeds");
    assert_eq!(reconciled, 1);
    assert!(h.cloudflare.calls().is_empty());
}

#[tokio::test]
async fn test_unreferenced_secret_reconciles_nothing() {
    let h = harness();

    let reconciled = fan_out_secret(&h.reconciler, "default", "unrelated")
        .await
        .expect("fan-out succeeds");
    assert_eq!(reconciled, 0);
    assert!(h.cloudflare.calls().is_empty());
}

#[tokio::test]
async fn test_fan_out_stops_at_first_retryable_failure() {
    let h = harness();
    h.cloudflare.respond_with(Err(ProviderError::Status {
        status: 502,
        body: "bad gateway".to_string(),
    }));

    let result = fan_out_secret(&h.reconciler, "default", "tls-a").await;
    assert!(matches!(
        result,
        Err(ReconcilerError::Provider(ProviderError::Status { status: 502, .. }))
    ));

    // cert-b was never attempted
    let calls = h.cloudflare.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].certificate_id.as_deref(), Some("cf123"));
    assert_eq!(
        h.store
            .status("default", "cert-b")
            .and_then(|s| s.secret_resource_version),
        Some("5".to_string())
    );

    // The retried Secret event finishes the job
    let reconciled = fan_out_secret(&h.reconciler, "default", "tls-a")
        .await
        .expect("retry succeeds");
    assert_eq!(reconciled, 2);
    assert_eq!(h.cloudflare.calls().len(), 3);
}
