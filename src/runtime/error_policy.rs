//! # Error Policy
//!
//! Requeue policy for failed reconciliations and classification of watch
//! stream errors.

use crate::controller::reconciler::{Reconciler, ReconcilerError};
use crate::observability::metrics;
use kube::Resource;
use kube_runtime::controller::{self, Action};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn, Instrument};

/// Requeue a failed object with per-resource Fibonacci backoff
///
/// Used by both the `CertificateUpload` and the `Secret` controller; backoff
/// state is keyed by kind, namespace and name.
pub fn handle_reconciliation_error<K>(
    obj: Arc<K>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action
where
    K: Resource<DynamicType = ()>,
{
    let kind = K::kind(&());
    let name = obj.meta().name.as_deref().unwrap_or("unknown");
    let namespace = obj.meta().namespace.as_deref().unwrap_or("default");

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.kind = %kind,
        resource.name = name,
        resource.namespace = namespace,
        error = %error
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation error for {} {}/{}: {}", kind, namespace, name, error);
    metrics::increment_reconciliation_errors(&kind);

    let key = Reconciler::backoff_key(&kind, namespace, name);
    let (backoff_seconds, error_count) = ctx.next_backoff(&key);

    let next_trigger_time =
        chrono::Utc::now() + chrono::Duration::seconds(i64::try_from(backoff_seconds).unwrap_or(i64::MAX));
    info!(
        "Retrying {} in {}s (error count: {}, next attempt at {})",
        key,
        backoff_seconds,
        error_count,
        next_trigger_time.to_rfc3339()
    );

    metrics::increment_requeues_total("error-backoff");
    Action::requeue(Duration::from_secs(backoff_seconds))
}

/// What the watch loop should do with a controller stream error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorKind {
    Unauthorized,
    Expired,
    Throttled,
    NotFound,
    Other,
}

/// Classify a controller stream error from its debug rendering
#[must_use]
pub fn classify_watch_error(error_string: &str) -> WatchErrorKind {
    // 404 first: a plain-text 404 body surfaces as a serde error mentioning WatchFailed
    let is_not_found = error_string.contains("ObjectNotFound")
        || error_string.contains("404")
        || error_string.contains("not found");
    if (error_string.contains("401") || error_string.contains("Unauthorized")) && !is_not_found {
        return WatchErrorKind::Unauthorized;
    }
    if error_string.contains("410")
        || error_string.contains("too old resource version")
        || error_string.contains("Expired")
        || error_string.contains("Gone")
    {
        return WatchErrorKind::Expired;
    }
    if error_string.contains("429")
        || error_string.contains("storage is (re)initializing")
        || error_string.contains("TooManyRequests")
    {
        return WatchErrorKind::Throttled;
    }
    if is_not_found {
        return WatchErrorKind::NotFound;
    }
    WatchErrorKind::Other
}

/// Handle a controller stream error
///
/// Returns `None` to drop the error (the stream keeps running or restarts) and
/// `Some(())` to pass it on.
pub async fn handle_watch_stream_error(
    error_string: &str,
    backoff: &Arc<AtomicU64>,
    max_backoff_ms: u64,
    watch_restart_delay_secs: u64,
) -> Option<()> {
    let error_span = tracing::span!(
        tracing::Level::WARN,
        "controller.watch.error",
        error = %error_string
    );
    async {
        match classify_watch_error(error_string) {
            WatchErrorKind::Unauthorized => {
                error!("Watch authentication failed (401 Unauthorized), RBAC may have been revoked or the token expired");
                error!("Check that the cert-uploader ClusterRole still grants list/watch on certificateuploads and secrets:");
                error!("  kubectl auth can-i watch certificateuploads.cert-uploader.dev --as=system:serviceaccount:<namespace>:cert-uploader --all-namespaces");
                error!("  kubectl auth can-i watch secrets --as=system:serviceaccount:<namespace>:cert-uploader --all-namespaces");
                warn!(
                    "Waiting {}s before retrying watch (RBAC may need time to propagate)...",
                    watch_restart_delay_secs
                );
                tokio::time::sleep(Duration::from_secs(watch_restart_delay_secs)).await;
                None
            }
            WatchErrorKind::Expired => {
                warn!(error_type = "410", "Watch resource version expired, watch will restart");
                None
            }
            WatchErrorKind::Throttled => {
                let current_backoff = backoff.load(Ordering::Relaxed);
                warn!(
                    "API server storage reinitializing (429), backing off for {}ms before restart...",
                    current_backoff
                );
                tokio::time::sleep(Duration::from_millis(current_backoff)).await;
                let new_backoff = current_backoff.saturating_mul(2).min(max_backoff_ms);
                backoff.store(new_backoff, Ordering::Relaxed);
                None
            }
            WatchErrorKind::NotFound => {
                let resource_info = if error_string.contains("CertificateUpload") {
                    "CertificateUpload resource (is the CRD installed?)"
                } else if error_string.contains("Secret") {
                    "Secret"
                } else {
                    "Resource"
                };
                warn!(
                    "{} not found (404), this is normal if it was just deleted. Error: {}",
                    resource_info, error_string
                );
                Some(())
            }
            WatchErrorKind::Other => {
                error!("Controller stream error: {}", error_string);
                tokio::time::sleep(Duration::from_secs(watch_restart_delay_secs)).await;
                None
            }
        }
    }
    .instrument(error_span)
    .await
}

/// Backoff key of an object the controller could no longer find
///
/// A requeued object deleted in the meantime surfaces as
/// `ObjectNotFound`; its backoff entry would otherwise never be reset.
pub fn deleted_object_key<K, R, Q>(error: &controller::Error<R, Q>) -> Option<String>
where
    K: Resource<DynamicType = ()>,
    R: 'static,
    Q: 'static,
{
    match error {
        controller::Error::ObjectNotFound(obj_ref) => obj_ref.namespace.as_deref().map(|namespace| {
            Reconciler::backoff_key(&K::kind(&()), namespace, &obj_ref.name)
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::Secret;
    use kube_runtime::reflector::ObjectRef;

    #[test]
    fn test_classify_watch_errors() {
        assert_eq!(
            classify_watch_error("ApiError: Unauthorized (401)"),
            WatchErrorKind::Unauthorized
        );
        assert_eq!(
            classify_watch_error("too old resource version: 123 (410)"),
            WatchErrorKind::Expired
        );
        assert_eq!(
            classify_watch_error("storage is (re)initializing"),
            WatchErrorKind::Throttled
        );
        assert_eq!(
            classify_watch_error("WatchFailed: invalid type: integer `404`, Unauthorized"),
            WatchErrorKind::NotFound
        );
        assert_eq!(classify_watch_error("connection reset"), WatchErrorKind::Other);
    }

    #[tokio::test]
    async fn test_throttled_backoff_doubles_up_to_max() {
        let backoff = Arc::new(AtomicU64::new(1));
        assert!(handle_watch_stream_error("429 TooManyRequests", &backoff, 3, 0)
            .await
            .is_none());
        assert_eq!(backoff.load(Ordering::Relaxed), 2);
        handle_watch_stream_error("429 TooManyRequests", &backoff, 3, 0).await;
        assert_eq!(backoff.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_not_found_is_passed_on() {
        let backoff = Arc::new(AtomicU64::new(1));
        assert!(handle_watch_stream_error("ObjectNotFound", &backoff, 10, 0)
            .await
            .is_some());
    }

    #[test]
    fn test_deleted_object_key() {
        let gone = ObjectRef::<Secret>::new("tls-a").within("web").erase();
        let error: controller::Error<ReconcilerError, std::io::Error> =
            controller::Error::ObjectNotFound(gone);
        assert_eq!(
            deleted_object_key::<Secret, _, _>(&error).as_deref(),
            Some("Secret/web/tls-a")
        );

        let failed: controller::Error<ReconcilerError, std::io::Error> =
            controller::Error::QueueError(std::io::Error::other("watch closed"));
        assert!(deleted_object_key::<Secret, _, _>(&failed).is_none());
    }
}
