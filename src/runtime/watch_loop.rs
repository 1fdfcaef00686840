//! # Watch Loop
//!
//! Waits for leadership, then runs the `CertificateUpload` controller, the
//! `Secret` fan-out controller and the index watch, restarting the controllers
//! when their streams end.

use crate::config::SharedControllerConfig;
use crate::constants::TLS_SECRET_TYPE;
use crate::controller::leader_election::LeaderElector;
use crate::controller::index::ObjectKey;
use crate::controller::reconciler::{
    fan_out_secret, reconcile_upload, ChangeMark, Reconciler, ReconcilerError,
};
use crate::controller::server::ServerState;
use crate::controller::shutdown::{ShutdownSignal, ShutdownTrigger};
use crate::crd::CertificateUpload;
use crate::observability::metrics;
use crate::runtime::error_policy::{
    deleted_object_key, handle_reconciliation_error, handle_watch_stream_error,
};
use crate::runtime::index_watch::run_index_watch;
use futures::{FutureExt, Stream, StreamExt};
use k8s_openapi::api::core::v1::Secret;
use kube::api::Api;
use kube::Resource;
use kube_runtime::{controller::Action, watcher, Controller};
use std::sync::atomic::{AtomicU64, Ordering};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Run both controllers until shutdown
///
/// With a `leader` elector the controllers only start once the Lease is held.
///
/// # Errors
///
/// Fails when leadership is lost; errors inside the streams are handled and
/// the controllers restarted.
pub async fn run_watch_loop(
    uploads: Api<CertificateUpload>,
    secrets: Api<Secret>,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
    shutdown: ShutdownTrigger,
    controller_config: SharedControllerConfig,
    leader: Option<Arc<LeaderElector>>,
) -> Result<(), anyhow::Error> {
    let config = controller_config.read().await.clone();
    let upload_watch = watcher::Config::default()
        .any_semantic()
        .timeout(config.watch_timeout_secs);
    let secret_watch = watcher::Config::default()
        .any_semantic()
        .timeout(config.watch_timeout_secs)
        .fields(&format!("type={TLS_SECRET_TYPE}"));

    spawn_signal_handler(server_state.clone(), shutdown.clone());

    let stopping = reconciler.shutdown.clone();
    let mut leadership = None;
    if let Some(elector) = leader {
        tokio::select! {
            guard = elector.acquire() => leadership = Some(guard),
            () = stopping.triggered() => {
                info!("Shutdown requested before leadership was acquired");
                return Ok(());
            }
        }
    }
    let lost_task = leadership.as_mut().map(|guard| {
        let lost = guard.lost();
        let server_state = server_state.clone();
        let shutdown = shutdown.clone();
        let stopping = stopping.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = lost => {
                    error!("Leadership lost, stopping controllers");
                    server_state.set_ready(false);
                    shutdown.trigger();
                    true
                }
                () = stopping.triggered() => false,
            }
        })
    });

    let index_task = tokio::spawn(run_index_watch(
        uploads.clone(),
        reconciler.clone(),
        upload_watch.clone(),
    ));

    let backoff_duration_ms = Arc::new(AtomicU64::new(config.backoff_start_ms));

    loop {
        if !server_state.is_ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        info!("Starting CertificateUpload and Secret controllers...");

        let upload_controller = Controller::new(uploads.clone(), upload_watch.clone())
            .shutdown_on_signal()
            .graceful_shutdown_on(on_shutdown(stopping.clone()))
            .run(
                reconcile_certificate_upload,
                handle_reconciliation_error::<CertificateUpload>,
                reconciler.clone(),
            )
            .inspect({
                let ctx = reconciler.clone();
                move |item| forget_deleted::<CertificateUpload, _, _, _>(&ctx, item)
            });
        let secret_controller = Controller::new(secrets.clone(), secret_watch.clone())
            .shutdown_on_signal()
            .graceful_shutdown_on(on_shutdown(stopping.clone()))
            .run(
                reconcile_secret,
                handle_reconciliation_error::<Secret>,
                reconciler.clone(),
            )
            .inspect({
                let ctx = reconciler.clone();
                move |item| forget_deleted::<Secret, _, _, _>(&ctx, item)
            });

        let watch_span = info_span!("controller.watch", operation = "watch_loop");
        futures::future::join(
            drain(upload_controller, backoff_duration_ms.clone(), controller_config.clone()),
            drain(secret_controller, backoff_duration_ms.clone(), controller_config.clone()),
        )
        .instrument(watch_span)
        .await;

        if !server_state.is_ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let delay = controller_config
            .read()
            .await
            .watch_restart_delay_after_end_duration();
        warn!(
            "Controller watch streams ended, restarting in {} seconds...",
            delay.as_secs()
        );
        tokio::time::sleep(delay).await;
    }

    if let Err(e) = index_task.await {
        warn!("Secret index watch task failed: {}", e);
    }

    let lost = match lost_task {
        Some(task) => task.await.unwrap_or(false),
        None => false,
    };
    if lost {
        return Err(anyhow::anyhow!("Leadership lost, exiting"));
    }
    if let Some(guard) = leadership {
        if let Err(e) = guard.release().await {
            warn!(error = %e, "Failed to release leader Lease, standby waits for expiry");
        }
    }
    info!("Controller stopped gracefully");
    Ok(())
}

/// Resolve when the shutdown broadcast fires
///
/// Bridged through a oneshot channel because controller shutdown triggers
/// must be `Sync`.
fn on_shutdown(signal: ShutdownSignal) -> impl Future<Output = ()> + Send + Sync + 'static {
    let (mut tx, rx) = futures::channel::oneshot::channel::<()>();
    tokio::spawn(async move {
        let fired = tokio::select! {
            () = signal.triggered() => true,
            () = tx.cancellation() => false,
        };
        if fired {
            let _ = tx.send(());
        }
    });
    rx.map(|_| ())
}

/// Consume a controller stream, classifying its errors
async fn drain<S, T, E>(stream: S, backoff: Arc<AtomicU64>, controller_config: SharedControllerConfig)
where
    S: Stream<Item = Result<T, E>>,
    E: std::fmt::Debug,
{
    stream
        .filter_map(move |item| {
            let backoff = backoff.clone();
            let config = controller_config.clone();
            async move {
                match item {
                    Ok(_) => {
                        let start = config.read().await.backoff_start_ms;
                        backoff.store(start, Ordering::Relaxed);
                        debug!("watch.event.success");
                        Some(())
                    }
                    Err(e) => {
                        let error_string = format!("{e:?}");
                        let config = config.read().await.clone();
                        handle_watch_stream_error(
                            &error_string,
                            &backoff,
                            config.backoff_max_ms,
                            config.watch_restart_delay_secs,
                        )
                        .await
                    }
                }
            }
        })
        .for_each(|()| futures::future::ready(()))
        .await;
}

/// Drop the backoff state of an object deleted while requeued
fn forget_deleted<K, T, R, Q>(ctx: &Reconciler, item: &Result<T, kube_runtime::controller::Error<R, Q>>)
where
    K: Resource<DynamicType = ()>,
    R: 'static,
    Q: 'static,
{
    if let Err(e) = item {
        if let Some(key) = deleted_object_key::<K, R, Q>(e) {
            debug!(resource = %key, "Object deleted, clearing its backoff");
            ctx.reset_backoff(&key);
        }
    }
}

/// Clear readiness and broadcast shutdown on SIGINT or SIGTERM
fn spawn_signal_handler(server_state: Arc<ServerState>, shutdown: ShutdownTrigger) {
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Received shutdown signal, initiating graceful shutdown...");
        server_state.set_ready(false);
        shutdown.trigger();
        info!("Marked server as not ready, cancelling in-flight uploads");
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Reconcile function of the `CertificateUpload` controller
async fn reconcile_certificate_upload(
    obj: Arc<CertificateUpload>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let Some(key) = ObjectKey::of_upload(&obj) else {
        return Ok(Action::await_change());
    };
    metrics::increment_reconciliations("CertificateUpload");

    if obj.meta().deletion_timestamp.is_some() {
        debug!(resource = %key, "CertificateUpload is being deleted, uploads are not retracted");
        return Ok(Action::await_change());
    }

    let mark = ChangeMark::of(&obj);
    if ctx.change_filter.is_unchanged(&key, &mark) {
        debug!(
            resource = %key,
            generation = mark.generation.unwrap_or(0),
            "Skipping reconciliation - spec and reconcile annotation unchanged"
        );
        return Ok(Action::await_change());
    }

    reconcile_upload(&ctx, &key.namespace, &key.name)
        .await
        .into_result()?;

    ctx.change_filter.record(key.clone(), mark);
    ctx.reset_backoff(&Reconciler::backoff_key("CertificateUpload", &key.namespace, &key.name));
    Ok(Action::await_change())
}

/// Reconcile function of the `Secret` controller
async fn reconcile_secret(obj: Arc<Secret>, ctx: Arc<Reconciler>) -> Result<Action, ReconcilerError> {
    let (Some(namespace), Some(name)) = (obj.meta().namespace.as_deref(), obj.meta().name.as_deref())
    else {
        return Ok(Action::await_change());
    };
    metrics::increment_reconciliations("Secret");

    if obj.meta().deletion_timestamp.is_some() {
        ctx.reset_backoff(&Reconciler::backoff_key("Secret", namespace, name));
        return Ok(Action::await_change());
    }

    fan_out_secret(&ctx, namespace, name).await?;
    ctx.reset_backoff(&Reconciler::backoff_key("Secret", namespace, name));
    Ok(Action::await_change())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_on_shutdown_resolves_after_trigger() {
        let (trigger, signal) = ShutdownSignal::channel();
        let stopped = on_shutdown(signal);
        let waiter = tokio::spawn(stopped);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        trigger.trigger();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("controller shutdown trigger should fire")
            .unwrap();
    }

    #[tokio::test]
    async fn test_on_shutdown_stays_pending_without_trigger() {
        let (_trigger, signal) = ShutdownSignal::channel();
        let result = tokio::time::timeout(Duration::from_millis(20), on_shutdown(signal)).await;
        assert!(result.is_err());
    }
}
