//! # Types
//!
//! Core types for the reconciler.

use super::filter::ChangeFilter;
use crate::constants::{DEFAULT_RECONCILE_BACKOFF_MAX_SECS, DEFAULT_RECONCILE_BACKOFF_MIN_SECS};
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::events::EventPublisher;
use crate::controller::index::SecretIndex;
use crate::controller::shutdown::ShutdownSignal;
use crate::controller::store::{ResourceStore, StoreError};
use crate::provider::{CertificateStore, ProviderError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::OwnedMutexGuard;

/// Retryable reconciliation failure
///
/// Anything that reaches kube-runtime's error policy is one of these; absorbed
/// outcomes never become errors.
#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("Failed to read {what}: {source}")]
    Read {
        what: String,
        #[source]
        source: StoreError,
    },
    #[error("Failed to write status of {resource}: {source}")]
    StatusWrite {
        resource: String,
        #[source]
        source: StoreError,
    },
    #[error("Cloudflare request failed: {0}")]
    Provider(#[from] ProviderError),
}

/// Backoff state for a specific resource
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_secs, max_secs),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count = self.error_count.saturating_add(1);
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// Shared reconciliation context handed to both controllers
#[derive(Clone)]
pub struct Reconciler {
    pub store: Arc<dyn ResourceStore>,
    pub certificates: Arc<dyn CertificateStore>,
    pub events: Arc<dyn EventPublisher>,
    pub index: SecretIndex,
    pub shutdown: ShutdownSignal,
    pub change_filter: ChangeFilter,
    // Backoff state per resource (identified by kind/namespace/name)
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
    // One lock per CertificateUpload (namespace/name), shared by both controllers
    upload_locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
    pub backoff_min_secs: u64,
    pub backoff_max_secs: u64,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("indexed", &self.index.len())
            .field("shutdown", &self.shutdown.is_triggered())
            .field("backoff_min_secs", &self.backoff_min_secs)
            .field("backoff_max_secs", &self.backoff_max_secs)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        certificates: Arc<dyn CertificateStore>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            store,
            certificates,
            events,
            index: SecretIndex::new(),
            shutdown: ShutdownSignal::never(),
            change_filter: ChangeFilter::new(),
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
            upload_locks: Arc::new(Mutex::new(HashMap::new())),
            backoff_min_secs: DEFAULT_RECONCILE_BACKOFF_MIN_SECS,
            backoff_max_secs: DEFAULT_RECONCILE_BACKOFF_MAX_SECS,
        }
    }

    #[must_use]
    pub fn with_index(mut self, index: SecretIndex) -> Self {
        self.index = index;
        self
    }

    #[must_use]
    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    #[must_use]
    pub fn with_backoff(mut self, min_secs: u64, max_secs: u64) -> Self {
        self.backoff_min_secs = min_secs;
        self.backoff_max_secs = max_secs;
        self
    }

    /// Key under which backoff state is tracked
    #[must_use]
    pub fn backoff_key(kind: &str, namespace: &str, name: &str) -> String {
        format!("{kind}/{namespace}/{name}")
    }

    /// Advance the backoff of `key`, returning the delay and the error count
    pub fn next_backoff(&self, key: &str) -> (u64, u32) {
        let mut states = self
            .backoff_states
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let state = states
            .entry(key.to_string())
            .or_insert_with(|| BackoffState::new(self.backoff_min_secs, self.backoff_max_secs));
        state.increment_error();
        (state.backoff.next_backoff_seconds(), state.error_count)
    }

    /// Forget the backoff of `key` after a successful reconciliation
    pub fn reset_backoff(&self, key: &str) {
        let mut states = self
            .backoff_states
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        states.remove(key);
    }

    /// Wait for exclusive use of the `CertificateUpload` `namespace/name`
    ///
    /// Passes from the `CertificateUpload` controller and Secret fan-out run
    /// one at a time per resource while the returned guard is held.
    pub async fn lock_upload(&self, namespace: &str, name: &str) -> UploadGuard {
        let key = format!("{namespace}/{name}");
        let lock = {
            let mut locks = self
                .upload_locks
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            Arc::clone(locks.entry(key.clone()).or_default())
        };
        UploadGuard {
            guard: Some(lock.lock_owned().await),
            key,
            locks: Arc::clone(&self.upload_locks),
        }
    }

    /// Number of resources with a live upload lock
    #[must_use]
    pub fn upload_locks_held(&self) -> usize {
        self.upload_locks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}

/// Exclusive hold on one `CertificateUpload`, released on drop
///
/// The map entry is removed once no other pass holds or awaits the lock.
pub struct UploadGuard {
    guard: Option<OwnedMutexGuard<()>>,
    key: String,
    locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl std::fmt::Debug for UploadGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadGuard").field("key", &self.key).finish()
    }
}

impl Drop for UploadGuard {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        // Only the map itself still references the lock
        if locks
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.key);
        }
    }
}
