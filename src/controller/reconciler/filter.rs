//! # Change Filter
//!
//! Skips `CertificateUpload` reconciliations triggered only by status writes.
//!
//! A pass is skipped when the resource's generation and its
//! `cert-uploader.dev/reconcile` annotation both match the last pass that
//! finished without a retryable error. Secret changes do not go through this
//! filter; they reach the reconciler through fan-out.

use crate::constants::RECONCILE_ANNOTATION;
use crate::controller::index::ObjectKey;
use crate::crd::CertificateUpload;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// What a finished pass saw
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeMark {
    pub generation: Option<i64>,
    pub reconcile_request: Option<String>,
}

impl ChangeMark {
    #[must_use]
    pub fn of(upload: &CertificateUpload) -> Self {
        Self {
            generation: upload.metadata.generation,
            reconcile_request: upload
                .metadata
                .annotations
                .as_ref()
                .and_then(|annotations| annotations.get(RECONCILE_ANNOTATION))
                .cloned(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChangeFilter {
    marks: Arc<Mutex<HashMap<ObjectKey, ChangeMark>>>,
}

impl ChangeFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `mark` was already handled for `key`
    #[must_use]
    pub fn is_unchanged(&self, key: &ObjectKey, mark: &ChangeMark) -> bool {
        self.marks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .is_some_and(|seen| seen == mark)
    }

    pub fn record(&self, key: ObjectKey, mark: ChangeMark) {
        self.marks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, mark);
    }

    pub fn forget(&self, key: &ObjectKey) {
        self.marks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}
