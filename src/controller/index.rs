//! # Secret Index
//!
//! Reverse index from a TLS Secret to the `CertificateUpload` resources that
//! mirror it. The Secret controller resolves a changed Secret through this
//! index instead of listing every resource.
//!
//! The index is process-local. It is rebuilt from a full list at startup and
//! kept current by the index watch; only that task writes it.

use crate::crd::CertificateUpload;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Namespaced object identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Identity of a `CertificateUpload`, `None` if it has no name or namespace
    #[must_use]
    pub fn of_upload(upload: &CertificateUpload) -> Option<Self> {
        Some(Self::new(
            upload.metadata.namespace.as_deref()?,
            upload.metadata.name.as_deref()?,
        ))
    }

    /// Key of the Secret an upload references
    #[must_use]
    pub fn secret_of(upload: &CertificateUpload) -> Option<Self> {
        Some(Self::new(
            upload.metadata.namespace.as_deref()?,
            upload.spec.secret_name.as_str(),
        ))
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[derive(Debug, Default)]
struct IndexState {
    by_secret: HashMap<ObjectKey, BTreeSet<ObjectKey>>,
    by_owner: HashMap<ObjectKey, ObjectKey>,
}

impl IndexState {
    fn insert(&mut self, owner: ObjectKey, secret: ObjectKey) {
        self.remove(&owner);
        self.by_secret
            .entry(secret.clone())
            .or_default()
            .insert(owner.clone());
        self.by_owner.insert(owner, secret);
    }

    fn remove(&mut self, owner: &ObjectKey) -> bool {
        let Some(secret) = self.by_owner.remove(owner) else {
            return false;
        };
        if let Some(owners) = self.by_secret.get_mut(&secret) {
            owners.remove(owner);
            if owners.is_empty() {
                self.by_secret.remove(&secret);
            }
        }
        true
    }
}

/// Shared handle to the Secret index
#[derive(Debug, Clone, Default)]
pub struct SecretIndex {
    inner: Arc<RwLock<IndexState>>,
}

impl SecretIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or move) the Secret reference of an upload
    pub fn upsert(&self, upload: &CertificateUpload) {
        let (Some(owner), Some(secret)) =
            (ObjectKey::of_upload(upload), ObjectKey::secret_of(upload))
        else {
            return;
        };
        self.write().insert(owner, secret);
    }

    /// Forget an upload; returns whether it was indexed
    pub fn remove(&self, owner: &ObjectKey) -> bool {
        self.write().remove(owner)
    }

    /// Replace the whole index with the given uploads
    pub fn replace_all<'a>(&self, uploads: impl IntoIterator<Item = &'a CertificateUpload>) {
        let mut fresh = IndexState::default();
        for upload in uploads {
            if let (Some(owner), Some(secret)) =
                (ObjectKey::of_upload(upload), ObjectKey::secret_of(upload))
            {
                fresh.insert(owner, secret);
            }
        }
        *self.write() = fresh;
    }

    /// Snapshot of the uploads referencing `namespace/secret_name`, in order
    #[must_use]
    pub fn lookup(&self, namespace: &str, secret_name: &str) -> Vec<ObjectKey> {
        let key = ObjectKey::new(namespace, secret_name);
        self.read()
            .by_secret
            .get(&key)
            .map(|owners| owners.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of indexed uploads
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().by_owner.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, IndexState> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, IndexState> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::CertificateUploadSpec;

    fn upload(namespace: &str, name: &str, secret: &str) -> CertificateUpload {
        let mut upload = CertificateUpload::new(
            name,
            CertificateUploadSpec {
                secret_name: secret.to_string(),
                cloudflare: None,
            },
        );
        upload.metadata.namespace = Some(namespace.to_string());
        upload
    }

    #[test]
    fn test_lookup_finds_every_owner() {
        let index = SecretIndex::new();
        index.upsert(&upload("web", "cert-b", "tls-a"));
        index.upsert(&upload("web", "cert-a", "tls-a"));
        index.upsert(&upload("web", "cert-c", "tls-c"));

        assert_eq!(
            index.lookup("web", "tls-a"),
            vec![ObjectKey::new("web", "cert-a"), ObjectKey::new("web", "cert-b")]
        );
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_lookup_is_namespace_scoped() {
        let index = SecretIndex::new();
        index.upsert(&upload("web", "cert-a", "tls-a"));
        index.upsert(&upload("api", "cert-a", "tls-a"));

        assert_eq!(index.lookup("web", "tls-a"), vec![ObjectKey::new("web", "cert-a")]);
        assert!(index.lookup("other", "tls-a").is_empty());
    }

    #[test]
    fn test_changed_reference_moves_entry() {
        let index = SecretIndex::new();
        index.upsert(&upload("web", "cert-a", "tls-a"));
        index.upsert(&upload("web", "cert-a", "tls-b"));

        assert!(index.lookup("web", "tls-a").is_empty());
        assert_eq!(index.lookup("web", "tls-b"), vec![ObjectKey::new("web", "cert-a")]);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_remove() {
        let index = SecretIndex::new();
        index.upsert(&upload("web", "cert-a", "tls-a"));

        assert!(index.remove(&ObjectKey::new("web", "cert-a")));
        assert!(!index.remove(&ObjectKey::new("web", "cert-a")));
        assert!(index.lookup("web", "tls-a").is_empty());
        assert!(index.is_empty());
    }

    #[test]
    fn test_replace_all_drops_stale_entries() {
        let index = SecretIndex::new();
        index.upsert(&upload("web", "gone", "tls-old"));

        let fresh = [upload("web", "cert-a", "tls-a")];
        index.replace_all(fresh.iter());

        assert!(index.lookup("web", "tls-old").is_empty());
        assert_eq!(index.lookup("web", "tls-a").len(), 1);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_uploads_without_namespace_are_ignored() {
        let index = SecretIndex::new();
        let mut orphan = upload("web", "cert-a", "tls-a");
        orphan.metadata.namespace = None;
        index.upsert(&orphan);
        assert!(index.is_empty());
    }

    #[test]
    fn test_object_key_display() {
        assert_eq!(ObjectKey::new("web", "cert-a").to_string(), "web/cert-a");
    }
}
