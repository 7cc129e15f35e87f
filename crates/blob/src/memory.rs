use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

use crate::error::BlobError;
use crate::key::KeyGenerator;
use crate::store::BlobStore;

const LOCATOR_SCHEME: &str = "memory://";

/// An object held by [`MemoryBlobStore`].
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub data: Bytes,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
}

/// In-memory [`BlobStore`] backed by a [`DashMap`].
///
/// Locators have the form `memory://<key>`. Intended for tests and local
/// development; contents are lost on restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    objects: Arc<DashMap<String, StoredBlob>>,
    keys: Arc<KeyGenerator>,
}

impl MemoryBlobStore {
    /// Create an empty store using the default `contactos` key prefix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store with a custom key prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            objects: Arc::default(),
            keys: Arc::new(KeyGenerator::new(prefix)),
        }
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the store holds no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Locators of every stored object, sorted.
    pub fn locators(&self) -> Vec<String> {
        let mut all: Vec<String> = self
            .objects
            .iter()
            .map(|entry| format!("{LOCATOR_SCHEME}{}", entry.key()))
            .collect();
        all.sort();
        all
    }

    /// Fetch a stored object by locator.
    pub fn get(&self, locator: &str) -> Option<StoredBlob> {
        let key = locator.strip_prefix(LOCATOR_SCHEME)?;
        self.objects.get(key).map(|entry| entry.value().clone())
    }

    fn key_of<'a>(&self, locator: &'a str) -> Result<&'a str, BlobError> {
        locator
            .strip_prefix(LOCATOR_SCHEME)
            .filter(|key| self.keys.owns(key))
            .ok_or_else(|| BlobError::InvalidLocator(locator.to_owned()))
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "memory"
    }

    async fn put(
        &self,
        data: Bytes,
        suggested_name: &str,
        content_type: &str,
    ) -> Result<String, BlobError> {
        let key = self.keys.next_key(suggested_name);
        debug!(key = %key, size = data.len(), "storing blob in memory");
        self.objects.insert(
            key.clone(),
            StoredBlob {
                data,
                content_type: content_type.to_owned(),
                created_at: Utc::now(),
            },
        );
        Ok(format!("{LOCATOR_SCHEME}{key}"))
    }

    async fn delete(&self, locator: &str) -> Result<(), BlobError> {
        let key = self.key_of(locator)?;
        if self.objects.remove(key).is_none() {
            debug!(key = %key, "blob already absent");
        }
        Ok(())
    }

    async fn exists(&self, locator: &str) -> Result<bool, BlobError> {
        let key = self.key_of(locator)?;
        Ok(self.objects.contains_key(key))
    }
}
