//! In-memory object store
//!
//! Keeps objects in a sorted map so listings come back in key order, the way
//! S3 returns them. Counts enumeration calls and can be switched into a
//! failing state, which is what the cache and catalog tests need.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use super::{ObjectEntry, ObjectStore, Visibility};
use crate::error::StoreError;

#[derive(Debug, Clone)]
struct StoredObject {
    body: Vec<u8>,
    visibility: Visibility,
}

/// Object store backed by a process-local map
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RwLock<BTreeMap<String, StoredObject>>,
    list_calls: AtomicUsize,
    unavailable: AtomicBool,
    list_delay: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with empty objects at `keys`
    pub fn with_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        for key in keys {
            store.insert(key, Vec::new());
        }
        store
    }

    /// Make every listing take at least `delay`
    ///
    /// Lets tests hold a refresh open while other readers arrive.
    pub fn with_list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = Some(delay);
        self
    }

    /// Insert or replace an object without going through the async API
    pub fn insert(&self, key: impl Into<String>, body: Vec<u8>) {
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                key.into(),
                StoredObject {
                    body,
                    visibility: Visibility::Private,
                },
            );
    }

    /// Remove an object, returning whether it existed
    pub fn remove(&self, key: &str) -> bool {
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some()
    }

    /// Contents of the object at `key`
    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map(|o| o.body.clone())
    }

    /// Visibility the object at `key` was last written with
    pub fn visibility(&self, key: &str) -> Option<Visibility> {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map(|o| o.visibility)
    }

    /// Number of `list_all_objects` calls made so far
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Make subsequent calls fail with [`StoreError::Unavailable`]
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "memory store is switched off".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_all_objects(&self) -> Result<Vec<ObjectEntry>, StoreError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.list_delay {
            tokio::time::sleep(delay).await;
        }
        self.check_available()?;

        let objects = self.objects.read().unwrap_or_else(PoisonError::into_inner);
        Ok(objects
            .iter()
            .map(|(key, object)| ObjectEntry {
                key: key.clone(),
                size: Some(object.body.len() as u64),
                last_modified: None,
            })
            .collect())
    }

    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        visibility: Visibility,
    ) -> Result<(), StoreError> {
        self.check_available()?;

        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), StoredObject { body, visibility });
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
