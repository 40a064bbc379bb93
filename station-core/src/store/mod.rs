//! Backing object store port
//!
//! The catalog consumes only two primitives from its store: a full listing of
//! the bucket and a single-object upload. Implementations:
//! - [`S3Store`] - any S3-compatible service (R2, MinIO, AWS), behind the `s3` feature
//! - [`MemoryStore`] - in-process map for tests and local runs

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

pub mod memory;
#[cfg(feature = "s3")]
pub mod s3;
#[cfg(feature = "s3")]
mod sigv4;

pub use memory::MemoryStore;
#[cfg(feature = "s3")]
pub use s3::S3Store;

/// One object as reported by a bucket listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEntry {
    /// Full object key, e.g. `mod/foo/1.2.3/archive.zip`
    pub key: String,

    /// Object size in bytes, when the store reports it
    #[serde(default)]
    pub size: Option<u64>,

    /// Last modification time as reported by the store
    #[serde(default)]
    pub last_modified: Option<String>,
}

impl ObjectEntry {
    /// Entry with only a key; used by stores that track nothing else
    pub fn from_key(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            size: None,
            last_modified: None,
        }
    }
}

/// Access level applied to an uploaded object
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Visibility {
    #[default]
    Private,
    /// Anonymous reads allowed through the public base address
    PublicRead,
}

impl Visibility {
    /// Canned ACL name understood by S3-compatible stores
    pub fn as_acl(&self) -> &'static str {
        match self {
            Visibility::Private => "private",
            Visibility::PublicRead => "public-read",
        }
    }
}

/// Trait for backing object stores
///
/// Implementations perform no retries; a failed call is reported once and
/// the caller decides what to do with it.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Enumerate every object in the bucket
    ///
    /// An empty bucket is a successful, empty listing.
    async fn list_all_objects(&self) -> Result<Vec<ObjectEntry>, StoreError>;

    /// Write `body` to `key`, replacing any existing object
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        visibility: Visibility,
    ) -> Result<(), StoreError>;

    /// Store identifier for logging
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visibility_acl_names() {
        assert_eq!(Visibility::PublicRead.as_acl(), "public-read");
        assert_eq!(Visibility::default().as_acl(), "private");
    }

    #[test]
    fn test_entry_from_key() {
        let entry = ObjectEntry::from_key("mod/foo/1.0.0/archive.zip");
        assert_eq!(entry.key, "mod/foo/1.0.0/archive.zip");
        assert!(entry.size.is_none());
    }
}
