//! Mod Station catalog - versioned artifacts in an object store
//!
//! Each artifact version is one object under a fixed key layout. The catalog
//! lists what the bucket holds, grouped per artifact with versions ordered
//! newest-first, builds public download locators, and uploads new versions.
//!
//! # Architecture
//!
//! ```text
//! Object store (R2 / S3)
//!     │
//!     └── mod/{id}/{version}/archive.zip  ← one object per version
//!            │
//!            ▼
//!     ListingCache       ← full listing, reused for the TTL
//!            │
//!            ▼
//!     Catalog::list      ← parse keys, group by id, sort versions
//!            │
//!            ▼
//!     CatalogView        ← { "id": ["newest", ..., "oldest"] }
//! ```
//!
//! `get` never touches the store; `put` writes straight through and does not
//! invalidate the listing, so a new version shows up once the cached listing
//! expires.

mod cache;
mod key;
mod view;

pub use cache::{ListingCache, ListingSnapshot};
pub use key::{ArtifactKey, ARCHIVE_NAME, MOD_PREFIX};
pub use view::CatalogView;

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::error::{CatalogError, Result};
use crate::store::{ObjectStore, Visibility};
use crate::version::{self, VersionClass};

/// Version selector resolved to the newest listed version
pub const LATEST: &str = "latest";

/// Restricts a listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    /// Raw key prefix on the artifact id; `foo` also matches `foobar`
    pub artifact_id: Option<String>,

    /// Version expression; accepted and logged, does not filter yet
    pub version_expr: Option<String>,
}

impl ListFilter {
    /// No restriction
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_artifact(artifact_id: impl Into<String>) -> Self {
        Self {
            artifact_id: Some(artifact_id.into()),
            version_expr: None,
        }
    }

    pub fn with_version_expr(mut self, version_expr: impl Into<String>) -> Self {
        self.version_expr = Some(version_expr.into());
        self
    }
}

/// Catalog of versioned artifacts backed by an [`ObjectStore`]
pub struct Catalog {
    store: Arc<dyn ObjectStore>,
    cache: ListingCache,
    public_url_base: String,
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("store", &self.store.name())
            .field("cache", &self.cache)
            .field("public_url_base", &self.public_url_base)
            .finish()
    }
}

impl Catalog {
    /// Catalog with a default listing cache over `store`
    pub fn new(store: Arc<dyn ObjectStore>, public_url_base: impl Into<String>) -> Self {
        let cache = ListingCache::with_default_ttl(Arc::clone(&store));
        Self {
            store,
            cache,
            public_url_base: public_url_base.into(),
        }
    }

    /// Use a preconfigured listing cache
    ///
    /// The cache should list the same store the catalog writes to.
    pub fn with_listing_cache(mut self, cache: ListingCache) -> Self {
        self.cache = cache;
        self
    }

    /// Build an S3-backed catalog from validated configuration
    #[cfg(feature = "s3")]
    pub fn from_config(config: &crate::config::StationConfig) -> Result<Self> {
        let store: Arc<dyn ObjectStore> = Arc::new(crate::store::S3Store::new(&config.store)?);
        let cache = ListingCache::new(Arc::clone(&store), config.cache.ttl());
        Ok(Self::new(store, config.store.public_url_base.clone()).with_listing_cache(cache))
    }

    pub fn cache(&self) -> &ListingCache {
        &self.cache
    }

    /// Group every artifact version matching `filter`, newest first
    pub async fn list(&self, filter: &ListFilter) -> Result<CatalogView> {
        if let Some(expr) = &filter.version_expr {
            debug!("Ignoring version expression {:?}", expr);
        }

        let prefix = ArtifactKey::prefix_for(filter.artifact_id.as_deref());
        let entries = self.cache.get_by_prefix(&prefix).await?;

        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for entry in entries {
            match ArtifactKey::parse(&entry.key) {
                Some(key) => grouped.entry(key.artifact_id).or_default().push(key.version),
                None => trace!("Skipping non-artifact key {}", entry.key),
            }
        }

        let mut unordered = 0;
        for versions in grouped.values_mut() {
            version::sort_descending(versions);
            unordered += versions
                .iter()
                .filter(|v| version::classify(v) == VersionClass::Opaque)
                .count();
        }
        if unordered > 0 {
            warn!(
                "{} listed version(s) under {} have no recognizable ordering and keep listing order",
                unordered, prefix
            );
        }

        let view = CatalogView::from(grouped);
        debug!(
            "Listed {} artifacts ({} versions) under {}",
            view.artifact_count(),
            view.version_count(),
            prefix
        );
        Ok(view)
    }

    /// Public download locator for a version; does not check that it exists
    ///
    /// Each key segment is percent-encoded, so `#` or `?` in a version stay
    /// part of the path.
    pub fn get(&self, artifact_id: &str, version: &str) -> Result<Url> {
        let segments = [MOD_PREFIX.trim_end_matches('/'), artifact_id, version, ARCHIVE_NAME];
        let locator_error = |source: url::ParseError| CatalogError::Locator {
            key: segments.join("/"),
            source,
        };

        let mut url =
            Url::parse(self.public_url_base.trim_end_matches('/')).map_err(locator_error)?;
        url.path_segments_mut()
            .map_err(|_| locator_error(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Upload `content` as the archive for a version, replacing any existing one
    pub async fn put(&self, artifact_id: &str, version: &str, content: Vec<u8>) -> Result<()> {
        let key = ArtifactKey::new(artifact_id, version)?;
        let object_key = key.object_key();
        let size = content.len();

        self.store
            .put_object(&object_key, content, Visibility::PublicRead)
            .await?;

        info!("Uploaded {} ({} bytes) to {}", key, size, object_key);
        Ok(())
    }

    /// Locator for a version, with `latest` resolved against the listing
    ///
    /// Returns `None` when `latest` is requested for an artifact with no
    /// listed versions.
    pub async fn resolve(&self, artifact_id: &str, version: &str) -> Result<Option<Url>> {
        if version != LATEST {
            return self.get(artifact_id, version).map(Some);
        }

        let view = self.list(&ListFilter::for_artifact(artifact_id)).await?;
        match view.latest(artifact_id) {
            Some(newest) => {
                debug!("Resolved {}@latest to {}", artifact_id, newest);
                self.get(artifact_id, newest).map(Some)
            }
            None => Ok(None),
        }
    }
}
