//! Time-bounded cache of the full bucket listing
//!
//! Prefix queries are answered from an immutable [`ListingSnapshot`]. A
//! snapshot younger than the TTL is served without I/O; an older one (or none
//! at all) triggers one full enumeration of the store.
//!
//! Snapshots are published with an atomic pointer swap, so readers never
//! wait on each other. Refreshes are single-flight: a stale reader takes the
//! refresh gate, re-checks freshness, and only enumerates if nobody else
//! published a fresh snapshot while it waited.

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::DEFAULT_LISTING_TTL;
use crate::error::StoreError;
use crate::store::{ObjectEntry, ObjectStore};

/// Immutable capture of every object in the bucket
#[derive(Debug, Clone)]
pub struct ListingSnapshot {
    entries: Vec<ObjectEntry>,
    captured_at: DateTime<Utc>,
}

impl ListingSnapshot {
    pub fn new(entries: Vec<ObjectEntry>, captured_at: DateTime<Utc>) -> Self {
        Self {
            entries,
            captured_at,
        }
    }

    pub fn entries(&self) -> &[ObjectEntry] {
        &self.entries
    }

    /// When the enumeration backing this snapshot completed
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Entries whose key starts with `prefix`
    pub fn with_prefix(&self, prefix: &str) -> Vec<ObjectEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.key.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Listing cache over an [`ObjectStore`]
pub struct ListingCache {
    store: Arc<dyn ObjectStore>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    snapshot: ArcSwapOption<ListingSnapshot>,
    refresh_gate: Mutex<()>,
}

impl std::fmt::Debug for ListingCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListingCache")
            .field("store", &self.store.name())
            .field("ttl", &self.ttl)
            .field("snapshot_len", &self.snapshot.load_full().map(|s| s.len()))
            .finish()
    }
}

impl ListingCache {
    pub fn new(store: Arc<dyn ObjectStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            clock: Arc::new(SystemClock),
            snapshot: ArcSwapOption::empty(),
            refresh_gate: Mutex::new(()),
        }
    }

    /// Cache with the default 60 second lifetime
    pub fn with_default_ttl(store: Arc<dyn ObjectStore>) -> Self {
        Self::new(store, DEFAULT_LISTING_TTL)
    }

    /// Replace the time source used to stamp and age snapshots
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Currently published snapshot, fresh or not
    pub fn snapshot(&self) -> Option<Arc<ListingSnapshot>> {
        self.snapshot.load_full()
    }

    /// Drop the published snapshot so the next read enumerates again
    pub fn invalidate(&self) {
        self.snapshot.store(None);
        debug!("Listing cache invalidated");
    }

    fn is_fresh(&self, snapshot: &ListingSnapshot) -> bool {
        // A negative age means the clock went backwards; keep the snapshot
        match (self.clock.now() - snapshot.captured_at).to_std() {
            Ok(age) => age < self.ttl,
            Err(_) => true,
        }
    }

    fn fresh_snapshot(&self) -> Option<Arc<ListingSnapshot>> {
        self.snapshot
            .load_full()
            .filter(|snapshot| self.is_fresh(snapshot))
    }

    /// Enumerate the store and publish the result
    ///
    /// On failure the previous snapshot stays published.
    pub async fn refresh(&self) -> Result<Arc<ListingSnapshot>, StoreError> {
        let _gate = self.refresh_gate.lock().await;
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> Result<Arc<ListingSnapshot>, StoreError> {
        let entries = self.store.list_all_objects().await.map_err(|e| {
            warn!("Listing {} store failed: {}", self.store.name(), e);
            e
        })?;

        let snapshot = Arc::new(ListingSnapshot::new(entries, self.clock.now()));
        self.snapshot.store(Some(Arc::clone(&snapshot)));

        info!(
            "Refreshed listing from {} store: {} objects",
            self.store.name(),
            snapshot.len()
        );
        Ok(snapshot)
    }

    async fn current(&self) -> Result<Arc<ListingSnapshot>, StoreError> {
        if let Some(snapshot) = self.fresh_snapshot() {
            debug!("Listing cache hit ({} objects)", snapshot.len());
            return Ok(snapshot);
        }

        let _gate = self.refresh_gate.lock().await;
        if let Some(snapshot) = self.fresh_snapshot() {
            debug!("Reusing listing published while waiting for refresh");
            return Ok(snapshot);
        }

        debug!("Listing cache miss, refreshing");
        self.refresh_locked().await
    }

    /// Every cached entry whose key starts with `prefix`
    pub async fn get_by_prefix(&self, prefix: &str) -> Result<Vec<ObjectEntry>, StoreError> {
        let snapshot = self.current().await?;
        Ok(snapshot.with_prefix(prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;

    const TTL: Duration = Duration::from_millis(60_000);

    fn setup(keys: &[&str]) -> (Arc<MemoryStore>, Arc<ManualClock>, ListingCache) {
        let store = Arc::new(MemoryStore::with_keys(keys.iter().copied()));
        let clock = Arc::new(ManualClock::default());
        let cache = ListingCache::new(store.clone(), TTL).with_clock(clock.clone());
        (store, clock, cache)
    }

    fn keys(entries: Vec<ObjectEntry>) -> Vec<String> {
        entries.into_iter().map(|e| e.key).collect()
    }

    #[tokio::test]
    async fn test_fresh_snapshot_is_reused() {
        let (store, clock, cache) = setup(&["mod/a/1/archive.zip", "mod/b/1/archive.zip"]);

        let first = cache.get_by_prefix("mod/a").await.unwrap();
        clock.advance(chrono::Duration::milliseconds(59_999));
        let second = cache.get_by_prefix("mod/b").await.unwrap();

        assert_eq!(keys(first), vec!["mod/a/1/archive.zip"]);
        assert_eq!(keys(second), vec!["mod/b/1/archive.zip"]);
        assert_eq!(store.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_expired_snapshot_is_replaced() {
        let (store, clock, cache) = setup(&["mod/a/1/archive.zip"]);

        cache.get_by_prefix("mod/").await.unwrap();
        store.insert("mod/a/2/archive.zip", Vec::new());
        clock.advance(chrono::Duration::milliseconds(60_000));

        let entries = cache.get_by_prefix("mod/").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(store.list_calls(), 2);
    }

    #[tokio::test]
    async fn test_clock_going_backwards_keeps_snapshot() {
        let (store, clock, cache) = setup(&["mod/a/1/archive.zip"]);

        cache.get_by_prefix("mod/").await.unwrap();
        clock.advance(chrono::Duration::seconds(-30));
        cache.get_by_prefix("mod/").await.unwrap();

        assert_eq!(store.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let (store, clock, cache) = setup(&["mod/a/1/archive.zip"]);

        let before = cache.refresh().await.unwrap();
        store.set_unavailable(true);
        clock.advance(chrono::Duration::seconds(61));

        assert!(cache.get_by_prefix("mod/").await.is_err());

        let after = cache.snapshot().unwrap();
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(after.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_listing_is_cached() {
        let (store, _clock, cache) = setup(&[]);

        assert!(cache.get_by_prefix("mod/").await.unwrap().is_empty());
        assert!(cache.get_by_prefix("mod/").await.unwrap().is_empty());

        assert!(cache.snapshot().unwrap().is_empty());
        assert_eq!(store.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_enumeration() {
        let (store, _clock, cache) = setup(&["mod/a/1/archive.zip"]);

        cache.get_by_prefix("mod/").await.unwrap();
        cache.invalidate();
        assert!(cache.snapshot().is_none());

        cache.get_by_prefix("mod/").await.unwrap();
        assert_eq!(store.list_calls(), 2);
    }

    #[tokio::test]
    async fn test_snapshot_timestamp_comes_from_clock() {
        let (_store, clock, cache) = setup(&[]);

        let snapshot = cache.refresh().await.unwrap();
        assert_eq!(snapshot.captured_at(), clock.now());
    }
}
