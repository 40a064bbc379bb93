//! Test helper functions for integration tests
//!
//! Shared across the test files using the tests/common/ pattern.

#![allow(dead_code)]

use station_core::catalog::{Catalog, ListingCache};
use station_core::clock::ManualClock;
use station_core::store::MemoryStore;
use std::sync::Arc;
use std::sync::Once;
use std::time::Duration;

/// Initialize logging for tests (only once per test run)
static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_level(true)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .with(tracing_subscriber::filter::EnvFilter::from_default_env())
            .try_init();
    });
}

pub const PUBLIC_BASE: &str = "https://mods.example.com";

/// Listing lifetime used by the cache tests
pub const TTL: Duration = Duration::from_millis(60_000);

/// A catalog over an in-memory store with a hand-driven clock
pub struct TestStation {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub catalog: Catalog,
}

pub fn station_with(store: MemoryStore) -> TestStation {
    init_test_logging();

    let store = Arc::new(store);
    let clock = Arc::new(ManualClock::default());
    let cache = ListingCache::new(store.clone(), TTL).with_clock(clock.clone());
    let catalog = Catalog::new(store.clone(), PUBLIC_BASE).with_listing_cache(cache);

    TestStation {
        store,
        clock,
        catalog,
    }
}

pub fn station_with_keys(keys: &[&str]) -> TestStation {
    station_with(MemoryStore::with_keys(keys.iter().copied()))
}
