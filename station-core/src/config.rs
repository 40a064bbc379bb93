//! Station configuration
//!
//! ## Configuration Sources (in precedence order)
//!
//! 1. Environment variables (`S3_ENDPOINT`, `S3_BUCKET`, ...)
//! 2. YAML file passed with `--config`
//! 3. Built-in defaults
//!
//! ## File Format
//!
//! ```yaml
//! store:
//!   endpoint: https://<account>.r2.cloudflarestorage.com
//!   region: auto
//!   bucket: mods
//!   access_key_id: ...
//!   secret_access_key: ...
//!   public_url_base: https://mods.example.com
//! cache:
//!   ttl_ms: 60000
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::ConfigError;

/// Default listing cache lifetime (60 seconds)
pub const DEFAULT_LISTING_TTL: Duration = Duration::from_millis(60_000);

pub const ENV_ENDPOINT: &str = "S3_ENDPOINT";
pub const ENV_REGION: &str = "S3_REGION";
pub const ENV_ACCESS_KEY_ID: &str = "S3_ACCESS_KEY_ID";
pub const ENV_SECRET_ACCESS_KEY: &str = "S3_SECRET_ACCESS_KEY";
pub const ENV_BUCKET: &str = "S3_BUCKET";
pub const ENV_PUBLIC_URL_BASE: &str = "S3_PUBLIC_URL_BASE";
pub const ENV_CACHE_TTL_MS: &str = "STATION_CACHE_TTL_MS";

/// Top-level station configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StationConfig {
    /// Backing object store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Listing cache settings
    #[serde(default)]
    pub cache: CacheConfig,
}

/// S3-compatible store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Service endpoint, e.g. `https://<account>.r2.cloudflarestorage.com`
    #[serde(default)]
    pub endpoint: String,

    /// Signing region ("auto" for R2)
    #[serde(default = "default_region")]
    pub region: String,

    /// Bucket holding the `mod/` tree
    #[serde(default)]
    pub bucket: String,

    #[serde(default)]
    pub access_key_id: String,

    #[serde(default)]
    pub secret_access_key: String,

    /// Public address objects are downloaded from
    #[serde(default)]
    pub public_url_base: String,

    /// HTTP timeout for store calls in seconds, 30 by default
    ///
    /// The catalog has no timeout or retry of its own, and a listing refresh
    /// holds the single-flight gate while its store call runs. This bound is
    /// what stops a hung connection from stalling every waiting `list`.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            region: default_region(),
            bucket: String::new(),
            access_key_id: String::new(),
            secret_access_key: String::new(),
            public_url_base: String::new(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_region() -> String {
    "auto".to_string()
}

fn default_timeout() -> u64 {
    30
}

/// Listing cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// How long a bucket listing is reused, in milliseconds
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: default_ttl_ms(),
        }
    }
}

fn default_ttl_ms() -> u64 {
    DEFAULT_LISTING_TTL.as_millis() as u64
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

impl StationConfig {
    /// Load configuration: optional file, then environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        config.warn_missing();
        Ok(config)
    }

    /// Parse a YAML config file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config = serde_yaml_ng::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        debug!("Loaded station config from {}", path.display());
        Ok(config)
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary lookup; empty values are ignored
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let store = &mut self.store;
        for (name, slot) in [
            (ENV_ENDPOINT, &mut store.endpoint),
            (ENV_REGION, &mut store.region),
            (ENV_ACCESS_KEY_ID, &mut store.access_key_id),
            (ENV_SECRET_ACCESS_KEY, &mut store.secret_access_key),
            (ENV_BUCKET, &mut store.bucket),
            (ENV_PUBLIC_URL_BASE, &mut store.public_url_base),
        ] {
            if let Some(value) = lookup(name) {
                *slot = value;
            }
        }

        if let Some(ttl) = lookup(ENV_CACHE_TTL_MS) {
            self.cache.ttl_ms = ttl.parse().map_err(|_| ConfigError::Invalid {
                name: ENV_CACHE_TTL_MS,
                message: format!("expected milliseconds, got {ttl:?}"),
            })?;
        }

        Ok(())
    }

    fn required(&self) -> [(&'static str, &'static str, &str); 5] {
        [
            ("store endpoint", ENV_ENDPOINT, self.store.endpoint.as_str()),
            (
                "store access key id",
                ENV_ACCESS_KEY_ID,
                self.store.access_key_id.as_str(),
            ),
            (
                "store secret access key",
                ENV_SECRET_ACCESS_KEY,
                self.store.secret_access_key.as_str(),
            ),
            ("store bucket", ENV_BUCKET, self.store.bucket.as_str()),
            (
                "public url base",
                ENV_PUBLIC_URL_BASE,
                self.store.public_url_base.as_str(),
            ),
        ]
    }

    /// Log a warning for every required setting that is still empty
    pub fn warn_missing(&self) {
        for (_, env, value) in self.required() {
            if value.is_empty() {
                warn!("{} is not specified", env);
            }
        }
    }

    /// Check that a store can be built from this configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some((name, env, _)) = self.required().into_iter().find(|(_, _, v)| v.is_empty()) {
            return Err(ConfigError::Missing { name, env });
        }

        for (name, value) in [
            ("store endpoint", self.store.endpoint.as_str()),
            ("public url base", self.store.public_url_base.as_str()),
        ] {
            url::Url::parse(value).map_err(|e| ConfigError::Invalid {
                name,
                message: format!("{value}: {e}"),
            })?;
        }

        if self.store.timeout_seconds == 0 {
            return Err(ConfigError::Invalid {
                name: "store timeout_seconds",
                message: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}
