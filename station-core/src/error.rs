//! Error types for the station catalog and its backing store

use thiserror::Error;

/// Failures reported by a backing object store
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store could not be reached (network, DNS, TLS, timeout)
    #[error("Object store request failed: {operation}")]
    Transport {
        operation: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The store answered with a non-success status
    #[error("Object store rejected {operation}: HTTP {status} - {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },

    /// The store answered, but the response body could not be understood
    #[error("Failed to parse object store response for {operation}: {message}")]
    Malformed {
        operation: &'static str,
        message: String,
    },

    /// Any other store-specific failure (used by test doubles)
    #[error("Object store unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced by [`crate::catalog::Catalog`]
#[derive(Error, Debug)]
pub enum CatalogError {
    /// The backing store call failed; nothing was retried
    #[error("Backing store unavailable")]
    StoreUnavailable(#[from] StoreError),

    /// The public base address and key did not form a valid URL
    #[error("Invalid download locator for key {key}")]
    Locator {
        key: String,
        #[source]
        source: url::ParseError,
    },

    /// An artifact id or version cannot be encoded as a single key segment
    #[error("Invalid artifact key {artifact_id}/{version}: {reason}")]
    InvalidKey {
        artifact_id: String,
        version: String,
        reason: &'static str,
    },
}

/// Configuration loading and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read a config file
    #[error("Failed to read station config from {path}")]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse a config file
    #[error("Failed to parse station config {path}")]
    Parse {
        path: std::path::PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },

    /// A required setting is empty after all sources were applied
    #[error("{name} is not specified\n\nSet the {env} environment variable or add it to the config file.")]
    Missing {
        name: &'static str,
        env: &'static str,
    },

    /// A setting is present but unusable
    #[error("Invalid value for {name}: {message}")]
    Invalid { name: &'static str, message: String },
}

pub type Result<T, E = CatalogError> = std::result::Result<T, E>;
