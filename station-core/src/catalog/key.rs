//! Object key layout for stored artifacts
//!
//! Every artifact version lives at exactly one key:
//! `mod/{artifact_id}/{version}/archive.zip`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CatalogError, Result};

/// Root of the artifact tree inside the bucket
pub const MOD_PREFIX: &str = "mod/";

/// File name of every stored archive
pub const ARCHIVE_NAME: &str = "archive.zip";

/// Artifact id and version decoded from (or encoded into) an object key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactKey {
    pub artifact_id: String,
    pub version: String,
}

impl ArtifactKey {
    /// Build a key, rejecting segments that would change the key shape
    pub fn new(artifact_id: impl Into<String>, version: impl Into<String>) -> Result<Self> {
        let key = Self {
            artifact_id: artifact_id.into(),
            version: version.into(),
        };

        let reason = if key.artifact_id.is_empty() {
            Some("artifact id is empty")
        } else if key.version.is_empty() {
            Some("version is empty")
        } else if key.artifact_id.contains('/') {
            Some("artifact id contains '/'")
        } else if key.version.contains('/') {
            Some("version contains '/'")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(CatalogError::InvalidKey {
                artifact_id: key.artifact_id,
                version: key.version,
                reason,
            }),
            None => Ok(key),
        }
    }

    /// Decode an object key; `None` for anything but the exact artifact shape
    pub fn parse(key: &str) -> Option<Self> {
        let rest = key.strip_prefix(MOD_PREFIX)?;
        let mut segments = rest.split('/');

        let artifact_id = segments.next()?;
        let version = segments.next()?;
        let file = segments.next()?;

        if segments.next().is_some()
            || artifact_id.is_empty()
            || version.is_empty()
            || file != ARCHIVE_NAME
        {
            return None;
        }

        Some(Self {
            artifact_id: artifact_id.to_string(),
            version: version.to_string(),
        })
    }

    /// Encoded object key
    pub fn object_key(&self) -> String {
        format!(
            "{}{}/{}/{}",
            MOD_PREFIX, self.artifact_id, self.version, ARCHIVE_NAME
        )
    }

    /// Listing prefix for an artifact id filter
    ///
    /// This is a raw string prefix: `foo` also matches `foobar`.
    pub fn prefix_for(artifact_id: Option<&str>) -> String {
        format!("{}{}", MOD_PREFIX, artifact_id.unwrap_or_default())
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.artifact_id, self.version)
    }
}
