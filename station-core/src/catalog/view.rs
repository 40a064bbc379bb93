//! Grouped, ordered result of a catalog listing

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Artifact id to versions, newest first
///
/// Serializes as a plain JSON object: `{ "foo": ["1.1.0", "1.0.0"] }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatalogView {
    artifacts: BTreeMap<String, Vec<String>>,
}

impl CatalogView {
    /// Versions of `artifact_id` in catalog order
    pub fn versions(&self, artifact_id: &str) -> Option<&[String]> {
        self.artifacts.get(artifact_id).map(Vec::as_slice)
    }

    /// First version in catalog order
    pub fn latest(&self, artifact_id: &str) -> Option<&str> {
        self.versions(artifact_id)?.first().map(String::as_str)
    }

    pub fn artifact_count(&self) -> usize {
        self.artifacts.len()
    }

    pub fn version_count(&self) -> usize {
        self.artifacts.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.artifacts
            .iter()
            .map(|(id, versions)| (id.as_str(), versions.as_slice()))
    }

    pub fn into_inner(self) -> BTreeMap<String, Vec<String>> {
        self.artifacts
    }
}

impl From<BTreeMap<String, Vec<String>>> for CatalogView {
    fn from(artifacts: BTreeMap<String, Vec<String>>) -> Self {
        Self { artifacts }
    }
}
