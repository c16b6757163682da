//! Materialized output: the merged file map and package manifest.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::entities::common::RelativePath;
use crate::domain::version::VersionRange;
use crate::domain::warning::Warning;

/// Path → final content. Ordered, so iteration (and therefore every write and
/// every hash over it) is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileMap(BTreeMap<RelativePath, String>);

impl FileMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        RelativePath::try_new(path)
            .ok()
            .and_then(|p| self.0.get(&p))
            .map(String::as_str)
    }

    pub fn insert(&mut self, path: RelativePath, content: String) -> Option<String> {
        self.0.insert(path, content)
    }

    pub fn contains(&self, path: &RelativePath) -> bool {
        self.0.contains_key(path)
    }

    pub(crate) fn get_mut(&mut self, path: &RelativePath) -> Option<&mut String> {
        self.0.get_mut(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RelativePath, &String)> {
        self.0.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &RelativePath> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of content sizes in bytes.
    pub fn total_bytes(&self) -> usize {
        self.0.values().map(String::len).sum()
    }
}

/// One merged manifest dependency and the modules that asked for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub range: VersionRange,
    pub contributors: Vec<String>,
}

/// Merged package manifest: dependency name → intersected range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest(BTreeMap<String, ManifestEntry>);

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, dependency: &str) -> Option<&ManifestEntry> {
        self.0.get(dependency)
    }

    pub(crate) fn entry_mut(&mut self, dependency: &str) -> Option<&mut ManifestEntry> {
        self.0.get_mut(dependency)
    }

    pub(crate) fn insert(&mut self, dependency: String, entry: ManifestEntry) {
        self.0.insert(dependency, entry);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ManifestEntry)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `name → range` view, the shape package managers want.
    pub fn ranges(&self) -> BTreeMap<String, String> {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), v.range.to_string()))
            .collect()
    }
}

/// Result of instantiating a resolved module set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Instantiation {
    pub files: FileMap,
    pub manifest: Manifest,
    pub warnings: Vec<Warning>,
}
