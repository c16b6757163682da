//! Driven (output) ports - implemented by infrastructure.
//!
//! These traits define what the pipeline needs from external systems.
//! The `kiln-adapters` crate provides implementations.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{FileMap, Manifest, ModuleRef, Warning};
use crate::error::KilnResult;

/// Port for filesystem operations.
///
/// Implemented by:
/// - `kiln_adapters::filesystem::LocalFilesystem` (production)
/// - `kiln_adapters::filesystem::MemoryFilesystem` (testing, fault injection)
///
/// Methods are synchronous; the pipeline calls them from blocking tasks.
/// Implementations report recoverable hiccups (interrupted calls, timeouts,
/// contention) as `ApplicationError::TransientIo` so the pipeline can retry.
#[cfg_attr(test, mockall::automock)]
pub trait Filesystem: Send + Sync {
    /// Create a directory and all parent directories.
    fn create_dir_all(&self, path: &Path) -> KilnResult<()>;

    /// Write content to a file, replacing it if present.
    fn write_file(&self, path: &Path, content: &str) -> KilnResult<()>;

    /// Check if path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Move a directory into place. Must fail if `to` already exists.
    fn rename(&self, from: &Path, to: &Path) -> KilnResult<()>;

    /// Remove a directory and all contents.
    fn remove_dir_all(&self, path: &Path) -> KilnResult<()>;
}

/// Bumped whenever the shape of `CacheEntry` or the meaning of a fingerprint
/// changes. Entries written under another version are discarded.
pub const CACHE_SCHEMA_VERSION: u32 = 1;

/// A persisted generation result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: String,
    pub schema_version: u32,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub modules: Vec<ModuleRef>,
    pub files: FileMap,
    pub manifest: Manifest,
    pub warnings: Vec<Warning>,
}

impl CacheEntry {
    /// Whether the entry may be served at `now`.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.schema_version == CACHE_SCHEMA_VERSION && self.expires_at.is_none_or(|at| now < at)
    }
}

/// Port for the generation cache.
///
/// Implemented by:
/// - `kiln_adapters::cache_store::MemoryCacheStore` (bounded, in process)
/// - `kiln_adapters::cache_store::FsCacheStore` (one JSON document per key)
///
/// Stores hand out owned copies; nothing returned aliases stored state.
#[cfg_attr(test, mockall::automock)]
pub trait CacheStore: Send + Sync {
    /// Look up an entry by fingerprint.
    fn get(&self, fingerprint: &str) -> KilnResult<Option<CacheEntry>>;

    /// Insert or replace the entry for `entry.fingerprint`.
    fn put(&self, entry: CacheEntry) -> KilnResult<()>;

    /// Drop an entry. Removing a missing key is not an error.
    fn remove(&self, fingerprint: &str) -> KilnResult<()>;
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn entry(expires_at: Option<DateTime<Utc>>) -> CacheEntry {
        CacheEntry {
            fingerprint: "f".into(),
            schema_version: CACHE_SCHEMA_VERSION,
            created_at: Utc::now(),
            expires_at,
            modules: Vec::new(),
            files: FileMap::new(),
            manifest: Manifest::new(),
            warnings: Vec::new(),
        }
    }

    #[test]
    fn expiry_and_schema_gate_usability() {
        let now = Utc::now();
        assert!(entry(None).is_usable(now));
        assert!(entry(Some(now + Duration::seconds(5))).is_usable(now));
        assert!(!entry(Some(now - Duration::seconds(5))).is_usable(now));

        let mut stale = entry(None);
        stale.schema_version = CACHE_SCHEMA_VERSION + 1;
        assert!(!stale.is_usable(now));
    }
}
