//! Filesystem-backed cache store: one JSON document per fingerprint.

use std::path::{Path, PathBuf};

use tracing::{debug, instrument, warn};

use kiln_core::application::{
    ApplicationError,
    ports::{CACHE_SCHEMA_VERSION, CacheEntry, CacheStore},
};
use kiln_core::error::KilnResult;

use super::is_valid_key;
use crate::io::map_io_error;

/// Cache store persisting entries under `<dir>/<fingerprint>.json`.
///
/// Writes go to a uniquely named temporary file first and are renamed into
/// place, so concurrent readers see either the old or the new document.
/// Unreadable or foreign-schema documents are deleted and reported as misses.
#[derive(Debug, Clone)]
pub struct FsCacheStore {
    dir: PathBuf,
}

impl FsCacheStore {
    /// Open (and create if needed) a cache rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> KilnResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| map_io_error(&dir, e, "create cache dir"))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, fingerprint: &str) -> KilnResult<PathBuf> {
        if !is_valid_key(fingerprint) {
            return Err(ApplicationError::Cache {
                reason: format!("invalid cache key {fingerprint:?}"),
            }
            .into());
        }
        Ok(self.dir.join(format!("{fingerprint}.json")))
    }

    fn discard(&self, path: &Path, why: &str) {
        warn!(path = %path.display(), why, "discarding unreadable cache entry");
        if let Err(e) = std::fs::remove_file(path) {
            debug!(path = %path.display(), error = %e, "could not remove cache entry");
        }
    }
}

impl CacheStore for FsCacheStore {
    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    fn get(&self, fingerprint: &str) -> KilnResult<Option<CacheEntry>> {
        let path = self.path_for(fingerprint)?;
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(map_io_error(&path, e, "read cache entry")),
        };

        let entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                self.discard(&path, &e.to_string());
                return Ok(None);
            }
        };
        if entry.schema_version != CACHE_SCHEMA_VERSION || entry.fingerprint != fingerprint {
            self.discard(&path, "schema or key mismatch");
            return Ok(None);
        }
        Ok(Some(entry))
    }

    #[instrument(skip_all, fields(fingerprint = %entry.fingerprint))]
    fn put(&self, entry: CacheEntry) -> KilnResult<()> {
        let path = self.path_for(&entry.fingerprint)?;
        let body = serde_json::to_string(&entry).map_err(|e| ApplicationError::Cache {
            reason: format!("failed to serialize entry: {e}"),
        })?;

        let tmp = self
            .dir
            .join(format!(".{}.{}.tmp", entry.fingerprint, uuid::Uuid::new_v4().simple()));
        std::fs::write(&tmp, body).map_err(|e| map_io_error(&tmp, e, "write cache entry"))?;
        if let Err(e) = std::fs::rename(&tmp, &path) {
            if let Err(cleanup) = std::fs::remove_file(&tmp) {
                warn!(path = %tmp.display(), error = %cleanup, "failed to remove temporary cache file");
            }
            return Err(map_io_error(&path, e, "commit cache entry"));
        }
        debug!(path = %path.display(), "cache entry written");
        Ok(())
    }

    fn remove(&self, fingerprint: &str) -> KilnResult<()> {
        let path = self.path_for(fingerprint)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(map_io_error(&path, e, "remove cache entry")),
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::cache_store::fixtures::{entry, key};

    #[test]
    fn survives_reopening() {
        let temp = TempDir::new().unwrap();
        FsCacheStore::open(temp.path())
            .unwrap()
            .put(entry(&key(1)))
            .unwrap();

        let reopened = FsCacheStore::open(temp.path()).unwrap();
        let got = reopened.get(&key(1)).unwrap().unwrap();
        assert_eq!(got, entry_with_time(&key(1), got.created_at));
        assert!(temp.path().join(format!("{}.json", key(1))).exists());
    }

    fn entry_with_time(k: &str, at: chrono::DateTime<chrono::Utc>) -> CacheEntry {
        let mut e = entry(k);
        e.created_at = at;
        e
    }

    #[test]
    fn missing_entry_is_a_miss() {
        let temp = TempDir::new().unwrap();
        let store = FsCacheStore::open(temp.path()).unwrap();
        assert!(store.get(&key(2)).unwrap().is_none());
    }

    #[test]
    fn corrupt_entry_is_discarded() {
        let temp = TempDir::new().unwrap();
        let store = FsCacheStore::open(temp.path()).unwrap();
        let path = temp.path().join(format!("{}.json", key(3)));
        std::fs::write(&path, "{ not json").unwrap();

        assert!(store.get(&key(3)).unwrap().is_none());
        assert!(!path.exists());
    }

    #[test]
    fn foreign_schema_is_discarded() {
        let temp = TempDir::new().unwrap();
        let store = FsCacheStore::open(temp.path()).unwrap();
        let mut old = entry(&key(4));
        old.schema_version = CACHE_SCHEMA_VERSION + 1;
        store.put(old).unwrap();

        assert!(store.get(&key(4)).unwrap().is_none());
        assert!(!temp.path().join(format!("{}.json", key(4))).exists());
    }

    #[test]
    fn rejects_path_like_keys() {
        let temp = TempDir::new().unwrap();
        let store = FsCacheStore::open(temp.path()).unwrap();
        let err = store.get("../escape").unwrap_err();
        assert_eq!(err.kind(), "cache");
    }

    #[test]
    fn remove_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let store = FsCacheStore::open(temp.path()).unwrap();
        store.put(entry(&key(5))).unwrap();
        store.remove(&key(5)).unwrap();
        store.remove(&key(5)).unwrap();
        assert!(store.get(&key(5)).unwrap().is_none());
    }

    #[test]
    fn leaves_no_temporary_files() {
        let temp = TempDir::new().unwrap();
        let store = FsCacheStore::open(temp.path()).unwrap();
        for n in 0..5 {
            store.put(entry(&key(n))).unwrap();
        }
        let names: Vec<_> = std::fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 5);
        assert!(names.iter().all(|n| n.ends_with(".json") && !n.starts_with('.')));
    }
}
