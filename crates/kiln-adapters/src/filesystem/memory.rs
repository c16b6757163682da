//! In-memory filesystem adapter for testing.
//!
//! Besides storing files, it can inject faults: a number of upcoming writes
//! can be made to fail transiently, every write can be slowed down so
//! timeouts fire mid-materialization, and renames can return late.

use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use parking_lot::RwLock;

use kiln_core::application::{ApplicationError, ports::Filesystem};
use kiln_core::error::KilnResult;

/// In-memory filesystem for testing.
#[derive(Debug, Clone, Default)]
pub struct MemoryFilesystem {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    files: BTreeMap<PathBuf, String>,
    directories: BTreeSet<PathBuf>,
    failing_writes: u32,
    write_delay: Option<Duration>,
    rename_delay: Option<Duration>,
    writes: u64,
}

impl MemoryFilesystem {
    /// Create a new empty memory filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a file's content (testing helper).
    pub fn read_file(&self, path: impl AsRef<Path>) -> Option<String> {
        self.inner.read().files.get(path.as_ref()).cloned()
    }

    /// All stored file paths, sorted.
    pub fn list_files(&self) -> Vec<PathBuf> {
        self.inner.read().files.keys().cloned().collect()
    }

    pub fn file_count(&self) -> usize {
        self.inner.read().files.len()
    }

    /// Successful writes since creation.
    pub fn write_count(&self) -> u64 {
        self.inner.read().writes
    }

    /// Make the next `n` writes fail with a transient error.
    pub fn fail_next_writes(&self, n: u32) {
        self.inner.write().failing_writes = n;
    }

    /// Sleep this long before every write.
    pub fn set_write_delay(&self, delay: Duration) {
        self.inner.write().write_delay = Some(delay);
    }

    /// Sleep this long after every rename has taken effect.
    pub fn set_rename_delay(&self, delay: Duration) {
        self.inner.write().rename_delay = Some(delay);
    }

    /// Clear all contents. Fault settings are kept.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.files.clear();
        inner.directories.clear();
    }
}

impl Filesystem for MemoryFilesystem {
    fn create_dir_all(&self, path: &Path) -> KilnResult<()> {
        let mut inner = self.inner.write();
        let mut current = PathBuf::new();
        for component in path.components() {
            current.push(component);
            inner.directories.insert(current.clone());
        }
        Ok(())
    }

    fn write_file(&self, path: &Path, content: &str) -> KilnResult<()> {
        let delay = self.inner.read().write_delay;
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        let mut inner = self.inner.write();
        if inner.failing_writes > 0 {
            inner.failing_writes -= 1;
            return Err(ApplicationError::TransientIo {
                path: path.to_path_buf(),
                reason: "injected write failure".into(),
            }
            .into());
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !inner.directories.contains(parent) {
                return Err(ApplicationError::Filesystem {
                    path: path.to_path_buf(),
                    reason: "parent directory does not exist".into(),
                }
                .into());
            }
        }

        inner.files.insert(path.to_path_buf(), content.to_string());
        inner.writes += 1;
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        let inner = self.inner.read();
        inner.files.contains_key(path) || inner.directories.contains(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> KilnResult<()> {
        let delay = {
            let mut inner = self.inner.write();
            Self::move_tree(&mut inner, from, to)?;
            inner.rename_delay
        };
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        Ok(())
    }

    fn remove_dir_all(&self, path: &Path) -> KilnResult<()> {
        let mut inner = self.inner.write();
        inner.directories.retain(|p| !p.starts_with(path));
        inner.files.retain(|p, _| !p.starts_with(path));
        Ok(())
    }
}

impl MemoryFilesystem {
    fn move_tree(inner: &mut Inner, from: &Path, to: &Path) -> KilnResult<()> {
        if inner.directories.contains(to) || inner.files.contains_key(to) {
            return Err(ApplicationError::ProjectExists {
                path: to.to_path_buf(),
            }
            .into());
        }
        if !inner.directories.contains(from) {
            return Err(ApplicationError::Filesystem {
                path: from.to_path_buf(),
                reason: "source directory does not exist".into(),
            }
            .into());
        }

        let moved = |p: &Path| p.strip_prefix(from).ok().map(|rest| to.join(rest));

        let files = std::mem::take(&mut inner.files);
        inner.files = files
            .into_iter()
            .map(|(p, c)| (moved(&p).unwrap_or(p), c))
            .collect();

        let dirs = std::mem::take(&mut inner.directories);
        inner.directories = dirs
            .into_iter()
            .map(|p| moved(&p).unwrap_or(p))
            .collect();

        // Ancestors of the target exist after a successful rename.
        let mut current = PathBuf::new();
        for component in to.components() {
            current.push(component);
            inner.directories.insert(current.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_requires_parent() {
        let fs = MemoryFilesystem::new();
        assert!(fs.write_file(Path::new("a/b.txt"), "x").is_err());

        fs.create_dir_all(Path::new("a")).unwrap();
        fs.write_file(Path::new("a/b.txt"), "x").unwrap();
        assert_eq!(fs.read_file("a/b.txt").as_deref(), Some("x"));
        assert!(fs.exists(Path::new("a")));
    }

    #[test]
    fn rename_moves_the_whole_tree() {
        let fs = MemoryFilesystem::new();
        fs.create_dir_all(Path::new("out/.stage/src")).unwrap();
        fs.write_file(Path::new("out/.stage/src/a.ts"), "a").unwrap();
        fs.write_file(Path::new("out/.stage/b.md"), "b").unwrap();

        fs.rename(Path::new("out/.stage"), Path::new("out/app"))
            .unwrap();

        assert_eq!(
            fs.list_files(),
            vec![PathBuf::from("out/app/b.md"), PathBuf::from("out/app/src/a.ts")]
        );
        assert!(!fs.exists(Path::new("out/.stage")));
        assert!(fs.exists(Path::new("out/app/src")));
    }

    #[test]
    fn rename_refuses_existing_target() {
        let fs = MemoryFilesystem::new();
        fs.create_dir_all(Path::new("out/.stage")).unwrap();
        fs.create_dir_all(Path::new("out/app")).unwrap();

        let err = fs
            .rename(Path::new("out/.stage"), Path::new("out/app"))
            .unwrap_err();
        assert_eq!(err.kind(), "project-exists");
    }

    #[test]
    fn injected_failures_are_transient_and_run_out() {
        let fs = MemoryFilesystem::new();
        fs.create_dir_all(Path::new("d")).unwrap();
        fs.fail_next_writes(2);

        for _ in 0..2 {
            let err = fs.write_file(Path::new("d/f"), "x").unwrap_err();
            assert!(err.is_retryable());
        }
        fs.write_file(Path::new("d/f"), "x").unwrap();
        assert_eq!(fs.write_count(), 1);
    }

    #[test]
    fn remove_drops_nested_entries() {
        let fs = MemoryFilesystem::new();
        fs.create_dir_all(Path::new("p/q")).unwrap();
        fs.write_file(Path::new("p/q/r"), "x").unwrap();
        fs.remove_dir_all(Path::new("p")).unwrap();
        assert_eq!(fs.file_count(), 0);
        assert!(!fs.exists(Path::new("p/q")));
    }
}
