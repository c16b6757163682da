//! Local filesystem adapter using std::fs.

use std::path::Path;

use kiln_core::application::{ApplicationError, ports::Filesystem};
use kiln_core::error::KilnResult;

use crate::io::map_io_error;

/// Production filesystem implementation using `std::fs`.
#[derive(Debug, Clone, Copy)]
pub struct LocalFilesystem;

impl LocalFilesystem {
    /// Create a new local filesystem adapter.
    pub fn new() -> Self {
        Self
    }
}

impl Default for LocalFilesystem {
    fn default() -> Self {
        Self::new()
    }
}

impl Filesystem for LocalFilesystem {
    fn create_dir_all(&self, path: &Path) -> KilnResult<()> {
        std::fs::create_dir_all(path).map_err(|e| map_io_error(path, e, "create directory"))
    }

    fn write_file(&self, path: &Path, content: &str) -> KilnResult<()> {
        std::fs::write(path, content).map_err(|e| map_io_error(path, e, "write file"))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn rename(&self, from: &Path, to: &Path) -> KilnResult<()> {
        // POSIX rename replaces an empty target directory; refuse instead.
        if to.exists() {
            return Err(ApplicationError::ProjectExists {
                path: to.to_path_buf(),
            }
            .into());
        }
        std::fs::rename(from, to).map_err(|e| map_io_error(to, e, "move project into place"))
    }

    fn remove_dir_all(&self, path: &Path) -> KilnResult<()> {
        std::fs::remove_dir_all(path).map_err(|e| map_io_error(path, e, "remove directory"))
    }
}
