//! Atomic materialization: write into a hidden sibling directory, then
//! rename it onto the project root.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::application::ApplicationError;
use crate::application::pipeline::cancel::CancelFlag;
use crate::application::ports::Filesystem;
use crate::domain::FileMap;
use crate::error::KilnResult;

pub(crate) fn staging_path(output_location: &Path, project_name: &str) -> PathBuf {
    output_location.join(format!(".{project_name}.kiln-{}", Uuid::new_v4().simple()))
}

/// Removes the staging directory unless disarmed.
struct StagingGuard<'a> {
    fs: &'a dyn Filesystem,
    path: PathBuf,
    armed: bool,
}

impl Drop for StagingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        debug!(path = %self.path.display(), "discarding staged output");
        if let Err(e) = self.fs.remove_dir_all(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove staging directory");
        }
    }
}

/// Write `files` under `output_location/project_name`.
///
/// Either the whole tree appears at the project root or nothing does. The
/// cancel flag is polled before every file and once more before the rename.
pub(crate) fn materialize(
    fs: &dyn Filesystem,
    output_location: &Path,
    project_name: &str,
    files: &FileMap,
    cancel: &CancelFlag,
) -> KilnResult<()> {
    let root = output_location.join(project_name);
    if fs.exists(&root) {
        return Err(ApplicationError::ProjectExists { path: root }.into());
    }

    let staging = staging_path(output_location, project_name);
    fs.create_dir_all(&staging)?;
    let mut guard = StagingGuard {
        fs,
        path: staging.clone(),
        armed: true,
    };

    for (path, content) in files.iter() {
        cancel.check()?;
        let target = staging.join(path.as_path());
        if let Some(parent) = target.parent() {
            if parent != staging {
                fs.create_dir_all(parent)?;
            }
        }
        fs.write_file(&target, content)?;
    }

    cancel.check()?;
    if fs.exists(&root) {
        return Err(ApplicationError::ProjectExists { path: root }.into());
    }
    fs.rename(&staging, &root)?;
    guard.armed = false;

    debug!(root = %root.display(), files = files.len(), "project materialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::MockFilesystem;
    use crate::domain::RelativePath;

    fn files() -> FileMap {
        let mut files = FileMap::new();
        files.insert(RelativePath::new("README.md"), "# shop\n".into());
        files.insert(RelativePath::new("src/index.ts"), "export {};\n".into());
        files
    }

    fn is_staging(p: &Path) -> bool {
        p.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(".shop.kiln-"))
    }

    #[test]
    fn staging_dir_is_a_hidden_sibling() {
        let path = staging_path(Path::new("/out"), "shop");
        assert_eq!(path.parent(), Some(Path::new("/out")));
        assert!(is_staging(&path));
        assert_ne!(path, staging_path(Path::new("/out"), "shop"));
    }

    #[test]
    fn writes_then_renames() {
        let mut fs = MockFilesystem::new();
        fs.expect_exists().returning(|_| false);
        fs.expect_create_dir_all().times(2).returning(|_| Ok(()));
        fs.expect_write_file().times(2).returning(|_, _| Ok(()));
        fs.expect_rename()
            .withf(|from, to| is_staging(from) && to == Path::new("/out/shop"))
            .times(1)
            .returning(|_, _| Ok(()));
        fs.expect_remove_dir_all().never();

        materialize(&fs, Path::new("/out"), "shop", &files(), &CancelFlag::new()).unwrap();
    }

    #[test]
    fn existing_root_is_refused_before_any_write() {
        let mut fs = MockFilesystem::new();
        fs.expect_exists()
            .withf(|p| p == Path::new("/out/shop"))
            .returning(|_| true);
        fs.expect_create_dir_all().never();
        fs.expect_write_file().never();

        let err = materialize(&fs, Path::new("/out"), "shop", &files(), &CancelFlag::new()).unwrap_err();
        assert_eq!(err.kind(), "project-exists");
    }

    #[test]
    fn failed_write_discards_staging() {
        let mut fs = MockFilesystem::new();
        fs.expect_exists().returning(|_| false);
        fs.expect_create_dir_all().returning(|_| Ok(()));
        fs.expect_write_file().returning(|path, _| {
            Err(ApplicationError::TransientIo {
                path: path.to_path_buf(),
                reason: "interrupted".into(),
            }
            .into())
        });
        fs.expect_rename().never();
        fs.expect_remove_dir_all()
            .withf(|p| is_staging(p))
            .times(1)
            .returning(|_| Ok(()));

        let err = materialize(&fs, Path::new("/out"), "shop", &files(), &CancelFlag::new()).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn cancellation_discards_staging() {
        let cancel = CancelFlag::new();
        cancel.cancel();

        let mut fs = MockFilesystem::new();
        fs.expect_exists().returning(|_| false);
        fs.expect_create_dir_all().times(1).returning(|_| Ok(()));
        fs.expect_write_file().never();
        fs.expect_rename().never();
        fs.expect_remove_dir_all().times(1).returning(|_| Ok(()));

        let err = materialize(&fs, Path::new("/out"), "shop", &files(), &cancel).unwrap_err();
        assert_eq!(err.kind(), "cancelled");
    }
}
