//! Mapping `std::io` failures onto the pipeline's error taxonomy.

use std::io;
use std::path::Path;

use kiln_core::application::ApplicationError;
use kiln_core::error::KilnError;

/// Whether an I/O failure is worth retrying.
pub(crate) fn is_transient(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
            | io::ErrorKind::ResourceBusy
    )
}

pub(crate) fn map_io_error(path: &Path, e: io::Error, operation: &str) -> KilnError {
    let reason = format!("failed to {operation}: {e}");
    if is_transient(e.kind()) {
        ApplicationError::TransientIo {
            path: path.to_path_buf(),
            reason,
        }
        .into()
    } else {
        ApplicationError::Filesystem {
            path: path.to_path_buf(),
            reason,
        }
        .into()
    }
}
