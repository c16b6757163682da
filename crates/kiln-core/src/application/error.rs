//! Application layer errors.
//!
//! These errors represent failures in orchestration, not composition logic.
//! Composition errors are `DomainError` from `crate::domain`.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::error::ErrorCategory;

/// Errors that occur while running the generation pipeline.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApplicationError {
    /// The request failed validation. Every problem is listed.
    #[error("invalid request: {}", .issues.join("; "))]
    Validation { issues: Vec<String> },

    /// The run exceeded its time budget.
    #[error("generation timed out after {}ms", .limit.as_millis())]
    Timeout { limit: Duration },

    /// A filesystem or cache hiccup worth retrying.
    #[error("transient I/O failure at {path}: {reason}")]
    TransientIo { path: PathBuf, reason: String },

    /// Filesystem operation failed.
    #[error("filesystem error at {path}: {reason}")]
    Filesystem { path: PathBuf, reason: String },

    /// Project already exists at target location.
    #[error("project already exists at {path}")]
    ProjectExists { path: PathBuf },

    /// Cache store failure that is not transient (corrupt entry, bad path).
    #[error("cache error: {reason}")]
    Cache { reason: String },

    /// Work stopped because the run was cancelled.
    #[error("generation cancelled")]
    Cancelled,

    /// A rendering worker panicked or was aborted.
    #[error("worker failed: {reason}")]
    WorkerFailed { reason: String },
}

impl ApplicationError {
    pub fn validation(issues: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::Validation {
            issues: issues.into_iter().map(Into::into).collect(),
        }
    }

    /// Get user-actionable suggestions.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Validation { issues } => {
                let mut out = vec!["Fix the request:".to_string()];
                out.extend(issues.iter().map(|i| format!("  • {i}")));
                out
            }
            Self::Timeout { .. } => vec![
                "Increase the budget with --timeout".into(),
                "Or request fewer modules".into(),
            ],
            Self::TransientIo { path, .. } => vec![
                format!("Temporary failure accessing {}", path.display()),
                "Try again, or raise --max-retries".into(),
            ],
            Self::Filesystem { path, .. } => vec![
                format!("Failed to access: {}", path.display()),
                "Check that you have write permissions".into(),
                "Ensure the parent directory exists".into(),
            ],
            Self::ProjectExists { path } => vec![
                format!("Directory already exists: {}", path.display()),
                "Choose a different project name or output directory".into(),
            ],
            Self::Cache { .. } => vec![
                "The generation cache could not be used".into(),
                "Try again with --no-cache".into(),
            ],
            _ => vec!["Check the error details above".into()],
        }
    }

    /// Get error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } | Self::ProjectExists { .. } => ErrorCategory::Validation,
            Self::Timeout { .. } | Self::Cancelled => ErrorCategory::Internal,
            Self::TransientIo { .. }
            | Self::Filesystem { .. }
            | Self::Cache { .. }
            | Self::WorkerFailed { .. } => ErrorCategory::Internal,
        }
    }
}
