//! Unified error handling for Kiln Core.
//!
//! This module provides a unified error type that wraps domain and application
//! errors, with rich context and user-actionable suggestions.

use thiserror::Error;

use crate::application::ApplicationError;
use crate::domain::DomainError;

/// Root error type for Kiln Core operations.
///
/// Every variant is `Clone`: a failure computed once by an in-flight owner is
/// handed to every request waiting on the same fingerprint.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KilnError {
    /// Errors from the domain layer (composition rule violations).
    #[error("{0}")]
    Domain(#[from] DomainError),

    /// Errors from the application layer (orchestration failures).
    #[error("{0}")]
    Application(#[from] ApplicationError),

    /// Configuration or setup errors.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Unexpected internal errors (bugs).
    #[error("Internal error: {message}. This is a bug, please report it.")]
    Internal { message: String },
}

impl KilnError {
    /// Get user-actionable suggestions for fixing this error.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Domain(e) => e.suggestions(),
            Self::Application(e) => e.suggestions(),
            Self::Configuration { message } => vec![
                format!("Configuration issue: {message}"),
                "Check your setup and try again".into(),
            ],
            Self::Internal { .. } => vec![
                "This appears to be a bug in Kiln".into(),
                "Please report this issue with the command you ran".into(),
            ],
        }
    }

    /// Get error category for display/styling purposes.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Domain(e) => match e.category() {
                crate::domain::ErrorCategory::Validation => ErrorCategory::Validation,
                crate::domain::ErrorCategory::Compatibility => ErrorCategory::Compatibility,
                crate::domain::ErrorCategory::NotFound => ErrorCategory::NotFound,
                crate::domain::ErrorCategory::Internal => ErrorCategory::Internal,
            },
            Self::Application(e) => e.category(),
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Only transient I/O is retryable; everything else is terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Application(ApplicationError::TransientIo { .. })
        )
    }

    /// Whether a failure describes the request itself (and so is the same
    /// for every request with the same fingerprint) rather than this run.
    pub fn is_shareable(&self) -> bool {
        match self {
            Self::Domain(_) => true,
            Self::Application(ApplicationError::Validation { .. }) => true,
            _ => false,
        }
    }

    /// Short machine-readable name, used in logs and JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Domain(e) => match e {
                DomainError::ModuleNotFound { .. } => "module-not-found",
                DomainError::VersionMismatch { .. } => "version-mismatch",
                DomainError::CircularDependency { .. } => "circular-dependency",
                DomainError::IncompatibleModule { .. } => "incompatible-module",
                DomainError::Conflict { .. } => "conflict",
                DomainError::DependencyVersionConflict { .. } => "dependency-version-conflict",
                DomainError::UnboundVariable { .. } => "unbound-variable",
                DomainError::MalformedDocument { .. } => "malformed-document",
                DomainError::DuplicateModule { .. } => "duplicate-module",
                _ => "invalid-descriptor",
            },
            Self::Application(e) => match e {
                ApplicationError::Validation { .. } => "validation",
                ApplicationError::Timeout { .. } => "timeout",
                ApplicationError::TransientIo { .. } => "transient-io",
                ApplicationError::Filesystem { .. } => "filesystem",
                ApplicationError::ProjectExists { .. } => "project-exists",
                ApplicationError::Cache { .. } => "cache",
                ApplicationError::Cancelled => "cancelled",
                ApplicationError::WorkerFailed { .. } => "worker-failed",
            },
            Self::Configuration { .. } => "configuration",
            Self::Internal { .. } => "internal",
        }
    }
}

/// Error categories for UI display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Compatibility,
    NotFound,
    Configuration,
    Internal,
}

/// Convenient result type alias.
pub type KilnResult<T> = Result<T, KilnError>;
