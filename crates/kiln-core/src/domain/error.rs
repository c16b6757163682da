// ============================================================================
// domain/error.rs - COMPOSITION ERROR DOMAIN
// ============================================================================

use thiserror::Error;

/// Root domain error type.
///
/// All errors are:
/// - Cloneable (a deduplicated failure is handed to every waiter)
/// - Categorizable (for CLI display)
/// - Actionable (provides suggestions)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    // ========================================================================
    // Descriptor / Registry Errors
    // ========================================================================
    #[error("invalid module id '{id}': {reason}")]
    InvalidModuleId { id: String, reason: String },

    #[error("invalid category '{category}': {reason}")]
    InvalidCategory { category: String, reason: String },

    #[error("invalid version '{input}': {reason}")]
    InvalidVersion { input: String, reason: String },

    #[error("invalid version range '{input}': {reason}")]
    InvalidVersionRange { input: String, reason: String },

    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("module '{id}' is invalid: {}", .issues.join("; "))]
    InvalidDescriptor { id: String, issues: Vec<String> },

    #[error("module '{id}' is already registered")]
    DuplicateModule { id: String },

    #[error("Absolute paths not allowed: {path}")]
    AbsolutePathNotAllowed { path: String },

    #[error("Required field missing: {field}")]
    MissingRequiredField { field: &'static str },

    // ========================================================================
    // Resolution Errors
    // ========================================================================
    #[error("module '{id}' not found (required by {requested_by})")]
    ModuleNotFound { id: String, requested_by: String },

    #[error(
        "module '{requested_by}' requires '{id}' {required}, but version {found} is registered"
    )]
    VersionMismatch {
        id: String,
        found: String,
        required: String,
        requested_by: String,
    },

    #[error("circular dependency: {}", .path.join(" -> "))]
    CircularDependency { path: Vec<String> },

    #[error("module '{id}' does not support target {target}")]
    IncompatibleModule { id: String, target: String },

    #[error("conflicting modules [{}]: {reason}", .ids.join(", "))]
    Conflict { ids: Vec<String>, reason: String },

    // ========================================================================
    // Instantiation Errors
    // ========================================================================
    #[error(
        "'{dependency}' has no version satisfying both {first_module} ({first_range}) and {second_module} ({second_range})"
    )]
    DependencyVersionConflict {
        dependency: String,
        first_module: String,
        first_range: String,
        second_module: String,
        second_range: String,
    },

    #[error("module '{module}' uses unbound variable '{{{{{placeholder}}}}}' in {path}")]
    UnboundVariable {
        module: String,
        placeholder: String,
        path: String,
    },

    #[error("module '{module}' produced an unparseable {document} document at {path}: {reason}")]
    MalformedDocument {
        module: String,
        path: String,
        document: &'static str,
        reason: String,
    },
}

impl DomainError {
    /// Get user-actionable suggestions for fixing this error.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::ModuleNotFound { id, requested_by } => vec![
                format!("No module named '{id}' is registered"),
                format!("Check the dependency list of {requested_by}"),
                "Try: kiln modules to see available modules".into(),
            ],
            Self::CircularDependency { path } => vec![
                "Modules may not depend on themselves, directly or indirectly".into(),
                format!("Break the cycle: {}", path.join(" -> ")),
            ],
            Self::IncompatibleModule { id, target } => vec![
                format!("'{id}' cannot be used for {target}"),
                "Pick a different framework or archetype".into(),
                "Or declare a framework-specific variant for the module".into(),
            ],
            Self::Conflict { ids, .. } => vec![
                format!("Only one of [{}] can be active", ids.join(", ")),
                "Remove all but one of them from the request".into(),
                "Or use --strictness auto to let kiln pick a winner".into(),
            ],
            Self::DependencyVersionConflict {
                dependency,
                first_module,
                second_module,
                ..
            } => vec![
                format!("{first_module} and {second_module} disagree on '{dependency}'"),
                "Align the version ranges in the module descriptors".into(),
            ],
            Self::UnboundVariable { placeholder, .. } => vec![
                format!("Provide a value with --var {placeholder}=<value>"),
                "Or declare a default in the module descriptor".into(),
            ],
            Self::InvalidDescriptor { issues, .. } => {
                let mut out = vec!["Fix the module descriptor:".to_string()];
                out.extend(issues.iter().map(|i| format!("  • {i}")));
                out
            }
            _ => vec!["See documentation for more details".into()],
        }
    }

    /// Error category for CLI display styling.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidModuleId { .. }
            | Self::InvalidCategory { .. }
            | Self::InvalidVersion { .. }
            | Self::InvalidVersionRange { .. }
            | Self::InvalidTarget(_)
            | Self::InvalidDescriptor { .. }
            | Self::DuplicateModule { .. }
            | Self::AbsolutePathNotAllowed { .. }
            | Self::MissingRequiredField { .. }
            | Self::UnboundVariable { .. } => ErrorCategory::Validation,
            Self::VersionMismatch { .. }
            | Self::CircularDependency { .. }
            | Self::IncompatibleModule { .. }
            | Self::Conflict { .. }
            | Self::DependencyVersionConflict { .. } => ErrorCategory::Compatibility,
            Self::ModuleNotFound { .. } => ErrorCategory::NotFound,
            Self::MalformedDocument { .. } => ErrorCategory::Internal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Compatibility,
    NotFound,
    Internal,
}
