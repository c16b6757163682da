//! Error handling for the Kiln CLI.
//!
//! Provides structured errors with:
//! - User-friendly messages
//! - Actionable suggestions
//! - Exit code mapping

use std::error::Error;

use kiln_adapters::LoadError;
use kiln_core::error::{ErrorCategory as CoreCategory, KilnError};
use owo_colors::OwoColorize;
use thiserror::Error;

/// Result type alias for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

/// CLI error types.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input that clap could not catch.
    #[error("Invalid input: {message}")]
    InvalidInput {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // ── Config errors ──────────────────────────────────────────────────────
    /// A configuration value or file could not be used.
    #[error("Configuration error: {message}")]
    ConfigError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A module directory could not be loaded into the registry.
    #[error("Failed to load modules: {0}")]
    ModuleSource(#[from] LoadError),

    // ── Core errors ────────────────────────────────────────────────────────
    /// An error propagated from `kiln-core`.
    #[error("Generation failed: {0}")]
    Core(#[from] KilnError),

    // ── System errors ──────────────────────────────────────────────────────
    /// An I/O operation failed.
    #[error("I/O error: {message}")]
    IoError {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::IoError {
            message: err.to_string(),
            source: err,
        }
    }
}

impl CliError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
            source: None,
        }
    }

    /// Get user-actionable suggestions for fixing this error.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidInput { message, .. } => vec![
                format!("Check your input: {message}"),
                "Use --help for usage information".into(),
            ],

            Self::ConfigError { message, .. } => vec![
                format!("Configuration issue: {message}"),
                format!(
                    "Check your config file at {}",
                    crate::config::AppConfig::config_path().display()
                ),
                "Environment variables use the KILN_ prefix, e.g. KILN_PIPELINE__MAX_RETRIES"
                    .into(),
            ],

            Self::ModuleSource(_) => vec![
                "Each module directory needs a valid module.toml".into(),
                "Check the paths passed with --modules-dir or set in [modules] dirs".into(),
            ],

            Self::Core(core_err) => {
                let mut out = core_err.suggestions();
                if core_err.category() == CoreCategory::NotFound {
                    out.push("List available modules: kiln modules".into());
                }
                out
            }

            Self::IoError { message, .. } => vec![
                format!("I/O operation failed: {message}"),
                "Check file permissions".into(),
                "Check available disk space".into(),
            ],
        }
    }

    /// Get the error category for styling and exit codes.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidInput { .. } => ErrorCategory::UserError,
            Self::ConfigError { .. } | Self::ModuleSource(_) => ErrorCategory::Configuration,
            Self::Core(core) => match core.category() {
                CoreCategory::Validation | CoreCategory::Compatibility => ErrorCategory::UserError,
                CoreCategory::NotFound => ErrorCategory::NotFound,
                CoreCategory::Configuration => ErrorCategory::Configuration,
                CoreCategory::Internal => ErrorCategory::Internal,
            },
            Self::IoError { .. } => ErrorCategory::Internal,
        }
    }

    /// Exit code to pass to the OS.
    ///
    /// | Category      | Code |
    /// |---------------|------|
    /// | User error    |  2   |
    /// | Not found     |  3   |
    /// | Configuration |  4   |
    /// | Internal      |  1   |
    pub fn exit_code(&self) -> u8 {
        match self.category() {
            ErrorCategory::UserError => 2,
            ErrorCategory::NotFound => 3,
            ErrorCategory::Configuration => 4,
            ErrorCategory::Internal => 1,
        }
    }

    /// Short machine-readable name for JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "invalid-input",
            Self::ConfigError { .. } => "configuration",
            Self::ModuleSource(_) => "module-source",
            Self::Core(core) => core.kind(),
            Self::IoError { .. } => "io",
        }
    }

    /// Format the error for display with colors and suggestions.
    pub fn format_colored(&self, verbose: bool) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "\n{} {}\n\n",
            "\u{2717}".red().bold(),
            "Error:".red().bold()
        ));
        output.push_str(&format!("  {}\n", self.to_string().red()));

        if verbose {
            let mut source = self.source();
            while let Some(err) = source {
                output.push_str(&format!(
                    "\n  {} {}\n",
                    "\u{2192}".dimmed(),
                    err.to_string().dimmed()
                ));
                source = err.source();
            }
        }

        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            output.push_str(&format!("\n{}\n", "Suggestions:".yellow().bold()));
            for suggestion in suggestions {
                output.push_str(&format!("  {suggestion}\n"));
            }
        }

        if !verbose {
            output.push('\n');
            output.push_str(&format!(
                "{} {}\n",
                "\u{2139}".blue(),
                "Use -v / --verbose for more details.".dimmed(),
            ));
        }

        output
    }

    /// Plain-text version of [`Self::format_colored`], no ANSI codes.
    pub fn format_plain(&self, verbose: bool) -> String {
        let mut out = String::new();
        out.push_str(&format!("\nError: {self}\n"));

        if verbose {
            let mut src = self.source();
            while let Some(err) = src {
                out.push_str(&format!("  Caused by: {err}\n"));
                src = err.source();
            }
        }

        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            out.push_str("\nSuggestions:\n");
            for s in &suggestions {
                out.push_str(&format!("  {s}\n"));
            }
        }

        if !verbose {
            out.push_str("\nUse -v / --verbose for more details.\n");
        }

        out
    }

    /// JSON document for `--output-format json`.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "success": false,
            "error": {
                "kind": self.kind(),
                "message": self.to_string(),
                "exit_code": self.exit_code(),
                "suggestions": self.suggestions(),
            }
        })
    }

    /// Log the error using tracing.
    pub fn log(&self) {
        match self.category() {
            ErrorCategory::UserError => tracing::warn!(kind = self.kind(), "User error: {self}"),
            ErrorCategory::NotFound => tracing::warn!(kind = self.kind(), "Not found: {self}"),
            ErrorCategory::Configuration => {
                tracing::error!(kind = self.kind(), "Configuration error: {self}");
            }
            ErrorCategory::Internal => tracing::error!(kind = self.kind(), "Internal error: {self}"),
        }

        if let Some(source) = self.source() {
            tracing::debug!("Caused by: {source}");
        }
    }
}

/// Error categories for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// User input error (validation, conflicts, incompatible modules).
    UserError,
    /// Resource not found.
    NotFound,
    /// Configuration error.
    Configuration,
    /// Internal/system error.
    Internal,
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::path::PathBuf;

    use kiln_core::application::ApplicationError;
    use kiln_core::domain::DomainError;

    use super::*;

    fn core(err: impl Into<KilnError>) -> CliError {
        CliError::Core(err.into())
    }

    #[test]
    fn conflicts_and_cycles_are_user_errors() {
        let conflict = core(DomainError::Conflict {
            ids: vec!["auth-provider-a".into(), "auth-provider-b".into()],
            reason: "both provide auth".into(),
        });
        assert_eq!(conflict.exit_code(), 2);
        assert_eq!(conflict.kind(), "conflict");

        let cycle = core(DomainError::CircularDependency {
            path: vec!["a".into(), "b".into(), "a".into()],
        });
        assert_eq!(cycle.exit_code(), 2);
    }

    #[test]
    fn unknown_module_is_not_found_and_points_at_listing() {
        let err = core(DomainError::ModuleNotFound {
            id: "auth-magic".into(),
            requested_by: "request".into(),
        });
        assert_eq!(err.exit_code(), 3);
        assert!(err.suggestions().iter().any(|s| s.contains("kiln modules")));
    }

    #[test]
    fn project_exists_is_a_user_error() {
        let err = core(ApplicationError::ProjectExists {
            path: PathBuf::from("/tmp/shop"),
        });
        assert_eq!(err.exit_code(), 2);
        assert!(!err.suggestions().is_empty());
    }

    #[test]
    fn timeout_and_io_are_internal() {
        let timeout = core(ApplicationError::Timeout {
            limit: std::time::Duration::from_secs(1),
        });
        assert_eq!(timeout.exit_code(), 1);

        let io_err: CliError = io::Error::other("disk on fire").into();
        assert_eq!(io_err.exit_code(), 1);
    }

    #[test]
    fn configuration_errors_exit_four() {
        assert_eq!(CliError::config("bad strictness").exit_code(), 4);
        let core_config = core(KilnError::Configuration {
            message: "x".into(),
        });
        assert_eq!(core_config.exit_code(), 4);
    }

    #[test]
    fn plain_format_has_no_ansi() {
        let err = CliError::InvalidInput {
            message: "bad".into(),
            source: None,
        };
        let text = err.format_plain(false);
        assert!(!text.contains('\u{1b}'));
        assert!(text.contains("Suggestions:"));
        assert!(text.contains("--verbose"));
    }

    #[test]
    fn verbose_plain_format_shows_the_cause() {
        let err = CliError::ConfigError {
            message: "unreadable".into(),
            source: Some(Box::new(io::Error::other("permission denied"))),
        };
        let text = err.format_plain(true);
        assert!(text.contains("Caused by: permission denied"));
        assert!(!text.contains("--verbose"));
    }

    #[test]
    fn json_carries_kind_and_exit_code() {
        let err = core(DomainError::ModuleNotFound {
            id: "nope".into(),
            requested_by: "request".into(),
        });
        let json = err.to_json();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["kind"], "module-not-found");
        assert_eq!(json["error"]["exit_code"], 3);
    }
}
