//! Non-fatal findings returned alongside a successful result.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Warning {
    /// Auto mode kept `winner` and dropped `superseded`.
    ConflictAutoResolved {
        winner: String,
        superseded: String,
        reason: String,
    },
    /// `original` does not support the target; `variant` was used instead.
    VariantSubstituted {
        original: String,
        variant: String,
        target: String,
    },
    /// `module` replaced content an earlier module wrote at `path`.
    FileOverridden {
        path: String,
        previous: String,
        module: String,
    },
    /// A structured merge replaced a scalar at `key`.
    ValueOverridden {
        path: String,
        key: String,
        previous_module: String,
        module: String,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConflictAutoResolved {
                winner,
                superseded,
                reason,
            } => write!(f, "'{superseded}' superseded by '{winner}' ({reason})"),
            Self::VariantSubstituted {
                original,
                variant,
                target,
            } => write!(f, "'{original}' replaced by variant '{variant}' for {target}"),
            Self::FileOverridden {
                path,
                previous,
                module,
            } => write!(f, "{path}: content from '{previous}' overridden by '{module}'"),
            Self::ValueOverridden {
                path,
                key,
                previous_module,
                module,
            } => write!(
                f,
                "{path}: value at '{key}' from '{previous_module}' overridden by '{module}'"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_superseded_module() {
        let w = Warning::ConflictAutoResolved {
            winner: "auth-provider-a".into(),
            superseded: "auth-provider-b".into(),
            reason: "exclusive category 'auth'".into(),
        };
        assert_eq!(
            w.to_string(),
            "'auth-provider-b' superseded by 'auth-provider-a' (exclusive category 'auth')"
        );
    }

    #[test]
    fn serializes_with_kind_tag() {
        let w = Warning::FileOverridden {
            path: "README.md".into(),
            previous: "baseline-business".into(),
            module: "docs".into(),
        };
        let json = serde_json::to_value(&w).unwrap();
        assert_eq!(json["kind"], "file-overridden");
    }
}
