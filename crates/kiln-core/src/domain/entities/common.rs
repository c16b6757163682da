use std::fmt;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;

/// A project-relative path, normalized to forward slashes.
///
/// Module contributions and the materialized file map must never contain
/// absolute paths or `..` components: a module could otherwise write outside
/// the project root.
///
/// The path is stored as a normalized `String` so that ordering (and therefore
/// every map keyed by it) is identical on every platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelativePath(String);

impl RelativePath {
    /// Try to create a relative path.
    pub fn try_new(path: impl AsRef<str>) -> Result<Self, DomainError> {
        let raw = path.as_ref().replace('\\', "/");
        let reject = || DomainError::AbsolutePathNotAllowed {
            path: path.as_ref().to_string(),
        };

        if raw.starts_with('/') || Path::new(&raw).is_absolute() || raw.contains(':') {
            return Err(reject());
        }

        let mut parts = Vec::new();
        for component in Path::new(&raw).components() {
            match component {
                Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(reject());
                }
            }
        }
        if parts.is_empty() {
            return Err(reject());
        }
        Ok(Self(parts.join("/")))
    }

    /// Create a new relative path.
    ///
    /// # Panics
    /// Panics if the provided path is absolute or escapes the root. Intended
    /// for compile-time literals in built-in catalogs and tests.
    pub fn new(path: impl AsRef<str>) -> Self {
        match Self::try_new(path) {
            Ok(p) => p,
            Err(e) => panic!("{e}"),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }

    /// File name component (e.g. `package.json`).
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Structural format implied by the file name.
    pub fn format(&self) -> FileFormat {
        FileFormat::from_file_name(self.file_name())
    }
}

impl AsRef<Path> for RelativePath {
    fn as_ref(&self) -> &Path {
        self.as_path()
    }
}

impl TryFrom<String> for RelativePath {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::try_new(s)
    }
}

impl From<RelativePath> for String {
    fn from(p: RelativePath) -> Self {
        p.0
    }
}

impl From<&str> for RelativePath {
    fn from(s: &str) -> Self {
        RelativePath::new(s)
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Structural format of a generated file, used to pick the escaping rule for
/// substituted values and the parser for structured merges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileFormat {
    Json,
    Toml,
    Yaml,
    /// `.env`-style `KEY="value"` files.
    Env,
    /// Source code with `//` line comments.
    SlashComment,
    /// Scripts and configs with `#` line comments.
    HashComment,
    Text,
}

impl FileFormat {
    pub fn from_file_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if lower == ".env" || lower.starts_with(".env.") || lower.ends_with(".env") {
            return Self::Env;
        }
        if matches!(lower.as_str(), ".gitignore" | ".dockerignore" | "dockerfile" | "makefile") {
            return Self::HashComment;
        }
        match lower.rsplit_once('.').map(|(_, ext)| ext) {
            Some("json") => Self::Json,
            Some("toml") => Self::Toml,
            Some("yaml" | "yml") => Self::Yaml,
            Some("js" | "jsx" | "ts" | "tsx" | "mjs" | "cjs" | "rs" | "go" | "java" | "kt"
            | "swift" | "dart" | "c" | "cpp" | "h" | "css" | "scss") => Self::SlashComment,
            Some("sh" | "py" | "rb" | "ini" | "cfg" | "conf" | "properties") => Self::HashComment,
            _ => Self::Text,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Toml => "toml",
            Self::Yaml => "yaml",
            Self::Env => "env",
            Self::SlashComment => "source",
            Self::HashComment => "config",
            Self::Text => "text",
        }
    }

    /// Line-comment prefix, if the format has one.
    pub const fn comment_prefix(&self) -> Option<&'static str> {
        match self {
            Self::Toml | Self::Yaml | Self::Env | Self::HashComment => Some("#"),
            Self::SlashComment => Some("//"),
            Self::Json | Self::Text => None,
        }
    }

    /// Whether the format has a parser the structured merge can use.
    pub const fn is_structured(&self) -> bool {
        matches!(self, Self::Json | Self::Toml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---------------------------------------------------------------------
    // RelativePath
    // ---------------------------------------------------------------------

    #[test]
    fn relative_path_accepts_relative() {
        let p = RelativePath::new("src/main.rs");
        assert_eq!(p.as_path(), Path::new("src/main.rs"));
        assert_eq!(p.file_name(), "main.rs");
    }

    #[test]
    fn relative_path_normalizes() {
        assert_eq!(RelativePath::new("./src//lib.rs").as_str(), "src/lib.rs");
        assert_eq!(RelativePath::new("src\\lib.rs").as_str(), "src/lib.rs");
    }

    #[test]
    #[should_panic]
    fn relative_path_rejects_absolute() {
        RelativePath::new("/etc/passwd");
    }

    #[test]
    fn try_new_rejects_escapes() {
        assert!(RelativePath::try_new("../outside.txt").is_err());
        assert!(RelativePath::try_new("src/../../x").is_err());
        assert!(RelativePath::try_new("C:/windows").is_err());
        assert!(RelativePath::try_new("").is_err());
        assert!(RelativePath::try_new(".").is_err());
    }

    // ---------------------------------------------------------------------
    // FileFormat
    // ---------------------------------------------------------------------

    #[test]
    fn formats_from_names() {
        assert_eq!(RelativePath::new("package.json").format(), FileFormat::Json);
        assert_eq!(RelativePath::new("Cargo.toml").format(), FileFormat::Toml);
        assert_eq!(RelativePath::new("ci/build.yml").format(), FileFormat::Yaml);
        assert_eq!(RelativePath::new(".env.example").format(), FileFormat::Env);
        assert_eq!(RelativePath::new(".gitignore").format(), FileFormat::HashComment);
        assert_eq!(RelativePath::new("src/app.tsx").format(), FileFormat::SlashComment);
        assert_eq!(RelativePath::new("README.md").format(), FileFormat::Text);
    }

    #[test]
    fn comment_prefixes() {
        assert_eq!(FileFormat::Env.comment_prefix(), Some("#"));
        assert_eq!(FileFormat::SlashComment.comment_prefix(), Some("//"));
        assert_eq!(FileFormat::Json.comment_prefix(), None);
    }
}
