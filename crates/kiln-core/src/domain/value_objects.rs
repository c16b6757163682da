//! Domain value objects: ModuleId, Category, Framework, Archetype, Strictness.
//!
//! # Design
//!
//! These are pure value types with equality-by-value and no identity. This
//! file's only job is to define the types, their string representations, and
//! their parsers. Identifier-like values (`ModuleId`, `Category`) are validated
//! on construction so that every instance in the system is well-formed.

use crate::domain::error::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Longest accepted module id or category name.
pub const MAX_IDENT_LEN: usize = 64;

/// Shared syntax check for ids and categories: lowercase ASCII letters,
/// digits and single hyphens, starting with a letter or digit.
fn check_ident(s: &str) -> Result<(), String> {
    if s.is_empty() {
        return Err("cannot be empty".into());
    }
    if s.len() > MAX_IDENT_LEN {
        return Err(format!(
            "is {} characters long; maximum is {MAX_IDENT_LEN}",
            s.len()
        ));
    }
    if s.starts_with('-') || s.ends_with('-') {
        return Err("cannot start or end with '-'".into());
    }
    if s.contains("--") {
        return Err("cannot contain consecutive '-'".into());
    }
    if let Some(bad) = s
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
    {
        return Err(format!(
            "contains '{bad}'; only lowercase letters, digits and '-' are allowed"
        ));
    }
    Ok(())
}

// ── ModuleId ─────────────────────────────────────────────────────────────────

/// Unique, syntactically valid module identifier (e.g. `auth-jwt`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModuleId(String);

impl ModuleId {
    pub fn parse(s: impl Into<String>) -> Result<Self, DomainError> {
        let s = s.into();
        check_ident(&s).map_err(|reason| DomainError::InvalidModuleId {
            id: s.clone(),
            reason,
        })?;
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ModuleId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ModuleId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<ModuleId> for String {
    fn from(id: ModuleId) -> Self {
        id.0
    }
}

impl AsRef<str> for ModuleId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ── Category ─────────────────────────────────────────────────────────────────

/// A capability grouping such as `auth`, `payments` or `storage`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Category(String);

impl Category {
    pub fn parse(s: impl Into<String>) -> Result<Self, DomainError> {
        let s = s.into();
        check_ident(&s).map_err(|reason| DomainError::InvalidCategory {
            category: s.clone(),
            reason,
        })?;
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Category {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Category {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<Category> for String {
    fn from(c: Category) -> Self {
        c.0
    }
}

// ── Framework ────────────────────────────────────────────────────────────────

/// The platform a generated project is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Framework {
    WebApp,
    Api,
    Mobile,
    Desktop,
    Cli,
}

impl Framework {
    pub const ALL: [Framework; 5] = [
        Self::WebApp,
        Self::Api,
        Self::Mobile,
        Self::Desktop,
        Self::Cli,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::WebApp => "web-app",
            Self::Api => "api",
            Self::Mobile => "mobile",
            Self::Desktop => "desktop",
            Self::Cli => "cli",
        }
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Framework {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "web-app" | "webapp" | "web" => Ok(Self::WebApp),
            "api" | "backend" => Ok(Self::Api),
            "mobile" => Ok(Self::Mobile),
            "desktop" => Ok(Self::Desktop),
            "cli" => Ok(Self::Cli),
            other => Err(DomainError::InvalidTarget(format!(
                "unknown framework: {other}"
            ))),
        }
    }
}

// ── Archetype ────────────────────────────────────────────────────────────────

/// The high-level shape of the generated project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Archetype {
    Foundation,
    Business,
    Performance,
    CrossPlatform,
}

impl Archetype {
    pub const ALL: [Archetype; 4] = [
        Self::Foundation,
        Self::Business,
        Self::Performance,
        Self::CrossPlatform,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Foundation => "foundation",
            Self::Business => "business",
            Self::Performance => "performance",
            Self::CrossPlatform => "cross-platform",
        }
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Archetype {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "foundation" | "base" => Ok(Self::Foundation),
            "business" => Ok(Self::Business),
            "performance" | "perf" => Ok(Self::Performance),
            "cross-platform" | "crossplatform" => Ok(Self::CrossPlatform),
            other => Err(DomainError::InvalidTarget(format!(
                "unknown archetype: {other}"
            ))),
        }
    }
}

// ── Strictness ───────────────────────────────────────────────────────────────

/// How the resolver treats conflicting modules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    /// Any conflict fails resolution.
    #[default]
    Strict,
    /// Keep one winner per conflict and record a warning for the rest.
    Auto,
}

impl Strictness {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Auto => "auto",
        }
    }
}

impl fmt::Display for Strictness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strictness {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "auto" => Ok(Self::Auto),
            other => Err(DomainError::InvalidTarget(format!(
                "unknown strictness: {other} (expected 'strict' or 'auto')"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_id_accepts_kebab_case() {
        assert_eq!(ModuleId::parse("auth-jwt").unwrap().as_str(), "auth-jwt");
        assert!(ModuleId::parse("s3").is_ok());
    }

    #[test]
    fn module_id_rejects_bad_syntax() {
        for bad in ["", "Auth", "auth_jwt", "-auth", "auth-", "a--b", "a b", "a@1"] {
            assert!(ModuleId::parse(bad).is_err(), "{bad:?} should be rejected");
        }
        assert!(ModuleId::parse("a".repeat(MAX_IDENT_LEN + 1)).is_err());
    }

    #[test]
    fn module_id_deserialize_validates() {
        let ok: ModuleId = serde_json::from_str("\"payment-stripe\"").unwrap();
        assert_eq!(ok.as_str(), "payment-stripe");
        assert!(serde_json::from_str::<ModuleId>("\"Payment\"").is_err());
    }

    #[test]
    fn framework_parses_aliases() {
        assert_eq!(Framework::from_str("web-app").unwrap(), Framework::WebApp);
        assert_eq!(Framework::from_str("WEB").unwrap(), Framework::WebApp);
        assert!(Framework::from_str("cobol").is_err());
    }

    #[test]
    fn archetype_round_trips_display() {
        for a in Archetype::ALL {
            assert_eq!(Archetype::from_str(a.as_str()).unwrap(), a);
        }
    }

    #[test]
    fn strictness_defaults_to_strict() {
        assert_eq!(Strictness::default(), Strictness::Strict);
        assert_eq!(Strictness::from_str("AUTO").unwrap(), Strictness::Auto);
    }
}
