//! The `Target` value and the matchers modules use to declare support.
//!
//! A `Target` is the (framework, archetype) pair a request is generated for.
//! Modules declare which targets they support through [`TargetSupport`]:
//! either every target, or a list of [`TargetMatcher`]s where `None` fields are
//! wildcards.
//!
//! # Domain purity
//!
//! This module must not import `tracing`. Observability is the responsibility
//! of the application and CLI layers, not the domain.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{Archetype, Framework};

// ── Target ───────────────────────────────────────────────────────────────────

/// The platform and project shape a request is generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Target {
    framework: Framework,
    archetype: Archetype,
}

impl Target {
    pub const fn new(framework: Framework, archetype: Archetype) -> Self {
        Self {
            framework,
            archetype,
        }
    }

    pub const fn framework(&self) -> Framework {
        self.framework
    }

    pub const fn archetype(&self) -> Archetype {
        self.archetype
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.framework, self.archetype)
    }
}

// ── TargetMatcher ────────────────────────────────────────────────────────────

/// Declarative rule for which targets a module applies to.
///
/// Uses the open-world assumption: `None` means "don't care". All specified
/// constraints must match (AND logic).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TargetMatcher {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<Framework>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archetype: Option<Archetype>,
}

impl TargetMatcher {
    pub fn builder() -> TargetMatcherBuilder {
        TargetMatcherBuilder::default()
    }

    pub fn matches(&self, target: &Target) -> bool {
        self.framework.is_none_or(|f| f == target.framework())
            && self.archetype.is_none_or(|a| a == target.archetype())
    }

    /// Count of non-wildcard fields.
    pub fn specificity(&self) -> u8 {
        u8::from(self.framework.is_some()) + u8::from(self.archetype.is_some())
    }
}

impl fmt::Display for TargetMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fw = self.framework.map_or("*", |f| f.as_str());
        let arch = self.archetype.map_or("*", |a| a.as_str());
        write!(f, "{fw}/{arch}")
    }
}

#[derive(Default)]
pub struct TargetMatcherBuilder {
    framework: Option<Framework>,
    archetype: Option<Archetype>,
}

impl TargetMatcherBuilder {
    pub fn framework(mut self, framework: Framework) -> Self {
        self.framework = Some(framework);
        self
    }

    pub fn archetype(mut self, archetype: Archetype) -> Self {
        self.archetype = Some(archetype);
        self
    }

    pub fn build(self) -> TargetMatcher {
        TargetMatcher {
            framework: self.framework,
            archetype: self.archetype,
        }
    }
}

// ── TargetSupport ────────────────────────────────────────────────────────────

/// The set of targets a module can be generated for.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetSupport {
    /// Wildcard: every framework and archetype.
    #[default]
    Any,
    /// Only targets matched by at least one matcher.
    Only(Vec<TargetMatcher>),
}

impl TargetSupport {
    pub fn supports(&self, target: &Target) -> bool {
        match self {
            Self::Any => true,
            Self::Only(matchers) => matchers.iter().any(|m| m.matches(target)),
        }
    }

    /// Convenience for the common "these frameworks, any archetype" case.
    pub fn frameworks(frameworks: impl IntoIterator<Item = Framework>) -> Self {
        Self::Only(
            frameworks
                .into_iter()
                .map(|f| TargetMatcher::builder().framework(f).build())
                .collect(),
        )
    }

    /// Convenience for the "this archetype, any framework" case.
    pub fn archetype(archetype: Archetype) -> Self {
        Self::Only(vec![TargetMatcher::builder().archetype(archetype).build()])
    }
}

impl fmt::Display for TargetSupport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("*/*"),
            Self::Only(matchers) => {
                let parts: Vec<String> = matchers.iter().map(ToString::to_string).collect();
                f.write_str(&parts.join(", "))
            }
        }
    }
}
