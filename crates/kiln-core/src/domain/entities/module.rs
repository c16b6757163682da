// ============================================================================
// entities/module.rs - MODULE DESCRIPTORS
// ============================================================================
//
// A module is a named, versioned unit that contributes files and manifest
// entries to a generated project. Descriptors are plain data: the registry
// checks them, the resolver walks their dependency edges, and the
// instantiation engine renders their contributions.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::entities::common::RelativePath;
use crate::domain::entities::module_config::ModuleConfig;
use crate::domain::entities::target::{Target, TargetSupport};
use crate::domain::error::DomainError;
use crate::domain::render::is_variable_name;
use crate::domain::value_objects::{Category, Framework, ModuleId};
use crate::domain::version::{Version, VersionRange};

// ============================================================================
// Dependency and conflict declarations
// ============================================================================

/// A declared dependency edge, optionally constrained to a version range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySpec {
    pub id: ModuleId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<VersionRange>,
}

impl DependencySpec {
    pub fn new(id: ModuleId) -> Self {
        Self { id, range: None }
    }

    pub fn with_range(id: ModuleId, range: VersionRange) -> Self {
        Self {
            id,
            range: Some(range),
        }
    }

    /// Parse `id` or `id@range` (e.g. `config-env@^1.0`).
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s.split_once('@') {
            Some((id, range)) => Ok(Self::with_range(
                ModuleId::parse(id.trim())?,
                VersionRange::parse(range.trim())?,
            )),
            None => Ok(Self::new(ModuleId::parse(s.trim())?)),
        }
    }
}

impl fmt::Display for DependencySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.range {
            Some(range) => write!(f, "{}@{range}", self.id),
            None => write!(f, "{}", self.id),
        }
    }
}

/// An explicit conflict declaration.
///
/// Serialized as the bare module id, or `category:<name>` for a category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ConflictRule {
    Module(ModuleId),
    Category(Category),
}

impl ConflictRule {
    /// Whether `other` is hit by this rule.
    pub fn matches(&self, other: &ModuleDescriptor) -> bool {
        match self {
            Self::Module(id) => *id == other.id,
            Self::Category(category) => other.category.as_ref() == Some(category),
        }
    }
}

impl TryFrom<String> for ConflictRule {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.strip_prefix("category:") {
            Some(category) => Ok(Self::Category(Category::parse(category)?)),
            None => Ok(Self::Module(ModuleId::parse(s)?)),
        }
    }
}

impl From<ConflictRule> for String {
    fn from(rule: ConflictRule) -> Self {
        rule.to_string()
    }
}

impl fmt::Display for ConflictRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Module(id) => write!(f, "{id}"),
            Self::Category(category) => write!(f, "category:{category}"),
        }
    }
}

// ============================================================================
// File contributions
// ============================================================================

/// How an incoming contribution combines with content already at its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeStrategy {
    /// Replace the earlier content (a warning is recorded).
    #[default]
    Override,
    /// Concatenate after a separator naming the module.
    Append,
    /// Deep-merge JSON or TOML documents.
    StructuredMerge,
}

impl MergeStrategy {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Override => "override",
            Self::Append => "append",
            Self::StructuredMerge => "structured-merge",
        }
    }
}

/// One file a module contributes: a path, opaque template text with
/// `{{PLACEHOLDER}}`s, and the strategy used when the path is already taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContribution {
    pub path: RelativePath,
    pub template: String,
    #[serde(default)]
    pub strategy: MergeStrategy,
}

impl FileContribution {
    pub fn new(path: impl Into<RelativePath>, template: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            template: template.into(),
            strategy: MergeStrategy::Override,
        }
    }

    pub fn append(mut self) -> Self {
        self.strategy = MergeStrategy::Append;
        self
    }

    pub fn structured(mut self) -> Self {
        self.strategy = MergeStrategy::StructuredMerge;
        self
    }

    pub fn strategy(mut self, strategy: MergeStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

// ============================================================================
// ModuleDescriptor
// ============================================================================

/// Everything the engine knows about one module.
///
/// ## Invariants (checked by [`ModuleDescriptor::issues`])
///
/// 1. A categorized module contributes files or manifest entries
/// 2. A baseline module contributes at least one file
/// 3. File paths are unique within the module
/// 4. Default variable names are valid identifiers
/// 5. The typed configuration validates
///
/// Dependency ids are *not* checked here: whether they exist is a question
/// for the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub id: ModuleId,
    pub version: Version,
    /// Exclusive category. At most one active module per category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    /// Opt out of category exclusivity.
    #[serde(default)]
    pub compatible_with_siblings: bool,
    /// Tie-breaker for auto conflict resolution (higher wins).
    #[serde(default)]
    pub priority: i32,
    /// Archetype scaffold, prepended to every request for a supported target.
    #[serde(default)]
    pub baseline: bool,
    #[serde(default)]
    pub dependencies: Vec<DependencySpec>,
    #[serde(default)]
    pub conflicts: Vec<ConflictRule>,
    #[serde(default)]
    pub support: TargetSupport,
    /// Framework-specific substitutes used when this module does not
    /// support the requested framework.
    #[serde(default)]
    pub variants: BTreeMap<Framework, ModuleId>,
    #[serde(default)]
    pub files: Vec<FileContribution>,
    /// Package manifest entries: dependency name to version range.
    #[serde(default)]
    pub manifest: BTreeMap<String, VersionRange>,
    /// Default values for template variables.
    #[serde(default)]
    pub defaults: BTreeMap<String, String>,
    #[serde(default)]
    pub config: ModuleConfig,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ModuleDescriptor {
    pub fn builder(id: impl Into<String>) -> ModuleDescriptorBuilder {
        ModuleDescriptorBuilder::new(id)
    }

    pub fn supports(&self, target: &Target) -> bool {
        self.support.supports(target)
    }

    /// Whether this module declares a conflict against `other`.
    pub fn conflicts_with(&self, other: &ModuleDescriptor) -> bool {
        self.id != other.id && self.conflicts.iter().any(|rule| rule.matches(other))
    }

    /// Whether two modules collide on an exclusive category.
    pub fn shares_exclusive_category(&self, other: &ModuleDescriptor) -> bool {
        self.id != other.id
            && !self.compatible_with_siblings
            && !other.compatible_with_siblings
            && self.category.is_some()
            && self.category == other.category
    }

    pub fn depends_on(&self, id: &ModuleId) -> bool {
        self.dependencies.iter().any(|d| d.id == *id)
    }

    /// `id@version`, the form used in registry revisions and logs.
    pub fn key(&self) -> String {
        format!("{}@{}", self.id, self.version)
    }

    /// Every invariant violation, as human-readable strings.
    pub fn issues(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.category.is_some() && self.files.is_empty() && self.manifest.is_empty() {
            issues.push("a categorized module must contribute files or manifest entries".into());
        }
        if self.baseline && self.files.is_empty() {
            issues.push("a baseline module must contribute at least one file".into());
        }

        let mut seen = HashSet::new();
        for file in &self.files {
            if !seen.insert(file.path.as_str()) {
                issues.push(format!("duplicate file contribution: {}", file.path));
            }
        }

        for name in self.defaults.keys() {
            if !is_variable_name(name) {
                issues.push(format!("default '{name}' is not a valid variable name"));
            }
        }

        if self.depends_on(&self.id) {
            issues.push("a module cannot depend on itself".into());
        }
        for (framework, variant) in &self.variants {
            if *variant == self.id {
                issues.push(format!("variant for {framework} points at the module itself"));
            }
        }

        issues.extend(self.config.validate().iter().map(ToString::to_string));
        issues
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        let issues = self.issues();
        if issues.is_empty() {
            Ok(())
        } else {
            Err(DomainError::InvalidDescriptor {
                id: self.id.to_string(),
                issues,
            })
        }
    }
}

impl fmt::Display for ModuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Builder for [`ModuleDescriptor`].
///
/// Setters take plain strings so catalogs read naturally; everything is
/// parsed in [`ModuleDescriptorBuilder::build`], which reports the first
/// syntax error it finds. Semantic invariants are left to the registry.
pub struct ModuleDescriptorBuilder {
    id: String,
    version: String,
    category: Option<String>,
    compatible_with_siblings: bool,
    priority: i32,
    baseline: bool,
    dependencies: Vec<String>,
    conflicts: Vec<String>,
    support: TargetSupport,
    variants: Vec<(Framework, String)>,
    files: Vec<FileContribution>,
    manifest: Vec<(String, String)>,
    defaults: BTreeMap<String, String>,
    config: Option<ModuleConfig>,
    description: String,
    tags: Vec<String>,
}

impl ModuleDescriptorBuilder {
    fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: "1.0.0".into(),
            category: None,
            compatible_with_siblings: false,
            priority: 0,
            baseline: false,
            dependencies: Vec::new(),
            conflicts: Vec::new(),
            support: TargetSupport::Any,
            variants: Vec::new(),
            files: Vec::new(),
            manifest: Vec::new(),
            defaults: BTreeMap::new(),
            config: None,
            description: String::new(),
            tags: Vec::new(),
        }
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn compatible_with_siblings(mut self) -> Self {
        self.compatible_with_siblings = true;
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn baseline(mut self) -> Self {
        self.baseline = true;
        self
    }

    /// Add a dependency, `id` or `id@range`.
    pub fn depends_on(mut self, dep: impl Into<String>) -> Self {
        self.dependencies.push(dep.into());
        self
    }

    /// Add a conflict, a module id or `category:<name>`.
    pub fn conflicts_with(mut self, rule: impl Into<String>) -> Self {
        self.conflicts.push(rule.into());
        self
    }

    pub fn support(mut self, support: TargetSupport) -> Self {
        self.support = support;
        self
    }

    pub fn variant(mut self, framework: Framework, id: impl Into<String>) -> Self {
        self.variants.push((framework, id.into()));
        self
    }

    pub fn file(mut self, file: FileContribution) -> Self {
        self.files.push(file);
        self
    }

    pub fn manifest(mut self, dependency: impl Into<String>, range: impl Into<String>) -> Self {
        self.manifest.push((dependency.into(), range.into()));
        self
    }

    pub fn default_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(name.into(), value.into());
        self
    }

    pub fn config(mut self, config: ModuleConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Consume the builder and construct the descriptor.
    ///
    /// # Errors
    ///
    /// Any malformed id, version, range, category or conflict rule.
    /// When no config is set, the category default is used.
    pub fn build(self) -> Result<ModuleDescriptor, DomainError> {
        let id = ModuleId::parse(self.id)?;
        let version = Version::parse(&self.version)?;
        let category = self.category.map(Category::parse).transpose()?;

        let dependencies = self
            .dependencies
            .iter()
            .map(|d| DependencySpec::parse(d))
            .collect::<Result<Vec<_>, _>>()?;

        let conflicts = self
            .conflicts
            .into_iter()
            .map(ConflictRule::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let variants = self
            .variants
            .into_iter()
            .map(|(fw, v)| ModuleId::parse(v).map(|v| (fw, v)))
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        let manifest = self
            .manifest
            .into_iter()
            .map(|(name, range)| VersionRange::parse(&range).map(|r| (name, r)))
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        let config = self
            .config
            .unwrap_or_else(|| ModuleConfig::default_for(category.as_ref()));

        Ok(ModuleDescriptor {
            id,
            version,
            category,
            compatible_with_siblings: self.compatible_with_siblings,
            priority: self.priority,
            baseline: self.baseline,
            dependencies,
            conflicts,
            support: self.support,
            variants,
            files: self.files,
            manifest,
            defaults: self.defaults,
            config,
            description: self.description,
            tags: self.tags,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth(id: &str) -> ModuleDescriptor {
        ModuleDescriptor::builder(id)
            .category("auth")
            .file(FileContribution::new(format!("src/{id}.ts").as_str(), "x"))
            .build()
            .unwrap()
    }

    #[test]
    fn builder_parses_declarations() {
        let m = ModuleDescriptor::builder("payment-stripe")
            .version("2.1.0")
            .category("payments")
            .depends_on("http-client")
            .depends_on("config-env@^1.0")
            .conflicts_with("category:billing")
            .manifest("stripe", "^14.0.0")
            .file(FileContribution::new("src/payments.ts", "// stripe"))
            .build()
            .unwrap();

        assert_eq!(m.key(), "payment-stripe@2.1.0");
        assert_eq!(m.dependencies.len(), 2);
        assert!(m.dependencies[1].range.is_some());
        assert_eq!(m.conflicts[0].to_string(), "category:billing");
        assert_eq!(m.config.kind(), "payments");
        assert!(m.validate().is_ok());
    }

    #[test]
    fn builder_rejects_bad_syntax() {
        assert!(ModuleDescriptor::builder("Bad Id").build().is_err());
        assert!(ModuleDescriptor::builder("ok").version("one").build().is_err());
        assert!(ModuleDescriptor::builder("ok").depends_on("x@>=2 <1").build().is_err());
    }

    #[test]
    fn categorized_module_without_contributions_is_invalid() {
        let m = ModuleDescriptor::builder("empty-auth").category("auth").build().unwrap();
        let err = m.validate().unwrap_err();
        assert!(matches!(err, DomainError::InvalidDescriptor { ref id, .. } if id == "empty-auth"));
    }

    #[test]
    fn issues_collects_everything() {
        let m = ModuleDescriptor::builder("broken")
            .baseline()
            .depends_on("broken")
            .default_var("not valid", "x")
            .build()
            .unwrap();
        assert_eq!(m.issues().len(), 3);
    }

    #[test]
    fn duplicate_paths_are_reported() {
        let m = ModuleDescriptor::builder("dup")
            .file(FileContribution::new("a.txt", "1"))
            .file(FileContribution::new("a.txt", "2"))
            .build()
            .unwrap();
        assert_eq!(m.issues(), vec!["duplicate file contribution: a.txt".to_string()]);
    }

    #[test]
    fn category_collisions() {
        let a = auth("auth-provider-a");
        let b = auth("auth-provider-b");
        assert!(a.shares_exclusive_category(&b));
        assert!(!a.shares_exclusive_category(&a));

        let mut c = auth("auth-audit");
        c.compatible_with_siblings = true;
        assert!(!a.shares_exclusive_category(&c));
    }

    #[test]
    fn explicit_conflicts() {
        let mut a = auth("auth-provider-a");
        let b = auth("auth-provider-b");
        assert!(!a.conflicts_with(&b));
        a.conflicts.push(ConflictRule::Module(b.id.clone()));
        assert!(a.conflicts_with(&b));
        assert!(!b.conflicts_with(&a));
    }

    #[test]
    fn dependency_spec_display() {
        let d = DependencySpec::parse("config-env@^1.2").unwrap();
        assert_eq!(d.to_string(), "config-env@^1.2");
        assert_eq!(DependencySpec::parse("http-client").unwrap().to_string(), "http-client");
    }

    #[test]
    fn merge_strategy_serde_names() {
        let s: MergeStrategy = serde_json::from_str("\"structured-merge\"").unwrap();
        assert_eq!(s, MergeStrategy::StructuredMerge);
        assert_eq!(MergeStrategy::default(), MergeStrategy::Override);
    }
}
