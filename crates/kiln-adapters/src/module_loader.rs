//! Filesystem-based module loader.
//!
//! Discovers `module.toml` manifests one level below a directory and turns
//! each into a [`ModuleDescriptor`]. Every other file inside a module's
//! directory is a payload: it becomes a file contribution at the same
//! relative path, with its content used as the template.
//!
//! # Directory layout expected
//!
//! ```text
//! modules/
//! ├── audit-log/
//! │   ├── module.toml          ← manifest (required)
//! │   ├── .env.example
//! │   └── src/
//! │       └── audit.ts
//! └── feature-flags/
//!     ├── module.toml
//!     └── src/flags.ts
//! ```
//!
//! # `module.toml` format
//!
//! ```toml
//! [module]
//! id           = "audit-log"
//! version      = "1.0.0"
//! category     = "audit"                    # optional, exclusive slot
//! priority     = 0                          # auto-resolution tiebreak
//! baseline     = false
//! dependencies = ["config-env@^1.0.0"]
//! conflicts    = ["category:legacy-audit"]
//! description  = "Structured audit trail"
//! tags         = ["observability"]
//!
//! # Omit to support every target.
//! [[support]]
//! framework = "api"                         # optional
//! archetype = "business"                    # optional
//!
//! [variants]
//! mobile = "audit-log-lite"
//!
//! [manifest]
//! winston = "^3.11.0"
//!
//! [defaults]
//! AUDIT_LEVEL = "info"
//!
//! [config]
//! kind     = "generic"
//! settings = { AUDIT_SINK = "stdout" }
//!
//! # Per-file overrides. Payload files default to `override`.
//! [[files]]
//! path     = ".env.example"
//! strategy = "append"                       # override | append | structured-merge
//!
//! # Inline contributions need no payload file.
//! [[files]]
//! path     = "package.json"
//! strategy = "structured-merge"
//! template = '{"dependencies": {"winston": "^3.11.0"}}'
//! ```

use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use walkdir::WalkDir;

use kiln_core::domain::{
    DomainError, FileContribution, Framework, MergeStrategy, ModuleConfig, ModuleDescriptor,
    RelativePath, TargetMatcher, TargetSupport,
};

const MANIFEST_FILE: &str = "module.toml";

/// Failures while reading module directories.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("module directory not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error(transparent)]
    Domain(#[from] DomainError),
}

// ── Manifest types ────────────────────────────────────────────────────────────

/// Deserialised representation of a `module.toml` file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleManifest {
    pub module: ModuleSection,
    #[serde(default)]
    pub support: Vec<SupportEntry>,
    #[serde(default)]
    pub variants: BTreeMap<String, String>,
    #[serde(default)]
    pub manifest: BTreeMap<String, String>,
    #[serde(default)]
    pub defaults: BTreeMap<String, String>,
    pub config: Option<ModuleConfig>,
    #[serde(default)]
    pub files: Vec<FileEntry>,
}

/// `[module]` section.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleSection {
    pub id: String,
    #[serde(default = "default_version")]
    pub version: String,
    pub category: Option<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub baseline: bool,
    #[serde(default)]
    pub compatible_with_siblings: bool,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub conflicts: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_version() -> String {
    "1.0.0".into()
}

/// One `[[support]]` matcher. Missing fields are wildcards.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SupportEntry {
    pub framework: Option<String>,
    pub archetype: Option<String>,
}

/// One `[[files]]` entry.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileEntry {
    pub path: String,
    #[serde(default)]
    pub strategy: MergeStrategy,
    /// Inline content. When absent the payload file at `path` is used.
    pub template: Option<String>,
}

// ── Loader ────────────────────────────────────────────────────────────────────

/// Loads [`ModuleDescriptor`]s from a directory of module directories.
///
/// Subdirectories without a `module.toml`, or whose manifest or payload is
/// invalid, are logged at `WARN` and skipped; they never stop the rest of
/// the directory from loading.
pub struct FilesystemModuleLoader {
    modules_dir: PathBuf,
}

impl FilesystemModuleLoader {
    pub fn new(modules_dir: impl Into<PathBuf>) -> Self {
        Self {
            modules_dir: modules_dir.into(),
        }
    }

    /// Load every valid module, in directory-name order.
    ///
    /// # Errors
    ///
    /// [`LoadError::NotFound`] if the directory is missing and
    /// [`LoadError::Io`] if it cannot be listed.
    #[instrument(skip(self), fields(dir = %self.modules_dir.display()))]
    pub fn load_all(&self) -> Result<Vec<ModuleDescriptor>, LoadError> {
        if !self.modules_dir.is_dir() {
            return Err(LoadError::NotFound(self.modules_dir.clone()));
        }

        let mut modules = Vec::new();
        let walker = WalkDir::new(&self.modules_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name();

        for entry in walker {
            let entry = entry.map_err(|e| LoadError::Io {
                path: self.modules_dir.clone(),
                reason: e.to_string(),
            })?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let dir = entry.path();
            if !dir.join(MANIFEST_FILE).is_file() {
                debug!(dir = %dir.display(), "no module.toml, ignoring");
                continue;
            }

            match load_module(dir) {
                Ok(module) => {
                    debug!(id = %module.id, version = %module.version, "loaded module");
                    modules.push(module);
                }
                Err(e) => {
                    warn!(
                        dir = %dir.display(),
                        error = %e,
                        "skipping module directory due to load error"
                    );
                }
            }
        }

        debug!(count = modules.len(), "finished loading modules");
        Ok(modules)
    }
}

/// Load the single module rooted at `dir`.
pub fn load_module(dir: &Path) -> Result<ModuleDescriptor, LoadError> {
    let manifest_path = dir.join(MANIFEST_FILE);
    let raw = fs::read_to_string(&manifest_path).map_err(|e| LoadError::Io {
        path: manifest_path.clone(),
        reason: e.to_string(),
    })?;
    let manifest: ModuleManifest = toml::from_str(&raw).map_err(|e| LoadError::Parse {
        path: manifest_path.clone(),
        reason: e.to_string(),
    })?;

    let files = collect_files(dir, &manifest.files)?;
    let descriptor = build_descriptor(manifest, files)?;
    descriptor.validate()?;
    Ok(descriptor)
}

fn build_descriptor(
    manifest: ModuleManifest,
    files: Vec<FileContribution>,
) -> Result<ModuleDescriptor, LoadError> {
    let m = manifest.module;
    let mut builder = ModuleDescriptor::builder(m.id)
        .version(m.version)
        .priority(m.priority)
        .description(m.description);

    if let Some(category) = m.category {
        builder = builder.category(category);
    }
    if m.baseline {
        builder = builder.baseline();
    }
    if m.compatible_with_siblings {
        builder = builder.compatible_with_siblings();
    }
    for dep in m.dependencies {
        builder = builder.depends_on(dep);
    }
    for rule in m.conflicts {
        builder = builder.conflicts_with(rule);
    }
    for tag in m.tags {
        builder = builder.tag(tag);
    }

    if !manifest.support.is_empty() {
        let matchers = manifest
            .support
            .iter()
            .map(parse_matcher)
            .collect::<Result<Vec<_>, _>>()?;
        builder = builder.support(TargetSupport::Only(matchers));
    }
    for (framework, variant) in manifest.variants {
        builder = builder.variant(Framework::from_str(&framework)?, variant);
    }
    for (dependency, range) in manifest.manifest {
        builder = builder.manifest(dependency, range);
    }
    for (name, value) in manifest.defaults {
        builder = builder.default_var(name, value);
    }
    if let Some(config) = manifest.config {
        builder = builder.config(config);
    }
    for file in files {
        builder = builder.file(file);
    }

    Ok(builder.build()?)
}

fn parse_matcher(entry: &SupportEntry) -> Result<TargetMatcher, DomainError> {
    let mut matcher = TargetMatcher::builder();
    if let Some(framework) = &entry.framework {
        matcher = matcher.framework(framework.parse()?);
    }
    if let Some(archetype) = &entry.archetype {
        matcher = matcher.archetype(archetype.parse()?);
    }
    Ok(matcher.build())
}

/// Payload files first (sorted by path), then inline-only entries.
fn collect_files(dir: &Path, entries: &[FileEntry]) -> Result<Vec<FileContribution>, LoadError> {
    let overrides: BTreeMap<String, &FileEntry> = entries
        .iter()
        .map(|f| (normalize_path(&f.path), f))
        .collect();
    let mut seen = BTreeSet::new();
    let mut files = Vec::new();

    for walk_entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
        let walk_entry = walk_entry.map_err(|e| LoadError::Io {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })?;
        if !walk_entry.file_type().is_file() {
            continue;
        }
        let abs = walk_entry.path();
        let rel = abs.strip_prefix(dir).map_err(|_| LoadError::Io {
            path: abs.to_path_buf(),
            reason: format!("not inside {}", dir.display()),
        })?;
        let rel = normalize_path(&rel.to_string_lossy());
        if rel == MANIFEST_FILE {
            continue;
        }

        let path = RelativePath::try_new(&rel)?;
        let entry = overrides.get(&rel);
        let template = match entry.and_then(|e| e.template.clone()) {
            Some(inline) => inline,
            None => fs::read_to_string(abs).map_err(|e| LoadError::Io {
                path: abs.to_path_buf(),
                reason: e.to_string(),
            })?,
        };
        let strategy = entry.map(|e| e.strategy).unwrap_or_default();

        files.push(FileContribution::new(path, template).strategy(strategy));
        seen.insert(rel);
    }

    for (rel, entry) in &overrides {
        if seen.contains(rel) {
            continue;
        }
        let Some(template) = &entry.template else {
            return Err(LoadError::Parse {
                path: dir.join(MANIFEST_FILE),
                reason: format!("[[files]] entry '{rel}' has no payload file and no template"),
            });
        };
        files.push(
            FileContribution::new(RelativePath::try_new(rel)?, template.clone())
                .strategy(entry.strategy),
        );
    }

    Ok(files)
}

/// Forward slashes only, no leading `./`.
fn normalize_path(p: &str) -> String {
    let p = p.replace('\\', "/");
    p.strip_prefix("./").map(str::to_string).unwrap_or(p)
}
