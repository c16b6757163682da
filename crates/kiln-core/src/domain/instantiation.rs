// ============================================================================
// domain/instantiation.rs - RENDER AND MERGE
// ============================================================================
//
// Instantiation is split in two so the pipeline can parallelize the
// expensive half:
//
//   render_module   pure, per module, safe to fan out across workers
//   merge           single-threaded fold over rendered modules, in resolved
//                   order, applying each contribution's merge strategy
//
// `instantiate` chains the two for callers that don't care.
//
// Determinism: all maps are ordered (`BTreeMap`, and `serde_json::Value`
// objects are sorted), so identical inputs produce byte-identical output.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::domain::entities::common::{FileFormat, RelativePath};
use crate::domain::entities::module::{FileContribution, MergeStrategy, ModuleDescriptor};
use crate::domain::entities::output::{FileMap, Instantiation, Manifest, ManifestEntry};
use crate::domain::entities::resolved::{ModuleRef, ResolvedModuleSet};
use crate::domain::entities::target::Target;
use crate::domain::error::DomainError;
use crate::domain::render::RenderContext;
use crate::domain::version::VersionRange;
use crate::domain::warning::Warning;

/// One module's contributions after placeholder substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedModule {
    pub module: ModuleRef,
    pub files: Vec<RenderedFile>,
    pub manifest: BTreeMap<String, VersionRange>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFile {
    pub path: RelativePath,
    pub content: String,
    pub strategy: MergeStrategy,
}

impl RenderedModule {
    /// Approximate heap footprint of the rendered content.
    pub fn size_bytes(&self) -> usize {
        self.files
            .iter()
            .map(|f| f.content.len() + f.path.as_str().len())
            .sum()
    }
}

// ============================================================================
// Rendering
// ============================================================================

/// Variables for one module, layered lowest to highest: project built-ins,
/// module built-ins, descriptor defaults, typed config, request bindings.
pub fn module_context(
    module: &ModuleDescriptor,
    project: &RenderContext,
    bindings: &BTreeMap<String, String>,
) -> RenderContext {
    project
        .clone()
        .with_variable("MODULE_ID", module.id.as_str())
        .with_variable("MODULE_VERSION", module.version.to_string())
        .layer(module.defaults.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .layer(module.config.variables())
        .layer(bindings.iter().map(|(k, v)| (k.as_str(), v.as_str())))
}

/// Render a single file contribution.
pub fn render_file(
    module: &ModuleDescriptor,
    file: &FileContribution,
    ctx: &RenderContext,
) -> Result<RenderedFile, DomainError> {
    let format = file.path.format();
    let content = ctx
        .render(&file.template, format)
        .map_err(|unbound| DomainError::UnboundVariable {
            module: module.id.to_string(),
            placeholder: unbound.0,
            path: file.path.to_string(),
        })?;

    if file.strategy == MergeStrategy::StructuredMerge && format.is_structured() {
        parse_document(&content, format).map_err(|reason| DomainError::MalformedDocument {
            module: module.id.to_string(),
            path: file.path.to_string(),
            document: format.as_str(),
            reason,
        })?;
    }

    Ok(RenderedFile {
        path: file.path.clone(),
        content,
        strategy: file.strategy,
    })
}

/// Render every contribution of one module.
pub fn render_module(
    module: &ModuleDescriptor,
    project: &RenderContext,
    bindings: &BTreeMap<String, String>,
) -> Result<RenderedModule, DomainError> {
    let ctx = module_context(module, project, bindings);
    let files = module
        .files
        .iter()
        .map(|file| render_file(module, file, &ctx))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RenderedModule {
        module: ModuleRef::from(module),
        files,
        manifest: module.manifest.clone(),
    })
}

// ============================================================================
// Merging
// ============================================================================

/// Fold rendered modules, in resolved order, into one file map and manifest.
pub fn merge(rendered: impl IntoIterator<Item = RenderedModule>) -> Result<Instantiation, DomainError> {
    let mut merger = Merger::default();
    for module in rendered {
        merger.add(module)?;
    }
    Ok(merger.finish())
}

/// Render and merge a resolved set in one go.
pub fn instantiate(
    set: &ResolvedModuleSet,
    project_name: &str,
    bindings: &BTreeMap<String, String>,
) -> Result<Instantiation, DomainError> {
    let project = project_context(project_name, set.target());
    let rendered = set
        .iter()
        .map(|m| render_module(m, &project, bindings))
        .collect::<Result<Vec<_>, _>>()?;
    merge(rendered)
}

pub fn project_context(project_name: &str, target: Target) -> RenderContext {
    RenderContext::for_project(project_name, &target)
}

#[derive(Default)]
struct Merger {
    files: FileMap,
    manifest: Manifest,
    warnings: Vec<Warning>,
    /// Last module to write each path.
    owners: BTreeMap<RelativePath, String>,
    /// Module that set each scalar inside structured documents, keyed by
    /// path then dotted key.
    value_owners: BTreeMap<RelativePath, BTreeMap<String, String>>,
}

impl Merger {
    fn add(&mut self, rendered: RenderedModule) -> Result<(), DomainError> {
        let module = rendered.module.id.to_string();

        for file in rendered.files {
            self.add_file(&module, file)?;
        }

        for (dependency, range) in rendered.manifest {
            self.add_manifest(&module, dependency, range)?;
        }
        Ok(())
    }

    fn add_file(&mut self, module: &str, file: RenderedFile) -> Result<(), DomainError> {
        if !self.files.contains(&file.path) {
            self.owners.insert(file.path.clone(), module.to_string());
            self.files.insert(file.path, file.content);
            return Ok(());
        }

        let previous = self
            .owners
            .get(&file.path)
            .cloned()
            .unwrap_or_default();
        let format = file.path.format();
        let Some(existing) = self.files.get_mut(&file.path) else {
            return Ok(());
        };

        match file.strategy {
            MergeStrategy::Override => {
                *existing = file.content;
                self.warnings.push(Warning::FileOverridden {
                    path: file.path.to_string(),
                    previous,
                    module: module.to_string(),
                });
            }
            MergeStrategy::StructuredMerge if format.is_structured() => {
                let mut base = parse_document(existing, format).map_err(|reason| {
                    DomainError::MalformedDocument {
                        module: previous.clone(),
                        path: file.path.to_string(),
                        document: format.as_str(),
                        reason,
                    }
                })?;
                let incoming = parse_document(&file.content, format).map_err(|reason| {
                    DomainError::MalformedDocument {
                        module: module.to_string(),
                        path: file.path.to_string(),
                        document: format.as_str(),
                        reason,
                    }
                })?;

                let owners = self.value_owners.entry(file.path.clone()).or_default();
                let mut doc = DocMerge {
                    path: &file.path,
                    module,
                    file_owner: &previous,
                    owners,
                    warnings: &mut self.warnings,
                };
                doc.merge_value(&mut base, incoming, &mut Vec::new())?;

                *existing = write_document(&base, format).map_err(|reason| {
                    DomainError::MalformedDocument {
                        module: module.to_string(),
                        path: file.path.to_string(),
                        document: format.as_str(),
                        reason,
                    }
                })?;
            }
            // Structured merge of a format without a parser degrades to append.
            MergeStrategy::Append | MergeStrategy::StructuredMerge => {
                append_section(existing, module, format, &file.content);
            }
        }

        self.owners.insert(file.path, module.to_string());
        Ok(())
    }

    fn add_manifest(
        &mut self,
        module: &str,
        dependency: String,
        range: VersionRange,
    ) -> Result<(), DomainError> {
        match self.manifest.entry_mut(&dependency) {
            Some(entry) => {
                let merged = entry.range.intersect(&range).ok_or_else(|| {
                    DomainError::DependencyVersionConflict {
                        dependency: dependency.clone(),
                        first_module: entry.contributors.join(", "),
                        first_range: entry.range.to_string(),
                        second_module: module.to_string(),
                        second_range: range.to_string(),
                    }
                })?;
                entry.range = merged;
                entry.contributors.push(module.to_string());
            }
            None => self.manifest.insert(
                dependency,
                ManifestEntry {
                    range,
                    contributors: vec![module.to_string()],
                },
            ),
        }
        Ok(())
    }

    fn finish(self) -> Instantiation {
        Instantiation {
            files: self.files,
            manifest: self.manifest,
            warnings: self.warnings,
        }
    }
}

/// Join `incoming` onto `existing` after a separator naming `module`: a
/// comment line in the file's syntax, or a blank line when it has none.
fn append_section(existing: &mut String, module: &str, format: FileFormat, incoming: &str) {
    if !existing.is_empty() && !existing.ends_with('\n') {
        existing.push('\n');
    }
    match format.comment_prefix() {
        Some(prefix) => {
            existing.push('\n');
            existing.push_str(&format!("{prefix} --- {module} ---\n"));
        }
        None => existing.push('\n'),
    }
    existing.push_str(incoming);
}

// ============================================================================
// Structured documents
// ============================================================================

fn parse_document(content: &str, format: FileFormat) -> Result<Value, String> {
    match format {
        FileFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        FileFormat::Toml => {
            let table: toml::Table = toml::from_str(content).map_err(|e| e.to_string())?;
            serde_json::to_value(table).map_err(|e| e.to_string())
        }
        other => Err(format!("{} documents cannot be merged", other.as_str())),
    }
}

fn write_document(value: &Value, format: FileFormat) -> Result<String, String> {
    match format {
        FileFormat::Json => serde_json::to_string_pretty(value)
            .map(|s| s + "\n")
            .map_err(|e| e.to_string()),
        FileFormat::Toml => toml::to_string(value).map_err(|e| e.to_string()),
        other => Err(format!("{} documents cannot be written", other.as_str())),
    }
}

struct DocMerge<'a> {
    path: &'a RelativePath,
    module: &'a str,
    /// Owner of values no one has touched since the file was first written.
    file_owner: &'a str,
    owners: &'a mut BTreeMap<String, String>,
    warnings: &'a mut Vec<Warning>,
}

impl DocMerge<'_> {
    fn merge_value(
        &mut self,
        base: &mut Value,
        incoming: Value,
        keys: &mut Vec<String>,
    ) -> Result<(), DomainError> {
        match (base, incoming) {
            (Value::Object(base), Value::Object(incoming)) => {
                for (key, value) in incoming {
                    keys.push(key.clone());
                    match base.get_mut(&key) {
                        Some(existing) => self.merge_value(existing, value, keys)?,
                        None => {
                            self.owners.insert(keys.join("."), self.module.to_string());
                            base.insert(key, value);
                        }
                    }
                    keys.pop();
                }
                Ok(())
            }
            (Value::Array(base), Value::Array(incoming)) => {
                for item in incoming {
                    if !base.contains(&item) {
                        base.push(item);
                    }
                }
                Ok(())
            }
            (base, incoming) if *base == incoming => Ok(()),
            (base, incoming) => self.merge_scalar(base, incoming, keys),
        }
    }

    fn merge_scalar(
        &mut self,
        base: &mut Value,
        incoming: Value,
        keys: &[String],
    ) -> Result<(), DomainError> {
        let dotted = keys.join(".");
        let previous = self
            .owners
            .get(&dotted)
            .cloned()
            .unwrap_or_else(|| self.file_owner.to_string());

        if let (Some(a), Some(b)) = (base.as_str(), incoming.as_str()) {
            if let Some((first, second)) = version_pair(keys, a, b) {
                let merged =
                    first
                        .intersect(&second)
                        .ok_or_else(|| DomainError::DependencyVersionConflict {
                            dependency: dependency_name(keys),
                            first_module: previous.clone(),
                            first_range: a.to_string(),
                            second_module: self.module.to_string(),
                            second_range: b.to_string(),
                        })?;
                let owner = if merged.as_str() == b {
                    self.module.to_string()
                } else if merged.as_str() == a {
                    previous
                } else {
                    format!("{previous}, {}", self.module)
                };
                *base = Value::String(merged.as_str().to_string());
                self.owners.insert(dotted, owner);
                return Ok(());
            }
        }

        *base = incoming;
        self.warnings.push(Warning::ValueOverridden {
            path: self.path.to_string(),
            key: dotted.clone(),
            previous_module: previous,
            module: self.module.to_string(),
        });
        self.owners.insert(dotted, self.module.to_string());
        Ok(())
    }
}

/// Both sides as version ranges, when the key sits in a dependency table and
/// both values look like requirements.
fn version_pair(keys: &[String], a: &str, b: &str) -> Option<(VersionRange, VersionRange)> {
    if !in_dependency_table(keys)
        || !VersionRange::looks_like_range(a)
        || !VersionRange::looks_like_range(b)
    {
        return None;
    }
    Some((VersionRange::parse(a).ok()?, VersionRange::parse(b).ok()?))
}

/// Whether the key path runs through a dependency table
/// (`dependencies`, `devDependencies`, `dev-dependencies`, ...).
fn in_dependency_table(keys: &[String]) -> bool {
    keys.iter()
        .rev()
        .skip(1)
        .any(|k| k.to_ascii_lowercase().contains("dependencies"))
}

/// The package a version key belongs to: the key itself, or its parent for
/// `{ version = "..." }` tables.
fn dependency_name(keys: &[String]) -> String {
    match keys {
        [.., parent, last] if last == "version" => parent.clone(),
        [.., last] => last.clone(),
        [] => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::registry::ModuleRegistry;
    use crate::domain::resolver::resolve;
    use crate::domain::value_objects::{Archetype, Framework, ModuleId, Strictness};

    fn web() -> Target {
        Target::new(Framework::WebApp, Archetype::Business)
    }

    fn set_of(mods: Vec<ModuleDescriptor>, roots: &[&str]) -> ResolvedModuleSet {
        let reg = ModuleRegistry::from_descriptors(mods).unwrap();
        let ids: Vec<ModuleId> = roots.iter().map(|r| ModuleId::parse(*r).unwrap()).collect();
        resolve(&reg, &ids, web(), Strictness::Strict).unwrap()
    }

    fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn renders_with_layered_variables() {
        let m = ModuleDescriptor::builder("greeter")
            .default_var("GREETING", "hello")
            .default_var("TARGET", "world")
            .file(FileContribution::new(
                "greet.txt",
                "{{GREETING}} {{TARGET}} from {{MODULE_ID}}@{{MODULE_VERSION}} in {{PROJECT_NAME_KEBAB}}",
            ))
            .build()
            .unwrap();
        let set = set_of(vec![m], &["greeter"]);
        let out = instantiate(&set, "My App", &vars(&[("TARGET", "kiln")])).unwrap();
        assert_eq!(
            out.files.get("greet.txt"),
            Some("hello kiln from greeter@1.0.0 in my-app")
        );
    }

    #[test]
    fn config_variables_sit_between_defaults_and_bindings() {
        let m = ModuleDescriptor::builder("auth-jwt")
            .category("auth")
            .default_var("AUTH_STRATEGY", "overridden-by-config")
            .file(FileContribution::new(".env.example", "AUTH={{AUTH_STRATEGY}} TTL={{AUTH_TOKEN_TTL_SECS}}"))
            .build()
            .unwrap();
        let set = set_of(vec![m], &["auth-jwt"]);

        let out = instantiate(&set, "app", &BTreeMap::new()).unwrap();
        assert_eq!(out.files.get(".env.example"), Some("AUTH=jwt TTL=3600"));

        let out = instantiate(&set, "app", &vars(&[("AUTH_TOKEN_TTL_SECS", "60")])).unwrap();
        assert_eq!(out.files.get(".env.example"), Some("AUTH=jwt TTL=60"));
    }

    #[test]
    fn unbound_placeholder_names_module_and_path() {
        let m = ModuleDescriptor::builder("mailer")
            .file(FileContribution::new("mail.toml", "host = \"{{SMTP_HOST}}\""))
            .build()
            .unwrap();
        let set = set_of(vec![m], &["mailer"]);
        let err = instantiate(&set, "app", &BTreeMap::new()).unwrap_err();
        assert_eq!(
            err,
            DomainError::UnboundVariable {
                module: "mailer".into(),
                placeholder: "SMTP_HOST".into(),
                path: "mail.toml".into(),
            }
        );
    }

    #[test]
    fn override_replaces_and_warns() {
        let a = ModuleDescriptor::builder("a")
            .file(FileContribution::new("README.md", "from a"))
            .build()
            .unwrap();
        let b = ModuleDescriptor::builder("b")
            .depends_on("a")
            .file(FileContribution::new("README.md", "from b"))
            .build()
            .unwrap();
        let out = instantiate(&set_of(vec![a, b], &["b"]), "app", &BTreeMap::new()).unwrap();
        assert_eq!(out.files.get("README.md"), Some("from b"));
        assert_eq!(
            out.warnings,
            vec![Warning::FileOverridden {
                path: "README.md".into(),
                previous: "a".into(),
                module: "b".into(),
            }]
        );
    }

    #[test]
    fn append_uses_comment_separator() {
        let a = ModuleDescriptor::builder("config-env")
            .file(FileContribution::new(".env.example", "PORT=3000"))
            .build()
            .unwrap();
        let b = ModuleDescriptor::builder("auth-jwt")
            .depends_on("config-env")
            .file(FileContribution::new(".env.example", "JWT_SECRET=change-me\n").append())
            .build()
            .unwrap();
        let out = instantiate(&set_of(vec![a, b], &["auth-jwt"]), "app", &BTreeMap::new()).unwrap();
        assert_eq!(
            out.files.get(".env.example"),
            Some("PORT=3000\n\n# --- auth-jwt ---\nJWT_SECRET=change-me\n")
        );
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn append_without_comment_syntax_uses_blank_line() {
        let mut section = String::from("# Title");
        append_section(&mut section, "docs", FileFormat::Text, "More");
        assert_eq!(section, "# Title\n\nMore");
    }

    #[test]
    fn structured_merge_json() {
        let a = ModuleDescriptor::builder("base")
            .file(FileContribution::new(
                "package.json",
                r#"{"name": "{{PROJECT_NAME_KEBAB}}", "dependencies": {"zod": "^3.20.0"}, "keywords": ["app"]}"#,
            ))
            .build()
            .unwrap();
        let b = ModuleDescriptor::builder("extra")
            .depends_on("base")
            .file(
                FileContribution::new(
                    "package.json",
                    r#"{"dependencies": {"zod": "^3.22.0", "jose": "^5.0.0"}, "keywords": ["app", "auth"]}"#,
                )
                .structured(),
            )
            .build()
            .unwrap();
        let out = instantiate(&set_of(vec![a, b], &["extra"]), "Shop", &BTreeMap::new()).unwrap();
        let doc: Value = serde_json::from_str(out.files.get("package.json").unwrap()).unwrap();
        assert_eq!(doc["name"], "shop");
        assert_eq!(doc["dependencies"]["zod"], "^3.22.0");
        assert_eq!(doc["dependencies"]["jose"], "^5.0.0");
        assert_eq!(doc["keywords"], serde_json::json!(["app", "auth"]));
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn structured_merge_reports_disjoint_ranges() {
        let a = ModuleDescriptor::builder("base")
            .file(FileContribution::new("package.json", r#"{"dependencies": {"react": "^17.0.0"}}"#))
            .build()
            .unwrap();
        let b = ModuleDescriptor::builder("modern")
            .depends_on("base")
            .file(
                FileContribution::new("package.json", r#"{"dependencies": {"react": "^18.0.0"}}"#)
                    .structured(),
            )
            .build()
            .unwrap();
        let err = instantiate(&set_of(vec![a, b], &["modern"]), "app", &BTreeMap::new()).unwrap_err();
        assert_eq!(
            err,
            DomainError::DependencyVersionConflict {
                dependency: "react".into(),
                first_module: "base".into(),
                first_range: "^17.0.0".into(),
                second_module: "modern".into(),
                second_range: "^18.0.0".into(),
            }
        );
    }

    #[test]
    fn structured_merge_scalar_collision_warns() {
        let a = ModuleDescriptor::builder("base")
            .file(FileContribution::new("settings.json", r#"{"port": 3000}"#))
            .build()
            .unwrap();
        let b = ModuleDescriptor::builder("server")
            .depends_on("base")
            .file(FileContribution::new("settings.json", r#"{"port": 8080}"#).structured())
            .build()
            .unwrap();
        let out = instantiate(&set_of(vec![a, b], &["server"]), "app", &BTreeMap::new()).unwrap();
        let doc: Value = serde_json::from_str(out.files.get("settings.json").unwrap()).unwrap();
        assert_eq!(doc["port"], 8080);
        assert!(matches!(&out.warnings[0], Warning::ValueOverridden { key, .. } if key == "port"));
    }

    #[test]
    fn structured_merge_toml_tables() {
        let a = ModuleDescriptor::builder("crate-base")
            .file(FileContribution::new(
                "Cargo.toml",
                "[package]\nname = \"{{PROJECT_NAME_KEBAB}}\"\n\n[dependencies]\nserde = { version = \"1.0\", features = [\"derive\"] }\n",
            ))
            .build()
            .unwrap();
        let b = ModuleDescriptor::builder("crate-json")
            .depends_on("crate-base")
            .file(
                FileContribution::new(
                    "Cargo.toml",
                    "[dependencies]\nserde = { version = \"1.0.190\" }\nserde_json = \"1\"\n",
                )
                .structured(),
            )
            .build()
            .unwrap();
        let out = instantiate(&set_of(vec![a, b], &["crate-json"]), "My Crate", &BTreeMap::new()).unwrap();
        let doc: toml::Table = toml::from_str(out.files.get("Cargo.toml").unwrap()).unwrap();
        assert_eq!(doc["package"]["name"].as_str(), Some("my-crate"));
        let serde = &doc["dependencies"]["serde"];
        assert_eq!(serde["features"].as_array().map(Vec::len), Some(1));
        assert!(serde["version"].as_str().is_some());
        assert_eq!(doc["dependencies"]["serde_json"].as_str(), Some("1"));
    }

    #[test]
    fn manifest_ranges_are_intersected() {
        let a = ModuleDescriptor::builder("a")
            .manifest("jose", "^5.0.0")
            .file(FileContribution::new("a.txt", "a"))
            .build()
            .unwrap();
        let b = ModuleDescriptor::builder("b")
            .manifest("jose", ">=5.2.0")
            .manifest("stripe", "^14.0.0")
            .file(FileContribution::new("b.txt", "b"))
            .build()
            .unwrap();
        let out = instantiate(&set_of(vec![a, b], &["a", "b"]), "app", &BTreeMap::new()).unwrap();
        let jose = out.manifest.get("jose").unwrap();
        assert_eq!(jose.range.to_string(), ">=5.2.0 <6.0.0");
        assert_eq!(jose.contributors, ["a", "b"]);
        assert_eq!(out.manifest.len(), 2);
    }

    #[test]
    fn manifest_disjoint_ranges_name_both_modules() {
        let a = ModuleDescriptor::builder("a")
            .manifest("axios", "^0.27.0")
            .file(FileContribution::new("a.txt", "a"))
            .build()
            .unwrap();
        let b = ModuleDescriptor::builder("b")
            .manifest("axios", "^1.6.0")
            .file(FileContribution::new("b.txt", "b"))
            .build()
            .unwrap();
        let err = instantiate(&set_of(vec![a, b], &["a", "b"]), "app", &BTreeMap::new()).unwrap_err();
        assert_eq!(
            err,
            DomainError::DependencyVersionConflict {
                dependency: "axios".into(),
                first_module: "a".into(),
                first_range: "^0.27.0".into(),
                second_module: "b".into(),
                second_range: "^1.6.0".into(),
            }
        );
    }

    #[test]
    fn repeated_instantiation_is_byte_identical() {
        let a = ModuleDescriptor::builder("a")
            .file(FileContribution::new("package.json", r#"{"b": 1, "a": {"z": [1, 2], "y": "{{PROJECT_NAME}}"}}"#))
            .manifest("left-pad", "^1.0.0")
            .build()
            .unwrap();
        let b = ModuleDescriptor::builder("b")
            .depends_on("a")
            .file(FileContribution::new("package.json", r#"{"a": {"z": [3], "x": true}}"#).structured())
            .file(FileContribution::new("notes.md", "b notes").append())
            .build()
            .unwrap();
        let set = set_of(vec![a, b], &["b"]);
        let bindings = vars(&[("EXTRA", "1")]);
        let first = instantiate(&set, "Determinism \"Test\"", &bindings).unwrap();
        for _ in 0..10 {
            assert_eq!(instantiate(&set, "Determinism \"Test\"", &bindings).unwrap(), first);
        }
    }

    #[test]
    fn invalid_structured_contribution_is_rejected_at_render() {
        let m = ModuleDescriptor::builder("broken")
            .file(FileContribution::new("x.json", "{ not json").structured())
            .build()
            .unwrap();
        let set = set_of(vec![m], &["broken"]);
        let err = instantiate(&set, "app", &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, DomainError::MalformedDocument { document: "json", .. }));
    }

    #[test]
    fn dependency_name_uses_parent_for_version_keys() {
        let keys = |ks: &[&str]| ks.iter().map(|k| k.to_string()).collect::<Vec<_>>();
        assert_eq!(dependency_name(&keys(&["dependencies", "serde", "version"])), "serde");
        assert_eq!(dependency_name(&keys(&["devDependencies", "vitest"])), "vitest");
        assert!(in_dependency_table(&keys(&["devDependencies", "vitest"])));
        assert!(!in_dependency_table(&keys(&["dependencies"])));
        assert!(!in_dependency_table(&keys(&["engines", "node"])));
    }
}
