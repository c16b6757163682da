//! `GenerationRequest`: what a caller asks the pipeline to build.
//!
//! A request is an immutable value object. The builder performs no
//! validation beyond what the types enforce; syntax and range checks happen in
//! the pipeline's validating stage, which reports every problem at once.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::entities::target::Target;
use crate::domain::value_objects::{Archetype, Framework, Strictness};

/// Pipeline knobs carried by each request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub enable_cache: bool,
    pub enable_parallel_processing: bool,
    /// Retries for transient I/O failures (0..=10).
    pub max_retries: u32,
    /// Budget for the whole run.
    #[serde(with = "duration_millis")]
    pub timeout: Duration,
    pub strictness: Strictness,
    /// Run every stage but do not write to the output location.
    pub dry_run: bool,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            enable_cache: true,
            enable_parallel_processing: true,
            max_retries: 3,
            timeout: Duration::from_secs(30),
            strictness: Strictness::Strict,
            dry_run: false,
        }
    }
}

/// A request to compose and generate one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    project_name: String,
    output_location: PathBuf,
    framework: Framework,
    archetype: Archetype,
    /// Raw module ids in request order, first occurrence wins.
    modules: Vec<String>,
    variables: BTreeMap<String, String>,
    options: GenerationOptions,
}

impl GenerationRequest {
    pub fn builder(project_name: impl Into<String>) -> GenerationRequestBuilder {
        GenerationRequestBuilder {
            project_name: project_name.into(),
            output_location: PathBuf::from("."),
            framework: Framework::WebApp,
            archetype: Archetype::Foundation,
            modules: Vec::new(),
            variables: BTreeMap::new(),
            options: GenerationOptions::default(),
        }
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub fn output_location(&self) -> &Path {
        &self.output_location
    }

    /// Where the project ends up: `<output_location>/<project_name>`.
    pub fn project_root(&self) -> PathBuf {
        self.output_location.join(&self.project_name)
    }

    pub fn framework(&self) -> Framework {
        self.framework
    }

    pub fn archetype(&self) -> Archetype {
        self.archetype
    }

    pub fn target(&self) -> Target {
        Target::new(self.framework, self.archetype)
    }

    pub fn modules(&self) -> &[String] {
        &self.modules
    }

    pub fn variables(&self) -> &BTreeMap<String, String> {
        &self.variables
    }

    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }
}

pub struct GenerationRequestBuilder {
    project_name: String,
    output_location: PathBuf,
    framework: Framework,
    archetype: Archetype,
    modules: Vec<String>,
    variables: BTreeMap<String, String>,
    options: GenerationOptions,
}

impl GenerationRequestBuilder {
    pub fn output_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_location = path.into();
        self
    }

    pub fn framework(mut self, framework: Framework) -> Self {
        self.framework = framework;
        self
    }

    pub fn archetype(mut self, archetype: Archetype) -> Self {
        self.archetype = archetype;
        self
    }

    /// Request a module. Duplicates collapse to the first occurrence.
    pub fn module(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        if !self.modules.contains(&id) {
            self.modules.push(id);
        }
        self
    }

    pub fn modules<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ids.into_iter().fold(self, |b, id| b.module(id))
    }

    pub fn variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn strictness(mut self, strictness: Strictness) -> Self {
        self.options.strictness = strictness;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = timeout;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.options.max_retries = retries;
        self
    }

    pub fn cache(mut self, enabled: bool) -> Self {
        self.options.enable_cache = enabled;
        self
    }

    pub fn parallel(mut self, enabled: bool) -> Self {
        self.options.enable_parallel_processing = enabled;
        self
    }

    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.options.dry_run = enabled;
        self
    }

    pub fn build(self) -> GenerationRequest {
        GenerationRequest {
            project_name: self.project_name,
            output_location: self.output_location,
            framework: self.framework,
            archetype: self.archetype,
            modules: self.modules,
            variables: self.variables,
            options: self.options,
        }
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_collapse_to_first_occurrence() {
        let req = GenerationRequest::builder("shop")
            .modules(["auth-jwt", "payment-stripe", "auth-jwt"])
            .module("config-env")
            .build();
        assert_eq!(req.modules(), ["auth-jwt", "payment-stripe", "config-env"]);
    }

    #[test]
    fn project_root_joins_name() {
        let req = GenerationRequest::builder("shop")
            .output_location("/tmp/out")
            .build();
        assert_eq!(req.project_root(), PathBuf::from("/tmp/out/shop"));
    }

    #[test]
    fn defaults() {
        let req = GenerationRequest::builder("shop").build();
        let opts = req.options();
        assert!(opts.enable_cache);
        assert!(opts.enable_parallel_processing);
        assert_eq!(opts.max_retries, 3);
        assert_eq!(opts.strictness, Strictness::Strict);
        assert!(!opts.dry_run);
        assert_eq!(
            req.target(),
            Target::new(Framework::WebApp, Archetype::Foundation)
        );
    }

    #[test]
    fn options_serialize_timeout_as_millis() {
        let json = serde_json::to_value(GenerationOptions::default()).unwrap();
        assert_eq!(json["timeout"], 30_000);
    }
}
