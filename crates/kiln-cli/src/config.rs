//! Application configuration.
//!
//! [`AppConfig`] is loaded once at startup and passed down by value.  The
//! CLI layer owns config; the core crate only ever sees a [`PipelineConfig`].
//!
//! # Resolution order (highest priority first)
//!
//! 1. CLI flags (handled at the call-site, not here)
//! 2. `KILN_*` environment variables, e.g. `KILN_PIPELINE__MAX_RETRIES=5`
//! 3. Config file (`--config`, else the platform config dir)
//! 4. Built-in defaults (always present)

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use config::{Config, Environment, File};
use kiln_core::application::PipelineConfig;
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Default target for new projects.
    pub defaults: Defaults,
    pub pipeline: PipelineSettings,
    pub cache: CacheSettings,
    pub modules: ModuleSettings,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub framework: String,
    pub archetype: String,
}

/// Request defaults and pipeline tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub cache: bool,
    pub parallel: bool,
    pub max_retries: u32,
    pub timeout_secs: u64,
    pub strictness: String,
    /// `0` means one worker per available core.
    pub max_workers: usize,
    /// `0` means cache entries never expire.
    pub cache_ttl_secs: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// In-process only; nothing survives the command.
    Memory,
    /// One JSON document per fingerprint under `cache.dir`.
    #[default]
    Fs,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub backend: CacheBackend,
    /// Cache directory; the platform cache dir when unset.
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleSettings {
    /// Extra directories of `module.toml` modules.
    pub dirs: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub no_color: bool,
    pub format: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            framework: "web-app".into(),
            archetype: "foundation".into(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            cache: true,
            parallel: true,
            max_retries: 3,
            timeout_secs: 30,
            strictness: "strict".into(),
            max_workers: 0,
            cache_ttl_secs: 0,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            no_color: false,
            format: "auto".into(),
        }
    }
}

impl AppConfig {
    /// Load configuration: defaults, then the config file, then `KILN_*`
    /// environment variables.
    ///
    /// An explicit `config_file` must exist; the default location is optional.
    pub fn load(config_file: Option<&PathBuf>) -> anyhow::Result<Self> {
        let (path, required) = match config_file {
            Some(path) => (path.clone(), true),
            None => (Self::config_path(), false),
        };
        if required && !path.exists() {
            anyhow::bail!("config file not found: {}", path.display());
        }

        Self::builder(&path, required)?
            .add_source(
                Environment::with_prefix("KILN")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("modules.dirs"),
            )
            .build()
            .context("failed to read configuration")?
            .try_deserialize()
            .with_context(|| format!("invalid configuration in {}", path.display()))
    }

    /// Load from exactly one file on top of the defaults, ignoring the
    /// environment.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        Self::builder(path, true)?
            .build()
            .context("failed to read configuration")?
            .try_deserialize()
            .with_context(|| format!("invalid configuration in {}", path.display()))
    }

    fn builder(
        path: &Path,
        required: bool,
    ) -> anyhow::Result<config::ConfigBuilder<config::builder::DefaultState>> {
        let defaults =
            Config::try_from(&Self::default()).context("failed to serialise default config")?;
        Ok(Config::builder()
            .add_source(defaults)
            .add_source(File::from(path).required(required)))
    }

    /// Path to the default configuration file.
    ///
    /// Uses `directories::ProjectDirs` for cross-platform correctness,
    /// falling back to `.kiln.toml` in the current directory.
    pub fn config_path() -> PathBuf {
        directories::ProjectDirs::from("dev", "kiln", "kiln")
            .map(|d| d.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from(".kiln.toml"))
    }

    /// Directory the filesystem cache lives in.
    pub fn cache_dir(&self) -> PathBuf {
        self.cache.dir.clone().unwrap_or_else(|| {
            directories::ProjectDirs::from("dev", "kiln", "kiln")
                .map(|d| d.cache_dir().join("generations"))
                .unwrap_or_else(|| PathBuf::from(".kiln-cache"))
        })
    }

    /// The subset of settings the core pipeline consumes.
    pub fn pipeline_config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        if self.pipeline.max_workers > 0 {
            config.max_workers = self.pipeline.max_workers;
        }
        if self.pipeline.cache_ttl_secs > 0 {
            config.cache_ttl = Some(Duration::from_secs(self.pipeline.cache_ttl_secs));
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn defaults_match_request_defaults() {
        let cfg = AppConfig::default();
        assert!(cfg.pipeline.cache);
        assert!(cfg.pipeline.parallel);
        assert_eq!(cfg.pipeline.max_retries, 3);
        assert_eq!(cfg.pipeline.timeout_secs, 30);
        assert_eq!(cfg.pipeline.strictness, "strict");
        assert_eq!(cfg.cache.backend, CacheBackend::Fs);
    }

    #[test]
    fn file_overrides_only_what_it_names() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kiln.toml");
        fs::write(
            &path,
            "[pipeline]\nmax_retries = 7\nstrictness = \"auto\"\n\n[cache]\nbackend = \"memory\"\n",
        )
        .unwrap();

        let cfg = AppConfig::from_file(&path).unwrap();
        assert_eq!(cfg.pipeline.max_retries, 7);
        assert_eq!(cfg.pipeline.strictness, "auto");
        assert_eq!(cfg.cache.backend, CacheBackend::Memory);
        assert_eq!(cfg.pipeline.timeout_secs, 30);
        assert_eq!(cfg.output, OutputConfig::default());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(AppConfig::load(Some(&missing)).is_err());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kiln.toml");
        fs::write(&path, "[pipeline]\nmax_retries = \"many\"\n").unwrap();
        assert!(AppConfig::from_file(&path).is_err());
    }

    #[test]
    fn pipeline_config_maps_zero_to_core_defaults() {
        let mut cfg = AppConfig::default();
        assert_eq!(cfg.pipeline_config().cache_ttl, None);

        cfg.pipeline.max_workers = 2;
        cfg.pipeline.cache_ttl_secs = 60;
        let pipeline = cfg.pipeline_config();
        assert_eq!(pipeline.max_workers, 2);
        assert_eq!(pipeline.cache_ttl, Some(Duration::from_secs(60)));
    }

    #[test]
    fn explicit_cache_dir_wins() {
        let mut cfg = AppConfig::default();
        cfg.cache.dir = Some(PathBuf::from("/tmp/kiln-cache"));
        assert_eq!(cfg.cache_dir(), PathBuf::from("/tmp/kiln-cache"));
    }

    #[test]
    fn config_path_is_not_empty() {
        assert!(!AppConfig::config_path().as_os_str().is_empty());
    }
}
