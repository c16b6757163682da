//! Command handlers. Each submodule owns one subcommand.

use std::path::PathBuf;

use kiln_core::domain::ModuleRegistry;
use tracing::debug;

use crate::{config::AppConfig, error::CliResult};

pub mod completions;
pub mod config;
pub mod modules;
pub mod new;

/// Built-in catalog plus every configured and command-line module directory.
pub(crate) fn load_registry(config: &AppConfig, extra_dirs: &[PathBuf]) -> CliResult<ModuleRegistry> {
    let dirs: Vec<PathBuf> = config
        .modules
        .dirs
        .iter()
        .chain(extra_dirs)
        .cloned()
        .collect();
    let registry = kiln_adapters::builtin_modules::registry_with(&dirs)?;
    debug!(
        modules = registry.len(),
        dirs = dirs.len(),
        revision = %registry.revision(),
        "Module registry loaded"
    );
    Ok(registry)
}
