//! Implementation of the `kiln new` command.
//!
//! Responsibility: translate CLI arguments and configuration into a
//! `GenerationRequest`, run it through the pipeline, and display the result.
//! No composition logic lives here.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use kiln_adapters::{FsCacheStore, LocalFilesystem, MemoryCacheStore};
use kiln_core::{
    application::{CacheStore, GenerationPipeline, GenerationResult},
    domain::{Archetype, DomainError, Framework, GenerationRequest, Strictness},
    error::KilnError,
};
use tracing::{debug, info, instrument, warn};

use crate::{
    cli::{NewArgs, global::GlobalArgs},
    commands::load_registry,
    config::{AppConfig, CacheBackend},
    error::{CliError, CliResult},
    output::OutputManager,
};

/// Execute the `kiln new` command.
///
/// 1. Merge flags over configuration into a request
/// 2. Assemble the registry, cache store and filesystem
/// 3. Run the pipeline on a fresh tokio runtime
/// 4. Report files, warnings and next steps (or JSON)
#[instrument(skip_all, fields(project = %args.name))]
pub fn execute(
    args: NewArgs,
    global: GlobalArgs,
    config: AppConfig,
    output: OutputManager,
) -> CliResult<()> {
    let registry = Arc::new(load_registry(&config, &args.modules_dir)?);
    let request = build_request(&args, &config)?;

    debug!(
        target_platform = %request.target(),
        modules = ?request.modules(),
        dry_run = request.options().dry_run,
        cache = request.options().enable_cache,
        "Request built"
    );

    let cache = open_cache(&config)?;
    let pipeline_config = config.pipeline_config();

    if !output.is_json() {
        output.header(&format!(
            "Creating '{}' for {}...",
            request.project_name(),
            request.target()
        ))?;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::IoError {
            message: "failed to start the async runtime".into(),
            source: e,
        })?;

    let result = runtime.block_on(async move {
        let pipeline = GenerationPipeline::new(
            registry,
            cache,
            Arc::new(LocalFilesystem::new()),
            pipeline_config,
        );
        pipeline.run(request).await
    });

    debug!(
        run_id = %result.metrics.run_id,
        duration_ms = result.metrics.total.as_millis() as u64,
        retries = result.metrics.retries,
        peak_memory_bytes = result.metrics.peak_memory_bytes,
        "Run finished"
    );

    if !result.success {
        return Err(first_error(&result));
    }

    info!(
        project = %result.project_root.display(),
        files = result.files.len(),
        cache = ?result.cache_status,
        "Generation completed"
    );

    if output.is_json() {
        output.json(&to_json(&result))?;
    } else {
        report(&result, &global, &output)?;
    }

    Ok(())
}

// ── Request construction ──────────────────────────────────────────────────────

/// Flags win over configuration; configuration wins over built-in defaults.
pub(crate) fn build_request(args: &NewArgs, config: &AppConfig) -> CliResult<GenerationRequest> {
    let framework = match args.framework {
        Some(f) => f.into(),
        None => parse_setting::<Framework>("defaults.framework", &config.defaults.framework)?,
    };
    let archetype = match args.archetype {
        Some(a) => a.into(),
        None => parse_setting::<Archetype>("defaults.archetype", &config.defaults.archetype)?,
    };
    let strictness = match args.strictness {
        Some(s) => s.into(),
        None => parse_setting::<Strictness>("pipeline.strictness", &config.pipeline.strictness)?,
    };

    let mut builder = GenerationRequest::builder(args.name.clone())
        .output_location(args.output.clone().unwrap_or_else(|| PathBuf::from(".")))
        .framework(framework)
        .archetype(archetype)
        .modules(args.modules.iter().map(|m| m.trim()).filter(|m| !m.is_empty()))
        .strictness(strictness)
        .timeout(Duration::from_secs(
            args.timeout.unwrap_or(config.pipeline.timeout_secs),
        ))
        .max_retries(args.max_retries.unwrap_or(config.pipeline.max_retries))
        .cache(config.pipeline.cache && !args.no_cache)
        .parallel(config.pipeline.parallel && !args.no_parallel)
        .dry_run(args.dry_run);

    for (key, value) in &args.vars {
        builder = builder.variable(key.clone(), value.clone());
    }

    Ok(builder.build())
}

fn parse_setting<T>(key: &str, value: &str) -> CliResult<T>
where
    T: FromStr<Err = DomainError>,
{
    value.parse().map_err(|e: DomainError| CliError::ConfigError {
        message: format!("invalid value '{value}' for {key}"),
        source: Some(Box::new(e)),
    })
}

fn open_cache(config: &AppConfig) -> CliResult<Arc<dyn CacheStore>> {
    match config.cache.backend {
        CacheBackend::Memory => Ok(Arc::new(MemoryCacheStore::new())),
        CacheBackend::Fs => {
            let dir = config.cache_dir();
            debug!(dir = %dir.display(), "Opening filesystem cache");
            Ok(Arc::new(FsCacheStore::open(dir)?))
        }
    }
}

/// The first error ends the command; any others are logged.
fn first_error(result: &GenerationResult) -> CliError {
    for extra in result.errors.iter().skip(1) {
        warn!(kind = extra.kind(), "Additional failure: {extra}");
    }
    match result.error() {
        Some(err) => CliError::Core(err.clone()),
        None => CliError::Core(KilnError::Internal {
            message: "run failed without reporting an error".into(),
        }),
    }
}

// ── Reporting ─────────────────────────────────────────────────────────────────

fn report(result: &GenerationResult, global: &GlobalArgs, output: &OutputManager) -> CliResult<()> {
    let modules: Vec<String> = result.modules.iter().map(ToString::to_string).collect();
    output.info(&format!("Modules: {}", modules.join(", ")))?;

    for warning in &result.warnings {
        output.warning(&warning.to_string())?;
    }

    let root = result.project_root.display();
    if result.dry_run {
        output.info(&format!(
            "Dry run: would create {} files at {root}",
            result.files.len()
        ))?;
        for path in result.files.paths() {
            output.detail(&format!("  {path}"))?;
        }
        return Ok(());
    }

    output.success(&format!(
        "Project created at {root} ({} files)",
        result.files.len()
    ))?;

    if global.verbose > 0 {
        for path in &result.generated_file_paths {
            output.detail(&format!("  {}", path.display()))?;
        }
        if let Some(status) = result.cache_status {
            output.detail(&format!("  cache: {status}"))?;
        }
    }

    output.print("")?;
    output.print("Next steps:")?;
    output.print(&format!("  cd {root}"))?;
    if result.files.get("package.json").is_some() {
        output.print("  npm install")?;
    }
    if result.files.get(".env.example").is_some() {
        output.print("  cp .env.example .env")?;
    }

    Ok(())
}

fn to_json(result: &GenerationResult) -> serde_json::Value {
    let modules: Vec<String> = result.modules.iter().map(ToString::to_string).collect();
    let files: Vec<String> = result.files.paths().map(ToString::to_string).collect();
    serde_json::json!({
        "success": true,
        "project_root": result.project_root,
        "dry_run": result.dry_run,
        "fingerprint": result.fingerprint,
        "cache_status": result.cache_status,
        "modules": modules,
        "files": files,
        "manifest": result.manifest.ranges(),
        "warnings": result.warnings,
        "metrics": result.metrics,
        "generated_at": chrono::Utc::now().to_rfc3339(),
    })
}
