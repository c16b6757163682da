//! The generation pipeline.
//!
//! A run moves through `Received → Validating → Resolving → Instantiating →
//! Finalizing → {Succeeded | Failed}`. Resolution and instantiation are pure
//! domain calls; this module adds everything around them: caching keyed by
//! fingerprint, per-fingerprint deduplication of concurrent runs, bounded
//! parallel rendering, retries for transient I/O, the run budget, and atomic
//! materialization through the [`Filesystem`] port.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let pipeline = GenerationPipeline::new(registry, cache, filesystem, PipelineConfig::default());
//! let request = GenerationRequest::builder("shop")
//!     .archetype(Archetype::Business)
//!     .modules(["auth-jwt", "payment-stripe"])
//!     .build();
//! let result = pipeline.run(request).await;
//! assert!(result.success);
//! ```

pub mod cancel;
pub mod fingerprint;
pub mod inflight;
pub mod metrics;
pub mod retry;
mod staging;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::application::ApplicationError;
use crate::application::ports::{CACHE_SCHEMA_VERSION, CacheEntry, CacheStore, Filesystem};
use crate::domain::instantiation::{self, RenderedModule};
use crate::domain::{
    DomainValidator, FileMap, GenerationRequest, Manifest, ModuleDescriptor, ModuleId, ModuleRef,
    ModuleRegistry, RenderContext, ResolvedModuleSet, Warning, resolve,
};
use crate::error::{KilnError, KilnResult};

pub use cancel::CancelFlag;
pub use fingerprint::fingerprint;
pub use metrics::{CacheStatus, PipelineMetrics, RunMetrics, Stage, StageTiming};
pub use retry::RetryPolicy;

use inflight::{InFlight, Role};

/// Knobs that belong to the pipeline rather than to a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Rendering workers shared by every run of this pipeline.
    pub max_workers: usize,
    /// Lifetime of cache entries written by this pipeline. `None` never expires.
    pub cache_ttl: Option<Duration>,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_workers: std::thread::available_parallelism().map_or(4, usize::from),
            cache_ttl: None,
            retry_base_delay: retry::DEFAULT_BASE_DELAY,
            retry_max_delay: retry::DEFAULT_MAX_DELAY,
        }
    }
}

/// What a run produces before it is materialized. Shared between the owner
/// of a fingerprint and its waiters; each caller copies out of it.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Artifact {
    modules: Vec<ModuleRef>,
    files: FileMap,
    manifest: Manifest,
    warnings: Vec<Warning>,
}

impl From<CacheEntry> for Artifact {
    fn from(entry: CacheEntry) -> Self {
        Self {
            modules: entry.modules,
            files: entry.files,
            manifest: entry.manifest,
            warnings: entry.warnings,
        }
    }
}

type Outcome = Result<Arc<Artifact>, KilnError>;

/// Outcome of one run. Failures are reported in `errors`, never panicked.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub success: bool,
    pub project_root: PathBuf,
    pub fingerprint: Option<String>,
    /// Absolute (or output-relative) paths of every generated file. Populated
    /// for dry runs too, naming where files would have gone.
    pub generated_file_paths: Vec<PathBuf>,
    pub modules: Vec<ModuleRef>,
    pub files: FileMap,
    pub manifest: Manifest,
    pub errors: Vec<KilnError>,
    pub warnings: Vec<Warning>,
    pub cache_status: Option<CacheStatus>,
    pub dry_run: bool,
    pub metrics: RunMetrics,
}

impl GenerationResult {
    pub fn error(&self) -> Option<&KilnError> {
        self.errors.first()
    }
}

struct Generated {
    artifact: Arc<Artifact>,
    status: CacheStatus,
}

/// Mutable state of one run, threaded through the stages.
struct RunState {
    recorder: metrics::RunRecorder,
    cancel: CancelFlag,
    /// Held by the materializing task; the timeout path waits on it so staged
    /// output is gone before `Timeout` is returned. The flag is set once the
    /// project root has been renamed into place.
    gate: Arc<tokio::sync::Mutex<bool>>,
    retry: RetryPolicy,
    fingerprint: Option<String>,
}

/// Orchestrates generation runs. Cheap to share behind an `Arc`; any number
/// of runs may execute concurrently.
pub struct GenerationPipeline {
    registry: Arc<ModuleRegistry>,
    revision: String,
    cache: Arc<dyn CacheStore>,
    filesystem: Arc<dyn Filesystem>,
    config: PipelineConfig,
    workers: Arc<Semaphore>,
    inflight: InFlight<Outcome>,
    metrics: Mutex<PipelineMetrics>,
}

impl GenerationPipeline {
    pub fn new(
        registry: Arc<ModuleRegistry>,
        cache: Arc<dyn CacheStore>,
        filesystem: Arc<dyn Filesystem>,
        config: PipelineConfig,
    ) -> Self {
        let revision = registry.revision();
        let workers = Arc::new(Semaphore::new(config.max_workers.max(1)));
        Self {
            registry,
            revision,
            cache,
            filesystem,
            config,
            workers,
            inflight: InFlight::new(),
            metrics: Mutex::new(PipelineMetrics::default()),
        }
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Snapshot of the aggregate metrics.
    pub fn metrics(&self) -> PipelineMetrics {
        self.metrics.lock().clone()
    }

    /// Run one request to completion.
    #[instrument(
        skip_all,
        fields(
            project = %request.project_name(),
            framework = %request.framework(),
            archetype = %request.archetype(),
            run_id = tracing::field::Empty,
        )
    )]
    pub async fn run(&self, request: GenerationRequest) -> GenerationResult {
        let run_id = Uuid::new_v4();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));

        let options = request.options().clone();
        let mut run = RunState {
            recorder: metrics::RunRecorder::new(run_id),
            cancel: CancelFlag::new(),
            gate: Arc::new(tokio::sync::Mutex::new(false)),
            retry: RetryPolicy::new(options.max_retries)
                .with_delays(self.config.retry_base_delay, self.config.retry_max_delay),
            fingerprint: None,
        };
        let cancel = run.cancel.clone();
        let gate = Arc::clone(&run.gate);
        let limit = options.timeout;

        info!(modules = request.modules().len(), "generation started");

        let outcome = tokio::select! {
            biased;
            outcome = self.execute(&request, &mut run) => outcome,
            () = tokio::time::sleep(limit) => {
                cancel.cancel();
                let committed = gate.lock().await;
                if *committed {
                    self.discard(&request.project_root()).await;
                }
                Err(ApplicationError::Timeout { limit }.into())
            }
        };

        let project_root = request.project_root();
        let fingerprint = run.fingerprint.take();
        match outcome {
            Ok(Generated { artifact, status }) => {
                let metrics = run.recorder.finish(true);
                self.metrics.lock().record(&metrics);
                info!(
                    files = artifact.files.len(),
                    modules = artifact.modules.len(),
                    warnings = artifact.warnings.len(),
                    cache = %status,
                    dry_run = options.dry_run,
                    elapsed_ms = metrics.total.as_millis() as u64,
                    "generation succeeded"
                );

                let artifact = Arc::unwrap_or_clone(artifact);
                GenerationResult {
                    success: true,
                    generated_file_paths: artifact
                        .files
                        .paths()
                        .map(|p| project_root.join(p.as_path()))
                        .collect(),
                    project_root,
                    fingerprint,
                    modules: artifact.modules,
                    files: artifact.files,
                    manifest: artifact.manifest,
                    errors: Vec::new(),
                    warnings: artifact.warnings,
                    cache_status: Some(status),
                    dry_run: options.dry_run,
                    metrics,
                }
            }
            Err(error) => {
                let stage = run.recorder.stage();
                let metrics = run.recorder.finish(false);
                self.metrics.lock().record(&metrics);
                warn!(kind = error.kind(), %stage, error = %error, "generation failed");

                GenerationResult {
                    success: false,
                    project_root,
                    fingerprint,
                    generated_file_paths: Vec::new(),
                    modules: Vec::new(),
                    files: FileMap::new(),
                    manifest: Manifest::new(),
                    cache_status: metrics.cache_status,
                    errors: vec![error],
                    warnings: Vec::new(),
                    dry_run: options.dry_run,
                    metrics,
                }
            }
        }
    }

    async fn execute(&self, request: &GenerationRequest, run: &mut RunState) -> KilnResult<Generated> {
        run.recorder.enter(Stage::Validating);
        let ids = self.validate(request)?;

        let root = request.project_root();
        if !request.options().dry_run && self.filesystem.exists(&root) {
            return Err(ApplicationError::ProjectExists { path: root }.into());
        }

        let fp = fingerprint(request, &ids, &self.revision);
        debug!(fingerprint = %fp, modules = ?ids.iter().map(ModuleId::as_str).collect::<Vec<_>>(), "request validated");
        run.fingerprint = Some(fp.clone());

        let (artifact, status) = self.obtain(request, &ids, &fp, run).await?;
        run.recorder.cache_status(status);
        run.recorder.files(artifact.files.len());
        run.recorder.sample_memory(artifact.files.total_bytes());
        if run.recorder.stage() != Stage::Finalizing {
            run.recorder.enter(Stage::Finalizing);
        }

        if request.options().dry_run {
            info!("dry run, nothing written");
        } else {
            self.materialize(request, &artifact, run).await?;
        }

        Ok(Generated { artifact, status })
    }

    /// Syntax checks plus the archetype baseline, which is prepended to the
    /// requested ids.
    fn validate(&self, request: &GenerationRequest) -> KilnResult<Vec<ModuleId>> {
        let requested =
            DomainValidator::validate_request(request).map_err(ApplicationError::validation)?;

        let target = request.target();
        let mut ids: Vec<ModuleId> = self
            .registry
            .baselines_for(&target)
            .iter()
            .map(|m| m.id.clone())
            .collect();
        if ids.is_empty() {
            return Err(ApplicationError::validation([format!(
                "no baseline module supports target {target}"
            )])
            .into());
        }
        for id in requested {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    /// Get the artifact from the cache, from a concurrent owner, or by
    /// computing it.
    async fn obtain(
        &self,
        request: &GenerationRequest,
        ids: &[ModuleId],
        fp: &str,
        run: &mut RunState,
    ) -> KilnResult<(Arc<Artifact>, CacheStatus)> {
        if !request.options().enable_cache {
            let artifact = self.compute(request, ids, run).await?;
            return Ok((artifact, CacheStatus::Bypass));
        }

        loop {
            if let Some(artifact) = self.lookup(fp, run).await {
                return Ok((artifact, CacheStatus::Hit));
            }

            match self.inflight.join(fp) {
                Role::Owner(guard) => {
                    // A previous owner may have committed between our lookup
                    // and the join.
                    if let Some(artifact) = self.lookup(fp, run).await {
                        guard.publish(Ok(Arc::clone(&artifact)));
                        return Ok((artifact, CacheStatus::Hit));
                    }

                    let artifact = match self.compute(request, ids, run).await {
                        Ok(artifact) => artifact,
                        Err(e) => {
                            if e.is_shareable() {
                                guard.publish(Err(e.clone()));
                            }
                            return Err(e);
                        }
                    };

                    run.recorder.enter(Stage::Finalizing);
                    let committed = self.commit(fp, &artifact, run).await;
                    guard.publish(Ok(Arc::clone(&artifact)));
                    committed?;
                    return Ok((artifact, CacheStatus::Miss));
                }
                Role::Waiter(waiter) => {
                    debug!(fingerprint = %fp, "awaiting in-flight generation");
                    if let Some(outcome) = waiter.wait().await {
                        return outcome.map(|artifact| (artifact, CacheStatus::Dedup));
                    }
                    debug!(fingerprint = %fp, "in-flight owner went away, taking over");
                }
            }
        }
    }

    async fn compute(
        &self,
        request: &GenerationRequest,
        ids: &[ModuleId],
        run: &mut RunState,
    ) -> KilnResult<Arc<Artifact>> {
        run.recorder.enter(Stage::Resolving);
        let target = request.target();
        let set = resolve(&self.registry, ids, target, request.options().strictness)?;
        check_resolved(&set)?;
        info!(modules = set.len(), warnings = set.warnings().len(), "module set resolved");
        run.cancel.check()?;

        run.recorder.enter(Stage::Instantiating);
        let project = Arc::new(instantiation::project_context(request.project_name(), target));
        let bindings = Arc::new(request.variables().clone());
        let rendered = if request.options().enable_parallel_processing && set.len() > 1 {
            self.render_parallel(&set, &project, &bindings, &run.cancel)
                .await?
        } else {
            set.modules()
                .iter()
                .map(|m| render_checked(m, &project, &bindings, &run.cancel))
                .collect::<KilnResult<Vec<_>>>()?
        };

        let rendered_bytes: usize = rendered.iter().map(RenderedModule::size_bytes).sum();
        let merged = instantiation::merge(rendered)?;
        run.recorder
            .sample_memory(rendered_bytes + merged.files.total_bytes());

        let mut warnings = set.warnings().to_vec();
        warnings.extend(merged.warnings);
        for warning in &warnings {
            debug!(%warning, "composition warning");
        }

        Ok(Arc::new(Artifact {
            modules: set.refs(),
            files: merged.files,
            manifest: merged.manifest,
            warnings,
        }))
    }

    /// Fan rendering out over the shared worker pool, then collect in
    /// resolved order so the first failure reported is deterministic.
    async fn render_parallel(
        &self,
        set: &ResolvedModuleSet,
        project: &Arc<RenderContext>,
        bindings: &Arc<std::collections::BTreeMap<String, String>>,
        cancel: &CancelFlag,
    ) -> KilnResult<Vec<RenderedModule>> {
        let mut handles = Vec::with_capacity(set.len());
        for module in set.modules() {
            let permit = Arc::clone(&self.workers)
                .acquire_owned()
                .await
                .map_err(|e| ApplicationError::WorkerFailed {
                    reason: e.to_string(),
                })?;
            cancel.check()?;

            let module = Arc::clone(module);
            let project = Arc::clone(project);
            let bindings = Arc::clone(bindings);
            let cancel = cancel.clone();
            handles.push(tokio::task::spawn_blocking(move || {
                let _permit = permit;
                render_checked(&module, &project, &bindings, &cancel)
            }));
        }

        let mut rendered = Vec::with_capacity(handles.len());
        for handle in handles {
            rendered.push(handle.await.map_err(worker_failed)??);
        }
        Ok(rendered)
    }

    /// `None` on a miss. Stale entries are evicted; lookup failures are
    /// logged and treated as misses.
    async fn lookup(&self, fp: &str, run: &mut RunState) -> Option<Arc<Artifact>> {
        let policy = run.retry;
        let (found, retries) = policy
            .run(&run.cancel, "cache lookup", || {
                let cache = Arc::clone(&self.cache);
                let key = fp.to_string();
                blocking(move || cache.get(&key))
            })
            .await;
        run.recorder.retries(retries);

        match found {
            Ok(Some(entry)) if entry.is_usable(Utc::now()) => {
                debug!(fingerprint = %fp, "cache hit");
                Some(Arc::new(Artifact::from(entry)))
            }
            Ok(Some(entry)) => {
                debug!(
                    fingerprint = %fp,
                    schema_version = entry.schema_version,
                    "evicting stale cache entry"
                );
                if let Err(e) = self.cache.remove(fp) {
                    warn!(fingerprint = %fp, error = %e, "failed to evict cache entry");
                }
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(fingerprint = %fp, error = %e, "cache lookup failed, treating as a miss");
                None
            }
        }
    }

    async fn commit(&self, fp: &str, artifact: &Artifact, run: &mut RunState) -> KilnResult<()> {
        let now = Utc::now();
        let entry = CacheEntry {
            fingerprint: fp.to_string(),
            schema_version: CACHE_SCHEMA_VERSION,
            created_at: now,
            expires_at: self
                .config
                .cache_ttl
                .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
                .map(|ttl| now + ttl),
            modules: artifact.modules.clone(),
            files: artifact.files.clone(),
            manifest: artifact.manifest.clone(),
            warnings: artifact.warnings.clone(),
        };

        let policy = run.retry;
        let (out, retries) = policy
            .run(&run.cancel, "cache commit", || {
                let cache = Arc::clone(&self.cache);
                let entry = entry.clone();
                blocking(move || cache.put(entry))
            })
            .await;
        run.recorder.retries(retries);
        if out.is_ok() {
            debug!(fingerprint = %fp, "cache entry committed");
        }
        out
    }

    async fn materialize(
        &self,
        request: &GenerationRequest,
        artifact: &Arc<Artifact>,
        run: &mut RunState,
    ) -> KilnResult<()> {
        let output = request.output_location().to_path_buf();
        let name = request.project_name().to_string();
        let policy = run.retry;
        let (out, retries) = policy
            .run(&run.cancel, "materialize", || {
                let fs = Arc::clone(&self.filesystem);
                let artifact = Arc::clone(artifact);
                let cancel = run.cancel.clone();
                let gate = Arc::clone(&run.gate);
                let output = output.clone();
                let name = name.clone();
                async move {
                    let mut committed = gate.lock_owned().await;
                    blocking(move || {
                        staging::materialize(fs.as_ref(), &output, &name, &artifact.files, &cancel)?;
                        *committed = true;
                        Ok(())
                    })
                    .await
                }
            })
            .await;
        run.recorder.retries(retries);
        out
    }

    /// Remove a project root whose rename completed after the run budget
    /// expired.
    async fn discard(&self, root: &Path) {
        let fs = Arc::clone(&self.filesystem);
        let path = root.to_path_buf();
        match blocking(move || fs.remove_dir_all(&path)).await {
            Ok(()) => debug!(root = %root.display(), "rolled back late materialization"),
            Err(e) => warn!(root = %root.display(), error = %e, "failed to roll back late materialization"),
        }
    }
}

/// Render one module, polling `cancel` between files.
fn render_checked(
    module: &ModuleDescriptor,
    project: &RenderContext,
    bindings: &std::collections::BTreeMap<String, String>,
    cancel: &CancelFlag,
) -> KilnResult<RenderedModule> {
    cancel.check()?;
    let ctx = instantiation::module_context(module, project, bindings);
    let mut files = Vec::with_capacity(module.files.len());
    for file in &module.files {
        cancel.check()?;
        files.push(instantiation::render_file(module, file, &ctx)?);
    }
    Ok(RenderedModule {
        module: ModuleRef::from(module),
        files,
        manifest: module.manifest.clone(),
    })
}

/// The resolver's output must be non-empty and fully target-compatible
/// before anything is rendered.
fn check_resolved(set: &ResolvedModuleSet) -> KilnResult<()> {
    if set.is_empty() {
        return Err(KilnError::Internal {
            message: "resolution produced an empty module set".into(),
        });
    }
    let target = set.target();
    if let Some(module) = set.iter().find(|m| !m.supports(&target)) {
        return Err(KilnError::Internal {
            message: format!("resolved module '{}' does not support {target}", module.id),
        });
    }
    Ok(())
}

async fn blocking<T, F>(f: F) -> KilnResult<T>
where
    F: FnOnce() -> KilnResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(worker_failed)?
}

fn worker_failed(e: tokio::task::JoinError) -> ApplicationError {
    ApplicationError::WorkerFailed {
        reason: e.to_string(),
    }
}
