//! Per-run and aggregate pipeline metrics.

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;
use uuid::Uuid;

/// Pipeline states, in the order a successful run visits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Received,
    Validating,
    Resolving,
    Instantiating,
    Finalizing,
    Succeeded,
    Failed,
}

impl Stage {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Validating => "validating",
            Self::Resolving => "resolving",
            Self::Instantiating => "instantiating",
            Self::Finalizing => "finalizing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the artifact for a run was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    /// Served from the cache store.
    Hit,
    /// Computed by this run, which owned the fingerprint.
    Miss,
    /// Received from a concurrent run computing the same fingerprint.
    Dedup,
    /// Caching disabled for this request.
    Bypass,
}

impl CacheStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Miss => "miss",
            Self::Dedup => "dedup",
            Self::Bypass => "bypass",
        }
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageTiming {
    pub stage: Stage,
    pub duration: Duration,
}

/// Record of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunMetrics {
    pub run_id: Uuid,
    pub final_stage: Stage,
    /// Stage that was active when a failed run stopped.
    pub failed_at: Option<Stage>,
    pub stages: Vec<StageTiming>,
    pub cache_status: Option<CacheStatus>,
    /// Largest amount of rendered content held at once, in bytes.
    pub peak_memory_bytes: usize,
    pub file_count: usize,
    pub retries: u32,
    pub total: Duration,
}

impl RunMetrics {
    pub fn duration_of(&self, stage: Stage) -> Option<Duration> {
        self.stages
            .iter()
            .find(|t| t.stage == stage)
            .map(|t| t.duration)
    }
}

/// Drives the state machine of one run and times each stage.
#[derive(Debug)]
pub(crate) struct RunRecorder {
    metrics: RunMetrics,
    started: Instant,
    stage_started: Instant,
}

impl RunRecorder {
    pub(crate) fn new(run_id: Uuid) -> Self {
        let now = Instant::now();
        Self {
            metrics: RunMetrics {
                run_id,
                final_stage: Stage::Received,
                failed_at: None,
                stages: Vec::new(),
                cache_status: None,
                peak_memory_bytes: 0,
                file_count: 0,
                retries: 0,
                total: Duration::ZERO,
            },
            started: now,
            stage_started: now,
        }
    }

    pub(crate) fn stage(&self) -> Stage {
        self.metrics.final_stage
    }

    /// Close the current stage and move to `next`.
    pub(crate) fn enter(&mut self, next: Stage) {
        let now = Instant::now();
        let current = self.metrics.final_stage;
        self.metrics.stages.push(StageTiming {
            stage: current,
            duration: now - self.stage_started,
        });
        self.metrics.final_stage = next;
        self.stage_started = now;
        tracing::debug!(from = %current, to = %next, "stage transition");
    }

    pub(crate) fn cache_status(&mut self, status: CacheStatus) {
        self.metrics.cache_status = Some(status);
    }

    pub(crate) fn sample_memory(&mut self, bytes: usize) {
        self.metrics.peak_memory_bytes = self.metrics.peak_memory_bytes.max(bytes);
    }

    pub(crate) fn files(&mut self, count: usize) {
        self.metrics.file_count = count;
    }

    pub(crate) fn retries(&mut self, retries: u32) {
        self.metrics.retries += retries;
    }

    /// Enter the terminal stage and return the record.
    pub(crate) fn finish(mut self, succeeded: bool) -> RunMetrics {
        if !succeeded {
            self.metrics.failed_at = Some(self.metrics.final_stage);
        }
        self.enter(if succeeded { Stage::Succeeded } else { Stage::Failed });
        self.metrics.total = self.started.elapsed();
        self.metrics
    }
}

/// Totals across every run of one pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineMetrics {
    pub runs: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub dedup_hits: u64,
    pub cache_bypassed: u64,
    pub retries: u64,
    pub files_generated: u64,
    pub peak_memory_bytes: usize,
    pub total_duration: Duration,
    pub last_run: Option<RunMetrics>,
}

impl PipelineMetrics {
    pub(crate) fn record(&mut self, run: &RunMetrics) {
        self.runs += 1;
        if run.final_stage == Stage::Succeeded {
            self.succeeded += 1;
            self.files_generated += run.file_count as u64;
        } else {
            self.failed += 1;
        }
        match run.cache_status {
            Some(CacheStatus::Hit) => self.cache_hits += 1,
            Some(CacheStatus::Miss) => self.cache_misses += 1,
            Some(CacheStatus::Dedup) => self.dedup_hits += 1,
            Some(CacheStatus::Bypass) => self.cache_bypassed += 1,
            None => {}
        }
        self.retries += u64::from(run.retries);
        self.peak_memory_bytes = self.peak_memory_bytes.max(run.peak_memory_bytes);
        self.total_duration += run.total;
        self.last_run = Some(run.clone());
    }

    /// Hits and dedups over every run that consulted the cache.
    pub fn hit_rate(&self) -> f64 {
        let served = self.cache_hits + self.dedup_hits;
        let consulted = served + self.cache_misses;
        if consulted == 0 {
            0.0
        } else {
            served as f64 / consulted as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_walks_the_state_machine() {
        let mut rec = RunRecorder::new(Uuid::new_v4());
        assert_eq!(rec.stage(), Stage::Received);
        rec.enter(Stage::Validating);
        rec.enter(Stage::Resolving);
        rec.cache_status(CacheStatus::Miss);
        rec.sample_memory(10);
        rec.sample_memory(4);
        rec.files(3);
        let run = rec.finish(true);

        assert_eq!(run.final_stage, Stage::Succeeded);
        let stages: Vec<Stage> = run.stages.iter().map(|t| t.stage).collect();
        assert_eq!(stages, [Stage::Received, Stage::Validating, Stage::Resolving]);
        assert_eq!(run.peak_memory_bytes, 10);
        assert!(run.duration_of(Stage::Validating).is_some());
        assert!(run.duration_of(Stage::Finalizing).is_none());
    }

    #[test]
    fn aggregate_counts_by_status() {
        let mut totals = PipelineMetrics::default();
        for (status, ok) in [
            (CacheStatus::Miss, true),
            (CacheStatus::Hit, true),
            (CacheStatus::Dedup, true),
        ] {
            let mut rec = RunRecorder::new(Uuid::new_v4());
            rec.cache_status(status);
            rec.files(2);
            totals.record(&rec.finish(ok));
        }
        totals.record(&RunRecorder::new(Uuid::new_v4()).finish(false));

        assert_eq!(totals.runs, 4);
        assert_eq!(totals.succeeded, 3);
        assert_eq!(totals.failed, 1);
        assert_eq!(totals.files_generated, 6);
        assert!((totals.hit_rate() - 2.0 / 3.0).abs() < f64::EPSILON);
        let last = totals.last_run.unwrap();
        assert_eq!(last.final_stage, Stage::Failed);
        assert_eq!(last.failed_at, Some(Stage::Received));
    }
}
