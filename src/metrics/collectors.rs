//! Recording helpers over the raw Prometheus metrics.
//!
//! `MetricsCollector` keeps labeling consistent and turns "metrics not
//! initialised" into a no-op, so library code and tests never need to care
//! whether `init_metrics()` ran.

use super::prometheus::{
    COMPLETIONS_TOTAL, PIPELINES_IN_PROGRESS, PIPELINE_RUNS_TOTAL, STAGE_DURATION,
    STORE_WRITE_FAILURES_TOTAL,
};

/// Outcome of a single completion function call, as seen by a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// Parsed into the expected shape.
    Ok,
    /// Call succeeded but the text was replaced by fallback content.
    Fallback,
    /// Call failed or timed out.
    Error,
}

impl CompletionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionOutcome::Ok => "ok",
            CompletionOutcome::Fallback => "fallback",
            CompletionOutcome::Error => "error",
        }
    }
}

/// Metrics collector for pipeline and store activity.
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector;

impl MetricsCollector {
    pub fn new() -> Self {
        Self
    }

    /// Record a finished pipeline run.
    ///
    /// # Arguments
    ///
    /// * `status` - Final status ("success" or "error")
    pub fn record_pipeline_run(&self, status: &str) {
        if let Some(runs) = PIPELINE_RUNS_TOTAL.get() {
            runs.with_label_values(&[status]).inc();
        }

        tracing::trace!(status = status, "Recorded pipeline run metric");
    }

    /// Record how long a stage took.
    pub fn record_stage(&self, stage: &str, duration_secs: f64) {
        if let Some(duration) = STAGE_DURATION.get() {
            duration.with_label_values(&[stage]).observe(duration_secs);
        }

        tracing::trace!(
            stage = stage,
            duration_secs = duration_secs,
            "Recorded stage duration metric"
        );
    }

    /// Record one completion function call made by `stage`.
    pub fn record_completion(&self, stage: &str, outcome: CompletionOutcome) {
        if let Some(completions) = COMPLETIONS_TOTAL.get() {
            completions
                .with_label_values(&[stage, outcome.as_str()])
                .inc();
        }

        tracing::trace!(
            stage = stage,
            outcome = outcome.as_str(),
            "Recorded completion metric"
        );
    }

    /// Record a best-effort store write that was swallowed.
    pub fn record_store_failure(&self, table: &str) {
        if let Some(failures) = STORE_WRITE_FAILURES_TOTAL.get() {
            failures.with_label_values(&[table]).inc();
        }

        tracing::trace!(table = table, "Recorded store write failure metric");
    }

    pub fn inc_pipelines_in_progress(&self) {
        if let Some(in_progress) = PIPELINES_IN_PROGRESS.get() {
            in_progress.inc();
        }
    }

    pub fn dec_pipelines_in_progress(&self) {
        if let Some(in_progress) = PIPELINES_IN_PROGRESS.get() {
            in_progress.dec();
        }
    }
}
