//! Prometheus metrics registration and export.
//!
//! All compliance-ai metrics live in one registry that is initialised once at
//! startup and scraped through `/metrics`.

use prometheus::{CounterVec, Encoder, Gauge, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

/// Global Prometheus registry for all compliance-ai metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Total pipeline runs, labeled by final status (success/error).
pub static PIPELINE_RUNS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Number of pipeline runs currently executing.
pub static PIPELINES_IN_PROGRESS: OnceLock<Gauge> = OnceLock::new();

/// Stage execution duration in seconds, labeled by stage.
pub static STAGE_DURATION: OnceLock<HistogramVec> = OnceLock::new();

/// Completion function calls, labeled by stage and outcome (ok/fallback/error).
pub static COMPLETIONS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Best-effort store writes that failed or timed out, labeled by table.
pub static STORE_WRITE_FAILURES_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Initialize all metrics and register them with the registry.
///
/// Call once at startup. Later calls build a fresh registry but leave the
/// globals pointing at the first one.
///
/// # Errors
///
/// Returns a `prometheus::Error` if a metric definition is invalid.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let registry = Registry::new();

    let pipeline_runs_total = CounterVec::new(
        Opts::new(
            "compliance_ai_pipeline_runs_total",
            "Total number of pipeline runs",
        ),
        &["status"],
    )?;

    let pipelines_in_progress = Gauge::new(
        "compliance_ai_pipelines_in_progress",
        "Number of pipeline runs currently executing",
    )?;

    let stage_duration = HistogramVec::new(
        prometheus::HistogramOpts::new(
            "compliance_ai_stage_duration_seconds",
            "Pipeline stage duration in seconds",
        )
        .buckets(vec![0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]),
        &["stage"],
    )?;

    let completions_total = CounterVec::new(
        Opts::new(
            "compliance_ai_completions_total",
            "Completion function calls by stage and outcome",
        ),
        &["stage", "outcome"],
    )?;

    let store_write_failures_total = CounterVec::new(
        Opts::new(
            "compliance_ai_store_write_failures_total",
            "Best-effort store writes that failed or timed out",
        ),
        &["table"],
    )?;

    registry.register(Box::new(pipeline_runs_total.clone()))?;
    registry.register(Box::new(pipelines_in_progress.clone()))?;
    registry.register(Box::new(stage_duration.clone()))?;
    registry.register(Box::new(completions_total.clone()))?;
    registry.register(Box::new(store_write_failures_total.clone()))?;

    // Already-set cells mean a previous call won; keep those.
    let _ = REGISTRY.set(registry);
    let _ = PIPELINE_RUNS_TOTAL.set(pipeline_runs_total);
    let _ = PIPELINES_IN_PROGRESS.set(pipelines_in_progress);
    let _ = STAGE_DURATION.set(stage_duration);
    let _ = COMPLETIONS_TOTAL.set(completions_total);
    let _ = STORE_WRITE_FAILURES_TOTAL.set(store_write_failures_total);

    tracing::info!("Prometheus metrics initialized successfully");

    Ok(())
}

/// Export all registered metrics in Prometheus text format.
///
/// Returns a comment line instead of failing when the registry is missing or
/// encoding breaks, so the scrape endpoint always answers.
pub fn export_metrics() -> String {
    let Some(registry) = REGISTRY.get() else {
        return "# Metrics not initialized. Call init_metrics() first.\n".to_string();
    };

    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# Error encoding metrics: {}\n", e);
    }

    String::from_utf8(buffer)
        .unwrap_or_else(|e| format!("# Error converting metrics to UTF-8: {}\n", e))
}

/// HTTP handler for the /metrics endpoint.
pub async fn metrics_handler() -> String {
    export_metrics()
}
