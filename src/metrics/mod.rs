//! Prometheus metrics for pipeline runs, stages, completions and store writes.
//!
//! ```ignore
//! use compliance_ai::metrics::{init_metrics, export_metrics, MetricsCollector};
//!
//! init_metrics()?;
//! MetricsCollector::new().record_pipeline_run("success");
//! let text = export_metrics();
//! ```

pub mod collectors;
pub mod prometheus;

pub use collectors::{CompletionOutcome, MetricsCollector};
pub use self::prometheus::{export_metrics, init_metrics, metrics_handler};

pub use self::prometheus::{
    COMPLETIONS_TOTAL, PIPELINES_IN_PROGRESS, PIPELINE_RUNS_TOTAL, REGISTRY, STAGE_DURATION,
    STORE_WRITE_FAILURES_TOTAL,
};
