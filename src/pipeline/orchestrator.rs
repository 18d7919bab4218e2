//! Entry points that run the standard compliance pipeline.
//!
//! [`CompliancePipeline`] wires the four standard stages around an injected
//! [`Completer`] and [`RecordStore`], and keeps run statistics alongside the
//! Prometheus counters.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::compliance::Regulation;
use crate::error::LlmError;
use crate::llm::{ChatCompletionClient, Completer, LlmCompleter, TimeoutCompleter};
use crate::metrics::MetricsCollector;
use crate::stages::{assessment_stages, planning_stage, standard_stages, StageContext};
use crate::storage::{bounded, ComplianceRepository, RecordStore, StoreError};

use super::config::PipelineConfig;
use super::executor::{ExecutionMode, PipelineExecutor};
use super::stage::Stage;
use super::state::{PipelineOutcome, PipelineState};

/// Failures that prevent a run from starting.
///
/// Problems inside a run never surface here; they end up in
/// [`PipelineOutcome::errors`].
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Regulation not found: {0}")]
    RegulationNotFound(String),

    #[error("Finding not found: {0}")]
    FindingNotFound(String),

    /// The finding was produced from an unstored regulation, so there is
    /// nothing to plan against.
    #[error("Finding {0} is not linked to a stored regulation")]
    UnlinkedFinding(String),

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for PipelineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { id, .. } => PipelineError::RegulationNotFound(id),
            other => PipelineError::Store(other),
        }
    }
}

/// Statistics about runs of one pipeline instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineStats {
    pub total_runs: u64,
    pub successful: u64,
    pub failed: u64,
    /// Successful runs where at least one stage used fallback content.
    pub degraded: u64,
    pub average_duration: Duration,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, state: &PipelineState, duration: Duration) {
        self.total_runs += 1;
        if state.has_errors() {
            self.failed += 1;
        } else {
            self.successful += 1;
            if !state.degraded.is_empty() {
                self.degraded += 1;
            }
        }
        self.update_average_duration(duration);
    }

    fn update_average_duration(&mut self, duration: Duration) {
        if self.total_runs == 1 {
            self.average_duration = duration;
        } else {
            let n = self.total_runs as f64;
            let old_avg = self.average_duration.as_secs_f64();
            let new_avg = old_avg + (duration.as_secs_f64() - old_avg) / n;
            self.average_duration = Duration::from_secs_f64(new_avg);
        }
    }
}

/// The standard four-stage compliance workflow.
pub struct CompliancePipeline {
    context: StageContext,
    repository: ComplianceRepository,
    planning_date: Option<NaiveDate>,
    mode: ExecutionMode,
    metrics: MetricsCollector,
    stats: RwLock<PipelineStats>,
}

impl CompliancePipeline {
    pub fn new(completer: Arc<dyn Completer>, store: Arc<dyn RecordStore>) -> Self {
        Self {
            context: StageContext::new(completer, store.clone()),
            repository: ComplianceRepository::new(store),
            planning_date: None,
            mode: ExecutionMode::default(),
            metrics: MetricsCollector::new(),
            stats: RwLock::new(PipelineStats::new()),
        }
    }

    /// Builds the production pipeline: an OpenAI-compatible client behind a
    /// completion deadline.
    pub fn from_config(
        config: &PipelineConfig,
        store: Arc<dyn RecordStore>,
    ) -> Result<Self, LlmError> {
        let client = ChatCompletionClient::new(
            config.llm_api_base.clone(),
            config.llm_api_key.clone(),
            config.model.clone(),
            config.completion_timeout,
        )?;
        let completer = LlmCompleter::new(Arc::new(client), config.model.clone())
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens);
        let completer = TimeoutCompleter::new(Arc::new(completer), config.completion_timeout);

        Ok(Self::new(Arc::new(completer), store).with_store_timeout(config.store_timeout))
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.context = self.context.with_store_timeout(timeout);
        self
    }

    /// Pins the date action item deadlines are computed from.
    pub fn with_planning_date(mut self, date: NaiveDate) -> Self {
        self.planning_date = Some(date);
        self
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn repository(&self) -> &ComplianceRepository {
        &self.repository
    }

    pub fn executor(&self) -> PipelineExecutor {
        PipelineExecutor::new(standard_stages(&self.context, self.planning_date)).with_mode(self.mode)
    }

    /// Runs the pipeline over a caller-supplied regulation.
    pub async fn run(&self, regulation: Regulation) -> PipelineOutcome {
        let started = Instant::now();
        tracing::info!(
            source = %regulation.source,
            title = %regulation.title,
            "Starting compliance pipeline"
        );

        self.metrics.inc_pipelines_in_progress();
        let state = self.executor().run(PipelineState::new(regulation)).await;
        self.metrics.dec_pipelines_in_progress();

        let duration = started.elapsed();
        self.stats.write().await.record(&state, duration);

        let outcome = PipelineOutcome::from(state);
        self.metrics.record_pipeline_run(outcome.status.as_str());

        if outcome.is_success() {
            tracing::info!(
                findings = outcome.state.findings.len(),
                action_items = outcome.state.action_items.len(),
                degraded = ?outcome.state.degraded,
                duration_ms = duration.as_millis() as u64,
                "Compliance pipeline completed"
            );
        } else {
            tracing::warn!(errors = ?outcome.errors, "Compliance pipeline failed");
        }
        outcome
    }

    /// Loads a stored regulation and runs the pipeline over it.
    pub async fn run_stored(&self, regulation_id: &str) -> Result<PipelineOutcome, PipelineError> {
        let regulation = self.load_regulation(regulation_id).await?;
        Ok(self.run(regulation).await)
    }

    /// Runs analysis and impact assessment over a stored regulation,
    /// persisting the findings but planning nothing.
    pub async fn assess_stored(&self, regulation_id: &str) -> Result<PipelineOutcome, PipelineError> {
        let regulation = self.load_regulation(regulation_id).await?;
        tracing::info!(regulation_id = %regulation_id, "Assessing stored regulation");
        Ok(self
            .run_partial(assessment_stages(&self.context), PipelineState::new(regulation))
            .await)
    }

    /// Plans action items for one stored finding of a stored regulation.
    pub async fn plan_for_finding(&self, finding_id: &str) -> Result<PipelineOutcome, PipelineError> {
        let finding = bounded(
            self.context.store_timeout,
            self.repository.get_finding(finding_id),
        )
        .await
        .map_err(|e| match e {
            StoreError::NotFound { .. } => PipelineError::FindingNotFound(finding_id.to_string()),
            other => PipelineError::Store(other),
        })?;
        let regulation_id = finding
            .regulation_id
            .clone()
            .ok_or_else(|| PipelineError::UnlinkedFinding(finding_id.to_string()))?;
        let regulation = self.load_regulation(&regulation_id).await?;

        tracing::info!(finding_id = %finding_id, "Planning actions for stored finding");
        let mut state = PipelineState::new(regulation);
        state.findings.push(finding);

        let planning: Arc<dyn Stage> = Arc::new(planning_stage(&self.context, self.planning_date));
        Ok(self.run_partial(vec![planning], state).await)
    }

    async fn load_regulation(&self, regulation_id: &str) -> Result<Regulation, PipelineError> {
        let regulation = bounded(
            self.context.store_timeout,
            self.repository.get_regulation(regulation_id),
        )
        .await?;
        Ok(regulation)
    }

    async fn run_partial(&self, stages: Vec<Arc<dyn Stage>>, initial: PipelineState) -> PipelineOutcome {
        let state = PipelineExecutor::new(stages)
            .with_mode(self.mode)
            .run(initial)
            .await;
        let outcome = PipelineOutcome::from(state);
        if !outcome.is_success() {
            tracing::warn!(errors = ?outcome.errors, "Partial pipeline run failed");
        }
        outcome
    }

    pub async fn stats(&self) -> PipelineStats {
        self.stats.read().await.clone()
    }
}
