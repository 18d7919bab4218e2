//! The four standard compliance stages.
//!
//! Regulatory analysis → impact assessment → action planning → report
//! generation. Each stage passes through a state that already carries errors,
//! turns completion call failures into an `errors` entry, and substitutes
//! fixed fallback content when the completion text does not parse.

pub mod action_planning;
pub mod impact_assessment;
pub mod regulatory_analysis;
pub mod report_generation;

pub use action_planning::ActionPlanningStage;
pub use impact_assessment::ImpactAssessmentStage;
pub use regulatory_analysis::RegulatoryAnalysisStage;
pub use report_generation::ReportGenerationStage;

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;

use crate::error::StageError;
use crate::llm::{complete_structured, Completer, Structured};
use crate::metrics::{CompletionOutcome, MetricsCollector};
use crate::pipeline::Stage;
use crate::storage::{persist_best_effort, to_record, RecordStore, Table};

/// Collaborators shared by the stages of one pipeline.
#[derive(Clone)]
pub struct StageContext {
    pub completer: Arc<dyn Completer>,
    pub store: Arc<dyn RecordStore>,
    pub store_timeout: Duration,
}

impl StageContext {
    pub fn new(completer: Arc<dyn Completer>, store: Arc<dyn RecordStore>) -> Self {
        Self {
            completer,
            store,
            store_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Best-effort write of a serializable value.
    pub(crate) async fn persist<T: serde::Serialize>(&self, table: Table, value: &T) {
        match to_record(value) {
            Ok(record) => {
                persist_best_effort(self.store.as_ref(), table, record, self.store_timeout).await;
            }
            Err(e) => {
                tracing::warn!(table = %table, error = %e, "Could not encode record, skipping write");
            }
        }
    }
}

/// The standard chain. `planning_date` pins the action planning clock.
pub fn standard_stages(
    context: &StageContext,
    planning_date: Option<NaiveDate>,
) -> Vec<Arc<dyn Stage>> {
    let mut stages = assessment_stages(context);
    stages.push(Arc::new(planning_stage(context, planning_date)));
    stages.push(Arc::new(ReportGenerationStage));
    stages
}

/// Analysis followed by impact assessment; the prefix of the standard chain
/// that produces findings.
pub fn assessment_stages(context: &StageContext) -> Vec<Arc<dyn Stage>> {
    vec![
        Arc::new(RegulatoryAnalysisStage::new(context.completer.clone())),
        Arc::new(ImpactAssessmentStage::new(context.clone())),
    ]
}

pub fn planning_stage(context: &StageContext, planning_date: Option<NaiveDate>) -> ActionPlanningStage {
    let stage = ActionPlanningStage::new(context.clone());
    match planning_date {
        Some(date) => stage.with_planning_date(date),
        None => stage,
    }
}

/// Runs one structured completion for `stage` and records its outcome.
pub(crate) async fn complete_for_stage<T, F>(
    stage: &'static str,
    completer: &dyn Completer,
    prompt: &str,
    fallback: F,
) -> Result<Structured<T>, StageError>
where
    T: DeserializeOwned,
    F: FnOnce(&str) -> T,
{
    let metrics = MetricsCollector::new();
    match complete_structured(completer, prompt, fallback).await {
        Ok(structured) => {
            let outcome = if structured.is_fallback() {
                CompletionOutcome::Fallback
            } else {
                CompletionOutcome::Ok
            };
            metrics.record_completion(stage, outcome);
            Ok(structured)
        }
        Err(e) => {
            metrics.record_completion(stage, CompletionOutcome::Error);
            Err(StageError::completion(stage, e))
        }
    }
}

/// JSON list for embedding in prompts.
pub(crate) fn json_list(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::error::LlmError;
    use crate::llm::Completer;

    /// Replays canned answers; `None` entries fail the call.
    pub struct ScriptedCompleter {
        answers: Mutex<VecDeque<Option<String>>>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedCompleter {
        pub fn new(answers: Vec<Option<&str>>) -> Self {
            Self {
                answers: Mutex::new(answers.into_iter().map(|a| a.map(String::from)).collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn prompts(&self) -> Vec<String> {
            self.prompts.lock().expect("lock not poisoned").clone()
        }
    }

    #[async_trait]
    impl Completer for ScriptedCompleter {
        async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
            self.prompts
                .lock()
                .expect("lock not poisoned")
                .push(prompt.to_string());
            match self.answers.lock().expect("lock not poisoned").pop_front() {
                Some(Some(answer)) => Ok(answer),
                _ => Err(LlmError::RequestFailed("connection refused".to_string())),
            }
        }
    }
}
