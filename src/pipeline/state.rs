//! The record threaded through every pipeline stage.

use serde::{Deserialize, Serialize};

use crate::compliance::{ActionItem, FinalReport, Finding, ImpactAssessment, Regulation, RegulatoryAnalysis};

/// State of one pipeline invocation.
///
/// Stages receive the whole state and return a full copy with only their own
/// slots changed. Once `errors` is non-empty, stages pass the state through.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    /// Input; never modified by stages.
    #[serde(default)]
    pub regulation: Option<Regulation>,
    #[serde(default)]
    pub analysis: Option<RegulatoryAnalysis>,
    #[serde(default)]
    pub impact: Option<ImpactAssessment>,
    #[serde(default)]
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub action_items: Vec<ActionItem>,
    /// Append-only. Non-empty means the run failed.
    #[serde(default)]
    pub errors: Vec<String>,
    /// Stages that substituted fallback content for unparseable output.
    #[serde(default)]
    pub degraded: Vec<String>,
    #[serde(default)]
    pub final_report: Option<FinalReport>,
}

impl PipelineState {
    pub fn new(regulation: Regulation) -> Self {
        Self {
            regulation: Some(regulation),
            ..Self::default()
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn mark_degraded(&mut self, stage: &str) {
        if !self.degraded.iter().any(|s| s == stage) {
            self.degraded.push(stage.to_string());
        }
    }
}

/// Termination predicate: stop once the run failed or produced its report.
pub fn should_end(state: &PipelineState) -> bool {
    state.has_errors() || state.final_report.is_some()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    Success,
    Error,
}

impl PipelineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStatus::Success => "success",
            PipelineStatus::Error => "error",
        }
    }
}

/// What callers of the pipeline receive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutcome {
    pub status: PipelineStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    pub state: PipelineState,
}

impl From<PipelineState> for PipelineOutcome {
    fn from(state: PipelineState) -> Self {
        let status = if state.has_errors() {
            PipelineStatus::Error
        } else {
            PipelineStatus::Success
        };
        Self {
            status,
            errors: state.errors.clone(),
            state,
        }
    }
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        self.status == PipelineStatus::Success
    }
}
