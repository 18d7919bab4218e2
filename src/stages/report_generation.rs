//! Summarizes the accumulated state into the final report.

use async_trait::async_trait;

use crate::compliance::FinalReport;
use crate::error::StageError;
use crate::pipeline::{PipelineState, Stage};

pub const STAGE_NAME: &str = "Report generation";

/// Pure stage: no completion call and nothing persisted.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportGenerationStage;

#[async_trait]
impl Stage for ReportGenerationStage {
    fn name(&self) -> &'static str {
        STAGE_NAME
    }

    async fn run(&self, mut state: PipelineState) -> PipelineState {
        if state.has_errors() {
            return state;
        }
        match FinalReport::from_state(&state) {
            Some(report) => {
                tracing::info!(
                    findings = report.findings_count,
                    action_items = report.action_items_count,
                    status = ?report.completion_status,
                    "Report generated"
                );
                state.final_report = Some(report);
            }
            None => {
                let error = StageError::invalid_input(STAGE_NAME, "no regulation supplied");
                state.record_error(error.to_string());
            }
        }
        state
    }
}
