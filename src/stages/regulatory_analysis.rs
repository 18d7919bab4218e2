//! Extracts key requirements and affected policy sections from a regulation.

use std::sync::Arc;

use async_trait::async_trait;

use super::complete_for_stage;
use crate::compliance::{Regulation, RegulatoryAnalysis};
use crate::error::StageError;
use crate::llm::Completer;
use crate::pipeline::{PipelineState, Stage};

pub const STAGE_NAME: &str = "Regulatory analysis";

const REGULATORY_ANALYSIS_PROMPT: &str = r#"Analyze this regulatory requirement:

Source: {source}
Title: {title}
Summary: {summary}
Priority: {priority}
Due Date: {due_date}
Potential Fine: {potential_fine}

Text:
{content}
{changes}
Extract the key requirements and the policy sections that need updates.

Your response MUST be a valid JSON object with these exact fields:
{
    "key_requirements": ["requirement1", "requirement2", ...],
    "policy_updates": ["section1", "section2", ...]
}

Make sure your output is properly formatted JSON without any additional text before or after."#;

fn or_unspecified(value: Option<&str>) -> &str {
    value.filter(|v| !v.trim().is_empty()).unwrap_or("Not specified")
}

fn build_prompt(regulation: &Regulation) -> String {
    let changes = if regulation.changes.is_empty() {
        String::new()
    } else {
        let lines: Vec<String> = regulation
            .changes
            .iter()
            .map(|c| format!("- Section {}: \"{}\" -> \"{}\"", c.section, c.old_text, c.new_text))
            .collect();
        format!("\nChanges:\n{}\n", lines.join("\n"))
    };
    let priority = regulation.priority.map(|p| p.as_str());

    REGULATORY_ANALYSIS_PROMPT
        .replace("{source}", &regulation.source)
        .replace("{title}", &regulation.title)
        .replace("{summary}", or_unspecified(regulation.summary.as_deref()))
        .replace("{priority}", or_unspecified(priority))
        .replace("{due_date}", or_unspecified(regulation.due_date.as_deref()))
        .replace(
            "{potential_fine}",
            or_unspecified(regulation.potential_fine.as_deref()),
        )
        .replace("{changes}", &changes)
        .replace("{content}", &regulation.content)
}

/// Placeholder analysis used when the completion text does not parse.
pub fn fallback_analysis(regulation_title: &str, raw: &str) -> RegulatoryAnalysis {
    let raw = raw.trim();
    RegulatoryAnalysis {
        key_requirements: if raw.is_empty() {
            Vec::new()
        } else {
            vec![raw.to_string()]
        },
        policy_updates: vec![format!(
            "Review policy sections affected by {}",
            regulation_title
        )],
    }
}

pub struct RegulatoryAnalysisStage {
    completer: Arc<dyn Completer>,
}

impl RegulatoryAnalysisStage {
    pub fn new(completer: Arc<dyn Completer>) -> Self {
        Self { completer }
    }

    async fn analyze(&self, state: &mut PipelineState) -> Result<(), StageError> {
        let regulation = state
            .regulation
            .as_ref()
            .ok_or_else(|| StageError::invalid_input(STAGE_NAME, "no regulation supplied"))?;
        regulation
            .validate()
            .map_err(|reason| StageError::invalid_input(STAGE_NAME, reason))?;

        let title = regulation.title.clone();
        let prompt = build_prompt(regulation);
        let structured = complete_for_stage(STAGE_NAME, self.completer.as_ref(), &prompt, |raw| {
            fallback_analysis(&title, raw)
        })
        .await?;

        if structured.is_fallback() {
            state.mark_degraded(STAGE_NAME);
        }
        let analysis = structured.into_inner();
        tracing::info!(
            key_requirements = analysis.key_requirements.len(),
            policy_updates = analysis.policy_updates.len(),
            "Regulation analyzed"
        );
        state.analysis = Some(analysis);
        Ok(())
    }
}

#[async_trait]
impl Stage for RegulatoryAnalysisStage {
    fn name(&self) -> &'static str {
        STAGE_NAME
    }

    async fn run(&self, mut state: PipelineState) -> PipelineState {
        if state.has_errors() {
            return state;
        }
        if let Err(e) = self.analyze(&mut state).await {
            tracing::warn!(error = %e, "Regulatory analysis failed");
            state.record_error(e.to_string());
        }
        state
    }
}
