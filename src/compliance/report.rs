//! Report rendering over pipeline state and over stored records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{ActionItem, CompletionStatus, FinalReport, Finding, Priority, Regulation};
use crate::pipeline::state::PipelineState;

fn report_title(regulation_title: &str) -> String {
    format!("Compliance Report: {}", regulation_title)
}

fn report_summary(regulation_title: &str, findings: usize, action_items: usize) -> String {
    format!(
        "This report analyzes the impact of '{}' with {} findings and {} action items.",
        regulation_title, findings, action_items
    )
}

impl FinalReport {
    /// Renders the final report for a run. `None` when the state carries no
    /// regulation.
    pub fn from_state(state: &PipelineState) -> Option<Self> {
        let regulation = state.regulation.as_ref()?;

        let key_requirements = state
            .analysis
            .as_ref()
            .map(|a| a.key_requirements.clone())
            .unwrap_or_default();
        let compliance_risks = state
            .impact
            .as_ref()
            .map(|i| i.compliance_risks.clone())
            .unwrap_or_default();
        let high_priority_actions = state
            .action_items
            .iter()
            .filter(|item| item.priority == Priority::High)
            .count();
        let completion_status = if state.degraded.is_empty() {
            CompletionStatus::Complete
        } else {
            CompletionStatus::Degraded
        };

        Some(Self {
            title: report_title(&regulation.title),
            regulation_source: regulation.source.clone(),
            due_date: regulation.due_date.clone(),
            summary: report_summary(
                &regulation.title,
                state.findings.len(),
                state.action_items.len(),
            ),
            key_requirements,
            compliance_risks,
            findings_count: state.findings.len(),
            action_items_count: state.action_items.len(),
            high_priority_actions,
            completion_status,
        })
    }
}

/// A report assembled from stored records rather than a live run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub title: String,
    pub generated_at: DateTime<Utc>,
    pub regulation: Regulation,
    pub findings: Vec<Finding>,
    pub action_items: Vec<ActionItem>,
    pub summary: String,
}

impl ComplianceReport {
    /// Action items are only kept when findings are included and non-empty.
    pub fn compose(
        regulation: Regulation,
        findings: Vec<Finding>,
        action_items: Vec<ActionItem>,
        include_findings: bool,
        include_action_items: bool,
    ) -> Self {
        let findings = if include_findings { findings } else { Vec::new() };
        let action_items = if include_action_items && !findings.is_empty() {
            action_items
        } else {
            Vec::new()
        };

        Self {
            title: report_title(&regulation.title),
            generated_at: Utc::now(),
            summary: report_summary(&regulation.title, findings.len(), action_items.len()),
            regulation,
            findings,
            action_items,
        }
    }
}
