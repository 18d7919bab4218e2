//! Assesses business impact and records findings.

use async_trait::async_trait;
use serde::Deserialize;

use super::{complete_for_stage, json_list, StageContext};
use crate::compliance::{derive_id, Finding, ImpactAssessment, Regulation, RegulatoryAnalysis};
use crate::error::StageError;
use crate::pipeline::{PipelineState, Stage};
use crate::storage::Table;

pub const STAGE_NAME: &str = "Impact assessment";

const IMPACT_ASSESSMENT_PROMPT: &str = r#"Based on this regulation and analysis:

Regulation: {title} ({source})
Summary: {summary}
Key Requirements: {key_requirements}
Policy Updates: {policy_updates}

Assess the business impact:
1. Which compliance gaps or impacts (findings) does this regulation create?
2. What operational changes are needed?
3. What are the main compliance risks?
4. What is the resource impact?

Your response MUST be a valid JSON object with these exact fields:
{
    "findings": [
        {
            "title": "...",
            "description": "...",
            "source_section": "...",
            "confidence": 0.0
        }
    ],
    "operational_changes": ["change1", "change2", ...],
    "compliance_risks": ["risk1", "risk2", ...],
    "resource_impact": "brief description"
}

"confidence" is a number between 0 and 1.
Make sure your output is properly formatted JSON without any additional text before or after."#;

fn default_confidence() -> f64 {
    0.5
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct FindingDraft {
    #[serde(default)]
    id: Option<String>,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    source_section: String,
    #[serde(default = "default_confidence", alias = "confidence_score")]
    confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct ImpactResponse {
    #[serde(default)]
    findings: Vec<FindingDraft>,
    operational_changes: Vec<String>,
    compliance_risks: Vec<String>,
    resource_impact: String,
}

/// Placeholder assessment and finding used when the completion text does not
/// parse.
fn fallback_response(regulation_title: &str) -> ImpactResponse {
    ImpactResponse {
        findings: vec![FindingDraft {
            id: None,
            title: format!("Review {} obligations", regulation_title),
            description: format!(
                "Compare current processes against the requirements of {}",
                regulation_title
            ),
            source_section: "General".to_string(),
            confidence: default_confidence(),
        }],
        operational_changes: vec!["Update notification processes".to_string()],
        compliance_risks: vec!["Missing notification deadlines".to_string()],
        resource_impact: "Medium - requires policy updates and staff training".to_string(),
    }
}

/// The assessment that accompanies the fallback finding.
pub fn fallback_assessment() -> ImpactAssessment {
    let response = fallback_response("");
    ImpactAssessment {
        operational_changes: response.operational_changes,
        compliance_risks: response.compliance_risks,
        resource_impact: response.resource_impact,
    }
}

fn build_prompt(regulation: &Regulation, analysis: &RegulatoryAnalysis) -> String {
    IMPACT_ASSESSMENT_PROMPT
        .replace("{title}", &regulation.title)
        .replace("{source}", &regulation.source)
        .replace(
            "{summary}",
            regulation.summary.as_deref().unwrap_or(&regulation.content),
        )
        .replace("{key_requirements}", &json_list(&analysis.key_requirements))
        .replace("{policy_updates}", &json_list(&analysis.policy_updates))
}

fn into_findings(regulation: &Regulation, drafts: Vec<FindingDraft>) -> Vec<Finding> {
    drafts
        .into_iter()
        .enumerate()
        .map(|(index, draft)| {
            let id = draft
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| {
                    derive_id(
                        "finding",
                        &[
                            regulation.id.as_deref().unwrap_or_default(),
                            regulation.source.as_str(),
                            regulation.title.as_str(),
                            index.to_string().as_str(),
                            draft.title.as_str(),
                        ],
                    )
                });
            Finding::new(
                id,
                draft.title,
                draft.description,
                draft.source_section,
                draft.confidence,
            )
            .with_regulation_id(regulation.id.clone())
        })
        .collect()
}

pub struct ImpactAssessmentStage {
    context: StageContext,
}

impl ImpactAssessmentStage {
    pub fn new(context: StageContext) -> Self {
        Self { context }
    }

    async fn assess(&self, state: &mut PipelineState) -> Result<Vec<Finding>, StageError> {
        let regulation = state
            .regulation
            .clone()
            .ok_or_else(|| StageError::invalid_input(STAGE_NAME, "no regulation supplied"))?;
        let analysis = state.analysis.as_ref().ok_or_else(|| {
            StageError::invalid_input(STAGE_NAME, "regulatory analysis is missing")
        })?;

        let prompt = build_prompt(&regulation, analysis);
        let structured = complete_for_stage(
            STAGE_NAME,
            self.context.completer.as_ref(),
            &prompt,
            |_| fallback_response(&regulation.title),
        )
        .await?;

        if structured.is_fallback() {
            state.mark_degraded(STAGE_NAME);
        }
        let response = structured.into_inner();
        let findings = into_findings(&regulation, response.findings);

        state.impact = Some(ImpactAssessment {
            operational_changes: response.operational_changes,
            compliance_risks: response.compliance_risks,
            resource_impact: response.resource_impact,
        });
        state.findings.extend(findings.iter().cloned());

        tracing::info!(findings = findings.len(), "Impact assessed");
        Ok(findings)
    }
}

#[async_trait]
impl Stage for ImpactAssessmentStage {
    fn name(&self) -> &'static str {
        STAGE_NAME
    }

    async fn run(&self, mut state: PipelineState) -> PipelineState {
        if state.has_errors() {
            return state;
        }
        match self.assess(&mut state).await {
            Ok(findings) => {
                for finding in &findings {
                    self.context.persist(Table::Findings, finding).await;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Impact assessment failed");
                state.record_error(e.to_string());
            }
        }
        state
    }
}
