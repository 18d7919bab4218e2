//! Turns findings into prioritized, assigned action items.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use serde::Deserialize;

use super::{complete_for_stage, json_list, StageContext};
use crate::compliance::{
    derive_id, parse_due_date, ActionItem, ActionStatus, Finding, Priority, Regulation,
};
use crate::error::StageError;
use crate::pipeline::{PipelineState, Stage};
use crate::storage::Table;

pub const STAGE_NAME: &str = "Action planning";

const ACTION_PLANNING_PROMPT: &str = r#"Create an action plan.

Today: {today}
Regulation: {title} ({source}) - Due by {due_date}
Requirements: {key_requirements}
Operational Changes: {operational_changes}
Compliance Risks: {compliance_risks}
Findings:
{findings}

Create 3-5 specific action items with:
- title
- description
- priority (high/medium/low)
- assigned_to (role/department)
- deadline (YYYY-MM-DD)
- finding_id (id of the finding it addresses)

Your response MUST be a valid JSON object with these exact fields:
{
    "action_items": [
        {
            "title": "...",
            "description": "...",
            "priority": "high|medium|low",
            "assigned_to": "...",
            "deadline": "YYYY-MM-DD",
            "finding_id": "..."
        }
    ]
}

Make sure your output is properly formatted JSON without any additional text before or after."#;

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct ActionDraft {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    priority: Option<Priority>,
    #[serde(default)]
    assigned_to: Option<String>,
    #[serde(default, alias = "due_date")]
    deadline: Option<String>,
    #[serde(default)]
    finding_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct ActionPlanResponse {
    action_items: Vec<ActionDraft>,
}

fn fallback_plan(today: NaiveDate) -> ActionPlanResponse {
    let deadline = |days: i64| Some((today + Duration::days(days)).format("%Y-%m-%d").to_string());
    ActionPlanResponse {
        action_items: vec![
            ActionDraft {
                title: "Update Privacy Policy".to_string(),
                description: "Revise data breach notification section".to_string(),
                priority: Some(Priority::High),
                assigned_to: Some("Legal Department".to_string()),
                deadline: deadline(30),
                finding_id: None,
            },
            ActionDraft {
                title: "Staff Training".to_string(),
                description: "Train staff on new notification procedures".to_string(),
                priority: Some(Priority::Medium),
                assigned_to: Some("HR Department".to_string()),
                deadline: deadline(60),
                finding_id: None,
            },
        ],
    }
}

fn findings_block(findings: &[Finding]) -> String {
    if findings.is_empty() {
        return "(none)".to_string();
    }
    findings
        .iter()
        .map(|f| format!("- [{}] {}: {}", f.id, f.title, f.description))
        .collect::<Vec<_>>()
        .join("\n")
}

fn build_prompt(state: &PipelineState, regulation: &Regulation, today: NaiveDate) -> String {
    let key_requirements = state
        .analysis
        .as_ref()
        .map(|a| json_list(&a.key_requirements))
        .unwrap_or_else(|| "[]".to_string());
    let (operational_changes, compliance_risks) = state
        .impact
        .as_ref()
        .map(|i| (json_list(&i.operational_changes), json_list(&i.compliance_risks)))
        .unwrap_or_else(|| ("[]".to_string(), "[]".to_string()));

    ACTION_PLANNING_PROMPT
        .replace("{today}", &today.format("%Y-%m-%d").to_string())
        .replace("{title}", &regulation.title)
        .replace("{source}", &regulation.source)
        .replace(
            "{due_date}",
            regulation.due_date.as_deref().unwrap_or("Not specified"),
        )
        .replace("{key_requirements}", &key_requirements)
        .replace("{operational_changes}", &operational_changes)
        .replace("{compliance_risks}", &compliance_risks)
        .replace("{findings}", &findings_block(&state.findings))
}

/// Items referencing an unknown finding, or none, link to the first finding.
fn into_action_items(
    regulation: &Regulation,
    findings: &[Finding],
    drafts: Vec<ActionDraft>,
) -> Vec<ActionItem> {
    let first_finding = findings.first().map(|f| f.id.clone());

    drafts
        .into_iter()
        .enumerate()
        .map(|(index, draft)| {
            let finding_id = draft
                .finding_id
                .filter(|id| findings.iter().any(|f| &f.id == id))
                .or_else(|| first_finding.clone());
            let id = derive_id(
                "action_item",
                &[
                    regulation.id.as_deref().unwrap_or_default(),
                    regulation.source.as_str(),
                    regulation.title.as_str(),
                    finding_id.as_deref().unwrap_or_default(),
                    index.to_string().as_str(),
                    draft.title.as_str(),
                ],
            );

            ActionItem {
                id,
                title: draft.title,
                description: draft.description,
                priority: draft.priority.unwrap_or(Priority::Medium),
                assigned_to: draft.assigned_to.filter(|a| !a.trim().is_empty()),
                due_date: draft.deadline.as_deref().and_then(parse_due_date),
                status: ActionStatus::Pending,
                finding_id,
            }
        })
        .collect()
}

pub struct ActionPlanningStage {
    context: StageContext,
    planning_date: Option<NaiveDate>,
}

impl ActionPlanningStage {
    pub fn new(context: StageContext) -> Self {
        Self {
            context,
            planning_date: None,
        }
    }

    /// Fixes the date deadlines are computed from. Defaults to today (UTC).
    pub fn with_planning_date(mut self, date: NaiveDate) -> Self {
        self.planning_date = Some(date);
        self
    }

    fn today(&self) -> NaiveDate {
        self.planning_date
            .unwrap_or_else(|| Utc::now().date_naive())
    }

    async fn plan(&self, state: &mut PipelineState) -> Result<Vec<ActionItem>, StageError> {
        let regulation = state
            .regulation
            .clone()
            .ok_or_else(|| StageError::invalid_input(STAGE_NAME, "no regulation supplied"))?;
        let today = self.today();

        let prompt = build_prompt(state, &regulation, today);
        let structured = complete_for_stage(
            STAGE_NAME,
            self.context.completer.as_ref(),
            &prompt,
            |_| fallback_plan(today),
        )
        .await?;

        if structured.is_fallback() {
            state.mark_degraded(STAGE_NAME);
        }
        let items = into_action_items(
            &regulation,
            &state.findings,
            structured.into_inner().action_items,
        );
        state.action_items.extend(items.iter().cloned());

        tracing::info!(action_items = items.len(), "Action plan created");
        Ok(items)
    }
}

#[async_trait]
impl Stage for ActionPlanningStage {
    fn name(&self) -> &'static str {
        STAGE_NAME
    }

    async fn run(&self, mut state: PipelineState) -> PipelineState {
        if state.has_errors() {
            return state;
        }
        match self.plan(&mut state).await {
            Ok(items) => {
                for item in &items {
                    self.context.persist(Table::ActionItems, item).await;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Action planning failed");
                state.record_error(e.to_string());
            }
        }
        state
    }
}
