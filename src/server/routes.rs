//! Request handlers. Each one is a thin adapter over the pipeline or the
//! repository.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};

use super::error::ApiError;
use super::AppState;
use crate::compliance::{
    default_sources, ActionItem, ActionStatus, ComplianceReport, Finding, Priority, Regulation,
    RegulatorySource,
};
use crate::pipeline::PipelineOutcome;

type ApiResult<T> = Result<Json<T>, ApiError>;

fn into_result(outcome: PipelineOutcome) -> ApiResult<PipelineOutcome> {
    if outcome.is_success() {
        Ok(Json(outcome))
    } else {
        Err(ApiError::PipelineFailed(Box::new(outcome)))
    }
}

pub async fn root() -> Json<Value> {
    Json(json!({ "message": "Compliance AI API - Welcome!" }))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Runs the pipeline over the regulation in the request body.
pub async fn run_pipeline(
    State(state): State<Arc<AppState>>,
    Json(regulation): Json<Regulation>,
) -> ApiResult<PipelineOutcome> {
    into_result(state.pipeline.run(regulation).await)
}

/// Runs the pipeline over a stored regulation.
pub async fn run_stored_regulation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<PipelineOutcome> {
    into_result(state.pipeline.run_stored(&id).await?)
}

/// Analysis and impact assessment over a stored regulation.
pub async fn assess_impact(
    State(state): State<Arc<AppState>>,
    Path(regulation_diff_id): Path<String>,
) -> ApiResult<PipelineOutcome> {
    into_result(state.pipeline.assess_stored(&regulation_diff_id).await?)
}

/// Action planning for one stored finding.
pub async fn plan_finding(
    State(state): State<Arc<AppState>>,
    Path(finding_id): Path<String>,
) -> ApiResult<PipelineOutcome> {
    into_result(state.pipeline.plan_for_finding(&finding_id).await?)
}

pub async fn list_regulations(State(state): State<Arc<AppState>>) -> ApiResult<Vec<Regulation>> {
    Ok(Json(state.repository().list_regulations().await?))
}

pub async fn create_regulation(
    State(state): State<Arc<AppState>>,
    Json(regulation): Json<Regulation>,
) -> Result<(StatusCode, Json<Regulation>), ApiError> {
    regulation.validate().map_err(ApiError::BadRequest)?;
    let stored = state.repository().insert_regulation(regulation).await?;
    tracing::info!(id = ?stored.id, source = %stored.source, "Regulation stored");
    Ok((StatusCode::CREATED, Json(stored)))
}

pub async fn get_regulation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Regulation> {
    Ok(Json(state.repository().get_regulation(&id).await?))
}

pub async fn list_sources() -> Json<Vec<RegulatorySource>> {
    Json(default_sources())
}

#[derive(Debug, Default, Deserialize)]
pub struct FindingsQuery {
    pub regulation_id: Option<String>,
}

pub async fn list_findings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FindingsQuery>,
) -> ApiResult<Vec<Finding>> {
    let findings = state
        .repository()
        .list_findings(query.regulation_id.as_deref())
        .await?;
    Ok(Json(findings))
}

pub async fn list_action_items(State(state): State<Arc<AppState>>) -> ApiResult<Vec<ActionItem>> {
    Ok(Json(state.repository().list_action_items().await?))
}

/// Editable fields of an action item; the id comes from the path.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionItemUpdate {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub priority: Priority,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: ActionStatus,
    #[serde(default)]
    pub finding_id: Option<String>,
}

impl ActionItemUpdate {
    fn into_item(self, id: String) -> ActionItem {
        ActionItem {
            id,
            title: self.title,
            description: self.description,
            priority: self.priority,
            assigned_to: self.assigned_to,
            due_date: self.due_date,
            status: self.status,
            finding_id: self.finding_id,
        }
    }
}

pub async fn update_action_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(update): Json<ActionItemUpdate>,
) -> ApiResult<ActionItem> {
    let item = update.into_item(id.clone());
    let updated = state.repository().update_action_item(&id, &item).await?;
    tracing::info!(id = %id, status = ?updated.status, "Action item updated");
    Ok(Json(updated))
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportRequest {
    pub regulation_diff_id: String,
    #[serde(default = "default_true")]
    pub include_findings: bool,
    #[serde(default = "default_true")]
    pub include_action_items: bool,
}

/// Assembles a report from stored records.
pub async fn generate_report(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ReportRequest>,
) -> ApiResult<ComplianceReport> {
    let repository = state.repository();
    let regulation = repository
        .get_regulation(&request.regulation_diff_id)
        .await?;

    let findings = if request.include_findings {
        repository
            .list_findings(Some(&request.regulation_diff_id))
            .await?
    } else {
        Vec::new()
    };
    let action_items = if request.include_action_items && !findings.is_empty() {
        let ids: Vec<String> = findings.iter().map(|f| f.id.clone()).collect();
        repository.list_action_items_for_findings(&ids).await?
    } else {
        Vec::new()
    };

    Ok(Json(ComplianceReport::compose(
        regulation,
        findings,
        action_items,
        request.include_findings,
        request.include_action_items,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{CompliancePipeline, PipelineStatus};
    use crate::stages::testing::ScriptedCompleter;
    use crate::storage::{MemoryStore, RecordStore};
    use axum::response::IntoResponse;

    fn app_state(answers: Vec<Option<&str>>) -> Arc<AppState> {
        let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
        let pipeline = CompliancePipeline::new(Arc::new(ScriptedCompleter::new(answers)), store);
        Arc::new(AppState::new(pipeline))
    }

    #[tokio::test]
    async fn test_root_message() {
        let Json(body) = root().await;
        assert_eq!(body["message"], "Compliance AI API - Welcome!");
    }

    #[tokio::test]
    async fn test_run_pipeline_failure_is_bad_gateway() {
        let state = app_state(vec![None]);
        let err = run_pipeline(State(state), Json(Regulation::new("GDPR", "X", "Y")))
            .await
            .expect_err("completion fails");

        match &err {
            ApiError::PipelineFailed(outcome) => {
                assert_eq!(outcome.status, PipelineStatus::Error);
                assert_eq!(outcome.errors.len(), 1);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_create_and_get_regulation() {
        let state = app_state(vec![]);
        let (status, Json(stored)) = create_regulation(
            State(state.clone()),
            Json(Regulation::new("SEC", "Form PF", "Amendments")),
        )
        .await
        .expect("created");
        assert_eq!(status, StatusCode::CREATED);

        let id = stored.id.clone().expect("id assigned");
        let Json(fetched) = get_regulation(State(state), Path(id)).await.expect("found");
        assert_eq!(fetched, stored);
    }

    #[tokio::test]
    async fn test_create_regulation_rejects_blank_title() {
        let err = create_regulation(State(app_state(vec![])), Json(Regulation::new("SEC", " ", "Y")))
            .await
            .expect_err("invalid");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_regulation_is_not_found() {
        let state = app_state(vec![]);
        let err = run_stored_regulation(State(state.clone()), Path("nope".to_string()))
            .await
            .expect_err("missing");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err = get_regulation(State(state), Path("nope".to_string()))
            .await
            .expect_err("missing");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_update_missing_action_item_is_not_found() {
        let update = ActionItemUpdate {
            title: "Staff Training".to_string(),
            description: String::new(),
            priority: Priority::Medium,
            assigned_to: None,
            due_date: None,
            status: ActionStatus::Done,
            finding_id: None,
        };
        let err = update_action_item(State(app_state(vec![])), Path("a-1".to_string()), Json(update))
            .await
            .expect_err("missing");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_report_for_stored_records() {
        let state = app_state(vec![]);
        let repository = state.repository();
        let regulation = repository
            .insert_regulation(Regulation::new("SEC", "Form PF", "Amendments"))
            .await
            .expect("insert");
        let reg_id = regulation.id.clone().expect("id");
        let finding = Finding::new("f-1", "Gap", "d", "s", 0.8).with_regulation_id(Some(reg_id.clone()));
        repository.save_finding(&finding).await.expect("finding");
        let item = ActionItemUpdate {
            title: "Fix".to_string(),
            description: String::new(),
            priority: Priority::High,
            assigned_to: None,
            due_date: None,
            status: ActionStatus::Pending,
            finding_id: Some("f-1".to_string()),
        }
        .into_item("a-1".to_string());
        repository.save_action_item(&item).await.expect("item");

        let request = ReportRequest {
            regulation_diff_id: reg_id,
            include_findings: true,
            include_action_items: true,
        };
        let Json(report) = generate_report(State(state), Json(request)).await.expect("report");
        assert_eq!(report.title, "Compliance Report: Form PF");
        assert_eq!(report.findings, vec![finding]);
        assert_eq!(report.action_items, vec![item]);
    }

    #[test]
    fn test_report_request_defaults() {
        let request: ReportRequest =
            serde_json::from_str(r#"{"regulation_diff_id": "r-1"}"#).expect("parses");
        assert!(request.include_findings);
        assert!(request.include_action_items);
    }
}
