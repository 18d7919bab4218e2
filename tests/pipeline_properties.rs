//! End-to-end behavior of the compliance pipeline with fake collaborators.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{
    planning_date, regulation, ConstantCompleter, FailingStore, HangingCompleter,
    ScriptedCompleter,
};
use compliance_ai::compliance::{CompletionStatus, Finding, Priority, Regulation};
use compliance_ai::llm::{Completer, TimeoutCompleter};
use compliance_ai::pipeline::{
    CompliancePipeline, ExecutionMode, PipelineError, PipelineExecutor, PipelineState,
    PipelineStatus,
};
use compliance_ai::stages::impact_assessment::fallback_assessment;
use compliance_ai::stages::regulatory_analysis::fallback_analysis;
use compliance_ai::stages::{standard_stages, StageContext};
use compliance_ai::storage::{ComplianceRepository, MemoryStore, RecordStore, StoreError, Table};

fn pipeline_with(completer: Arc<dyn Completer>, store: Arc<dyn RecordStore>) -> CompliancePipeline {
    CompliancePipeline::new(completer, store).with_planning_date(planning_date())
}

fn executor(completer: Arc<dyn Completer>, mode: ExecutionMode) -> PipelineExecutor {
    let context = StageContext::new(completer, Arc::new(MemoryStore::new()));
    PipelineExecutor::new(standard_stages(&context, Some(planning_date()))).with_mode(mode)
}

#[tokio::test]
async fn test_short_circuit_equals_run_all_at_every_failure_point() {
    let scripts: Vec<Vec<Option<&str>>> = vec![
        vec![None],
        vec![Some(common::ANALYSIS), None],
        vec![Some(common::ANALYSIS), Some(common::IMPACT), None],
        vec![Some(common::ANALYSIS), Some(common::IMPACT), Some(common::PLAN)],
    ];

    for script in scripts {
        let short = executor(
            Arc::new(ScriptedCompleter::new(script.clone())),
            ExecutionMode::ShortCircuit,
        )
        .run(PipelineState::new(regulation()))
        .await;
        let all = executor(Arc::new(ScriptedCompleter::new(script)), ExecutionMode::RunAll)
            .run(PipelineState::new(regulation()))
            .await;

        assert_eq!(short, all);
    }
}

#[tokio::test]
async fn test_report_present_iff_no_errors() {
    for failing_call in 0..4 {
        let mut script = vec![Some(common::ANALYSIS), Some(common::IMPACT), Some(common::PLAN)];
        if failing_call < script.len() {
            script[failing_call] = None;
        }
        let pipeline = pipeline_with(
            Arc::new(ScriptedCompleter::new(script)),
            Arc::new(MemoryStore::new()),
        );

        let outcome = pipeline.run(regulation()).await;
        assert_eq!(
            outcome.state.final_report.is_some(),
            outcome.state.errors.is_empty(),
            "failing call {}",
            failing_call
        );
    }
}

#[tokio::test]
async fn test_failure_path_is_deterministic() {
    let run = || async {
        pipeline_with(
            Arc::new(ScriptedCompleter::new(vec![])),
            Arc::new(MemoryStore::new()),
        )
        .run(regulation())
        .await
    };

    let first = run().await;
    let second = run().await;
    assert_eq!(first.errors, second.errors);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_non_json_answers_use_documented_fallbacks() {
    let pipeline = pipeline_with(
        Arc::new(ConstantCompleter("Sorry, I can only answer in prose.")),
        Arc::new(MemoryStore::new()),
    );
    let outcome = pipeline.run(regulation()).await;

    assert!(outcome.is_success());
    assert_eq!(
        outcome.state.analysis,
        Some(fallback_analysis(
            "Breach notification",
            "Sorry, I can only answer in prose."
        ))
    );
    assert_eq!(outcome.state.impact, Some(fallback_assessment()));
    assert_eq!(outcome.state.findings.len(), 1);
    assert_eq!(
        outcome.state.findings[0].title,
        "Review Breach notification obligations"
    );

    let items = &outcome.state.action_items;
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].title, "Update Privacy Policy");
    assert_eq!(items[0].priority, Priority::High);
    assert_eq!(items[0].assigned_to.as_deref(), Some("Legal Department"));
    assert_eq!(items[0].due_date, planning_date().checked_add_days(chrono::Days::new(30)));
    assert_eq!(items[1].title, "Staff Training");
    assert_eq!(items[1].priority, Priority::Medium);
    assert_eq!(items[1].due_date, planning_date().checked_add_days(chrono::Days::new(60)));

    let report = outcome.state.final_report.expect("report");
    assert_eq!(report.completion_status, CompletionStatus::Degraded);
    assert_eq!(
        outcome.state.degraded,
        vec!["Regulatory analysis", "Impact assessment", "Action planning"]
    );
}

#[tokio::test]
async fn test_always_failing_completer() {
    let store = Arc::new(MemoryStore::new());
    let pipeline = pipeline_with(Arc::new(ScriptedCompleter::new(vec![])), store.clone());

    let outcome = pipeline
        .run(Regulation::new("GDPR", "X", "Y"))
        .await;

    assert_eq!(outcome.status, PipelineStatus::Error);
    assert_eq!(outcome.errors.len(), 1);
    assert!(outcome.errors[0].starts_with("Regulatory analysis failed: "));
    assert!(outcome.state.findings.is_empty());
    assert!(outcome.state.action_items.is_empty());
    assert!(outcome.state.final_report.is_none());
    assert_eq!(store.count(Table::Findings).await, 0);
}

#[tokio::test]
async fn test_well_formed_answers_complete_the_report() {
    let completer = Arc::new(ScriptedCompleter::happy_path());
    let store = Arc::new(MemoryStore::new());
    let pipeline = pipeline_with(completer.clone(), store.clone());

    let outcome = pipeline.run(Regulation::new("GDPR", "X", "Y")).await;

    assert!(outcome.is_success());
    assert_eq!(completer.calls(), 3);

    let state = &outcome.state;
    let report = state.final_report.as_ref().expect("report");
    assert_eq!(report.completion_status, CompletionStatus::Complete);
    assert_eq!(report.findings_count, state.findings.len());
    assert_eq!(report.action_items_count, state.action_items.len());
    assert_eq!(report.findings_count, 2);
    assert_eq!(report.action_items_count, 2);
    assert_eq!(report.high_priority_actions, 1);
    assert_eq!(report.title, "Compliance Report: X");

    let first_finding = state.findings[0].id.clone();
    assert!(state
        .action_items
        .iter()
        .all(|a| a.finding_id.as_deref() == Some(first_finding.as_str())));

    assert_eq!(store.count(Table::Findings).await, 2);
    assert_eq!(store.count(Table::ActionItems).await, 2);
}

#[tokio::test]
async fn test_finding_store_round_trip() {
    let repository = ComplianceRepository::new(Arc::new(MemoryStore::new()));
    let finding = Finding::new("f-42", "Consent wording", "Pre-ticked boxes", "Art. 7", 0.65)
        .with_regulation_id(Some("reg-7".to_string()));

    repository.save_finding(&finding).await.expect("saved");
    let read = repository.get_finding("f-42").await.expect("found");

    assert_eq!(read, finding);
}

#[tokio::test]
async fn test_store_failures_do_not_fail_the_run() {
    let pipeline = pipeline_with(Arc::new(ScriptedCompleter::happy_path()), Arc::new(FailingStore))
        .with_store_timeout(Duration::from_millis(200));

    let outcome = pipeline.run(regulation()).await;

    assert!(outcome.is_success());
    assert_eq!(outcome.state.findings.len(), 2);
    assert!(outcome.state.final_report.is_some());
}

#[tokio::test]
async fn test_completion_timeout_is_a_call_failure() {
    let completer = TimeoutCompleter::new(Arc::new(HangingCompleter), Duration::from_millis(50));
    let pipeline = pipeline_with(Arc::new(completer), Arc::new(MemoryStore::new()));

    let started = Instant::now();
    let outcome = pipeline.run(regulation()).await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(outcome.errors.len(), 1);
    assert!(outcome.errors[0].starts_with("Regulatory analysis failed: "));
    assert!(outcome.errors[0].contains("timed out"));
}

#[tokio::test]
async fn test_concurrent_runs_are_independent() {
    let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
    let ok = Arc::new(pipeline_with(Arc::new(ConstantCompleter("not json")), store.clone()));
    let failing = Arc::new(pipeline_with(Arc::new(ScriptedCompleter::new(vec![])), store));

    let mut handles = Vec::new();
    for i in 0..8 {
        let pipeline = if i % 2 == 0 { ok.clone() } else { failing.clone() };
        handles.push(tokio::spawn(async move { pipeline.run(regulation()).await }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        let outcome = handle.await.expect("task completes");
        assert_eq!(outcome.is_success(), i % 2 == 0);
    }
}

#[tokio::test]
async fn test_same_titled_stored_regulations_keep_their_own_records() {
    let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
    let pipeline = pipeline_with(Arc::new(ConstantCompleter("Looks fine to me.")), store);
    let repository = pipeline.repository();

    let mut ids = Vec::new();
    for content in ["Threshold lowered to $500M", "New strategy disclosures"] {
        let stored = repository
            .insert_regulation(Regulation::new("SEC", "Form PF", content))
            .await
            .expect("insert");
        ids.push(stored.id.expect("id"));
    }

    let first = pipeline.run_stored(&ids[0]).await.expect("runs");
    let second = pipeline.run_stored(&ids[1]).await.expect("runs");
    assert_ne!(first.state.findings[0].id, second.state.findings[0].id);
    assert_ne!(first.state.action_items[0].id, second.state.action_items[0].id);

    for id in &ids {
        let findings = repository.list_findings(Some(id)).await.expect("list");
        assert_eq!(findings.len(), 1, "findings of {} were overwritten", id);
    }
    assert_eq!(repository.list_action_items().await.expect("list").len(), 4);
}

#[tokio::test]
async fn test_store_failure_on_input_fetch_is_a_store_error() {
    let pipeline = pipeline_with(Arc::new(ScriptedCompleter::happy_path()), Arc::new(FailingStore));

    let result = pipeline.run_stored("reg-1").await;

    assert!(matches!(
        result,
        Err(PipelineError::Store(StoreError::Unavailable(_)))
    ));
}
