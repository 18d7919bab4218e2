//! Fakes shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use compliance_ai::compliance::Regulation;
use compliance_ai::llm::Completer;
use compliance_ai::storage::{Filter, Record, RecordStore, StoreError, Table};
use compliance_ai::LlmError;

pub const ANALYSIS: &str = r#"{"key_requirements": ["Notify the authority within 72 hours"], "policy_updates": ["Incident response policy"]}"#;

pub const IMPACT: &str = r#"```json
{
  "findings": [
    {"title": "No breach runbook", "description": "Notification steps are undocumented", "source_section": "Art. 33(1)", "confidence": 0.9},
    {"title": "Processor contracts", "description": "Processors lack notice duties", "source_section": "Art. 33(2)", "confidence": 0.7}
  ],
  "operational_changes": ["On-call privacy rota"],
  "compliance_risks": ["Late notification fines"],
  "resource_impact": "Medium"
}
```"#;

pub const PLAN: &str = r#"{"action_items": [
  {"title": "Write breach runbook", "description": "Document the 72h flow", "priority": "high", "assigned_to": "Security", "deadline": "2025-02-01"},
  {"title": "Amend processor contracts", "description": "Add notice clause", "priority": "medium", "assigned_to": "Legal", "deadline": "2025-03-01"}
]}"#;

pub fn planning_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid date")
}

pub fn regulation() -> Regulation {
    Regulation::new(
        "GDPR",
        "Breach notification",
        "Notify the supervisory authority within 72 hours.",
    )
}

/// Replays answers in order; `None` fails the call. Extra calls fail.
pub struct ScriptedCompleter {
    answers: Mutex<VecDeque<Option<String>>>,
    calls: AtomicUsize,
}

impl ScriptedCompleter {
    pub fn new(answers: Vec<Option<&str>>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().map(|a| a.map(String::from)).collect()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Three well-formed answers, one per completing stage.
    pub fn happy_path() -> Self {
        Self::new(vec![Some(ANALYSIS), Some(IMPACT), Some(PLAN)])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Completer for ScriptedCompleter {
    async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.answers.lock().expect("lock not poisoned").pop_front() {
            Some(Some(answer)) => Ok(answer),
            _ => Err(LlmError::RequestFailed("connection refused".to_string())),
        }
    }
}

/// Always answers with the same text.
pub struct ConstantCompleter(pub &'static str);

#[async_trait]
impl Completer for ConstantCompleter {
    async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
        Ok(self.0.to_string())
    }
}

/// Never answers within any reasonable deadline.
pub struct HangingCompleter;

#[async_trait]
impl Completer for HangingCompleter {
    async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        Ok("{}".to_string())
    }
}

/// A store whose every operation fails.
pub struct FailingStore;

#[async_trait]
impl RecordStore for FailingStore {
    async fn get(&self, _table: Table, _filter: &Filter) -> Result<Vec<Record>, StoreError> {
        Err(StoreError::Unavailable("store offline".to_string()))
    }

    async fn insert(&self, _table: Table, _record: Record) -> Result<Record, StoreError> {
        Err(StoreError::Unavailable("store offline".to_string()))
    }

    async fn update(&self, _table: Table, _id: &str, _fields: Record) -> Result<Record, StoreError> {
        Err(StoreError::Unavailable("store offline".to_string()))
    }
}
