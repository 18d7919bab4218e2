//! Domain records threaded through the compliance pipeline.
//!
//! Findings and action items get name-based (v5) UUIDs when the completion
//! function does not supply an id, so two runs over the same input produce
//! equal records.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for derived finding and action item ids.
const ID_NAMESPACE: Uuid = Uuid::from_u128(0x6d1f_8a52_3c4e_4b7a_9e21_5f0c_a8d3_7b14);

/// Derives a stable id from `kind` and an ordered list of name parts.
pub fn derive_id(kind: &str, parts: &[&str]) -> String {
    let name = format!("{}:{}", kind, parts.join("\u{1f}"));
    Uuid::new_v5(&ID_NAMESPACE, name.as_bytes()).to_string()
}

/// One amended section of a regulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegulationChange {
    pub section: String,
    #[serde(default)]
    pub old_text: String,
    #[serde(default)]
    pub new_text: String,
}

/// A regulation, as submitted by a caller or loaded from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Regulation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub source: String,
    pub title: String,
    #[serde(alias = "text")]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub potential_fine: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<RegulationChange>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Regulation {
    pub fn new(
        source: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            source: source.into(),
            title: title.into(),
            content: content.into(),
            summary: None,
            url: None,
            published_date: None,
            due_date: None,
            priority: None,
            potential_fine: None,
            changes: Vec::new(),
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_change(mut self, change: RegulationChange) -> Self {
        self.changes.push(change);
        self
    }

    /// Checks that source, title and content are present.
    pub fn validate(&self) -> Result<(), String> {
        let required = [
            ("source", &self.source),
            ("title", &self.title),
            ("content", &self.content),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(format!("regulation {} is empty", field));
            }
        }
        Ok(())
    }
}

/// Output of the regulatory analysis stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegulatoryAnalysis {
    pub key_requirements: Vec<String>,
    pub policy_updates: Vec<String>,
}

/// Output of the impact assessment stage, alongside its findings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactAssessment {
    pub operational_changes: Vec<String>,
    pub compliance_risks: Vec<String>,
    pub resource_impact: String,
}

/// A detected compliance gap or regulatory impact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    pub title: String,
    pub description: String,
    pub source_section: String,
    pub confidence_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regulation_id: Option<String>,
}

impl Finding {
    /// Creates a finding; `confidence_score` is clamped into `[0, 1]` and NaN
    /// becomes 0.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        source_section: impl Into<String>,
        confidence_score: f64,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            source_section: source_section.into(),
            confidence_score: clamp_confidence(confidence_score),
            regulation_id: None,
        }
    }

    pub fn with_regulation_id(mut self, regulation_id: Option<String>) -> Self {
        self.regulation_id = regulation_id;
        self
    }
}

fn clamp_confidence(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// Urgency of an action item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// Case-insensitive; anything unrecognised is `Medium`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "high" | "critical" | "urgent" => Priority::High,
            "low" => Priority::Low,
            _ => Priority::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl From<String> for Priority {
    fn from(value: String) -> Self {
        Priority::parse(&value)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle of an action item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    #[default]
    Pending,
    InProgress,
    Done,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Pending => "pending",
            ActionStatus::InProgress => "in_progress",
            ActionStatus::Done => "done",
        }
    }
}

impl FromStr for ActionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "pending" => Ok(ActionStatus::Pending),
            "in_progress" => Ok(ActionStatus::InProgress),
            "done" | "completed" => Ok(ActionStatus::Done),
            other => Err(format!("unknown action status: {}", other)),
        }
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A remediation task derived from a finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionItem {
    pub id: String,
    pub title: String,
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

/// Parses a `YYYY-MM-DD` date, also accepting a full ISO timestamp.
pub fn parse_due_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    let date_part = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// Whether every stage produced real content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionStatus {
    Complete,
    Degraded,
}

/// Summary produced by the terminal stage of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalReport {
    pub title: String,
    pub regulation_source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    pub summary: String,
    pub key_requirements: Vec<String>,
    pub compliance_risks: Vec<String>,
    pub findings_count: usize,
    pub action_items_count: usize,
    pub high_priority_actions: usize,
    pub completion_status: CompletionStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regulation_accepts_text_alias() {
        let regulation: Regulation =
            serde_json::from_str(r#"{"source": "GDPR", "title": "X", "text": "Y"}"#)
                .expect("valid regulation");
        assert_eq!(regulation.content, "Y");
        assert!(regulation.validate().is_ok());
    }

    #[test]
    fn test_regulation_validation_names_the_field() {
        let regulation = Regulation::new("SEC", "  ", "body");
        assert_eq!(
            regulation.validate(),
            Err("regulation title is empty".to_string())
        );
    }

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(Finding::new("1", "t", "d", "s", 1.7).confidence_score, 1.0);
        assert_eq!(Finding::new("1", "t", "d", "s", -0.2).confidence_score, 0.0);
        assert_eq!(
            Finding::new("1", "t", "d", "s", f64::NAN).confidence_score,
            0.0
        );
        assert_eq!(Finding::new("1", "t", "d", "s", 0.85).confidence_score, 0.85);
    }

    #[test]
    fn test_priority_parsing() {
        assert_eq!(Priority::parse("High"), Priority::High);
        assert_eq!(Priority::parse(" LOW "), Priority::Low);
        assert_eq!(Priority::parse("whenever"), Priority::Medium);

        let parsed: Priority = serde_json::from_str("\"HIGH\"").expect("string priority");
        assert_eq!(parsed, Priority::High);
        assert_eq!(
            serde_json::to_string(&Priority::Medium).expect("serializes"),
            "\"medium\""
        );
    }

    #[test]
    fn test_action_status_round_trip() {
        assert_eq!(
            "In Progress".parse::<ActionStatus>(),
            Ok(ActionStatus::InProgress)
        );
        assert!("blocked".parse::<ActionStatus>().is_err());
        assert_eq!(
            serde_json::to_string(&ActionStatus::InProgress).expect("serializes"),
            "\"in_progress\""
        );
    }

    #[test]
    fn test_parse_due_date() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 1);
        assert_eq!(parse_due_date("2025-03-01"), expected);
        assert_eq!(parse_due_date("2025-03-01T12:00:00"), expected);
        assert_eq!(parse_due_date("next quarter"), None);
    }

    #[test]
    fn test_derive_id_is_stable() {
        let a = derive_id("finding", &["GDPR", "X", "0"]);
        let b = derive_id("finding", &["GDPR", "X", "0"]);
        let c = derive_id("finding", &["GDPR", "X", "1"]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(Uuid::parse_str(&a).is_ok());
    }
}
