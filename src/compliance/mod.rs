//! Compliance domain: regulations, findings, action items and reports.

pub mod report;
pub mod sources;
pub mod types;

pub use report::ComplianceReport;
pub use sources::{default_sources, RegulatorySource};
pub use types::{
    derive_id, parse_due_date, ActionItem, ActionStatus, CompletionStatus, FinalReport, Finding,
    ImpactAssessment, Priority, Regulation, RegulationChange, RegulatoryAnalysis,
};
