//! compliance-ai: staged LLM pipeline for regulatory compliance work.
//!
//! A regulation flows through regulatory analysis, impact assessment, action
//! planning and report generation. Findings and action items are persisted to
//! a record store on a best-effort basis and served over a small HTTP API.

pub mod cli;
pub mod compliance;
pub mod error;
pub mod llm;
pub mod metrics;
pub mod pipeline;
pub mod server;
pub mod stages;
pub mod storage;
pub mod utils;

pub use error::{LlmError, StageError};
pub use pipeline::{CompliancePipeline, PipelineOutcome, PipelineState};
