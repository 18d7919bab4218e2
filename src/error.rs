//! Error types shared across compliance-ai subsystems.
//!
//! Subsystem-specific errors live next to their code (`StoreError` in
//! `storage`, `ConfigError` in `pipeline::config`, `ApiError` in `server`).
//! This module holds the errors that cross module boundaries:
//! - Completion function (LLM API) failures
//! - Stage failures, which are recorded into the pipeline state as messages

use thiserror::Error;

/// Errors that can occur while calling the completion function.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("LLM returned an empty response")]
    EmptyResponse,

    #[error("Completion timed out after {seconds} seconds")]
    Timeout { seconds: u64 },
}

/// A failure inside a pipeline stage.
///
/// Stages never return this across the stage boundary; they render it with
/// `to_string()` and append the message to `PipelineState::errors`.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("{stage} failed: {source}")]
    Completion {
        stage: &'static str,
        #[source]
        source: LlmError,
    },

    #[error("{stage} failed: {reason}")]
    InvalidInput { stage: &'static str, reason: String },
}

impl StageError {
    pub fn completion(stage: &'static str, source: LlmError) -> Self {
        StageError::Completion { stage, source }
    }

    pub fn invalid_input(stage: &'static str, reason: impl Into<String>) -> Self {
        StageError::InvalidInput {
            stage,
            reason: reason.into(),
        }
    }
}
