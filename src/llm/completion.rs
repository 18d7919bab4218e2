//! The completion function seam used by pipeline stages.
//!
//! Stages see the language model as `complete(prompt) -> text`. Everything
//! about transport, models and timeouts lives behind [`Completer`], which is
//! injected into the pipeline at construction time.
//!
//! [`complete_structured`] layers the parse-with-fallback protocol on top:
//! a failed *call* is an error, while a malformed *answer* degrades to a
//! caller-provided placeholder of the right shape.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use super::client::{GenerationRequest, LlmProvider, Message};
use crate::error::LlmError;
use crate::utils::json_extraction::{try_extract_json, JsonExtractionResult};

/// System prompt sent with every completion request.
const JSON_ONLY_SYSTEM_PROMPT: &str = "You are a regulatory compliance analyst. \
Respond with a single valid JSON object and no text before or after it.";

/// Opaque text-completion function.
#[async_trait]
pub trait Completer: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// [`Completer`] backed by a chat completion provider.
pub struct LlmCompleter {
    provider: Arc<dyn LlmProvider>,
    model: String,
    temperature: f64,
    max_tokens: u32,
}

impl LlmCompleter {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.2,
            max_tokens: 2000,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature.clamp(0.0, 2.0);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl Completer for LlmCompleter {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let request = GenerationRequest::new(
            self.model.clone(),
            vec![Message::system(JSON_ONLY_SYSTEM_PROMPT), Message::user(prompt)],
        )
        .with_temperature(self.temperature)
        .with_max_tokens(self.max_tokens);

        let response = self.provider.generate(request).await?;
        tracing::debug!(
            model = %response.model,
            total_tokens = response.usage.total_tokens,
            "Completion received"
        );

        response
            .first_content()
            .map(str::to_string)
            .ok_or(LlmError::EmptyResponse)
    }
}

/// Wraps a completer with a deadline. Expiry is reported as
/// [`LlmError::Timeout`], which stages treat like any other call failure.
pub struct TimeoutCompleter {
    inner: Arc<dyn Completer>,
    timeout: Duration,
}

impl TimeoutCompleter {
    pub fn new(inner: Arc<dyn Completer>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl Completer for TimeoutCompleter {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        match tokio::time::timeout(self.timeout, self.inner.complete(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout {
                seconds: self.timeout.as_secs(),
            }),
        }
    }
}

/// A parsed completion, or the fallback used in its place.
#[derive(Debug, Clone, PartialEq)]
pub enum Structured<T> {
    Parsed(T),
    Fallback(T),
}

impl<T> Structured<T> {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Structured::Fallback(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            Structured::Parsed(value) | Structured::Fallback(value) => value,
        }
    }
}

/// Parses completion text into `T`, accepting fenced or prose-wrapped JSON.
pub fn parse_structured<T: DeserializeOwned>(text: &str) -> Result<T, String> {
    let direct = match serde_json::from_str::<T>(text.trim()) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    match try_extract_json(text) {
        JsonExtractionResult::Success(json) => {
            serde_json::from_str::<T>(&json).map_err(|e| format!("shape mismatch: {}", e))
        }
        JsonExtractionResult::Truncated {
            unclosed_braces,
            unclosed_brackets,
            ..
        } => Err(format!(
            "truncated JSON ({} unclosed braces, {} unclosed brackets)",
            unclosed_braces, unclosed_brackets
        )),
        JsonExtractionResult::NotFound => Err(format!("no JSON found: {}", direct)),
    }
}

/// Runs one completion and parses it as `T`.
///
/// Returns `Err` only when the call itself fails. Unparseable output yields
/// `Structured::Fallback(fallback(raw_text))`.
pub async fn complete_structured<T, F>(
    completer: &dyn Completer,
    prompt: &str,
    fallback: F,
) -> Result<Structured<T>, LlmError>
where
    T: DeserializeOwned,
    F: FnOnce(&str) -> T,
{
    let text = completer.complete(prompt).await?;

    match parse_structured::<T>(&text) {
        Ok(value) => Ok(Structured::Parsed(value)),
        Err(reason) => {
            let preview: String = text.trim().chars().take(100).collect();
            tracing::warn!(
                reason = %reason,
                content_preview = %preview,
                "Completion did not match the expected shape, using fallback"
            );
            Ok(Structured::Fallback(fallback(&text)))
        }
    }
}
