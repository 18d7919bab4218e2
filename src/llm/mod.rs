//! Completion function plumbing.
//!
//! [`client`] speaks the OpenAI-compatible chat completion protocol.
//! [`completion`] turns a provider into the opaque `complete(prompt)` function
//! the pipeline stages call, and implements the parse-with-fallback protocol.

pub mod client;
pub mod completion;

pub use client::{
    ChatCompletionClient, Choice, GenerationRequest, GenerationResponse, LlmProvider, Message,
    Usage,
};
pub use completion::{
    complete_structured, parse_structured, Completer, LlmCompleter, Structured, TimeoutCompleter,
};
