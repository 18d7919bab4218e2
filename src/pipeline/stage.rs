//! The stage seam.

use async_trait::async_trait;

use super::state::PipelineState;

/// One step of the pipeline.
///
/// `run` never fails: internal failures become entries in
/// `PipelineState::errors`. A stage given a state that already has errors
/// returns it unchanged.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Display name, also used as the prefix of error messages.
    fn name(&self) -> &'static str;

    async fn run(&self, state: PipelineState) -> PipelineState;
}
